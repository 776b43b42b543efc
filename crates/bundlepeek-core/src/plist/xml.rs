//! XML property list decoding.
//!
//! A small recursive-descent parser over the standard tag-per-type
//! structure. It is not a general XML parser: it understands exactly the
//! document shape plists use (prolog, doctype, comments, one `<plist>`
//! root, nested typed elements) and fails hard on anything else.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::DateTime;
use chrono::Utc;

use super::Value;
use crate::PreviewError;
use crate::Result;

/// Decodes an XML-serialized property list.
pub(super) fn decode(bytes: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| malformed("XML plist is not valid UTF-8"))?
        .trim_start_matches('\u{feff}');
    let mut parser = Parser { text, pos: 0 };

    parser.skip_misc();
    let had_plist_root = parser.try_open_tag("plist")?;
    parser.skip_misc();
    let value = parser.parse_value()?;
    parser.skip_misc();
    if had_plist_root {
        parser.expect_close_tag("plist")?;
        parser.skip_misc();
    }
    if parser.pos != parser.text.len() {
        return Err(malformed("trailing content after document root"));
    }
    Ok(value)
}

fn malformed(msg: impl Into<String>) -> PreviewError {
    PreviewError::MalformedPlist(msg.into())
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn error(&self, msg: &str) -> PreviewError {
        malformed(format!("{msg} at byte {}", self.pos))
    }

    /// Skips whitespace, comments, the XML prolog, and doctype blocks.
    fn skip_misc(&mut self) {
        let text = self.text;
        loop {
            let trimmed = text[self.pos..].trim_start();
            self.pos = text.len() - trimmed.len();
            if let Some(after) = trimmed.strip_prefix("<!--") {
                match after.find("-->") {
                    Some(end) => self.pos += 4 + end + 3,
                    None => self.pos = text.len(),
                }
            } else if trimmed.starts_with("<?") || trimmed.starts_with("<!") {
                match trimmed.find('>') {
                    Some(end) => self.pos += end + 1,
                    None => self.pos = text.len(),
                }
            } else {
                return;
            }
        }
    }

    /// Consumes an opening tag with the given name if present, returning
    /// `false` when there is no match. Attributes are skipped; a
    /// self-closing match is an error here (plist roots never are).
    fn try_open_tag(&mut self, name: &str) -> Result<bool> {
        let rest = self.rest();
        let Some(after) = rest.strip_prefix('<').and_then(|r| r.strip_prefix(name)) else {
            return Ok(false);
        };
        if !after.starts_with([' ', '\t', '\n', '\r', '>']) {
            return Ok(false);
        }
        let close = after
            .find('>')
            .ok_or_else(|| self.error("unterminated tag"))?;
        if after[..close].ends_with('/') {
            return Err(self.error("unexpected self-closing root tag"));
        }
        self.pos += 1 + name.len() + close + 1;
        Ok(true)
    }

    fn expect_close_tag(&mut self, name: &str) -> Result<()> {
        let expected = format!("</{name}>");
        if self.rest().starts_with(&expected) {
            self.pos += expected.len();
            Ok(())
        } else {
            Err(self.error(&format!("expected {expected}")))
        }
    }

    /// Reads the next element start, returning its tag name and whether
    /// it was self-closing.
    fn open_any_tag(&mut self) -> Result<(&str, bool)> {
        if !self.rest().starts_with('<') {
            return Err(self.error("expected an element"));
        }
        let inner_at = self.pos + 1;
        let close = self.rest()
            .find('>')
            .ok_or_else(|| self.error("unterminated tag"))?;
        let inner = &self.text[inner_at..self.pos + close];
        let (inner, self_closing) = match inner.strip_suffix('/') {
            Some(stripped) => (stripped, true),
            None => (inner, false),
        };
        let name_len = inner
            .find(|c: char| c.is_ascii_whitespace())
            .unwrap_or(inner.len());
        let name = &inner[..name_len];
        if name.is_empty() || name.starts_with('/') {
            return Err(self.error("expected an element"));
        }
        self.pos += close + 1;
        Ok((name, self_closing))
    }

    /// Reads character data up to the next `<`, resolving entities.
    fn read_text(&mut self) -> Result<String> {
        let end = self.rest().find('<').unwrap_or(self.rest().len());
        let raw = &self.rest()[..end];
        let resolved = unescape(raw).ok_or_else(|| self.error("bad character entity"))?;
        self.pos += end;
        Ok(resolved)
    }

    fn parse_value(&mut self) -> Result<Value> {
        let (name, self_closing) = self.open_any_tag()?;
        let name = name.to_string();
        if self_closing {
            return empty_element(&name).ok_or_else(|| {
                self.error(&format!("unknown self-closing element <{name}/>"))
            });
        }
        match name.as_str() {
            "true" | "false" => {
                // Booleans are normally self-closing but <true></true>
                // appears in the wild.
                self.expect_close_tag(&name)?;
                Ok(Value::Boolean(name == "true"))
            }
            "string" => {
                let text = self.read_text()?;
                self.expect_close_tag("string")?;
                Ok(Value::String(text))
            }
            "integer" => {
                let text = self.read_text()?;
                self.expect_close_tag("integer")?;
                let n: i64 = text
                    .trim()
                    .parse()
                    .map_err(|_| malformed(format!("bad integer literal {text:?}")))?;
                Ok(Value::Integer(n))
            }
            "real" => {
                let text = self.read_text()?;
                self.expect_close_tag("real")?;
                let r: f64 = text
                    .trim()
                    .parse()
                    .map_err(|_| malformed(format!("bad real literal {text:?}")))?;
                Ok(Value::Real(r))
            }
            "date" => {
                let text = self.read_text()?;
                self.expect_close_tag("date")?;
                let date = DateTime::parse_from_rfc3339(text.trim())
                    .map_err(|_| malformed(format!("bad date literal {text:?}")))?;
                Ok(Value::Date(date.with_timezone(&Utc)))
            }
            "data" => {
                let text = self.read_text()?;
                self.expect_close_tag("data")?;
                let stripped: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                let bytes = BASE64
                    .decode(stripped.as_bytes())
                    .map_err(|_| malformed("bad base64 in <data>"))?;
                Ok(Value::Data(bytes))
            }
            "array" => {
                let mut items = Vec::new();
                loop {
                    self.skip_misc();
                    if self.rest().starts_with("</array>") {
                        self.pos += "</array>".len();
                        return Ok(Value::Array(items));
                    }
                    items.push(self.parse_value()?);
                }
            }
            "dict" => {
                let mut map = BTreeMap::new();
                loop {
                    self.skip_misc();
                    if self.rest().starts_with("</dict>") {
                        self.pos += "</dict>".len();
                        return Ok(Value::Dict(map));
                    }
                    let (tag, self_closing) = self.open_any_tag()?;
                    if tag != "key" {
                        return Err(malformed(format!("expected <key>, found <{tag}>")));
                    }
                    let key = if self_closing {
                        String::new()
                    } else {
                        let key = self.read_text()?;
                        self.expect_close_tag("key")?;
                        key
                    };
                    self.skip_misc();
                    let value = self.parse_value()?;
                    // Later duplicates win, matching lenient readers.
                    map.insert(key, value);
                }
            }
            other => Err(malformed(format!("unknown element <{other}>"))),
        }
    }
}

fn empty_element(name: &str) -> Option<Value> {
    match name {
        "true" => Some(Value::Boolean(true)),
        "false" => Some(Value::Boolean(false)),
        "dict" => Some(Value::Dict(BTreeMap::new())),
        "array" => Some(Value::Array(Vec::new())),
        "string" | "key" => Some(Value::String(String::new())),
        "data" => Some(Value::Data(Vec::new())),
        _ => None,
    }
}

/// Resolves the predefined XML entities plus numeric character
/// references. Returns `None` on an unterminated or unknown entity.
fn unescape(raw: &str) -> Option<String> {
    if !raw.contains('&') {
        return Some(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let semi = rest.find(';')?;
        let entity = &rest[1..semi];
        match entity {
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "amp" => out.push('&'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(str::parse))?
                    .ok()?;
                out.push(char::from_u32(code)?);
            }
        }
        rest = &rest[semi + 1..];
    }
    out.push_str(rest);
    Some(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(text: &str) -> Result<Value> {
        decode(text.as_bytes())
    }

    const PREFIX: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
        <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \
        \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n";

    #[test]
    fn test_full_document() {
        let doc = format!(
            "{PREFIX}<plist version=\"1.0\">\n<dict>\n\
             \t<key>CFBundleIdentifier</key>\n\t<string>com.example.app</string>\n\
             \t<key>CFBundleVersion</key>\n\t<integer>42</integer>\n\
             \t<key>LSRequiresIPhoneOS</key>\n\t<true/>\n\
             </dict>\n</plist>\n"
        );
        let value = parse(&doc).unwrap();
        assert_eq!(value.get_str("CFBundleIdentifier"), Some("com.example.app"));
        assert_eq!(value.get_i64("CFBundleVersion"), Some(42));
        assert_eq!(value.get_bool("LSRequiresIPhoneOS"), Some(true));
    }

    #[test]
    fn test_without_plist_root() {
        let value = parse("<dict><key>a</key><integer>1</integer></dict>").unwrap();
        assert_eq!(value.get_i64("a"), Some(1));
    }

    #[test]
    fn test_nested_collections() {
        let value = parse(
            "<plist version=\"1.0\"><dict>\
             <key>UIDeviceFamily</key><array><integer>1</integer><integer>2</integer></array>\
             <key>Nested</key><dict><key>deep</key><string>yes</string></dict>\
             </dict></plist>",
        )
        .unwrap();
        let family = value.get_array("UIDeviceFamily").unwrap();
        assert_eq!(family, &[Value::Integer(1), Value::Integer(2)]);
        assert_eq!(
            value.get("Nested").and_then(|n| n.get_str("deep")),
            Some("yes")
        );
    }

    #[test]
    fn test_date_and_data() {
        let value = parse(
            "<dict>\
             <key>ExpirationDate</key><date>2027-06-01T12:00:00Z</date>\
             <key>DER-Encoded-Profile</key><data>aGVsbG8=</data>\
             </dict>",
        )
        .unwrap();
        assert_eq!(
            value.get_date("ExpirationDate"),
            Some(Utc.with_ymd_and_hms(2027, 6, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(
            value.get("DER-Encoded-Profile").and_then(Value::as_data),
            Some(b"hello".as_slice())
        );
    }

    #[test]
    fn test_data_with_line_breaks() {
        let value = parse("<data>\n aGVs\n bG8= \n</data>").unwrap();
        assert_eq!(value, Value::Data(b"hello".to_vec()));
    }

    #[test]
    fn test_entities() {
        let value = parse("<string>a &lt;b&gt; &amp; &#44; &#x2603;</string>").unwrap();
        assert_eq!(value, Value::String("a <b> & , ☃".into()));
    }

    #[test]
    fn test_empty_elements() {
        assert_eq!(parse("<string></string>").unwrap(), Value::String(String::new()));
        assert_eq!(parse("<string/>").unwrap(), Value::String(String::new()));
        assert_eq!(parse("<dict/>").unwrap(), Value::Dict(BTreeMap::new()));
        assert_eq!(parse("<array/>").unwrap(), Value::Array(Vec::new()));
        assert_eq!(parse("<false/>").unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_comments_skipped() {
        let value = parse(
            "<dict><!-- injected by build -->\
             <key>a</key><!-- why not here too --><integer>1</integer></dict>",
        )
        .unwrap();
        assert_eq!(value.get_i64("a"), Some(1));
    }

    #[test]
    fn test_reject_mismatched_close() {
        assert!(matches!(
            parse("<dict><key>a</key><integer>1</integer></array>"),
            Err(PreviewError::MalformedPlist(_))
        ));
    }

    #[test]
    fn test_reject_key_outside_dict_value_position() {
        assert!(matches!(
            parse("<dict><integer>1</integer></dict>"),
            Err(PreviewError::MalformedPlist(_))
        ));
    }

    #[test]
    fn test_reject_unknown_element() {
        assert!(matches!(
            parse("<plist version=\"1.0\"><widget>x</widget></plist>"),
            Err(PreviewError::MalformedPlist(_))
        ));
    }

    #[test]
    fn test_reject_bad_literals() {
        assert!(parse("<integer>four</integer>").is_err());
        assert!(parse("<real>..5</real>").is_err());
        assert!(parse("<date>tomorrow</date>").is_err());
        assert!(parse("<data>!!!</data>").is_err());
    }

    #[test]
    fn test_reject_trailing_garbage() {
        assert!(matches!(
            parse("<plist version=\"1.0\"><dict/></plist><dict/>"),
            Err(PreviewError::MalformedPlist(_))
        ));
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let value = parse(
            "<dict><key>v</key><integer>1</integer><key>v</key><integer>2</integer></dict>",
        )
        .unwrap();
        assert_eq!(value.get_i64("v"), Some(2));
    }
}

//! Binary property list (`bplist00`) decoding and encoding.
//!
//! Layout per Apple's published format: an 8-byte magic, a pool of
//! variable-length objects, an offset table locating each object, and a
//! 32-byte trailer giving the offset-table offset, the offset and object
//! reference widths, the object count, and the top object index.
//!
//! The encoder exists so the value model can be round-tripped in tests
//! and so fixtures can be generated without hand-built byte blobs; the
//! crate has no archive-writing ambitions beyond that.

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;

use super::BPLIST_MAGIC;
use super::Value;
use crate::PreviewError;
use crate::Result;

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z, the binary
/// plist date reference point.
const COCOA_EPOCH_UNIX: i64 = 978_307_200;

/// Containers nested deeper than this are treated as structural damage.
const MAX_DEPTH: usize = 512;

const TRAILER_LEN: usize = 32;

fn malformed(msg: impl Into<String>) -> PreviewError {
    PreviewError::MalformedPlist(msg.into())
}

/// Reads a big-endian unsigned integer of `size` bytes at `offset`.
fn read_be_uint(bytes: &[u8], offset: usize, size: usize) -> Result<u64> {
    if size == 0 || size > 8 {
        return Err(malformed(format!("invalid integer width {size}")));
    }
    let end = offset
        .checked_add(size)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| malformed("integer field extends past end of input"))?;
    let mut value: u64 = 0;
    for b in &bytes[offset..end] {
        value = value << 8 | u64::from(*b);
    }
    Ok(value)
}

/// Recovers the length of a `bplist00` document that starts at the head
/// of `bytes` but may be followed by unrelated trailing data.
///
/// The trailer pins down the document length: offset table position plus
/// table size plus the trailer itself must land exactly on the document
/// end. Scanning backward for a self-consistent trailer finds that
/// boundary without parsing whatever framing surrounds the plist.
pub(crate) fn embedded_len(bytes: &[u8]) -> Option<usize> {
    if !bytes.starts_with(BPLIST_MAGIC) {
        return None;
    }
    // Smallest document: magic, one object byte, one offset byte,
    // trailer.
    let min = BPLIST_MAGIC.len() + 2 + TRAILER_LEN;
    for end in (min..=bytes.len()).rev() {
        let trailer = &bytes[end - TRAILER_LEN..end];
        if trailer[..6] != [0u8; 6] {
            continue;
        }
        let offset_int_size = u64::from(trailer[6]);
        if !(1..=8).contains(&offset_int_size) {
            continue;
        }
        let Ok(num_objects) = read_be_uint(trailer, 8, 8) else {
            continue;
        };
        let Ok(table_offset) = read_be_uint(trailer, 24, 8) else {
            continue;
        };
        if num_objects == 0 {
            continue;
        }
        let expected = num_objects
            .checked_mul(offset_int_size)
            .and_then(|table_len| table_len.checked_add(table_offset))
            .and_then(|table_end| table_end.checked_add(TRAILER_LEN as u64))
            .and_then(|len| usize::try_from(len).ok());
        if expected == Some(end) {
            return Some(end);
        }
    }
    None
}

/// Decodes a complete `bplist00` document.
pub(super) fn decode(bytes: &[u8]) -> Result<Value> {
    if !bytes.starts_with(BPLIST_MAGIC) {
        return Err(malformed("missing bplist00 magic"));
    }
    if bytes.len() < BPLIST_MAGIC.len() + TRAILER_LEN {
        return Err(malformed("input shorter than magic plus trailer"));
    }

    let trailer = &bytes[bytes.len() - TRAILER_LEN..];
    let offset_int_size = usize::from(trailer[6]);
    let ref_size = usize::from(trailer[7]);
    let num_objects = read_be_uint(trailer, 8, 8)?;
    let top_object = read_be_uint(trailer, 16, 8)?;
    let table_offset = read_be_uint(trailer, 24, 8)?;

    if !(1..=8).contains(&offset_int_size) || !(1..=8).contains(&ref_size) {
        return Err(malformed("invalid offset or reference width in trailer"));
    }
    if num_objects == 0 {
        return Err(malformed("zero objects"));
    }
    let num_objects = usize::try_from(num_objects)
        .map_err(|_| malformed("object count overflows address space"))?;
    let table_offset = usize::try_from(table_offset)
        .map_err(|_| malformed("offset table offset overflows address space"))?;

    // Offset table has to fit between the magic and the trailer.
    let table_len = num_objects
        .checked_mul(offset_int_size)
        .ok_or_else(|| malformed("offset table size overflow"))?;
    let table_end = table_offset
        .checked_add(table_len)
        .ok_or_else(|| malformed("offset table end overflow"))?;
    if table_offset < BPLIST_MAGIC.len() || table_end > bytes.len() - TRAILER_LEN {
        return Err(malformed("truncated offset table"));
    }
    if top_object >= num_objects as u64 {
        return Err(malformed("top object index out of range"));
    }

    let mut offsets = Vec::with_capacity(num_objects);
    for i in 0..num_objects {
        let off = read_be_uint(bytes, table_offset + i * offset_int_size, offset_int_size)?;
        let off =
            usize::try_from(off).map_err(|_| malformed("object offset overflows address space"))?;
        if off < BPLIST_MAGIC.len() || off >= table_offset {
            return Err(malformed(format!("object {i} offset out of range")));
        }
        offsets.push(off);
    }

    let mut decoder = Decoder {
        bytes,
        offsets,
        ref_size,
        in_progress: vec![false; num_objects],
    };
    #[allow(clippy::cast_possible_truncation)]
    decoder.parse_object(top_object as usize, 0)
}

struct Decoder<'a> {
    bytes: &'a [u8],
    offsets: Vec<usize>,
    ref_size: usize,
    in_progress: Vec<bool>,
}

impl Decoder<'_> {
    fn parse_object(&mut self, index: usize, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(malformed("nesting exceeds depth limit"));
        }
        let offset = *self
            .offsets
            .get(index)
            .ok_or_else(|| malformed(format!("object reference {index} out of range")))?;
        if self.in_progress[index] {
            return Err(malformed("cyclic object reference"));
        }

        let marker = *self
            .bytes
            .get(offset)
            .ok_or_else(|| malformed("object offset past end of input"))?;
        let info = usize::from(marker & 0x0F);
        let body = offset + 1;

        let value = match marker >> 4 {
            0x0 => match marker {
                0x00 => Value::Null,
                0x08 => Value::Boolean(false),
                0x09 => Value::Boolean(true),
                _ => return Err(malformed(format!("unknown singleton marker {marker:#04x}"))),
            },
            0x1 => self.parse_int(body, 1usize << info)?,
            0x2 => self.parse_real(body, 1usize << info)?,
            0x3 => {
                if info != 3 {
                    return Err(malformed(format!("unknown date marker {marker:#04x}")));
                }
                let bits = read_be_uint(self.bytes, body, 8)?;
                Value::Date(date_from_cocoa_seconds(f64::from_bits(bits))?)
            }
            0x4 => {
                let (count, start) = self.parse_count(info, body)?;
                Value::Data(self.slice(start, count)?.to_vec())
            }
            0x5 => {
                let (count, start) = self.parse_count(info, body)?;
                let raw = self.slice(start, count)?;
                let text = std::str::from_utf8(raw)
                    .map_err(|_| malformed("invalid bytes in ASCII string"))?;
                Value::String(text.to_string())
            }
            0x6 => {
                let (count, start) = self.parse_count(info, body)?;
                let byte_len = count
                    .checked_mul(2)
                    .ok_or_else(|| malformed("UTF-16 string length overflow"))?;
                let raw = self.slice(start, byte_len)?;
                let units: Vec<u16> = raw
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                let text = String::from_utf16(&units)
                    .map_err(|_| malformed("invalid UTF-16 string"))?;
                Value::String(text)
            }
            0x8 => Value::Uid(read_be_uint(self.bytes, body, info + 1)?),
            0xA => {
                let (count, start) = self.parse_count(info, body)?;
                self.in_progress[index] = true;
                let result = self.parse_array(start, count, depth);
                self.in_progress[index] = false;
                result?
            }
            0xD => {
                let (count, start) = self.parse_count(info, body)?;
                self.in_progress[index] = true;
                let result = self.parse_dict(start, count, depth);
                self.in_progress[index] = false;
                result?
            }
            _ => return Err(malformed(format!("unknown object marker {marker:#04x}"))),
        };
        Ok(value)
    }

    /// Resolves a count nibble, following the trailing int object used
    /// for counts of 15 or more. Returns the count and the offset just
    /// past it.
    fn parse_count(&self, info: usize, body: usize) -> Result<(usize, usize)> {
        if info != 0x0F {
            return Ok((info, body));
        }
        let marker = *self
            .bytes
            .get(body)
            .ok_or_else(|| malformed("count field past end of input"))?;
        if marker >> 4 != 0x1 {
            return Err(malformed("count is not an integer object"));
        }
        let size = 1usize << (marker & 0x0F);
        let count = read_be_uint(self.bytes, body + 1, size)?;
        let count =
            usize::try_from(count).map_err(|_| malformed("count overflows address space"))?;
        if count > self.bytes.len() {
            // No object can hold more elements than the file has bytes.
            return Err(malformed("count exceeds input size"));
        }
        Ok((count, body + 1 + size))
    }

    fn parse_int(&self, body: usize, size: usize) -> Result<Value> {
        match size {
            1 | 2 | 4 => {
                let value = read_be_uint(self.bytes, body, size)?;
                #[allow(clippy::cast_possible_wrap)]
                Ok(Value::Integer(value as i64))
            }
            // 8-byte integers are the only signed width in the format.
            8 => {
                let raw = read_be_uint(self.bytes, body, 8)?;
                #[allow(clippy::cast_possible_wrap)]
                Ok(Value::Integer(raw as i64))
            }
            16 => {
                let high = read_be_uint(self.bytes, body, 8)?;
                let low = read_be_uint(self.bytes, body + 8, 8)?;
                let wide = (i128::from(high) << 64) | i128::from(low);
                let narrow = i64::try_from(wide)
                    .map_err(|_| malformed("128-bit integer does not fit the value model"))?;
                Ok(Value::Integer(narrow))
            }
            _ => Err(malformed(format!("unsupported integer width {size}"))),
        }
    }

    fn parse_real(&self, body: usize, size: usize) -> Result<Value> {
        match size {
            4 => {
                let bits = read_be_uint(self.bytes, body, 4)?;
                #[allow(clippy::cast_possible_truncation)]
                Ok(Value::Real(f64::from(f32::from_bits(bits as u32))))
            }
            8 => {
                let bits = read_be_uint(self.bytes, body, 8)?;
                Ok(Value::Real(f64::from_bits(bits)))
            }
            _ => Err(malformed(format!("unsupported real width {size}"))),
        }
    }

    fn parse_array(&mut self, refs_at: usize, count: usize, depth: usize) -> Result<Value> {
        let mut items = Vec::with_capacity(count.min(1024));
        for i in 0..count {
            let child = self.object_ref(refs_at + i * self.ref_size)?;
            items.push(self.parse_object(child, depth + 1)?);
        }
        Ok(Value::Array(items))
    }

    fn parse_dict(&mut self, refs_at: usize, count: usize, depth: usize) -> Result<Value> {
        let values_at = refs_at + count * self.ref_size;
        let mut map = BTreeMap::new();
        for i in 0..count {
            let key_ref = self.object_ref(refs_at + i * self.ref_size)?;
            let value_ref = self.object_ref(values_at + i * self.ref_size)?;
            let key = match self.parse_object(key_ref, depth + 1)? {
                Value::String(s) => s,
                _ => return Err(malformed("dictionary key is not a string")),
            };
            let value = self.parse_object(value_ref, depth + 1)?;
            map.insert(key, value);
        }
        Ok(Value::Dict(map))
    }

    fn object_ref(&self, at: usize) -> Result<usize> {
        let raw = read_be_uint(self.bytes, at, self.ref_size)?;
        usize::try_from(raw).map_err(|_| malformed("object reference overflows address space"))
    }

    fn slice(&self, start: usize, len: usize) -> Result<&[u8]> {
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| malformed("variable-length object extends past end of input"))?;
        Ok(&self.bytes[start..end])
    }
}

fn date_from_cocoa_seconds(seconds: f64) -> Result<DateTime<Utc>> {
    if !seconds.is_finite() {
        return Err(malformed("non-finite date"));
    }
    let whole = seconds.floor();
    #[allow(clippy::cast_possible_truncation)]
    let mut nanos = ((seconds - whole) * 1.0e9).round() as u32;
    #[allow(clippy::cast_possible_truncation)]
    let mut unix = whole as i64 + COCOA_EPOCH_UNIX;
    if nanos >= 1_000_000_000 {
        nanos -= 1_000_000_000;
        unix += 1;
    }
    DateTime::from_timestamp(unix, nanos).ok_or_else(|| malformed("date out of range"))
}

fn cocoa_seconds_from_date(date: DateTime<Utc>) -> f64 {
    let unix = date.timestamp() - COCOA_EPOCH_UNIX;
    #[allow(clippy::cast_precision_loss)]
    let whole = unix as f64;
    whole + f64::from(date.timestamp_subsec_nanos()) / 1.0e9
}

// ---------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------

enum Obj<'a> {
    Val(&'a Value),
    Key(&'a str),
}

/// Serializes a value tree as a `bplist00` document.
///
/// Every node becomes its own object (no uniquing); decoding the result
/// yields a tree equal to the input, with dates compared at nanosecond
/// precision.
#[must_use]
pub fn encode_binary(value: &Value) -> Vec<u8> {
    let mut objs: Vec<Obj<'_>> = Vec::new();
    let mut children: Vec<Vec<usize>> = Vec::new();
    let top = flatten(value, &mut objs, &mut children);

    let ref_size = width_for(objs.len() as u64);
    let mut out = Vec::new();
    out.extend_from_slice(BPLIST_MAGIC);

    let mut offsets = Vec::with_capacity(objs.len());
    for (id, obj) in objs.iter().enumerate() {
        offsets.push(out.len() as u64);
        match obj {
            Obj::Key(s) => write_string(&mut out, s),
            Obj::Val(v) => write_value(&mut out, v, &children[id], ref_size),
        }
    }

    let table_offset = out.len() as u64;
    let offset_int_size = width_for(table_offset);
    for off in &offsets {
        write_be_uint(&mut out, *off, offset_int_size);
    }

    // Trailer: 5 unused bytes, sort version, widths, then three u64s.
    out.extend_from_slice(&[0u8; 6]);
    out.push(offset_int_size as u8);
    out.push(ref_size as u8);
    out.extend_from_slice(&(objs.len() as u64).to_be_bytes());
    out.extend_from_slice(&(top as u64).to_be_bytes());
    out.extend_from_slice(&table_offset.to_be_bytes());
    out
}

/// Assigns object ids in preorder; dictionaries contribute key objects
/// followed by value objects, matching the key-refs-then-value-refs
/// reference layout.
fn flatten<'a>(
    value: &'a Value,
    objs: &mut Vec<Obj<'a>>,
    children: &mut Vec<Vec<usize>>,
) -> usize {
    let id = objs.len();
    objs.push(Obj::Val(value));
    children.push(Vec::new());
    match value {
        Value::Array(items) => {
            let ids: Vec<usize> = items
                .iter()
                .map(|item| flatten(item, objs, children))
                .collect();
            children[id] = ids;
        }
        Value::Dict(map) => {
            let mut ids = Vec::with_capacity(map.len() * 2);
            for key in map.keys() {
                let key_id = objs.len();
                objs.push(Obj::Key(key));
                children.push(Vec::new());
                ids.push(key_id);
            }
            for item in map.values() {
                ids.push(flatten(item, objs, children));
            }
            children[id] = ids;
        }
        _ => {}
    }
    id
}

/// Smallest of the 1/2/4/8-byte widths that holds `max`.
fn width_for(max: u64) -> usize {
    if max <= u64::from(u8::MAX) {
        1
    } else if max <= u64::from(u16::MAX) {
        2
    } else if max <= u64::from(u32::MAX) {
        4
    } else {
        8
    }
}

fn write_be_uint(out: &mut Vec<u8>, value: u64, size: usize) {
    out.extend_from_slice(&value.to_be_bytes()[8 - size..]);
}

fn write_count(out: &mut Vec<u8>, marker_high: u8, count: usize) {
    if count < 0x0F {
        out.push(marker_high << 4 | count as u8);
    } else {
        out.push(marker_high << 4 | 0x0F);
        write_int(out, count as i64);
    }
}

fn write_int(out: &mut Vec<u8>, value: i64) {
    if let Ok(unsigned) = u64::try_from(value) {
        let size = width_for(unsigned);
        // Exactly u32::MAX-sized values still fit in 4 unsigned bytes,
        // but a full unsigned 8-byte range does not survive the signed
        // 8-byte reading rule, so anything wider than 4 bytes is written
        // as a signed 8-byte integer.
        if size <= 4 {
            out.push(0x10 | size.trailing_zeros() as u8);
            write_be_uint(out, unsigned, size);
            return;
        }
    }
    out.push(0x13);
    out.extend_from_slice(&value.to_be_bytes());
}

fn write_string(out: &mut Vec<u8>, text: &str) {
    if text.is_ascii() {
        write_count(out, 0x5, text.len());
        out.extend_from_slice(text.as_bytes());
    } else {
        let units: Vec<u16> = text.encode_utf16().collect();
        write_count(out, 0x6, units.len());
        for unit in units {
            out.extend_from_slice(&unit.to_be_bytes());
        }
    }
}

fn write_value(out: &mut Vec<u8>, value: &Value, child_ids: &[usize], ref_size: usize) {
    match value {
        Value::Null => out.push(0x00),
        Value::Boolean(false) => out.push(0x08),
        Value::Boolean(true) => out.push(0x09),
        Value::Integer(n) => write_int(out, *n),
        Value::Real(r) => {
            out.push(0x23);
            out.extend_from_slice(&r.to_bits().to_be_bytes());
        }
        Value::Date(d) => {
            out.push(0x33);
            out.extend_from_slice(&cocoa_seconds_from_date(*d).to_bits().to_be_bytes());
        }
        Value::Data(bytes) => {
            write_count(out, 0x4, bytes.len());
            out.extend_from_slice(bytes);
        }
        Value::String(s) => write_string(out, s),
        Value::Uid(u) => {
            let size = width_for(*u);
            out.push(0x80 | (size as u8 - 1));
            write_be_uint(out, *u, size);
        }
        Value::Array(_) => {
            write_count(out, 0xA, child_ids.len());
            for id in child_ids {
                write_be_uint(out, *id as u64, ref_size);
            }
        }
        Value::Dict(map) => {
            write_count(out, 0xD, map.len());
            for id in child_ids {
                write_be_uint(out, *id as u64, ref_size);
            }
        }
    }
}

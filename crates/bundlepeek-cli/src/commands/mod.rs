//! Subcommand implementations.

pub mod completion;
pub mod icon;
pub mod inspect;
pub mod list;
pub mod unpack;

//! Domain types for the shared instance cache.
//!
//! - [`SourceKey`], [`SlotKey`], [`Validity`], [`Ttl`]: keys and lifetimes
//! - [`XmlDocument`], [`ParsedDocument`]: immutable parsed XML
//! - [`CachedEntry`], [`InstanceView`]: stored entries and per-caller views

mod document;
mod entry;
mod key;

pub use document::*;
pub use entry::*;
pub use key::*;

//! XML parsing for instcache.
//!
//! Turns response bytes into immutable, shareable documents.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod encoding;
mod parser;

pub use parser::XmlParser;

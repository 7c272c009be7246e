//! # instcache
//!
//! Shared, TTL-bounded cache for immutable remote XML instances.
//!
//! Many request contexts reference the same external documents (code lists,
//! lookup tables). [`SharedInstanceCache::find`] fetches each URI once,
//! keeps the parsed tree for as long as its TTL allows, and hands every
//! caller a view carrying the caller's own identifiers over the shared tree.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use instcache::{FindRequest, SharedInstanceCache};
//!
//! let cache = Arc::new(SharedInstanceCache::new()?);
//!
//! let view = cache
//!     .find(FindRequest::new("countries", "main-model", "https://example.org/countries.xml")
//!         .with_ttl_millis(60_000))
//!     .await?;
//!
//! for country in view.document.root().elements() {
//!     println!("{}", country.text());
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;
mod config;

pub use cache::{CacheStats, SharedInstanceCache, SharedInstanceCacheBuilder};
pub use config::{FindRequest, InstanceCacheConfig};

pub use instcache_core::{
    CachedEntry, InstanceCacheError, InstanceView, ParsedDocument, Result, SourceKey, Ttl,
    XmlDocument, XmlElement, XmlNode,
};
pub use instcache_fetch::{FetchConfig, HttpFetcher};
pub use instcache_store::{LruSlotStore, StoreConfig};
pub use instcache_xml::XmlParser;

//! HTTP fetcher for instcache.
//!
//! Retrieves shared instance documents with plain GET requests.

mod fetch;

pub use fetch::{FetchConfig, HttpFetcher};

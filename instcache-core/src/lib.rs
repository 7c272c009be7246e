//! # instcache core
//!
//! Core types, errors, and traits for the shared instance cache.
//!
//! This crate provides the building blocks used by all other instcache crates:
//!
//! - **Types**: source keys, TTLs, parsed documents, entries and views
//! - **Errors**: the error enum returned by every cache operation
//! - **Constants**: cache namespace, default capacity, fetch defaults
//! - **Traits**: slot store, fetcher, parser and clock interfaces
//!
//! ## Example
//!
//! ```rust
//! use instcache_core::{Ttl, SlotKey, SHARED_INSTANCE_KEY_TYPE};
//!
//! let key = SlotKey::shared_instance("http://example.org/codes.xml");
//! assert_eq!(key.namespace(), SHARED_INSTANCE_KEY_TYPE);
//! assert!(Ttl::from_millis(-1).is_never());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod clock;
pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use clock::{ManualClock, SystemClock};
pub use constants::*;
pub use error::{InstanceCacheError, Result};
pub use traits::*;
pub use types::*;

//! Cache configuration and per-call requests.

use serde::{Deserialize, Serialize};

use instcache_core::types::{SourceKey, Ttl};
use instcache_fetch::FetchConfig;
use instcache_store::StoreConfig;

/// Shared instance cache configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InstanceCacheConfig {
    /// Slot store configuration
    pub store: StoreConfig,
    /// Fetcher configuration
    pub fetch: FetchConfig,
}

impl InstanceCacheConfig {
    /// Sets the slot store capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.store.capacity = capacity;
        self
    }

    /// Sets the overall fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout_seconds: u64) -> Self {
        self.fetch.timeout_seconds = timeout_seconds;
        self
    }
}

/// Arguments of a [`find`](crate::SharedInstanceCache::find) call.
///
/// `ttl` and `validation_hint` only matter when the call ends up admitting a
/// new entry; on a hit the stored values win.
#[derive(Clone, Debug)]
pub struct FindRequest {
    /// Caller's instance id, echoed into the view
    pub instance_id: String,
    /// Caller's model id, echoed into the view
    pub model_id: String,
    /// URI of the shared instance
    pub source_uri: SourceKey,
    /// Lifetime for a newly admitted entry
    pub ttl: Ttl,
    /// Schema identifier for a newly admitted entry
    pub validation_hint: Option<String>,
}

impl FindRequest {
    /// Creates a request that never expires and carries no validation hint.
    pub fn new(
        instance_id: impl Into<String>,
        model_id: impl Into<String>,
        source_uri: impl Into<SourceKey>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            model_id: model_id.into(),
            source_uri: source_uri.into(),
            ttl: Ttl::Never,
            validation_hint: None,
        }
    }

    /// Sets the TTL.
    pub fn with_ttl(mut self, ttl: Ttl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the TTL from signed milliseconds; negative means never.
    pub fn with_ttl_millis(self, ttl_ms: i64) -> Self {
        self.with_ttl(Ttl::from_millis(ttl_ms))
    }

    /// Sets the validation hint.
    pub fn with_validation(mut self, validation_hint: impl Into<String>) -> Self {
        self.validation_hint = Some(validation_hint.into());
        self
    }
}

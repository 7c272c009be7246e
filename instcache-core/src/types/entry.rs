//! Cache entries and the per-caller views built from them.
//!
//! - [`CachedEntry`]: what the slot store holds for one source URI
//! - [`InstanceView`]: what `find` hands back to a caller

use chrono::{DateTime, Utc};

use super::{ParsedDocument, SourceKey, Ttl};

// ═══════════════════════════════════════════════════════════════════════════════
// CACHED ENTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// A shared instance as stored in the slot store.
///
/// The entry is agnostic of the caller that caused its admission; caller
/// identifiers are only applied when a view is built. All fields are fixed
/// at construction, `admitted_at` included.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    document: ParsedDocument,
    source_uri: SourceKey,
    admitted_at: DateTime<Utc>,
    ttl: Ttl,
    validation_hint: Option<String>,
    is_shared: bool,
}

impl CachedEntry {
    /// Creates an application-shared entry admitted at `admitted_at`.
    pub fn new(
        document: ParsedDocument,
        source_uri: impl Into<SourceKey>,
        admitted_at: DateTime<Utc>,
        ttl: Ttl,
        validation_hint: Option<String>,
    ) -> Self {
        Self {
            document,
            source_uri: source_uri.into(),
            admitted_at,
            ttl,
            validation_hint,
            is_shared: true,
        }
    }

    /// Shared handle to the parsed document.
    pub fn document(&self) -> &ParsedDocument {
        &self.document
    }

    /// URI the entry was admitted under.
    pub fn source_uri(&self) -> &SourceKey {
        &self.source_uri
    }

    /// Wall-clock admission time.
    pub fn admitted_at(&self) -> DateTime<Utc> {
        self.admitted_at
    }

    /// Lifetime advertised at admission.
    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    /// Schema identifier propagated to views.
    pub fn validation_hint(&self) -> Option<&str> {
        self.validation_hint.as_deref()
    }

    /// Always true for entries admitted by the shared instance cache.
    pub fn is_shared(&self) -> bool {
        self.is_shared
    }

    /// Returns true if the entry's TTL has elapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ttl.is_expired(self.admitted_at, now)
    }

    /// Builds a view carrying the caller's identifiers over this entry's
    /// document.
    pub fn view(&self, instance_id: impl Into<String>, model_id: impl Into<String>) -> InstanceView {
        InstanceView {
            instance_id: instance_id.into(),
            model_id: model_id.into(),
            document: self.document.clone(),
            source_uri: self.source_uri.clone(),
            ttl: self.ttl,
            validation_hint: self.validation_hint.clone(),
            is_shared: self.is_shared,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INSTANCE VIEW
// ═══════════════════════════════════════════════════════════════════════════════

/// A caller's view of a shared instance.
///
/// Holds its own handle to the document, so it stays valid after the entry it
/// came from is expired, removed, displaced or overwritten.
#[derive(Clone, Debug)]
pub struct InstanceView {
    /// Caller-supplied instance id
    pub instance_id: String,
    /// Caller-supplied model id
    pub model_id: String,
    /// Document shared with the cache entry
    pub document: ParsedDocument,
    /// URI the entry was admitted under
    pub source_uri: SourceKey,
    /// TTL of the entry (the stored one on a hit)
    pub ttl: Ttl,
    /// Schema identifier copied from the entry
    pub validation_hint: Option<String>,
    /// Copied from the entry
    pub is_shared: bool,
}

impl InstanceView {
    /// Returns true if both views share one parsed document.
    pub fn shares_document_with(&self, other: &InstanceView) -> bool {
        ParsedDocument::ptr_eq(&self.document, &other.document)
    }
}

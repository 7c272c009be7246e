//! Keys, validity tokens and TTLs.
//!
//! - [`SourceKey`]: the URI a shared instance is indexed by
//! - [`SlotKey`]: composite `(namespace, source)` key used by the slot store
//! - [`Validity`]: opaque token compared on lookup
//! - [`Ttl`]: lifetime of an admitted entry

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{CONSTANT_VALIDITY, SHARED_INSTANCE_KEY_TYPE, TTL_NEVER_MILLIS};

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Identifier of a shared instance, semantically a URI.
///
/// Equality is byte-exact: no trimming, case folding or URL normalization is
/// applied, so `http://ex/a.xml` and `HTTP://ex/a.xml` are distinct keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceKey(String);

impl SourceKey {
    /// Wraps a URI string.
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Returns the URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceKey {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

impl From<String> for SourceKey {
    fn from(uri: String) -> Self {
        Self(uri)
    }
}

impl AsRef<str> for SourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SourceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SLOT KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Composite key under which values are held in a slot store.
///
/// The namespace lets several domain caches share one capacity budget while
/// still clearing only their own entries.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    namespace: String,
    source: SourceKey,
}

impl SlotKey {
    /// Creates a key in an arbitrary namespace.
    pub fn new(namespace: impl Into<String>, source: impl Into<SourceKey>) -> Self {
        Self {
            namespace: namespace.into(),
            source: source.into(),
        }
    }

    /// Creates a key in the shared instances namespace.
    pub fn shared_instance(source: impl Into<SourceKey>) -> Self {
        Self::new(SHARED_INSTANCE_KEY_TYPE, source)
    }

    /// Returns the namespace half of the key.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the source half of the key.
    pub fn source(&self) -> &SourceKey {
        &self.source
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.source)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Opaque validity token stored alongside a slot.
///
/// `find_valid` only returns a value when the supplied token equals the
/// stored one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Validity(pub u64);

impl Validity {
    /// The token used for every shared instance.
    pub const CONSTANT: Validity = Validity(CONSTANT_VALIDITY);
}

impl Default for Validity {
    fn default() -> Self {
        Self::CONSTANT
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TTL
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifetime of an admitted entry.
///
/// Entries with [`Ttl::Never`] are only removed explicitly or by capacity
/// pressure. A zero TTL expires on any lookup that happens after the clock
/// has moved past the admission instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Ttl {
    /// Never expires through TTL.
    #[default]
    Never,
    /// Expires once `admitted_at + millis < now`.
    Millis(u64),
}

impl Ttl {
    /// Converts a signed millisecond value; any negative value means never.
    pub fn from_millis(millis: i64) -> Self {
        if millis < 0 {
            Ttl::Never
        } else {
            Ttl::Millis(millis as u64)
        }
    }

    /// Returns the signed millisecond value, `-1` for [`Ttl::Never`].
    pub fn as_millis(&self) -> i64 {
        match self {
            Ttl::Never => TTL_NEVER_MILLIS,
            Ttl::Millis(millis) => i64::try_from(*millis).unwrap_or(i64::MAX),
        }
    }

    /// Returns true for [`Ttl::Never`].
    pub fn is_never(&self) -> bool {
        matches!(self, Ttl::Never)
    }

    /// Returns true if an entry admitted at `admitted_at` has expired at `now`.
    ///
    /// Expiry is strict: an entry is still live at exactly `admitted_at + ttl`.
    pub fn is_expired(&self, admitted_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Ttl::Never => false,
            Ttl::Millis(millis) => {
                let ttl = Duration::milliseconds(i64::try_from(*millis).unwrap_or(i64::MAX));
                match admitted_at.checked_add_signed(ttl) {
                    Some(deadline) => deadline < now,
                    // Deadline beyond the representable range: effectively never.
                    None => false,
                }
            }
        }
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Never => f.write_str("never"),
            Ttl::Millis(millis) => write!(f, "{}ms", millis),
        }
    }
}

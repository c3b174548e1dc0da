//! Ownership and visibility checks
//!
//! Every stored record has exactly one owner, fixed at creation. Ownership
//! failures are reported as `NotFound` so a caller cannot distinguish a
//! record they don't own from one that doesn't exist.

use crate::error::{Error, Result};

/// A record with a single immutable owner
pub trait Owned {
    /// Identity that created the record
    fn owner(&self) -> &str;
}

/// A record that can be shared beyond its owner
pub trait Shared: Owned {
    /// Identities explicitly granted read access
    fn grants(&self) -> &[String];

    /// Whether the record is publicly readable
    fn is_public(&self) -> bool;
}

/// Require that `identity` owns the record
pub fn ensure_owner<T: Owned>(identity: &str, record: &T, what: &str, id: &str) -> Result<()> {
    if record.owner() == identity {
        Ok(())
    } else {
        Err(Error::NotFound(format!("{} {} not found", what, id)))
    }
}

/// Whether `identity` may read the record: owner, granted viewer, or public
pub fn can_view<T: Shared>(identity: &str, record: &T) -> bool {
    record.owner() == identity
        || record.is_public()
        || record.grants().iter().any(|g| g == identity)
}

//! Append-only set of object identifiers.
//!
//! Grounded in `examples/original_source/lib/misc.c`
//! (`gss_create_empty_oid_set`, `gss_add_oid_set_member`,
//! `gss_test_oid_set_member`, `gss_release_oid_set`): add is idempotent,
//! membership test is a linear scan, and release is a no-op in Rust (the
//! `Vec` drops its elements) but kept as an explicit method for API-shape
//! parity with the rest of the surface.

use crate::error::{Error, Result};
use crate::oid::Oid;

/// An unordered, duplicate-free collection of [`Oid`]s.
#[derive(Debug, Clone, Default)]
pub struct OidSet {
    members: Vec<Oid>,
}

impl OidSet {
    /// An object-identifier set containing no object identifiers.
    pub fn create_empty() -> Self {
        OidSet { members: Vec::new() }
    }

    /// Add `oid` to the set. Idempotent: if `oid` is already present, the
    /// set is left unchanged and this still reports success.
    pub fn add_member(&mut self, oid: Oid) -> Result<()> {
        if self.test_member(&oid) {
            return Ok(());
        }
        if self.members.len() == usize::MAX {
            return Err(Error::Failure("oid set element count overflow".into()));
        }
        self.members.push(oid);
        Ok(())
    }

    pub fn test_member(&self, oid: &Oid) -> bool {
        self.members.iter().any(|m| m == oid)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Oid> {
        self.members.iter()
    }

    /// Free the set. A no-op beyond normal `Drop` in Rust; kept so callers
    /// translating from the C surface have a symmetrical call to make.
    pub fn release(self) {}
}

impl FromIterator<Oid> for OidSet {
    fn from_iter<T: IntoIterator<Item = Oid>>(iter: T) -> Self {
        let mut set = OidSet::create_empty();
        for oid in iter {
            // Construction from a trusted iterator never overflows in practice;
            // an iterator yielding usize::MAX distinct OIDs cannot be materialized.
            let _ = set.add_member(oid);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid::kerberos_v5_mechanism;

    #[test]
    fn add_member_is_idempotent() {
        let mut once = OidSet::create_empty();
        once.add_member(kerberos_v5_mechanism()).unwrap();

        let mut twice = OidSet::create_empty();
        twice.add_member(kerberos_v5_mechanism()).unwrap();
        twice.add_member(kerberos_v5_mechanism()).unwrap();

        assert_eq!(once.len(), 1);
        assert_eq!(twice.len(), 1);
        assert!(twice.test_member(&kerberos_v5_mechanism()));
    }

    #[test]
    fn test_member_on_empty_set_is_false() {
        let set = OidSet::create_empty();
        assert!(!set.test_member(&kerberos_v5_mechanism()));
    }
}

//! Credential handles.
//!
//! Grounded in `examples/original_source/lib/cred.c`'s doc comments for
//! `gss_acquire_cred`/`gss_inquire_cred`/`gss_release_cred`: a credential is
//! scoped to a name, a usage direction, and a lifetime, and is otherwise
//! opaque mechanism-private state (here, the Kerberos session handle and
//! long-term key the krb5 mechanism attaches).

use std::time::Duration;

use crate::name::Name;
use crate::oid::Oid;

/// Which direction(s) a credential may be used in, mirroring
/// `GSS_C_INITIATE`/`GSS_C_ACCEPT`/`GSS_C_BOTH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredUsage {
    Initiate,
    Accept,
    Both,
}

impl CredUsage {
    pub fn permits_initiate(self) -> bool {
        matches!(self, CredUsage::Initiate | CredUsage::Both)
    }

    pub fn permits_accept(self) -> bool {
        matches!(self, CredUsage::Accept | CredUsage::Both)
    }
}

/// A mechanism-agnostic credential handle (`spec.md` §4.3). `spec.md` §9
/// models "no credential" / "default credential" as `Option<Credential>`
/// rather than a sentinel variant here.
#[derive(Debug)]
pub struct Credential {
    pub name: Name,
    pub mech: Oid,
    pub usage: CredUsage,
    pub lifetime: Option<Duration>,
    pub(crate) state: Box<dyn std::any::Any + Send + Sync>,
}

impl Credential {
    pub fn new(
        name: Name,
        mech: Oid,
        usage: CredUsage,
        lifetime: Option<Duration>,
        state: Box<dyn std::any::Any + Send + Sync>,
    ) -> Self {
        Credential {
            name,
            mech,
            usage,
            lifetime,
            state,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.lifetime == Some(Duration::ZERO)
    }

    pub(crate) fn state_ref<T: 'static>(&self) -> crate::error::Result<&T> {
        self.state
            .downcast_ref::<T>()
            .ok_or(crate::error::Error::Failure(
                "credential state does not match its mechanism".into(),
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_permissions() {
        assert!(CredUsage::Initiate.permits_initiate());
        assert!(!CredUsage::Initiate.permits_accept());
        assert!(CredUsage::Both.permits_initiate());
        assert!(CredUsage::Both.permits_accept());
    }

    #[test]
    fn zero_lifetime_is_expired() {
        let cred = Credential::new(
            Name::hostbased_service("host/example.test"),
            crate::oid::kerberos_v5_mechanism(),
            CredUsage::Initiate,
            Some(Duration::ZERO),
            Box::new(()),
        );
        assert!(cred.is_expired());
    }
}

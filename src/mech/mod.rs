//! The mechanism seam: one trait every mechanism implements, and a closed,
//! statically-dispatched registry over it.
//!
//! `spec.md` §9 REDESIGN FLAGS calls for tagged dispatch over a fixed set of
//! compiled-in mechanisms rather than a dynamic plugin registry — there is
//! exactly one mechanism here (Kerberos V5), so the registry is a single
//! `if`/`else` rather than a table, but the shape (look up by OID, fail
//! closed on anything unrecognized) is what a larger registry would keep.
//! Grounded in `examples/original_source/lib/mechglue` conventions described
//! from `lib/context.c`'s `gss_init_sec_context`/`gss_accept_sec_context`,
//! which resolve a mechanism OID to a mechanism-specific implementation
//! before doing anything mechanism-specific.

use std::sync::OnceLock;
use std::time::Duration;

use crate::context::{Context, ContextFlags, SecContextStep};
use crate::credential::{CredUsage, Credential};
use crate::error::{Error, Result};
use crate::name::Name;
use crate::oid::Oid;

/// Everything a mechanism must implement to plug into the generic GSS
/// surface in `crate::surface` (`spec.md` §4 and §5).
pub trait Mechanism: Send + Sync {
    fn oid(&self) -> Oid;
    fn name(&self) -> &'static str;

    fn acquire_cred(
        &self,
        desired_name: Option<&Name>,
        usage: CredUsage,
        lifetime: Option<Duration>,
    ) -> Result<Credential>;

    fn init_sec_context(
        &self,
        cred: Option<&Credential>,
        context: &mut Option<Context>,
        target: &Name,
        req_flags: ContextFlags,
        input_token: Option<&[u8]>,
        channel_bindings: Option<&[u8]>,
    ) -> Result<SecContextStep>;

    fn accept_sec_context(
        &self,
        cred: Option<&Credential>,
        context: &mut Option<Context>,
        input_token: &[u8],
        channel_bindings: Option<&[u8]>,
    ) -> Result<SecContextStep>;

    /// Mechanism-specific teardown hook for `spec.md` §4.4 `delete_sec_context`.
    /// Called by `crate::surface::delete_sec_context` before it frees the
    /// generic context shell; the shell is freed regardless of what this
    /// returns.
    fn delete_sec_context(&self, context: &Context) -> Result<()>;

    /// Returns `(sealed_message, confidentiality_applied)`.
    fn wrap(&self, context: &Context, conf_req: bool, qop: u32, input: &[u8]) -> Result<(Vec<u8>, bool)>;

    /// Returns `(plaintext, confidentiality_was_applied, qop)`.
    fn unwrap(&self, context: &mut Context, input: &[u8]) -> Result<(Vec<u8>, bool, u32)>;

    fn get_mic(&self, context: &Context, qop: u32, input: &[u8]) -> Result<Vec<u8>>;

    /// Returns the qop the MIC was produced with.
    fn verify_mic(&self, context: &mut Context, message: &[u8], mic: &[u8]) -> Result<u32>;

    fn context_time(&self, context: &Context) -> Result<Duration>;

    fn wrap_size_limit(&self, context: &Context, conf_req: bool, req_output_size: usize) -> usize;
}

static KRB5: OnceLock<crate::krb5::Krb5Mechanism> = OnceLock::new();

/// Resolve `oid` to its mechanism implementation, or `None` if unrecognized.
pub fn find_mechanism(oid: &Oid) -> Option<&'static dyn Mechanism> {
    if *oid == crate::oid::kerberos_v5_mechanism() {
        Some(KRB5.get_or_init(crate::krb5::Krb5Mechanism::new) as &dyn Mechanism)
    } else {
        None
    }
}

/// As [`find_mechanism`], but fails with [`Error::BadMech`] instead of `None`
/// — the common case everywhere the caller has no fallback mechanism to try.
pub fn find_mechanism_no_default(oid: &Oid) -> Result<&'static dyn Mechanism> {
    find_mechanism(oid).ok_or(Error::BadMech)
}

/// All mechanisms this crate supports, for `gss_indicate_mechs`-style queries.
pub fn supported_mechanisms() -> crate::oid_set::OidSet {
    std::iter::once(crate::oid::kerberos_v5_mechanism()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kerberos_oid_resolves() {
        let mech = find_mechanism(&crate::oid::kerberos_v5_mechanism());
        assert!(mech.is_some());
        assert_eq!(mech.unwrap().name(), "kerberos_v5");
    }

    #[test]
    fn unknown_oid_is_bad_mech() {
        let bogus = Oid::from_dotted("1.2.3.4.5").unwrap();
        assert!(matches!(find_mechanism_no_default(&bogus), Err(Error::BadMech)));
    }

    #[test]
    fn supported_mechanisms_contains_kerberos() {
        let set = supported_mechanisms();
        assert!(set.test_member(&crate::oid::kerberos_v5_mechanism()));
    }
}

//! The generic GSS surface (`spec.md` §4.4, §4.7): mechanism-agnostic
//! argument validation, mechanism selection, forwarding, and the
//! half-built-context cleanup contract.
//!
//! Grounded in `examples/original_source/lib/init_sec_context.c`,
//! `accept_sec_context.c`, and `delete_sec_context.c`'s top-level flow — each
//! validates its arguments, resolves a mechanism, forwards, and (for
//! `init`/`accept`) rolls the context handle back to "no context" if the
//! very first call that created it failed. Rust's `Option<T>` models the "no
//! object" sentinels `spec.md` §9 calls for directly, so there is no
//! separate null-pointer check to write: a `None` where a caller means "no
//! context"/"no credential"/"no bindings" is already the statically-typed
//! absent value.

use std::time::Duration;

use crate::context::{Context, ContextFlags};
use crate::credential::{CredUsage, Credential};
use crate::error::{Error, Result};
use crate::mech::find_mechanism_no_default;
use crate::name::Name;
use crate::oid::Oid;
use crate::oid_set::OidSet;

/// Result of one `init_sec_context`/`accept_sec_context` step, widened with
/// the generic surface's own outputs (`actual_mech`, and `src_name` for the
/// acceptor) that a mechanism's [`crate::mech::Mechanism::init_sec_context`]/
/// `accept_sec_context` don't themselves know to report.
#[derive(Debug)]
pub struct SecContextOutput {
    pub output_token: Option<Vec<u8>>,
    pub actual_mech: Oid,
    pub ret_flags: ContextFlags,
    pub continue_needed: bool,
    pub src_name: Option<Name>,
}

/// `spec.md` §4.4 `init_sec_context`.
///
/// `mech_oid` selects the mechanism on the first call (`*ctx` is "no
/// context"); it is ignored on subsequent calls, which reuse `context`'s own
/// tagged mechanism (step 4).
pub fn init_sec_context(
    cred: Option<&Credential>,
    context: &mut Option<Context>,
    target_name: &Name,
    mech_oid: Option<&Oid>,
    req_flags: ContextFlags,
    input_token: Option<&[u8]>,
    channel_bindings: Option<&[u8]>,
) -> Result<SecContextOutput> {
    let selected = match context {
        Some(ctx) => ctx.mech.clone(),
        None => mech_oid.cloned().ok_or(Error::BadMech)?,
    };
    let mechanism = find_mechanism_no_default(&selected)?;
    let was_creating = context.is_none();

    match mechanism.init_sec_context(cred, context, target_name, req_flags, input_token, channel_bindings) {
        Ok(step) => Ok(SecContextOutput {
            output_token: step.output_token,
            actual_mech: mechanism.oid(),
            ret_flags: step.flags,
            continue_needed: step.continue_needed(),
            src_name: step.src_name,
        }),
        Err(e) => {
            if was_creating {
                *context = None;
            }
            Err(e)
        }
    }
}

/// `spec.md` §4.4 `accept_sec_context`. When `*ctx` is "no context" the
/// mechanism is discovered by decapsulating `input_token`'s embedded OID
/// (step 103); any decapsulation failure is already `Error::DefectiveToken`.
pub fn accept_sec_context(
    cred: Option<&Credential>,
    context: &mut Option<Context>,
    input_token: &[u8],
    channel_bindings: Option<&[u8]>,
) -> Result<SecContextOutput> {
    let selected = match context {
        Some(ctx) => ctx.mech.clone(),
        None => crate::token::decode(input_token)?.0,
    };
    let mechanism = find_mechanism_no_default(&selected)?;
    let was_creating = context.is_none();

    match mechanism.accept_sec_context(cred, context, input_token, channel_bindings) {
        Ok(step) => Ok(SecContextOutput {
            output_token: step.output_token,
            actual_mech: mechanism.oid(),
            ret_flags: step.flags,
            continue_needed: step.continue_needed(),
            src_name: step.src_name,
        }),
        Err(e) => {
            if was_creating {
                *context = None;
            }
            Err(e)
        }
    }
}

/// `spec.md` §4.4 `delete_sec_context`: validates, dispatches to the
/// mechanism's own delete hook, then always frees the context shell and
/// resets `*ctx` to "no context" regardless of that mechanism call's
/// outcome. Calling this on an already-`None` context is a no-op in effect
/// (the handle was already "no context") but still reports
/// [`Error::NoContext`], per `spec.md` §8's delete-idempotence property.
pub fn delete_sec_context(context: &mut Option<Context>) -> Result<()> {
    let mech_result = match context.as_ref() {
        Some(ctx) => find_mechanism_no_default(&ctx.mech).and_then(|m| m.delete_sec_context(ctx)),
        None => Err(Error::NoContext),
    };
    *context = None;
    mech_result
}

pub fn context_time(context: Option<&Context>) -> Result<Duration> {
    let ctx = context.ok_or(Error::NoContext)?;
    find_mechanism_no_default(&ctx.mech)?.context_time(ctx)
}

/// Not implemented by any registered mechanism (`spec.md` §9: returns
/// `UNAVAILABLE` universally in the source).
pub fn inquire_context(_context: Option<&Context>) -> Result<()> {
    Err(Error::Unavailable)
}

pub fn wrap(context: Option<&Context>, conf_req: bool, qop: u32, input: &[u8]) -> Result<(Vec<u8>, bool)> {
    let ctx = context.ok_or(Error::NoContext)?;
    find_mechanism_no_default(&ctx.mech)?.wrap(ctx, conf_req, qop, input)
}

pub fn unwrap(context: Option<&mut Context>, input: &[u8]) -> Result<(Vec<u8>, bool, u32)> {
    let ctx = context.ok_or(Error::NoContext)?;
    let mech_oid = ctx.mech.clone();
    find_mechanism_no_default(&mech_oid)?.unwrap(ctx, input)
}

pub fn get_mic(context: Option<&Context>, qop: u32, input: &[u8]) -> Result<Vec<u8>> {
    let ctx = context.ok_or(Error::NoContext)?;
    find_mechanism_no_default(&ctx.mech)?.get_mic(ctx, qop, input)
}

pub fn verify_mic(context: Option<&mut Context>, message: &[u8], mic: &[u8]) -> Result<u32> {
    let ctx = context.ok_or(Error::NoContext)?;
    let mech_oid = ctx.mech.clone();
    find_mechanism_no_default(&mech_oid)?.verify_mic(ctx, message, mic)
}

pub fn wrap_size_limit(context: Option<&Context>, conf_req: bool, req_output_size: usize) -> Result<usize> {
    let ctx = context.ok_or(Error::NoContext)?;
    Ok(find_mechanism_no_default(&ctx.mech)?.wrap_size_limit(ctx, conf_req, req_output_size))
}

/// `spec.md` §4.7 `acquire_cred`: if `desired_mechs` is given, use the first
/// member that resolves to a registered mechanism; else the default
/// (Kerberos V5, the only mechanism this crate registers).
pub fn acquire_cred(
    desired_name: Option<&Name>,
    time_req: Option<Duration>,
    desired_mechs: Option<&OidSet>,
    usage: CredUsage,
) -> Result<Credential> {
    let mech_oid = match desired_mechs {
        Some(set) => set
            .iter()
            .find(|oid| crate::mech::find_mechanism(oid).is_some())
            .cloned()
            .ok_or(Error::BadMech)?,
        None => crate::oid::kerberos_v5_mechanism(),
    };
    find_mechanism_no_default(&mech_oid)?.acquire_cred(desired_name, usage, time_req)
}

/// What `spec.md` §4.7 `inquire_cred` reports. Unlike the C surface's
/// opaque handle and out-parameters, [`Credential`]'s fields are already
/// public; this exists to fail closed on a credential tagged with a
/// mechanism this build doesn't register, and to report it alongside the
/// full set of mechanisms this crate supports.
#[derive(Debug)]
pub struct CredentialInfo {
    pub name: Name,
    pub usage: CredUsage,
    pub lifetime: Option<Duration>,
    pub mechs: OidSet,
}

pub fn inquire_cred(cred: &Credential) -> Result<CredentialInfo> {
    find_mechanism_no_default(&cred.mech)?;
    Ok(CredentialInfo {
        name: cred.name.clone(),
        usage: cred.usage,
        lifetime: cred.lifetime,
        mechs: std::iter::once(cred.mech.clone()).collect(),
    })
}

/// `spec.md` §4.7: accepts the "no credential" sentinel as a no-op success.
pub fn release_cred(cred: Option<Credential>) -> Result<()> {
    drop(cred);
    Ok(())
}

/// `spec.md` §3: a name is "released via a dedicated operation". `Name`
/// owns its bytes and needs no such call in Rust (ordinary drop glue frees
/// it), but the call exists anyway for API-shape parity with callers
/// translating from the C surface.
pub fn release_name(name: Name) {
    drop(name);
}

/// Not implemented by any registered mechanism (`spec.md` §9).
pub fn process_context_token(_context: Option<&Context>, _token: &[u8]) -> Result<()> {
    Err(Error::Unavailable)
}

/// Not implemented by any registered mechanism (`spec.md` §9).
pub fn export_sec_context(_context: &mut Option<Context>) -> Result<Vec<u8>> {
    Err(Error::Unavailable)
}

/// Not implemented by any registered mechanism (`spec.md` §9).
pub fn import_sec_context(_interprocess_token: &[u8]) -> Result<Context> {
    Err(Error::Unavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredUsage;

    #[test]
    fn init_sec_context_requires_a_mechanism_oid_on_first_call() {
        let mut ctx: Option<Context> = None;
        let result = init_sec_context(
            None,
            &mut ctx,
            &Name::kerberos_principal("host/svc.example.test@EXAMPLE.TEST"),
            None,
            ContextFlags::empty(),
            None,
            None,
        );
        assert!(matches!(result, Err(Error::BadMech)));
        assert!(ctx.is_none());
    }

    #[test]
    fn init_sec_context_leaves_no_context_behind_on_an_unrecognized_mechanism() {
        let mut ctx: Option<Context> = None;
        let bogus = Oid::from_dotted("1.2.3.4.5").unwrap();
        let result = init_sec_context(
            None,
            &mut ctx,
            &Name::kerberos_principal("host/svc.example.test@EXAMPLE.TEST"),
            Some(&bogus),
            ContextFlags::empty(),
            None,
            None,
        );
        assert!(matches!(result, Err(Error::BadMech)));
        assert!(ctx.is_none());
    }

    #[test]
    fn accept_sec_context_resolves_mechanism_from_the_token_envelope() {
        let mut ctx: Option<Context> = None;
        let bogus_oid = Oid::from_dotted("1.2.3.4.5").unwrap();
        let token = crate::token::encode(&bogus_oid, b"payload");
        let result = accept_sec_context(None, &mut ctx, &token, None);
        assert!(matches!(result, Err(Error::BadMech)));
    }

    #[test]
    fn delete_sec_context_on_no_context_reports_no_context_but_stays_a_no_op() {
        let mut ctx: Option<Context> = None;
        assert!(matches!(delete_sec_context(&mut ctx), Err(Error::NoContext)));
        assert!(matches!(delete_sec_context(&mut ctx), Err(Error::NoContext)));
        assert!(ctx.is_none());
    }

    #[test]
    fn release_cred_accepts_no_credential_sentinel() {
        release_cred(None).unwrap();
    }

    #[test]
    fn release_name_takes_ownership_without_erroring() {
        release_name(Name::kerberos_principal("alice@EXAMPLE.TEST"));
    }

    #[test]
    fn full_establishment_and_wrap_round_trip_through_the_generic_surface() {
        let init_cred = acquire_cred(
            Some(&Name::kerberos_principal("alice@EXAMPLE.TEST")),
            None,
            None,
            CredUsage::Initiate,
        )
        .unwrap();
        let accept_cred = acquire_cred(
            Some(&Name::kerberos_principal("host/svc.example.test@EXAMPLE.TEST")),
            None,
            None,
            CredUsage::Accept,
        )
        .unwrap();

        let mut init_ctx: Option<Context> = None;
        let step1 = init_sec_context(
            Some(&init_cred),
            &mut init_ctx,
            &Name::kerberos_principal("host/svc.example.test@EXAMPLE.TEST"),
            Some(&crate::oid::kerberos_v5_mechanism()),
            ContextFlags::empty(),
            None,
            None,
        )
        .unwrap();
        assert!(!step1.continue_needed);

        let mut accept_ctx: Option<Context> = None;
        let step2 = accept_sec_context(Some(&accept_cred), &mut accept_ctx, &step1.output_token.unwrap(), None).unwrap();
        assert!(!step2.continue_needed);
        assert_eq!(step2.src_name.unwrap().as_str_lossy(), "alice@EXAMPLE.TEST");

        let plaintext = b"through the generic surface";
        let (wrapped, _) = wrap(init_ctx.as_ref(), false, 0, plaintext).unwrap();
        let (unwrapped, conf, _) = unwrap(accept_ctx.as_mut(), &wrapped).unwrap();
        assert_eq!(unwrapped, plaintext);
        assert!(!conf);

        release_cred(Some(init_cred)).unwrap();
        release_cred(Some(accept_cred)).unwrap();
    }
}

//! The Kerberos V5 [`crate::mech::Mechanism`] implementation: the context
//! establishment state machine (`spec.md` §4.5) and the per-message
//! operations, wired on top of [`super::message`] and a [`KerberosEngine`].
//!
//! Grounded in `examples/original_source/lib/krb5/context.c`'s
//! `gss_krb5_init_sec_context`/`gss_krb5_accept_sec_context` — initiator
//! allocates on the first call and completes on the second only if mutual
//! authentication was requested; acceptor always completes in one call.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::context::{Context, ContextFlags, ContextStatus, Role, SecContextStep};
use crate::credential::{CredUsage, Credential};
use crate::error::{Error, Result};
use crate::name::Name;
use crate::oid::Oid;

use super::context::{Krb5Context, Krb5Credential};
use super::engine::{KerberosEngine, AP_REQ_CHECKSUM_TYPE};
use super::local::{LocalKerberosEngine, LocalRealmConfig};

/// Identity this mechanism falls back to when no credential and no desired
/// name are given. A real deployment resolves this from a ticket cache or
/// host keytab (`spec.md` §1 keeps that out of scope); this is a fixed
/// stand-in so `acquire_cred(None, ...)` still produces something usable.
const DEFAULT_PRINCIPAL: &str = "default@LOCAL.GSS";

/// Flags this mechanism actually honors. `DELEG`, `CONF`, and `ANON` are
/// accepted as input but never granted: delegation and anonymity are not
/// modeled, and confidentiality is refused at `wrap` time rather than
/// silently dropped here too (`spec.md` §4.6's Open Question resolution).
const SUPPORTED_FLAGS: ContextFlags = ContextFlags::MUTUAL
    .union(ContextFlags::REPLAY)
    .union(ContextFlags::SEQUENCE)
    .union(ContextFlags::INTEG)
    .union(ContextFlags::TRANS);

/// Length of the application checksum payload: 2-byte tag, 4-byte LE
/// length, 16 bytes of channel-binding material, 4-byte LE req_flags
/// (`spec.md` §4.5 step 5).
const CHECKSUM_PAYLOAD_LEN: usize = 2 + 4 + 16 + 4;
const CHECKSUM_TAG: [u8; 2] = [0x01, 0x00];
const AP_REQ_PREFIX: [u8; 2] = [0x01, 0x00];
const AP_REP_PREFIX: [u8; 2] = [0x02, 0x00];

pub struct Krb5Mechanism {
    config: LocalRealmConfig,
}

impl Krb5Mechanism {
    pub fn new() -> Self {
        Krb5Mechanism {
            config: LocalRealmConfig::new(b"gss kerberos v5 demo realm secret".to_vec()),
        }
    }

    fn new_engine(&self, principal: &str) -> Arc<dyn KerberosEngine> {
        Arc::new(LocalKerberosEngine::new(self.config.clone(), principal))
    }

    fn principal_text(name: Option<&Name>) -> String {
        name.map(|n| n.as_str_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_PRINCIPAL.to_string())
    }

    /// Build the application checksum payload carried in the AP-REQ's
    /// authenticator (`spec.md` §4.5 step 5). `bindings` is truncated or
    /// zero-padded to 16 bytes; a real channel-binding hash is out of scope.
    fn checksum_payload(bindings: Option<&[u8]>, req_flags: ContextFlags) -> Vec<u8> {
        let mut out = Vec::with_capacity(CHECKSUM_PAYLOAD_LEN);
        out.extend_from_slice(&CHECKSUM_TAG);
        out.extend_from_slice(&16u32.to_le_bytes());
        let mut material = [0u8; 16];
        if let Some(b) = bindings {
            let n = b.len().min(16);
            material[..n].copy_from_slice(&b[..n]);
        }
        out.extend_from_slice(&material);
        out.extend_from_slice(&req_flags.bits().to_le_bytes());
        out
    }

    fn parse_checksum_payload(payload: &[u8]) -> Result<ContextFlags> {
        if payload.len() != CHECKSUM_PAYLOAD_LEN {
            return Err(Error::DefectiveToken);
        }
        if payload[0..2] != CHECKSUM_TAG {
            return Err(Error::DefectiveToken);
        }
        let len = u32::from_le_bytes(payload[2..6].try_into().unwrap());
        if len != 16 {
            return Err(Error::DefectiveToken);
        }
        let flags_bits = u32::from_le_bytes(payload[22..26].try_into().unwrap());
        Ok(ContextFlags::from_bits_truncate(flags_bits))
    }

    fn with_owned_cred<'a>(
        &self,
        cred: Option<&'a Credential>,
        usage: CredUsage,
        owned: &'a mut Option<Credential>,
    ) -> Result<&'a Credential> {
        if let Some(c) = cred {
            return Ok(c);
        }
        *owned = Some(self.acquire_cred(None, usage, None)?);
        Ok(owned.as_ref().unwrap())
    }
}

impl Default for Krb5Mechanism {
    fn default() -> Self {
        Krb5Mechanism::new()
    }
}

impl crate::mech::Mechanism for Krb5Mechanism {
    fn oid(&self) -> Oid {
        crate::oid::kerberos_v5_mechanism()
    }

    fn name(&self) -> &'static str {
        "kerberos_v5"
    }

    fn acquire_cred(
        &self,
        desired_name: Option<&Name>,
        usage: CredUsage,
        lifetime: Option<Duration>,
    ) -> Result<Credential> {
        let principal = Self::principal_text(desired_name);
        let name = desired_name
            .cloned()
            .unwrap_or_else(|| Name::kerberos_principal(&principal));
        let engine = self.new_engine(&principal);
        let session = engine.init_session()?;
        let acceptor_key = if usage.permits_accept() {
            Some(engine.acceptor_key(session)?)
        } else {
            None
        };
        let state = Krb5Credential {
            engine,
            session,
            ticket: None,
            acceptor_key,
        };
        Ok(Credential::new(name, self.oid(), usage, lifetime, Box::new(state)))
    }

    fn init_sec_context(
        &self,
        cred: Option<&Credential>,
        context: &mut Option<Context>,
        target: &Name,
        req_flags: ContextFlags,
        input_token: Option<&[u8]>,
        channel_bindings: Option<&[u8]>,
    ) -> Result<SecContextStep> {
        if context.is_none() {
            let mut owned = None;
            let cred_ref = self.with_owned_cred(cred, CredUsage::Initiate, &mut owned)?;
            let cred_state = cred_ref.state_ref::<Krb5Credential>()?;

            let engine = cred_state.engine.clone();
            let session = cred_state.session;
            let ticket = engine.acquire_ticket(session, target)?;

            let mutual_required = req_flags.contains(ContextFlags::MUTUAL);
            log::debug!(
                "initiating Kerberos context with {} (mutual auth {})",
                ticket.server_principal,
                mutual_required
            );
            let payload = Self::checksum_payload(channel_bindings, req_flags);
            let (ap_req_bytes, session_key) =
                engine.build_ap_req(session, &ticket, mutual_required, AP_REQ_CHECKSUM_TYPE, &payload)?;
            let output_token = crate::token::encode_with_prefix(&self.oid(), AP_REQ_PREFIX, &ap_req_bytes);

            let granted_flags = (req_flags & SUPPORTED_FLAGS) | if mutual_required { ContextFlags::MUTUAL } else { ContextFlags::empty() };

            let krb5ctx = Krb5Context {
                engine,
                session,
                ticket: Some(ticket),
                session_key: Some(session_key),
                acceptor: false,
                mutual_required,
                init_seqno: std::sync::atomic::AtomicU32::new(0),
                accept_seqno: std::sync::atomic::AtomicU32::new(0),
                reply_done: !mutual_required,
                client_principal: None,
            };

            let mut new_context = Context::new(self.oid(), Role::Initiator, Box::new(krb5ctx));
            new_context.flags = granted_flags;
            new_context.status = if mutual_required {
                ContextStatus::Incomplete
            } else {
                ContextStatus::Established
            };
            let status = new_context.status;
            *context = Some(new_context);

            return Ok(SecContextStep {
                output_token: Some(output_token),
                status,
                flags: granted_flags,
                src_name: None,
            });
        }

        let ctx = context.as_mut().expect("checked above");
        if ctx.mech != self.oid() {
            return Err(Error::Failure("context belongs to a different mechanism".into()));
        }
        let krb5ctx = ctx.state_mut::<Krb5Context>()?;
        if krb5ctx.acceptor {
            return Err(Error::Failure("acceptor context passed to init_sec_context".into()));
        }
        if krb5ctx.reply_done {
            return Err(Error::Failure("context is already established".into()));
        }

        let tok = input_token.ok_or(Error::DefectiveToken)?;
        let (oid, ap_rep_bytes) = crate::token::decode_with_prefix(tok, AP_REP_PREFIX)?;
        if oid != self.oid() {
            return Err(Error::DefectiveToken);
        }
        let session_key = krb5ctx.session_key.clone().ok_or(Error::NoContext)?;
        let accept_seq = krb5ctx
            .engine
            .verify_ap_rep(&session_key, ap_rep_bytes)
            .map_err(|e| Error::Failure(format!("ap-rep verification failed: {e}")))?
            .unwrap_or(0);

        krb5ctx.accept_seqno = std::sync::atomic::AtomicU32::new(accept_seq);
        krb5ctx.reply_done = true;
        ctx.status = ContextStatus::Established;
        log::info!("Kerberos context established (mutual auth verified)");

        Ok(SecContextStep {
            output_token: None,
            status: ContextStatus::Established,
            flags: ctx.flags,
            src_name: None,
        })
    }

    fn accept_sec_context(
        &self,
        cred: Option<&Credential>,
        context: &mut Option<Context>,
        input_token: &[u8],
        channel_bindings: Option<&[u8]>,
    ) -> Result<SecContextStep> {
        if channel_bindings.is_some() {
            return Err(Error::BadBindings);
        }
        if context.is_some() {
            return Err(Error::Failure("Kerberos acceptor contexts complete in a single call".into()));
        }

        let mut owned = None;
        let cred_ref = self.with_owned_cred(cred, CredUsage::Accept, &mut owned)?;
        let cred_state = cred_ref.state_ref::<Krb5Credential>()?;
        let acceptor_key = cred_state.acceptor_key.clone().ok_or(Error::NoCred)?;

        let (oid, ap_req_bytes) = crate::token::decode_with_prefix(input_token, AP_REQ_PREFIX)?;
        if oid != self.oid() {
            return Err(Error::BadMech);
        }

        let info = cred_state.engine.process_ap_req(&acceptor_key, ap_req_bytes)?;
        if info.checksum_type != AP_REQ_CHECKSUM_TYPE {
            return Err(Error::DefectiveToken);
        }
        let requested_flags = Self::parse_checksum_payload(&info.checksum_payload)?;
        let mut granted_flags = requested_flags & SUPPORTED_FLAGS;
        if info.mutual_required {
            granted_flags |= ContextFlags::MUTUAL;
        }

        let output_token = if info.mutual_required {
            let ap_rep = cred_state.engine.build_ap_rep(&info.session_key, 0)?;
            Some(crate::token::encode_with_prefix(&self.oid(), AP_REP_PREFIX, &ap_rep))
        } else {
            None
        };

        let krb5ctx = Krb5Context {
            engine: cred_state.engine.clone(),
            session: cred_state.session,
            ticket: None,
            session_key: Some(info.session_key.clone()),
            acceptor: true,
            mutual_required: info.mutual_required,
            init_seqno: std::sync::atomic::AtomicU32::new(info.seq_number),
            accept_seqno: std::sync::atomic::AtomicU32::new(0),
            reply_done: true,
            client_principal: Some(info.client_principal.clone()),
        };

        let mut new_context = Context::new(self.oid(), Role::Acceptor, Box::new(krb5ctx));
        new_context.flags = granted_flags;
        new_context.status = ContextStatus::Established;
        *context = Some(new_context);
        log::info!(
            "accepted Kerberos context from {} (mutual auth {})",
            info.client_principal,
            info.mutual_required
        );

        Ok(SecContextStep {
            output_token,
            status: ContextStatus::Established,
            flags: granted_flags,
            src_name: Some(Name::kerberos_principal(&info.client_principal)),
        })
    }

    fn delete_sec_context(&self, context: &Context) -> Result<()> {
        let krb5ctx = context.state_ref::<Krb5Context>()?;
        log::debug!("deleting Kerberos context (acceptor: {})", krb5ctx.acceptor);
        Ok(())
    }

    fn wrap(&self, context: &Context, conf_req: bool, qop: u32, input: &[u8]) -> Result<(Vec<u8>, bool)> {
        if qop != 0 {
            return Err(Error::Failure("unsupported quality of protection".into()));
        }
        let krb5ctx = context.state_ref::<Krb5Context>()?;
        let key = krb5ctx.session_key.as_ref().ok_or(Error::NoContext)?;
        let seqno = if krb5ctx.acceptor {
            krb5ctx.accept_seqno.fetch_add(1, Ordering::SeqCst)
        } else {
            krb5ctx.init_seqno.fetch_add(1, Ordering::SeqCst)
        };
        let payload = super::message::wrap(krb5ctx.engine.as_ref(), key, krb5ctx.acceptor, seqno, conf_req, input)?;
        Ok((payload, false))
    }

    fn unwrap(&self, context: &mut Context, input: &[u8]) -> Result<(Vec<u8>, bool, u32)> {
        let krb5ctx = context.state_mut::<Krb5Context>()?;
        let key = krb5ctx.session_key.clone().ok_or(Error::NoContext)?;
        let receiver_is_acceptor = krb5ctx.acceptor;
        let counter = if receiver_is_acceptor {
            &krb5ctx.init_seqno
        } else {
            &krb5ctx.accept_seqno
        };
        let expected = counter.load(Ordering::SeqCst);
        let out = super::message::unwrap(krb5ctx.engine.as_ref(), &key, receiver_is_acceptor, expected, input).map_err(|e| {
            log::warn!("rejecting wrap token at expected sequence {expected}: {e}");
            e
        })?;
        counter.fetch_add(1, Ordering::SeqCst);
        Ok((out.plaintext, out.conf_state, 0))
    }

    fn get_mic(&self, context: &Context, qop: u32, input: &[u8]) -> Result<Vec<u8>> {
        if qop != 0 {
            return Err(Error::Failure("unsupported quality of protection".into()));
        }
        let krb5ctx = context.state_ref::<Krb5Context>()?;
        let key = krb5ctx.session_key.as_ref().ok_or(Error::NoContext)?;
        let seqno = if krb5ctx.acceptor {
            krb5ctx.accept_seqno.fetch_add(1, Ordering::SeqCst)
        } else {
            krb5ctx.init_seqno.fetch_add(1, Ordering::SeqCst)
        };
        Ok(super::message::get_mic(krb5ctx.engine.as_ref(), key, krb5ctx.acceptor, seqno, input))
    }

    fn verify_mic(&self, context: &mut Context, message: &[u8], mic: &[u8]) -> Result<u32> {
        let krb5ctx = context.state_mut::<Krb5Context>()?;
        let key = krb5ctx.session_key.clone().ok_or(Error::NoContext)?;
        let receiver_is_acceptor = krb5ctx.acceptor;
        let counter = if receiver_is_acceptor {
            &krb5ctx.init_seqno
        } else {
            &krb5ctx.accept_seqno
        };
        let expected = counter.load(Ordering::SeqCst);
        super::message::verify_mic(krb5ctx.engine.as_ref(), &key, receiver_is_acceptor, expected, message, mic)?;
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    fn context_time(&self, context: &Context) -> Result<Duration> {
        let krb5ctx = context.state_ref::<Krb5Context>()?;
        let ticket = krb5ctx.ticket.as_ref().ok_or(Error::Unavailable)?;
        krb5ctx.engine.ticket_lifetime(ticket).ok_or(Error::ContextExpired)
    }

    fn wrap_size_limit(&self, context: &Context, _conf_req: bool, req_output_size: usize) -> usize {
        let checksum_len = match context.state_ref::<Krb5Context>() {
            Ok(krb5ctx) => krb5ctx
                .session_key
                .as_ref()
                .map(|k| k.suite.checksum_len())
                .unwrap_or(20),
            Err(_) => 20,
        };
        let overhead = 24 + checksum_len;
        let available = req_output_size.saturating_sub(overhead);
        let usable_blocks = (available / 8) * 8;
        usable_blocks.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredUsage;
    use crate::mech::Mechanism;

    #[test]
    fn full_handshake_with_mutual_auth() {
        let mech = Krb5Mechanism::new();

        let init_cred = mech
            .acquire_cred(Some(&Name::kerberos_principal("alice@EXAMPLE.TEST")), CredUsage::Initiate, None)
            .unwrap();
        let accept_cred = mech
            .acquire_cred(Some(&Name::kerberos_principal("host/svc.example.test@EXAMPLE.TEST")), CredUsage::Accept, None)
            .unwrap();

        let mut initiator_ctx: Option<Context> = None;
        let step1 = mech
            .init_sec_context(
                Some(&init_cred),
                &mut initiator_ctx,
                &Name::kerberos_principal("host/svc.example.test@EXAMPLE.TEST"),
                ContextFlags::MUTUAL,
                None,
                None,
            )
            .unwrap();
        assert!(step1.continue_needed());
        let ap_req = step1.output_token.unwrap();

        let mut acceptor_ctx: Option<Context> = None;
        let step2 = mech
            .accept_sec_context(Some(&accept_cred), &mut acceptor_ctx, &ap_req, None)
            .unwrap();
        assert!(!step2.continue_needed());
        assert_eq!(
            step2.src_name.unwrap().as_str_lossy(),
            "alice@EXAMPLE.TEST"
        );
        let ap_rep = step2.output_token.unwrap();

        let step3 = mech
            .init_sec_context(
                Some(&init_cred),
                &mut initiator_ctx,
                &Name::kerberos_principal("host/svc.example.test@EXAMPLE.TEST"),
                ContextFlags::MUTUAL,
                Some(&ap_rep),
                None,
            )
            .unwrap();
        assert!(!step3.continue_needed());

        let init_ctx = initiator_ctx.as_ref().unwrap();
        let accept_ctx = acceptor_ctx.as_ref().unwrap();
        assert!(init_ctx.is_established());
        assert!(accept_ctx.is_established());

        let plaintext = b"protected message";
        let (wrapped, _) = mech.wrap(init_ctx, false, 0, plaintext).unwrap();
        let mut accept_ctx_mut = acceptor_ctx.unwrap();
        let (unwrapped, conf, _) = mech.unwrap(&mut accept_ctx_mut, &wrapped).unwrap();
        assert_eq!(unwrapped, plaintext);
        assert!(!conf);
    }

    #[test]
    fn no_mutual_auth_completes_on_first_call() {
        let mech = Krb5Mechanism::new();
        let init_cred = mech
            .acquire_cred(Some(&Name::kerberos_principal("bob@EXAMPLE.TEST")), CredUsage::Initiate, None)
            .unwrap();

        let mut ctx: Option<Context> = None;
        let step = mech
            .init_sec_context(
                Some(&init_cred),
                &mut ctx,
                &Name::kerberos_principal("host/svc.example.test@EXAMPLE.TEST"),
                ContextFlags::empty(),
                None,
                None,
            )
            .unwrap();
        assert!(!step.continue_needed());
        assert!(ctx.unwrap().is_established());
    }

    #[test]
    fn acceptor_rejects_channel_bindings() {
        let mech = Krb5Mechanism::new();
        let accept_cred = mech
            .acquire_cred(Some(&Name::kerberos_principal("host/svc.example.test@EXAMPLE.TEST")), CredUsage::Accept, None)
            .unwrap();
        let mut ctx: Option<Context> = None;
        let result = mech.accept_sec_context(Some(&accept_cred), &mut ctx, b"anything", Some(b"bindings"));
        assert!(matches!(result, Err(Error::BadBindings)));
    }

    #[test]
    fn delete_sec_context_is_a_no_op_success() {
        let mech = Krb5Mechanism::new();
        let init_cred = mech
            .acquire_cred(Some(&Name::kerberos_principal("carol@EXAMPLE.TEST")), CredUsage::Initiate, None)
            .unwrap();
        let mut ctx: Option<Context> = None;
        mech.init_sec_context(
            Some(&init_cred),
            &mut ctx,
            &Name::kerberos_principal("host/svc.example.test@EXAMPLE.TEST"),
            ContextFlags::empty(),
            None,
            None,
        )
        .unwrap();
        mech.delete_sec_context(ctx.as_ref().unwrap()).unwrap();
    }

    #[test]
    fn unknown_mechanism_token_is_rejected() {
        let mech = Krb5Mechanism::new();
        let accept_cred = mech
            .acquire_cred(Some(&Name::kerberos_principal("host/svc.example.test@EXAMPLE.TEST")), CredUsage::Accept, None)
            .unwrap();
        let bogus_oid = Oid::from_dotted("1.2.3.4.5").unwrap();
        let bogus_token = crate::token::encode_with_prefix(&bogus_oid, AP_REQ_PREFIX, b"not a real ap-req");
        let mut ctx: Option<Context> = None;
        let result = mech.accept_sec_context(Some(&accept_cred), &mut ctx, &bogus_token, None);
        assert!(matches!(result, Err(Error::BadMech)));
    }
}

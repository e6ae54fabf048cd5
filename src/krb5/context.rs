//! Mechanism-private state attached to [`crate::context::Context`] and
//! [`crate::credential::Credential`] for the Kerberos V5 mechanism.
//!
//! Grounded in `examples/original_source/lib/internal.h`'s `_gss_krb5_ctx_t`
//! (`sh`, `key`, `ticket`/`apreq`, `acceptor`, `req_flags`, `initseqnr`,
//! `acceptseqnr`) — `spec.md` §3 lists the same fields under different
//! names, which this struct uses directly.

use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use crate::krb5::engine::{KerberosEngine, Krb5Key, SessionHandle, Ticket};

/// Mechanism-private state of a Kerberos credential handle
/// (`spec.md` §3's "Credential handle" for Kerberos).
pub struct Krb5Credential {
    pub engine: Arc<dyn KerberosEngine>,
    pub session: SessionHandle,
    /// Present only for initiate-side credentials that already hold a
    /// ticket for a specific target (acquired eagerly at `acquire_cred`
    /// time); acceptor-side credentials carry `None` and decrypt whatever
    /// ticket the AP-REQ brings.
    pub ticket: Option<Ticket>,
    /// Present only for accept-side (or both-direction) credentials: the
    /// long-term key `process_ap_req` decrypts incoming tickets with,
    /// derived once at `acquire_cred` time.
    pub acceptor_key: Option<Krb5Key>,
}

impl std::fmt::Debug for Krb5Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Krb5Credential")
            .field("session", &self.session)
            .field("has_ticket", &self.ticket.is_some())
            .field("has_acceptor_key", &self.acceptor_key.is_some())
            .finish()
    }
}

/// Mechanism-private state of a Kerberos context handle (`spec.md` §3's
/// "Context handle" for Kerberos, and the fields mutated by the
/// establishment state machine in `spec.md` §4.5).
pub struct Krb5Context {
    pub engine: Arc<dyn KerberosEngine>,
    pub session: SessionHandle,
    pub ticket: Option<Ticket>,
    pub session_key: Option<Krb5Key>,
    pub acceptor: bool,
    /// Whether this initiator requested mutual authentication; governs
    /// whether a further call is expected before the context is established.
    pub mutual_required: bool,
    /// Sequence counter for tokens sent by the initiator: the initiator's
    /// own outgoing counter, and the acceptor's expected-incoming counter.
    pub init_seqno: AtomicU32,
    /// Sequence counter for tokens sent by the acceptor, symmetric to
    /// `init_seqno`.
    pub accept_seqno: AtomicU32,
    /// Per `spec.md` §3: false until the initiator has consumed the AP-REP.
    /// Always `true` for an acceptor context and for a no-mutual initiator.
    pub reply_done: bool,
    pub client_principal: Option<String>,
}

impl std::fmt::Debug for Krb5Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Krb5Context")
            .field("session", &self.session)
            .field("acceptor", &self.acceptor)
            .field("mutual_required", &self.mutual_required)
            .field("init_seqno", &self.init_seqno)
            .field("accept_seqno", &self.accept_seqno)
            .field("reply_done", &self.reply_done)
            .field("client_principal", &self.client_principal)
            .finish()
    }
}

//! Security context handles and the flags/outputs that travel with them.
//!
//! Grounded in `examples/original_source/lib/internal.h`'s
//! `gss_ctx_id_struct` (mechanism tag, a mechanism-private pointer, and the
//! negotiated flag/state fields OM_uint32 `gss_ctx_id_t` callers never see
//! directly) and `lib/krb5/context.c`'s establishment loop, which reads and
//! writes exactly the flag and sequence-number fields modeled here.

use bitflags::bitflags;

use crate::oid::Oid;

bitflags! {
    /// Context flags requested by an initiator and/or granted by an acceptor
    /// (`spec.md` §4.2's req_flags/ret_flags). Bit positions match RFC 2744's
    /// `GSS_C_*_FLAG` values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ContextFlags: u32 {
        const DELEG    = 1 << 0;
        const MUTUAL   = 1 << 1;
        const REPLAY   = 1 << 2;
        const SEQUENCE = 1 << 3;
        const CONF     = 1 << 4;
        const INTEG    = 1 << 5;
        const ANON     = 1 << 6;
        const TRANS    = 1 << 12;
    }
}

/// Which side of the exchange a context is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Acceptor,
}

/// Lifecycle state of a context, per `spec.md` §4.4's establishment state
/// machine: `Incomplete` while more tokens are expected, `Established` once
/// both sides agree, `Expired` once `context_time` reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextStatus {
    Incomplete,
    Established,
    Expired,
}

/// The result of one `init_sec_context`/`accept_sec_context` step
/// (`spec.md` §4.4): an optional token to send the peer, whether more
/// input is expected, and the flags/status negotiated so far.
#[derive(Debug, Clone)]
pub struct SecContextStep {
    pub output_token: Option<Vec<u8>>,
    pub status: ContextStatus,
    pub flags: ContextFlags,
    /// The authenticated initiator name, if this step established one
    /// (`spec.md` §4.4 step 10's `src_name` output — acceptor-side only).
    pub src_name: Option<crate::name::Name>,
}

impl SecContextStep {
    pub fn continue_needed(&self) -> bool {
        self.status == ContextStatus::Incomplete
    }
}

/// A mechanism-agnostic security context handle. `spec.md` §9 models "no
/// context" as `Option<Context>` rather than a sentinel variant here.
#[derive(Debug)]
pub struct Context {
    pub mech: Oid,
    pub role: Role,
    pub flags: ContextFlags,
    pub status: ContextStatus,
    pub(crate) state: Box<dyn std::any::Any + Send + Sync>,
}

impl Context {
    pub fn new(
        mech: Oid,
        role: Role,
        state: Box<dyn std::any::Any + Send + Sync>,
    ) -> Self {
        Context {
            mech,
            role,
            flags: ContextFlags::empty(),
            status: ContextStatus::Incomplete,
            state,
        }
    }

    pub fn is_established(&self) -> bool {
        self.status == ContextStatus::Established
    }

    /// Downcast the mechanism-private state. Mechanisms own the concrete
    /// type and are the only code that should ever call this.
    pub(crate) fn state_mut<T: 'static>(&mut self) -> crate::error::Result<&mut T> {
        self.state
            .downcast_mut::<T>()
            .ok_or(crate::error::Error::Failure(
                "context state does not match its mechanism".into(),
            ))
    }

    pub(crate) fn state_ref<T: 'static>(&self) -> crate::error::Result<&T> {
        self.state
            .downcast_ref::<T>()
            .ok_or(crate::error::Error::Failure(
                "context state does not match its mechanism".into(),
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_continue_needed_tracks_status() {
        let step = SecContextStep {
            output_token: None,
            status: ContextStatus::Incomplete,
            flags: ContextFlags::empty(),
            src_name: None,
        };
        assert!(step.continue_needed());

        let step = SecContextStep {
            output_token: None,
            status: ContextStatus::Established,
            flags: ContextFlags::empty(),
            src_name: None,
        };
        assert!(!step.continue_needed());
    }

    #[test]
    fn flags_combine_bitwise() {
        let requested = ContextFlags::MUTUAL | ContextFlags::REPLAY | ContextFlags::SEQUENCE;
        assert!(requested.contains(ContextFlags::MUTUAL));
        assert!(!requested.contains(ContextFlags::CONF));
    }
}

//! Status codes and the crate's error type.
//!
//! GSS-API traditionally reports two 32-bit codes per call: a routing major
//! status and a mechanism-private minor status. [`Error`] is the idiomatic
//! Rust replacement for that pair — callers match on it directly — but
//! [`Error::major_status`] reconstructs the wire-compatible [`MajorStatus`]
//! bitmask for callers that need it (logging, interop shims, tests that
//! assert on the exact routing bits from `spec.md` §6).

use bitflags::bitflags;

bitflags! {
    /// Routing/calling/supplementary bits, combined bitwise as RFC 2744 describes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MajorStatus: u32 {
        const COMPLETE              = 0;
        const CONTINUE_NEEDED        = 1 << 0;
        const DEFECTIVE_TOKEN        = 1 << 1;
        const DEFECTIVE_CREDENTIAL   = 1 << 2;
        const BAD_SIG                = 1 << 3;
        const BAD_MIC                = 1 << 3;
        const NO_CRED                = 1 << 4;
        const NO_CONTEXT             = 1 << 5;
        const BAD_BINDINGS           = 1 << 6;
        const BAD_MECH               = 1 << 7;
        const BAD_NAME               = 1 << 8;
        const BAD_NAMETYPE           = 1 << 9;
        const CREDENTIALS_EXPIRED    = 1 << 10;
        const CONTEXT_EXPIRED        = 1 << 11;
        const FAILURE                = 1 << 12;
        const UNAVAILABLE            = 1 << 13;
        const CALL_INACCESSIBLE_READ = 1 << 29;
        const CALL_BAD_STRUCTURE     = 1 << 30;
    }
}

/// Errors surfaced by the generic GSS surface and the Kerberos V5 mechanism.
///
/// Each variant carries its wire-compatible [`MajorStatus`] via
/// [`Error::major_status`]; variants that model the underlying Kerberos
/// capability failing carry that failure as an opaque minor-status string.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("context handle pointer is not accessible")]
    NullContext,
    #[error("output token buffer is not accessible")]
    NullOutputToken,
    #[error("no context established on this handle")]
    NoContext,
    #[error("no credential available for this operation")]
    NoCred,
    #[error("no mechanism registered for the requested object identifier")]
    BadMech,
    #[error("token envelope is malformed or truncated")]
    DefectiveToken,
    #[error("checksum, sequence number, or padding verification failed")]
    BadMic,
    #[error("channel bindings are not supported by this mechanism")]
    BadBindings,
    #[error("credentials have expired")]
    CredentialsExpired,
    #[error("context has expired")]
    ContextExpired,
    #[error("operation not available for this mechanism")]
    Unavailable,
    #[error("unsupported authentication mechanism: {0}")]
    UnsupportedMechanism(String),
    #[error("mechanism or underlying capability failure: {0}")]
    Failure(String),
}

impl Error {
    /// Reconstruct the wire-compatible major status bitmask for this error.
    pub fn major_status(&self) -> MajorStatus {
        match self {
            Error::NullContext => MajorStatus::NO_CONTEXT | MajorStatus::CALL_INACCESSIBLE_READ,
            Error::NullOutputToken => MajorStatus::FAILURE | MajorStatus::CALL_BAD_STRUCTURE,
            Error::NoContext => MajorStatus::NO_CONTEXT | MajorStatus::CALL_BAD_STRUCTURE,
            Error::NoCred => MajorStatus::NO_CRED,
            Error::BadMech | Error::UnsupportedMechanism(_) => MajorStatus::BAD_MECH,
            Error::DefectiveToken => MajorStatus::DEFECTIVE_TOKEN,
            Error::BadMic => MajorStatus::BAD_MIC,
            Error::BadBindings => MajorStatus::BAD_BINDINGS,
            Error::CredentialsExpired => MajorStatus::CREDENTIALS_EXPIRED,
            Error::ContextExpired => MajorStatus::CONTEXT_EXPIRED,
            Error::Unavailable => MajorStatus::UNAVAILABLE,
            Error::Failure(_) => MajorStatus::FAILURE,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_mic_and_bad_sig_share_a_bit() {
        assert_eq!(MajorStatus::BAD_MIC, MajorStatus::BAD_SIG);
    }

    #[test]
    fn null_context_combines_routing_and_calling_bits() {
        let status = Error::NullContext.major_status();
        assert!(status.contains(MajorStatus::NO_CONTEXT));
        assert!(status.contains(MajorStatus::CALL_INACCESSIBLE_READ));
    }
}

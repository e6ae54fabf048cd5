//! The "underlying Kerberos capability" that `spec.md` §6 treats as an
//! external collaborator: ticket acquisition, AP-REQ/AP-REP construction
//! and verification, keyed checksums, raw CBC encryption, and randomness.
//!
//! This crate does not implement a Kerberos client against a real KDC — that
//! is explicitly out of scope (`spec.md` §1's Non-goals: "key distribution,
//! ticket acquisition logic"). [`KerberosEngine`] is the seam a real
//! implementation plugs into; [`crate::krb5::local::LocalKerberosEngine`] is
//! the one shipped implementation, a self-contained in-process stand-in
//! sufficient to drive context establishment and per-message wrap/unwrap in
//! tests and examples.

use std::fmt;

use crate::error::Result;
use crate::name::Name;

/// Opaque handle to an engine-managed Kerberos session (keytab/cache state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHandle(pub(crate) u64);

/// The two cipher suites `spec.md` §4.6 specifies, selected by key enctype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuite {
    /// `des-cbc-md5`, RFC 3961 enctype 3. Checksum length 8.
    DesCbcMd5,
    /// `des3-cbc-sha1-kd`, RFC 3961 enctype 16. Checksum length 20.
    Des3CbcHmacSha1Kd,
}

impl CipherSuite {
    pub fn checksum_len(self) -> usize {
        match self {
            CipherSuite::DesCbcMd5 => 8,
            CipherSuite::Des3CbcHmacSha1Kd => 20,
        }
    }

    /// Wire value for the wrap token's signing-algorithm field (`spec.md` §4.6 table).
    pub fn signing_algorithm_field(self) -> u16 {
        match self {
            CipherSuite::DesCbcMd5 => 0x0000,
            CipherSuite::Des3CbcHmacSha1Kd => 0x0004,
        }
    }

    pub fn block_size(self) -> usize {
        8
    }
}

/// Key-usage value for the DES-MD5 per-message checksum (matches the GNU GSS
/// source's literal `0`).
pub const KEY_USAGE_DES_MD5_CHECKSUM: i32 = 0;
/// Key-usage value for the 3DES/HMAC-SHA1 per-message checksum — "the
/// GSS-R2 usage" `spec.md` §4.6 names.
pub const KEY_USAGE_GSS_R2: i32 = 24;
/// Key-usage value for the AP-REQ authenticator checksum, per `spec.md` §4.5 step 5.
pub const AP_REQ_CHECKSUM_TYPE: u32 = 0x8003;

/// A session key plus the cipher suite it was established for.
#[derive(Clone, PartialEq, Eq)]
pub struct Krb5Key {
    pub suite: CipherSuite,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Krb5Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Krb5Key")
            .field("suite", &self.suite)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

/// A ticket, opaque to everything except the engine that issued it and the
/// engine that can decrypt it with the right long-term key.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub server_principal: String,
    pub(crate) opaque: Vec<u8>,
}

/// What `process_ap_req` recovers from a valid AP-REQ.
#[derive(Debug, Clone)]
pub struct ApReqInfo {
    pub session_key: Krb5Key,
    pub client_principal: String,
    pub mutual_required: bool,
    pub checksum_type: u32,
    pub checksum_payload: Vec<u8>,
    pub seq_number: u32,
}

/// The capability required from the underlying Kerberos layer (`spec.md` §6).
pub trait KerberosEngine: fmt::Debug {
    /// Initialize a session (credential cache / keytab handle).
    fn init_session(&self) -> Result<SessionHandle>;

    /// Obtain a ticket for `target`, given a session hint.
    fn acquire_ticket(&self, session: SessionHandle, target: &Name) -> Result<Ticket>;

    /// The long-term key an acceptor credential for this engine's own
    /// principal decrypts incoming AP-REQs with (stands in for a keytab
    /// lookup; `spec.md` §1 keeps real key distribution out of scope).
    fn acceptor_key(&self, session: SessionHandle) -> Result<Krb5Key>;

    /// Build and serialize an AP-REQ for `ticket`, with the authenticator
    /// checksum set to `(checksum_type, checksum_payload)` and the
    /// mutual-authentication option set as requested. Returns the AP-REQ
    /// bytes (without the GSS inner-token tag) and the session key to use
    /// for subsequent per-message operations.
    fn build_ap_req(
        &self,
        session: SessionHandle,
        ticket: &Ticket,
        mutual_required: bool,
        checksum_type: u32,
        checksum_payload: &[u8],
    ) -> Result<(Vec<u8>, Krb5Key)>;

    /// Parse and verify an AP-REP, returning the acceptor's starting
    /// sequence number if the encrypted part carried one.
    fn verify_ap_rep(&self, session_key: &Krb5Key, ap_rep_bytes: &[u8]) -> Result<Option<u32>>;

    /// Parse and process an AP-REQ against `acceptor_key`, exposing the
    /// ticket's session key and client principal.
    fn process_ap_req(&self, acceptor_key: &Krb5Key, ap_req_bytes: &[u8]) -> Result<ApReqInfo>;

    /// Build and serialize an AP-REP for the given session key, optionally
    /// carrying an acceptor starting sequence number in its encrypted part.
    fn build_ap_rep(&self, session_key: &Krb5Key, acceptor_seq_number: u32) -> Result<Vec<u8>>;

    /// Compute a keyed checksum over `data`, by key-usage and the key's suite.
    fn checksum(&self, key: &Krb5Key, key_usage: i32, data: &[u8]) -> Vec<u8>;

    /// Encrypt `data` with `key` in raw CBC mode (no integrity), given `iv`.
    /// `data` must already be a multiple of the suite's block size.
    fn encrypt_cbc_raw(&self, key: &Krb5Key, iv: &[u8], data: &[u8]) -> Vec<u8>;

    /// Decrypt `data` with `key` in raw CBC mode (no integrity), given `iv`.
    fn decrypt_cbc_raw(&self, key: &Krb5Key, iv: &[u8], data: &[u8]) -> Vec<u8>;

    /// Produce `n` cryptographically strong random bytes.
    fn random_bytes(&self, n: usize) -> Vec<u8>;

    /// A ticket's remaining lifetime, if the engine tracks expiration.
    fn ticket_lifetime(&self, ticket: &Ticket) -> Option<std::time::Duration>;
}

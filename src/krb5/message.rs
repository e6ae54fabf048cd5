//! Per-message wrap/unwrap and MIC codecs (`spec.md` §4.6).
//!
//! Grounded directly in `examples/original_source/lib/krb5/msg.c`'s
//! `gss_krb5_wrap`/`gss_krb5_unwrap`: byte-for-byte header layout, the
//! little-endian sequence number, and the trailing-role-byte convention
//! (`0x00000000` from the acceptor, `0xFFFFFFFF` from the initiator) are
//! preserved verbatim. `get_mic`/`verify_mic` have no counterpart in the
//! original source (which never implements them); this module extends the
//! wrap token's header/sequence/checksum construction to a MIC-only token
//! (no confounder, no payload) that shares the same per-direction sequence
//! counters as wrap — see `DESIGN.md` for why.

use binrw::binrw;
use binrw::prelude::*;
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::krb5::engine::{CipherSuite, KerberosEngine, Krb5Key, KEY_USAGE_DES_MD5_CHECKSUM, KEY_USAGE_GSS_R2};
use crate::krb5::wire::{pkcs_pad, pkcs_unpad};

const TOK_WRAP: [u8; 2] = [0x02, 0x01];
const TOK_MIC: [u8; 2] = [0x01, 0x01];
const SEAL_ALG_NONE: u16 = 0xFFFF;
const FILLER: u16 = 0xFFFF;

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy)]
struct FixedHeader {
    token_id: [u8; 2],
    signing_algorithm: u16,
    sealing_algorithm: u16,
    filler: u16,
}

impl FixedHeader {
    fn to_bytes(self) -> [u8; 8] {
        let mut cursor = Cursor::new(Vec::with_capacity(8));
        self.write(&mut cursor).expect("fixed-size struct cannot fail to serialize");
        cursor.into_inner().try_into().expect("FixedHeader is exactly 8 bytes")
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        FixedHeader::read(&mut cursor).map_err(|_| Error::DefectiveToken)
    }
}

fn key_usage(suite: CipherSuite) -> i32 {
    match suite {
        CipherSuite::DesCbcMd5 => KEY_USAGE_DES_MD5_CHECKSUM,
        CipherSuite::Des3CbcHmacSha1Kd => KEY_USAGE_GSS_R2,
    }
}

/// 8-byte little-endian sequence number plaintext: 4 bytes of `seqno`, then
/// the trailing role-byte pattern (`spec.md` §4.6 step 4).
fn seqno_plaintext(seqno: u32, sender_is_acceptor: bool) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&seqno.to_le_bytes());
    let fill = if sender_is_acceptor { 0xFF } else { 0x00 };
    out[4..].fill(fill);
    out
}

/// Build the per-message payload for `gss_wrap` (`spec.md` §4.6 Wrap).
/// `sender_is_acceptor` identifies which side is producing this token.
/// Confidentiality is not implemented: the caller must not request it
/// (`conf_req_flag = true` fails with [`Error::Failure`] rather than
/// silently reporting a false `conf_state`, per `spec.md` §4.6's Open
/// Question resolution).
pub fn wrap(
    engine: &dyn KerberosEngine,
    key: &Krb5Key,
    sender_is_acceptor: bool,
    seqno: u32,
    conf_req: bool,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    if conf_req {
        return Err(Error::Failure(
            "confidentiality (sealing) is not implemented by this mechanism".into(),
        ));
    }

    let header = FixedHeader {
        token_id: TOK_WRAP,
        signing_algorithm: key.suite.signing_algorithm_field(),
        sealing_algorithm: SEAL_ALG_NONE,
        filler: FILLER,
    };
    let confounder = engine.random_bytes(8);
    let padded = pkcs_pad(plaintext, 8);

    let mut to_checksum = Vec::with_capacity(8 + 8 + padded.len());
    to_checksum.extend_from_slice(&header.to_bytes());
    to_checksum.extend_from_slice(&confounder);
    to_checksum.extend_from_slice(&padded);
    let checksum = engine.checksum(key, key_usage(key.suite), &to_checksum);

    let seqno_pt = seqno_plaintext(seqno, sender_is_acceptor);
    let enc_seqno = engine.encrypt_cbc_raw(key, &checksum[..8], &seqno_pt);

    let mut out = Vec::with_capacity(24 + checksum.len() + padded.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&enc_seqno);
    out.extend_from_slice(&checksum);
    out.extend_from_slice(&confounder);
    out.extend_from_slice(&padded);
    Ok(out)
}

/// Result of a successful `gss_unwrap` (`spec.md` §4.6).
pub struct Unwrapped {
    pub plaintext: Vec<u8>,
    pub conf_state: bool,
}

/// Parse and verify a wrap-token payload (post-envelope-decapsulation).
/// `accept_seqno` is the next sequence number this side expects from the
/// peer; the caller is responsible for incrementing its stored counter
/// only after this returns `Ok`.
pub fn unwrap(
    engine: &dyn KerberosEngine,
    key: &Krb5Key,
    receiver_is_acceptor: bool,
    expected_seqno: u32,
    payload: &[u8],
) -> Result<Unwrapped> {
    let min_len = 32 + key.suite.checksum_len();
    if payload.len() < min_len {
        return Err(Error::BadMic);
    }

    let header = FixedHeader::from_bytes(&payload[..8]).map_err(|_| Error::BadMic)?;
    if header.token_id != TOK_WRAP || header.filler != FILLER {
        return Err(Error::BadMic);
    }
    let conf_state = header.sealing_algorithm != SEAL_ALG_NONE;
    if conf_state {
        // This mechanism never produces sealed tokens; never claim a
        // confidentiality state it did not actually apply.
        return Err(Error::BadMic);
    }

    let n = key.suite.checksum_len();
    let enc_seqno = &payload[8..16];
    let checksum = &payload[16..16 + n];
    let confounder = &payload[16 + n..24 + n];
    let body = &payload[24 + n..];

    let seqno_pt = engine.decrypt_cbc_raw(key, checksum, enc_seqno);
    if seqno_pt[4..] != *role_pattern(receiver_is_acceptor) {
        return Err(Error::BadMic);
    }
    let seqno = u32::from_le_bytes(seqno_pt[..4].try_into().unwrap());
    if seqno != expected_seqno {
        return Err(Error::BadMic);
    }

    let plaintext = pkcs_unpad(body, 8).map_err(|_| Error::BadMic)?;

    let mut to_checksum = Vec::with_capacity(8 + confounder.len() + body.len());
    to_checksum.extend_from_slice(&payload[..8]);
    to_checksum.extend_from_slice(confounder);
    to_checksum.extend_from_slice(body);
    let expected = engine.checksum(key, key_usage(key.suite), &to_checksum);
    if !constant_time_eq(&expected, checksum) {
        return Err(Error::BadMic);
    }

    Ok(Unwrapped { plaintext, conf_state: false })
}

/// Build a MIC-only token: header, encrypted sequence number, checksum over
/// (header || message) — the wrap token's construction minus confounder and
/// payload, since a MIC carries no message body of its own.
pub fn get_mic(
    engine: &dyn KerberosEngine,
    key: &Krb5Key,
    sender_is_acceptor: bool,
    seqno: u32,
    message: &[u8],
) -> Vec<u8> {
    let header = FixedHeader {
        token_id: TOK_MIC,
        signing_algorithm: key.suite.signing_algorithm_field(),
        sealing_algorithm: SEAL_ALG_NONE,
        filler: FILLER,
    };

    let mut to_checksum = Vec::with_capacity(8 + message.len());
    to_checksum.extend_from_slice(&header.to_bytes());
    to_checksum.extend_from_slice(message);
    let checksum = engine.checksum(key, key_usage(key.suite), &to_checksum);

    let seqno_pt = seqno_plaintext(seqno, sender_is_acceptor);
    let enc_seqno = engine.encrypt_cbc_raw(key, &checksum[..8], &seqno_pt);

    let mut out = Vec::with_capacity(16 + checksum.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&enc_seqno);
    out.extend_from_slice(&checksum);
    out
}

pub fn verify_mic(
    engine: &dyn KerberosEngine,
    key: &Krb5Key,
    receiver_is_acceptor: bool,
    expected_seqno: u32,
    message: &[u8],
    mic_payload: &[u8],
) -> Result<()> {
    let n = key.suite.checksum_len();
    if mic_payload.len() != 16 + n {
        return Err(Error::BadMic);
    }
    let header = FixedHeader::from_bytes(&mic_payload[..8]).map_err(|_| Error::BadMic)?;
    if header.token_id != TOK_MIC || header.filler != FILLER || header.sealing_algorithm != SEAL_ALG_NONE {
        return Err(Error::BadMic);
    }

    let enc_seqno = &mic_payload[8..16];
    let checksum = &mic_payload[16..16 + n];

    let seqno_pt = engine.decrypt_cbc_raw(key, checksum, enc_seqno);
    if seqno_pt[4..] != *role_pattern(receiver_is_acceptor) {
        return Err(Error::BadMic);
    }
    let seqno = u32::from_le_bytes(seqno_pt[..4].try_into().unwrap());
    if seqno != expected_seqno {
        return Err(Error::BadMic);
    }

    let mut to_checksum = Vec::with_capacity(8 + message.len());
    to_checksum.extend_from_slice(&mic_payload[..8]);
    to_checksum.extend_from_slice(message);
    let expected = engine.checksum(key, key_usage(key.suite), &to_checksum);
    if !constant_time_eq(&expected, checksum) {
        return Err(Error::BadMic);
    }
    Ok(())
}

fn role_pattern(is_acceptor: bool) -> &'static [u8; 4] {
    if is_acceptor {
        &[0x00, 0x00, 0x00, 0x00]
    } else {
        &[0xFF, 0xFF, 0xFF, 0xFF]
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::krb5::local::{LocalKerberosEngine, LocalRealmConfig};

    fn key(suite: CipherSuite) -> (LocalKerberosEngine, Krb5Key) {
        let engine = LocalKerberosEngine::new(LocalRealmConfig::new(b"msg test realm".to_vec()), "alice@EXAMPLE.TEST");
        let len = match suite {
            CipherSuite::DesCbcMd5 => 8,
            CipherSuite::Des3CbcHmacSha1Kd => 24,
        };
        let key = Krb5Key { suite, bytes: engine.random_bytes(len) };
        (engine, key)
    }

    #[test]
    fn wrap_unwrap_round_trips_des_md5() {
        let (engine, key) = key(CipherSuite::DesCbcMd5);
        let payload = wrap(&engine, &key, false, 0, false, b"hello").unwrap();
        // spec.md scenario 3: 40 + 3 (pad to 8) bytes after the envelope.
        assert_eq!(payload.len(), 40 + 3);
        let out = unwrap(&engine, &key, true, 0, &payload).unwrap();
        assert_eq!(out.plaintext, b"hello");
        assert!(!out.conf_state);
    }

    #[test]
    fn wrap_unwrap_round_trips_3des() {
        let (engine, key) = key(CipherSuite::Des3CbcHmacSha1Kd);
        let payload = wrap(&engine, &key, false, 7, false, b"a longer message body").unwrap();
        let out = unwrap(&engine, &key, true, 7, &payload).unwrap();
        assert_eq!(out.plaintext, b"a longer message body");
    }

    #[test]
    fn role_isolation_rejects_self_unwrap() {
        let (engine, key) = key(CipherSuite::Des3CbcHmacSha1Kd);
        let payload = wrap(&engine, &key, false, 0, false, b"hi").unwrap();
        // The initiator tries to unwrap its own output as if it were the acceptor's peer.
        assert!(matches!(unwrap(&engine, &key, false, 0, &payload), Err(Error::BadMic)));
    }

    #[test]
    fn sequence_mismatch_is_bad_mic() {
        let (engine, key) = key(CipherSuite::Des3CbcHmacSha1Kd);
        let payload = wrap(&engine, &key, false, 5, false, b"hi").unwrap();
        assert!(matches!(unwrap(&engine, &key, true, 0, &payload), Err(Error::BadMic)));
    }

    #[test]
    fn tamper_anywhere_outside_confounder_is_bad_mic() {
        let (engine, key) = key(CipherSuite::DesCbcMd5);
        let original = wrap(&engine, &key, false, 0, false, b"hello").unwrap();
        // Flip a bit in the checksum field (bytes 16..24 for DES-MD5): this is
        // never the confounder, so it must always be detected.
        let mut mutated = original.clone();
        mutated[16] ^= 0x01;
        assert!(matches!(unwrap(&engine, &key, true, 0, &mutated), Err(Error::BadMic)));
    }

    #[test]
    fn confidentiality_request_is_refused_not_faked() {
        let (engine, key) = key(CipherSuite::DesCbcMd5);
        assert!(matches!(wrap(&engine, &key, false, 0, true, b"x"), Err(Error::Failure(_))));
    }

    #[test]
    fn mic_round_trips_and_tamper_fails() {
        let (engine, key) = key(CipherSuite::Des3CbcHmacSha1Kd);
        let mic = get_mic(&engine, &key, false, 0, b"signed message");
        verify_mic(&engine, &key, true, 0, b"signed message", &mic).unwrap();

        let mut tampered = mic.clone();
        *tampered.last_mut().unwrap() ^= 1;
        assert!(verify_mic(&engine, &key, true, 0, b"signed message", &tampered).is_err());
    }
}

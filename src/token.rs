//! Outer token encapsulation: the OID-tagged envelope shared by every
//! mechanism on the wire.
//!
//! Layout (`spec.md` §4.1): a tag byte `0x60` ("application constructed"), a
//! definite-length encoding of the payload length, a nested tag byte `0x06`
//! ("object identifier"), the OID's own length-prefixed bytes, then the raw
//! mechanism payload. `encode_with_prefix` additionally splices a fixed
//! two-byte prefix in front of the payload before encoding — used by the
//! Kerberos mechanism to carry the AP-REQ/AP-REP/wrap/MIC token-id tag.

use crate::error::{Error, Result};
use crate::oid::Oid;

const APPLICATION_CONSTRUCTED_TAG: u8 = 0x60;
const OID_TAG: u8 = 0x06;

/// Encode `(oid, payload)` as the outer envelope.
pub fn encode(oid: &Oid, payload: &[u8]) -> Vec<u8> {
    let oid_bytes = oid.as_bytes();
    let mut inner = Vec::with_capacity(2 + oid_bytes.len() + payload.len());
    inner.push(OID_TAG);
    write_der_length(&mut inner, oid_bytes.len());
    inner.extend_from_slice(oid_bytes);
    inner.extend_from_slice(payload);

    let mut out = Vec::with_capacity(1 + 5 + inner.len());
    out.push(APPLICATION_CONSTRUCTED_TAG);
    write_der_length(&mut out, inner.len());
    out.extend_from_slice(&inner);
    out
}

/// Encode `(oid, prefix ++ payload)`, i.e. [`encode`] with `prefix` spliced
/// in front of `payload` before the envelope is built.
pub fn encode_with_prefix(oid: &Oid, prefix: [u8; 2], payload: &[u8]) -> Vec<u8> {
    let mut combined = Vec::with_capacity(2 + payload.len());
    combined.extend_from_slice(&prefix);
    combined.extend_from_slice(payload);
    encode(oid, &combined)
}

/// Decode the outer envelope, returning the OID and a view of the payload.
///
/// Any deviation from the encoding — wrong outer tag, truncated length,
/// malformed nested OID tag, length that overruns the buffer — fails with
/// [`Error::DefectiveToken`].
pub fn decode(bytes: &[u8]) -> Result<(Oid, &[u8])> {
    let mut cursor = bytes;

    let outer_tag = take_byte(&mut cursor)?;
    if outer_tag != APPLICATION_CONSTRUCTED_TAG {
        return Err(Error::DefectiveToken);
    }
    let outer_len = read_der_length(&mut cursor)?;
    if cursor.len() < outer_len {
        return Err(Error::DefectiveToken);
    }
    let mut inner = &cursor[..outer_len];

    let oid_tag = take_byte(&mut inner)?;
    if oid_tag != OID_TAG {
        return Err(Error::DefectiveToken);
    }
    let oid_len = read_der_length(&mut inner)?;
    if inner.len() < oid_len {
        return Err(Error::DefectiveToken);
    }
    let oid_bytes = &inner[..oid_len];
    let payload = &inner[oid_len..];

    Ok((Oid::from_der_bytes(oid_bytes.to_vec()), payload))
}

/// Decode the envelope and additionally check the payload starts with
/// `expected_prefix` (the mechanism's inner token-id tag), returning the
/// remainder of the payload past that prefix.
pub fn decode_with_prefix<'a>(bytes: &'a [u8], expected_prefix: [u8; 2]) -> Result<(Oid, &'a [u8])> {
    let (oid, payload) = decode(bytes)?;
    if payload.len() < 2 || payload[0] != expected_prefix[0] || payload[1] != expected_prefix[1] {
        return Err(Error::DefectiveToken);
    }
    Ok((oid, &payload[2..]))
}

fn take_byte(cursor: &mut &[u8]) -> Result<u8> {
    let (first, rest) = cursor.split_first().ok_or(Error::DefectiveToken)?;
    *cursor = rest;
    Ok(*first)
}

fn write_der_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let be = len.to_be_bytes();
    let significant = be.iter().position(|&b| b != 0).unwrap_or(be.len() - 1);
    let octets = &be[significant..];
    out.push(0x80 | octets.len() as u8);
    out.extend_from_slice(octets);
}

fn read_der_length(cursor: &mut &[u8]) -> Result<usize> {
    let first = take_byte(cursor)?;
    if first & 0x80 == 0 {
        return Ok(first as usize);
    }
    let count = (first & 0x7f) as usize;
    if count == 0 || count > std::mem::size_of::<usize>() || cursor.len() < count {
        return Err(Error::DefectiveToken);
    }
    let mut len: usize = 0;
    for _ in 0..count {
        len = (len << 8) | take_byte(cursor)? as usize;
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid::kerberos_v5_mechanism;

    #[test]
    fn round_trips_arbitrary_payload() {
        let oid = kerberos_v5_mechanism();
        let payload = b"hello kerberos";
        let encoded = encode(&oid, payload);
        let (decoded_oid, decoded_payload) = decode(&encoded).unwrap();
        assert_eq!(decoded_oid, oid);
        assert_eq!(decoded_payload, payload);
    }

    #[test]
    fn round_trips_long_payload_needing_multi_byte_length() {
        let oid = kerberos_v5_mechanism();
        let payload = vec![0x42u8; 300];
        let encoded = encode(&oid, &payload);
        let (decoded_oid, decoded_payload) = decode(&encoded).unwrap();
        assert_eq!(decoded_oid, oid);
        assert_eq!(decoded_payload, payload.as_slice());
    }

    #[test]
    fn prefix_round_trips() {
        let oid = kerberos_v5_mechanism();
        let encoded = encode_with_prefix(&oid, [0x01, 0x00], b"ap-req-bytes");
        let (decoded_oid, rest) = decode_with_prefix(&encoded, [0x01, 0x00]).unwrap();
        assert_eq!(decoded_oid, oid);
        assert_eq!(rest, b"ap-req-bytes");
    }

    #[test]
    fn wrong_outer_tag_is_defective() {
        let oid = kerberos_v5_mechanism();
        let mut encoded = encode(&oid, b"payload");
        encoded[0] = 0x61;
        assert!(matches!(decode(&encoded), Err(Error::DefectiveToken)));
    }

    #[test]
    fn truncated_length_is_defective() {
        assert!(matches!(decode(&[0x60, 0x85]), Err(Error::DefectiveToken)));
    }

    #[test]
    fn wrong_oid_tag_is_defective() {
        let oid = kerberos_v5_mechanism();
        let mut encoded = encode(&oid, b"payload");
        // the nested OID tag sits right after the outer tag+length byte
        encoded[2] = 0x04;
        assert!(matches!(decode(&encoded), Err(Error::DefectiveToken)));
    }

    #[test]
    fn single_bit_flip_either_fails_or_changes_the_value() {
        let oid = kerberos_v5_mechanism();
        let original = encode(&oid, b"payload");
        for byte_index in 0..original.len() {
            for bit in 0..8u8 {
                let mut mutated = original.clone();
                mutated[byte_index] ^= 1 << bit;
                match decode(&mutated) {
                    Err(_) => {}
                    Ok((o, p)) => assert!(o != oid || p != b"payload"),
                }
            }
        }
    }
}

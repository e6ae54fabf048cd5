//! Object identifiers.
//!
//! An [`Oid`] is an immutable byte sequence interpreted as a DER-encoded OID
//! value, without the outer tag/length octets — equality is byte-exact, as
//! `spec.md` §3 requires. Mechanism OIDs and name-type OIDs share this type.

use std::fmt;

use der::asn1::ObjectIdentifier;
use der::Encode;

/// A DER-encoded object identifier value (tag/length stripped).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid(Vec<u8>);

impl Oid {
    /// Build an `Oid` directly from its raw DER value bytes.
    pub fn from_der_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Oid(bytes.into())
    }

    /// Parse an OID from dotted-decimal notation, e.g. `"1.2.840.113554.1.2.2"`.
    pub fn from_dotted(dotted: &str) -> Result<Self, der::Error> {
        let oid = ObjectIdentifier::new(dotted)?;
        // `to_der` on an `ObjectIdentifier` includes the tag/length octets;
        // skip them to keep this type's invariant (value bytes only).
        let full = oid.to_der()?;
        let (_, value) = split_tlv(&full).expect("der-encoded OID is well-formed");
        Ok(Oid(value.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Render in dotted-decimal notation for diagnostics.
    pub fn to_dotted_string(&self) -> String {
        match ObjectIdentifier::from_bytes(&self.0) {
            Ok(oid) => oid.to_string(),
            Err(_) => format!("<{} invalid DER bytes>", self.0.len()),
        }
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dotted_string())
    }
}

/// Split a DER TLV into `(tag_and_length, value)`. Only used internally to
/// strip the tag/length octets `der::asn1::ObjectIdentifier::to_der` adds.
fn split_tlv(der: &[u8]) -> Option<(&[u8], &[u8])> {
    if der.len() < 2 {
        return None;
    }
    let len_byte = der[1];
    let header_len = if len_byte & 0x80 == 0 {
        2
    } else {
        2 + (len_byte & 0x7f) as usize
    };
    if der.len() < header_len {
        return None;
    }
    Some((&der[..header_len], &der[header_len..]))
}

/// Kerberos V5 mechanism OID: `1.2.840.113554.1.2.2`.
pub fn kerberos_v5_mechanism() -> Oid {
    Oid::from_dotted("1.2.840.113554.1.2.2").expect("valid static OID")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kerberos_oid_round_trips_through_dotted_string() {
        let oid = kerberos_v5_mechanism();
        assert_eq!(oid.to_dotted_string(), "1.2.840.113554.1.2.2");
    }

    #[test]
    fn equality_is_byte_exact() {
        let a = Oid::from_der_bytes(vec![0x2a, 0x86, 0x48]);
        let b = Oid::from_der_bytes(vec![0x2a, 0x86, 0x48]);
        let c = Oid::from_der_bytes(vec![0x2a, 0x86, 0x49]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

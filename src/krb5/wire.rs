//! Minimal length-prefixed framing for the engine's internal records
//! (tickets, authenticators, AP-REQ/AP-REP bodies).
//!
//! None of this is a real Kerberos ASN.1 encoding — acquiring a ticket from
//! a KDC and parsing its DER is the "underlying Kerberos capability" this
//! crate treats as external (`spec.md` §1 Non-goals). These records never
//! leave [`crate::krb5::local::LocalKerberosEngine`]; they only need to be
//! unambiguous, not standards-compliant.

use crate::error::{Error, Result};

pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Writer { buf: Vec::new() }
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.u32(v.len() as u32);
        self.buf.extend_from_slice(v);
        self
    }

    pub fn str(&mut self, v: &str) -> &mut Self {
        self.bytes(v.as_bytes());
        self
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

/// PKCS#7-style padding to a multiple of `block_size` (1..=block_size bytes
/// of padding, every pad byte equal to the pad length), as `spec.md` §4.6
/// specifies for the confidentiality-sealed message body.
pub fn pkcs_pad(data: &[u8], block_size: usize) -> Vec<u8> {
    let pad_len = block_size - (data.len() % block_size);
    let mut out = Vec::with_capacity(data.len() + pad_len);
    out.extend_from_slice(data);
    out.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    out
}

pub fn pkcs_unpad(data: &[u8], block_size: usize) -> Result<Vec<u8>> {
    let pad_len = *data.last().ok_or(Error::DefectiveToken)? as usize;
    if pad_len == 0 || pad_len > block_size || pad_len > data.len() {
        return Err(Error::DefectiveToken);
    }
    if data[data.len() - pad_len..].iter().any(|&b| b as usize != pad_len) {
        return Err(Error::DefectiveToken);
    }
    Ok(data[..data.len() - pad_len].to_vec())
}

pub struct Reader<'a> {
    cursor: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader { cursor: bytes }
    }

    pub fn u8(&mut self) -> Result<u8> {
        let (first, rest) = self.cursor.split_first().ok_or(Error::DefectiveToken)?;
        self.cursor = rest;
        Ok(*first)
    }

    pub fn u32(&mut self) -> Result<u32> {
        if self.cursor.len() < 4 {
            return Err(Error::DefectiveToken);
        }
        let (head, rest) = self.cursor.split_at(4);
        self.cursor = rest;
        Ok(u32::from_be_bytes(head.try_into().unwrap()))
    }

    pub fn u64(&mut self) -> Result<u64> {
        if self.cursor.len() < 8 {
            return Err(Error::DefectiveToken);
        }
        let (head, rest) = self.cursor.split_at(8);
        self.cursor = rest;
        Ok(u64::from_be_bytes(head.try_into().unwrap()))
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        if self.cursor.len() < len {
            return Err(Error::DefectiveToken);
        }
        let (head, rest) = self.cursor.split_at(len);
        self.cursor = rest;
        Ok(head.to_vec())
    }

    pub fn str(&mut self) -> Result<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes).map_err(|_| Error::DefectiveToken)
    }

    pub fn finish(self) -> Result<()> {
        if self.cursor.is_empty() {
            Ok(())
        } else {
            Err(Error::DefectiveToken)
        }
    }
}

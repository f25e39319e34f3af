//! This module contains the minimum DER plumbing the library needs
//! from certificates: locating the SubjectPublicKeyInfo, the subject
//! and issuer names, and the KeyUsage bits.  Everything else about
//! X.509 is delegated to the chain verifier.

/// Prepend stuff to a DER encoding to make it a SEQUENCE.
pub fn wrap_in_sequence(bytes: &mut Vec<u8>) {
    wrap_in_asn1_len(bytes);
    bytes.insert(0, DER_SEQUENCE_TAG);
}

fn wrap_in_asn1_len(bytes: &mut Vec<u8>) {
    let len = bytes.len();

    if len <= 0x7f {
        bytes.insert(0, len as u8);
    } else {
        bytes.insert(0, 0x80u8);
        let mut left = len;
        while left > 0 {
            let byte = (left & 0xff) as u8;
            bytes.insert(1, byte);
            bytes[0] += 1;
            left >>= 8;
        }
        bytes[0] |= 0x80;
    }
}

const DER_SEQUENCE_TAG: u8 = 0x30;
const DER_CONTEXT_CONSTRUCTED_0: u8 = 0xa0;
const DER_CONTEXT_CONSTRUCTED_3: u8 = 0xa3;
const DER_BIT_STRING: u8 = 0x03;
const DER_OCTET_STRING: u8 = 0x04;
const DER_OID: u8 = 0x06;
const DER_BOOLEAN: u8 = 0x01;

/// id-ce-keyUsage, 2.5.29.15
const OID_KEY_USAGE: &[u8] = &[0x55, 0x1d, 0x0f];

struct Der<'a> {
    input: &'a [u8],
    offs: usize,
}

impl<'a> Der<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, offs: 0 }
    }

    fn any_left(&self) -> bool {
        self.offs < self.input.len()
    }

    fn byte(&mut self) -> Option<u8> {
        let b = *self.input.get(self.offs)?;
        self.offs += 1;
        Some(b)
    }

    fn bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.offs.checked_add(n)?;
        let out = self.input.get(self.offs..end)?;
        self.offs = end;
        Some(out)
    }

    /// Read one TLV, returning (tag, content, whole-TLV).
    fn tlv(&mut self) -> Option<(u8, &'a [u8], &'a [u8])> {
        let start = self.offs;
        let tag = self.byte()?;
        let first = self.byte()?;
        let len = if first & 0x80 == 0 {
            usize::from(first)
        } else {
            let count = usize::from(first & 0x7f);
            if count == 0 || count > 4 {
                return None;
            }
            let mut len = 0usize;
            for _ in 0..count {
                len = len.checked_shl(8)? | usize::from(self.byte()?);
            }
            len
        };
        let content = self.bytes(len)?;
        Some((tag, content, &self.input[start..self.offs]))
    }

    fn expect(&mut self, want: u8) -> Option<&'a [u8]> {
        let (tag, content, _) = self.tlv()?;
        if tag == want {
            Some(content)
        } else {
            None
        }
    }
}

/// The fields we pull out of an end-entity certificate.
#[derive(Debug, Clone)]
pub struct CertFields<'a> {
    /// Raw DER of the subjectPublicKeyInfo, tag and all.
    pub spki: &'a [u8],
    /// Raw DER content of the subject Name.
    pub subject: &'a [u8],
    /// Raw DER content of the issuer Name.
    pub issuer: &'a [u8],
    /// KeyUsage bits, leftmost bit first, when the extension is present.
    pub key_usage: Option<KeyUsage>,
}

/// The first byte of the KeyUsage BIT STRING.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub u8);

impl KeyUsage {
    pub const DIGITAL_SIGNATURE: u8 = 0x80;
    pub const KEY_ENCIPHERMENT: u8 = 0x20;
    pub const KEY_AGREEMENT: u8 = 0x08;
    pub const KEY_CERT_SIGN: u8 = 0x04;

    pub fn allows_digital_signature(&self) -> bool {
        self.0 & Self::DIGITAL_SIGNATURE != 0
    }

    pub fn allows_key_encipherment(&self) -> bool {
        self.0 & Self::KEY_ENCIPHERMENT != 0
    }
}

/// Walk the outer layers of a DER certificate.  Returns `None` on any
/// structural surprise; callers treat that as a certificate error.
pub fn parse_cert_fields(der: &[u8]) -> Option<CertFields> {
    let mut outer = Der::new(der);
    let cert = outer.expect(DER_SEQUENCE_TAG)?;

    let mut cert = Der::new(cert);
    let tbs = cert.expect(DER_SEQUENCE_TAG)?;

    let mut tbs = Der::new(tbs);

    // version is optional and tagged [0]
    let (first_tag, _, first_tlv) = tbs.tlv()?;
    let _serial = if first_tag == DER_CONTEXT_CONSTRUCTED_0 {
        tbs.tlv()?.2
    } else {
        first_tlv
    };

    let _sig_alg = tbs.expect(DER_SEQUENCE_TAG)?;
    let (issuer_tag, issuer, _) = tbs.tlv()?;
    let _validity = tbs.expect(DER_SEQUENCE_TAG)?;
    let (subject_tag, subject, _) = tbs.tlv()?;
    if issuer_tag != DER_SEQUENCE_TAG || subject_tag != DER_SEQUENCE_TAG {
        return None;
    }

    let (spki_tag, _, spki) = tbs.tlv()?;
    if spki_tag != DER_SEQUENCE_TAG {
        return None;
    }

    let mut key_usage = None;
    while tbs.any_left() {
        let (tag, content, _) = tbs.tlv()?;
        if tag == DER_CONTEXT_CONSTRUCTED_3 {
            key_usage = parse_key_usage(content);
        }
    }

    Some(CertFields {
        spki,
        subject,
        issuer,
        key_usage,
    })
}

/// Raw SPKI of a certificate, as used by the TOFU store and the
/// key-transport module.
pub fn extract_spki(der: &[u8]) -> Option<&[u8]> {
    parse_cert_fields(der).map(|f| f.spki)
}

fn parse_key_usage(extensions: &[u8]) -> Option<KeyUsage> {
    let mut exts = Der::new(extensions);
    let seq = exts.expect(DER_SEQUENCE_TAG)?;
    let mut seq = Der::new(seq);

    while seq.any_left() {
        let (tag, ext, _) = seq.tlv()?;
        if tag != DER_SEQUENCE_TAG {
            return None;
        }
        let mut ext = Der::new(ext);
        let oid = ext.expect(DER_OID)?;
        if oid != OID_KEY_USAGE {
            continue;
        }
        // skip the optional critical flag
        let (tag, content, _) = ext.tlv()?;
        let value = if tag == DER_BOOLEAN {
            ext.expect(DER_OCTET_STRING)?
        } else if tag == DER_OCTET_STRING {
            content
        } else {
            return None;
        };
        let mut value = Der::new(value);
        let bits = value.expect(DER_BIT_STRING)?;
        // first byte counts unused bits
        return bits.get(1).map(|b| KeyUsage(*b));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_sequence() {
        let mut val = Vec::new();
        val.insert(0, 0x00);
        wrap_in_sequence(&mut val);
        assert_eq!(vec![0x30, 0x01, 0x00], val);
    }

    #[test]
    fn long_sequence() {
        let mut val = vec![0x12; 256];
        wrap_in_sequence(&mut val);
        assert_eq!(val[0], 0x30);
        assert_eq!(val[1], 0x82);
        assert_eq!(val[2], 0x01);
        assert_eq!(val[3], 0x00);
        assert_eq!(val[4], 0x12);
    }

    #[test]
    fn truncated_cert_is_rejected() {
        assert!(parse_cert_fields(&[0x30, 0x05, 0x30]).is_none());
        assert!(parse_cert_fields(&[]).is_none());
    }

    #[test]
    fn key_usage_bits() {
        let ku = KeyUsage(KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_AGREEMENT);
        assert!(ku.allows_digital_signature());
        assert!(!ku.allows_key_encipherment());
    }
}

use std::collections::HashMap;

use crate::{
    error::Error,
    key::Certificate,
    msgs::handshake::{DistinguishedName, DistinguishedNames},
    x509,
};

/// A trust anchor, commonly known as a "Root Certificate."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedTrustAnchor {
    subject: Vec<u8>,
    spki: Vec<u8>,
    name_constraints: Option<Vec<u8>>,
}

impl OwnedTrustAnchor {
    /// Constructs an `OwnedTrustAnchor` from its components.
    ///
    /// `subject` is the subject field of the trust anchor *without*
    /// the outer SEQUENCE encoding.  `spki` is the complete DER
    /// subjectPublicKeyInfo.  `name_constraints` is the DER-encoded
    /// name constraints, if any.
    pub fn from_subject_spki_name_constraints(
        subject: impl Into<Vec<u8>>,
        spki: impl Into<Vec<u8>>,
        name_constraints: Option<impl Into<Vec<u8>>>,
    ) -> Self {
        Self {
            subject: subject.into(),
            spki: spki.into(),
            name_constraints: name_constraints.map(|x| x.into()),
        }
    }

    /// The raw DER subject name.
    pub fn subject(&self) -> &[u8] {
        &self.subject
    }

    pub(crate) fn to_trust_anchor(&self) -> webpki::TrustAnchor {
        webpki::TrustAnchor {
            subject: &self.subject,
            spki: &self.spki,
            name_constraints: self.name_constraints.as_deref(),
        }
    }
}

impl From<webpki::TrustAnchor<'_>> for OwnedTrustAnchor {
    fn from(t: webpki::TrustAnchor) -> Self {
        Self {
            subject: t.subject.to_vec(),
            spki: t.spki.to_vec(),
            name_constraints: t.name_constraints.map(|x| x.to_vec()),
        }
    }
}

/// The trust list: an ordered container of trust anchors able to
/// provide a root-of-trust for connection authentication, plus the
/// anchors the holder explicitly distrusts.
#[derive(Debug, Clone)]
pub struct RootCertStore {
    /// The list of roots.
    pub roots: Vec<OwnedTrustAnchor>,
    distrusted: Vec<OwnedTrustAnchor>,
    by_subject: HashMap<Vec<u8>, Vec<usize>>,
}

impl RootCertStore {
    /// Make a new, empty `RootCertStore`.
    pub fn empty() -> Self {
        Self {
            roots: Vec::new(),
            distrusted: Vec::new(),
            by_subject: HashMap::new(),
        }
    }

    /// Return true if there are no certificates.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Say how many certificates are in the container.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Add a single DER-encoded certificate to the store.
    pub fn add(&mut self, der: &Certificate) -> Result<(), Error> {
        let anchor = webpki::TrustAnchor::try_from_cert_der(&der.0)
            .map_err(|e| Error::InvalidCertificateData(e.to_string()))?;
        self.push(anchor.into());
        Ok(())
    }

    /// Adds all the given certificates, ignoring any that fail to
    /// parse.  Returns (added, ignored).
    pub fn add_parsable_certificates(&mut self, der_certs: &[Vec<u8>]) -> (usize, usize) {
        let mut valid_count = 0;
        let mut invalid_count = 0;

        for der in der_certs {
            match self.add(&Certificate(der.clone())) {
                Ok(_) => valid_count += 1,
                Err(_) => invalid_count += 1,
            }
        }

        (valid_count, invalid_count)
    }

    /// Add trust anchors from an iterator, e.g. a compiled-in root set.
    pub fn add_trust_anchors(&mut self, anchors: impl Iterator<Item = OwnedTrustAnchor>) {
        for a in anchors {
            self.push(a);
        }
    }

    /// Mark an anchor as distrusted.  A distrusted anchor is never
    /// returned by issuer lookups, even if also present in `roots`.
    pub fn distrust(&mut self, anchor: OwnedTrustAnchor) {
        self.distrusted.push(anchor);
    }

    /// Look up an issuer by its raw DER subject name, by reference.
    /// Anchors on the distrusted list are invisible here.
    pub fn find_issuer(&self, subject: &[u8]) -> Option<&OwnedTrustAnchor> {
        self.by_subject
            .get(subject)?
            .iter()
            .map(|i| &self.roots[*i])
            .find(|a| !self.distrusted.contains(a))
    }

    /// Look up an issuer by its raw DER subject name, deep-copied.
    pub fn find_issuer_owned(&self, subject: &[u8]) -> Option<OwnedTrustAnchor> {
        self.find_issuer(subject).cloned()
    }

    /// The usable (non-distrusted) anchors in webpki form.
    pub fn usable_anchors(&self) -> Vec<webpki::TrustAnchor> {
        self.roots
            .iter()
            .filter(|a| !self.distrusted.contains(a))
            .map(|a| a.to_trust_anchor())
            .collect()
    }

    /// Return the Subject Names for certificates in the container.
    pub fn subjects(&self) -> DistinguishedNames {
        let mut r = DistinguishedNames::new();

        for ota in &self.roots {
            let mut name = Vec::new();
            name.extend_from_slice(&ota.subject);
            x509::wrap_in_sequence(&mut name);
            r.push(DistinguishedName::new(name));
        }

        r
    }

    fn push(&mut self, anchor: OwnedTrustAnchor) {
        self.by_subject
            .entry(anchor.subject.clone())
            .or_default()
            .push(self.roots.len());
        self.roots.push(anchor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(subject: &[u8]) -> OwnedTrustAnchor {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            subject,
            &b"spki"[..],
            None::<Vec<u8>>,
        )
    }

    #[test]
    fn issuer_lookup_respects_distrust() {
        let mut store = RootCertStore::empty();
        store.add_trust_anchors(vec![anchor(b"ca-one"), anchor(b"ca-two")].into_iter());

        assert!(store.find_issuer(b"ca-one").is_some());
        assert!(store.find_issuer(b"ca-three").is_none());

        store.distrust(anchor(b"ca-one"));
        assert!(store.find_issuer(b"ca-one").is_none());
        assert!(store.find_issuer(b"ca-two").is_some());
        assert_eq!(store.usable_anchors().len(), 1);
    }

    #[test]
    fn deep_copy_lookup() {
        let mut store = RootCertStore::empty();
        store.add_trust_anchors(vec![anchor(b"ca")].into_iter());
        let owned = store.find_issuer_owned(b"ca").unwrap();
        assert_eq!(owned.subject(), b"ca");
    }
}

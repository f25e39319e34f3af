//! The credential registry: the per-kind material a session draws on
//! during negotiation.  Certificate credentials hold slots of chains
//! and keys; PSK credentials hold identity/key lookups; anonymous
//! credentials hold only Diffie-Hellman parameters.  All of them are
//! shared by reference across sessions and must not change while a
//! handshake is running.

use std::{collections::HashMap, io, sync::Arc};

use tls_core::{
    dns::{hostname_match, DnsName},
    key::{Certificate, PrivateKey},
    msgs::enums::{KeyExchangeAlgorithm, SignatureScheme},
    strings, x509, Error,
};

use crate::sign::CertifiedKey;

/// The longest PSK identity (or SRP-style username) we will emit or
/// accept, in bytes.
pub const MAX_USERNAME_SIZE: usize = 128;

/// A PSK identity after profile normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PskIdentity(Vec<u8>);

impl PskIdentity {
    /// Build an identity from a username, normalizing it with the
    /// RFC 7613 password rules.  With `ignore_errs`, undecodable
    /// bytes are carried through raw instead of failing.
    pub fn new(username: &[u8], ignore_errs: bool) -> Result<Self, Error> {
        let normalized = strings::utf8_password_normalize(username, ignore_errs)?;
        if normalized.len() > MAX_USERNAME_SIZE {
            return Err(Error::IllegalSrpUsername);
        }
        Ok(Self(normalized))
    }

    /// An identity received from the wire: bounded but not
    /// normalized.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() > MAX_USERNAME_SIZE {
            return Err(Error::IllegalSrpUsername);
        }
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Server-side PSK lookup, expressed as a strategy object so keys can
/// live anywhere (memory, a database, a token).
pub trait PskStore: Send + Sync {
    /// The key for `identity`, or `None` when the identity is
    /// unknown.
    fn psk(&self, identity: &[u8]) -> Option<Vec<u8>>;

    /// The identity hint sent to clients in the ServerKeyExchange.
    fn hint(&self) -> Option<Vec<u8>> {
        None
    }
}

/// An in-memory `PskStore`.
#[derive(Default)]
pub struct InMemoryPskStore {
    keys: HashMap<Vec<u8>, Vec<u8>>,
    hint: Option<Vec<u8>>,
}

impl InMemoryPskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key for `identity`, replacing any previous one.
    pub fn insert(&mut self, identity: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) {
        self.keys.insert(identity.into(), key.into());
    }

    pub fn set_hint(&mut self, hint: impl Into<Vec<u8>>) {
        self.hint = Some(hint.into());
    }
}

impl PskStore for InMemoryPskStore {
    fn psk(&self, identity: &[u8]) -> Option<Vec<u8>> {
        self.keys.get(identity).cloned()
    }

    fn hint(&self) -> Option<Vec<u8>> {
        self.hint.clone()
    }
}

/// A struct representing the received Client Hello, for certificate
/// slot selection.
pub struct ClientHello<'a> {
    pub(crate) server_name: &'a Option<DnsName>,
    pub(crate) signature_schemes: &'a [SignatureScheme],
    pub(crate) alpn: Option<&'a [&'a [u8]]>,
}

impl<'a> ClientHello<'a> {
    /// Get the server name indicator.
    ///
    /// Returns `None` if the client did not supply a SNI.
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_ref().map(|n| n.as_str())
    }

    /// Get the compatible signature schemes.
    ///
    /// Returns standard registered signature schemes offered by the client.
    pub fn signature_schemes(&self) -> &[SignatureScheme] {
        self.signature_schemes
    }

    /// Get the ALPN protocol identifiers submitted by the client.
    pub fn alpn(&self) -> Option<&[&[u8]]> {
        self.alpn
    }
}

/// How a server chooses the certificate slot for one handshake.
pub trait ResolvesServerCert: Send + Sync {
    /// Choose a certificate chain and matching key given the client
    /// hello.  A return of `None` aborts the handshake.
    fn resolve(&self, client_hello: ClientHello) -> Option<Arc<CertifiedKey>>;
}

/// The single-slot resolver: always hands out the same chain.
pub(crate) struct AlwaysResolvesChain(Arc<CertifiedKey>);

impl AlwaysResolvesChain {
    pub(crate) fn new(chain: Vec<Certificate>, key: &PrivateKey) -> Result<Self, Error> {
        let key = crate::sign::any_supported_type(key)
            .map_err(|_| Error::General("invalid private key".into()))?;
        Ok(Self(Arc::new(CertifiedKey::new(chain, key))))
    }

    pub(crate) fn new_with_ocsp(
        chain: Vec<Certificate>,
        key: &PrivateKey,
        ocsp: Vec<u8>,
    ) -> Result<Self, Error> {
        let mut r = Self::new(chain, key)?;
        Arc::get_mut(&mut r.0)
            .expect("no other holders yet")
            .ocsp = Some(ocsp);
        Ok(r)
    }
}

impl ResolvesServerCert for AlwaysResolvesChain {
    fn resolve(&self, _client_hello: ClientHello) -> Option<Arc<CertifiedKey>> {
        Some(Arc::clone(&self.0))
    }
}

/// A multi-slot resolver keyed by SNI name.  Wildcard names are
/// matched with the certificate wildcard rules.
#[derive(Default)]
pub struct ResolvesServerCertUsingSni {
    by_name: Vec<(String, Arc<CertifiedKey>)>,
}

impl ResolvesServerCertUsingSni {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slot for `name`.  `name` may carry a leading wildcard
    /// label.
    pub fn add(&mut self, name: &str, ck: CertifiedKey) -> Result<(), Error> {
        ck.end_entity_cert()?;
        self.by_name.push((name.to_string(), Arc::new(ck)));
        Ok(())
    }
}

impl ResolvesServerCert for ResolvesServerCertUsingSni {
    fn resolve(&self, client_hello: ClientHello) -> Option<Arc<CertifiedKey>> {
        let wanted = client_hello.server_name()?;
        self.by_name
            .iter()
            .find(|(name, _)| hostname_match(name.as_bytes(), wanted.as_bytes()))
            .map(|(_, ck)| Arc::clone(ck))
    }
}

/// Check the end-entity certificate's KeyUsage bits against the role
/// the negotiated key exchange puts its key in.  Certificates without
/// the extension pass.
pub(crate) fn check_key_usage(
    cert: &Certificate,
    kx: KeyExchangeAlgorithm,
    allow_violation: bool,
) -> Result<(), Error> {
    let usage = match x509::parse_cert_fields(&cert.0).and_then(|f| f.key_usage) {
        Some(u) => u,
        None => return Ok(()),
    };

    let permitted = if kx.requires_signing_key() {
        usage.allows_digital_signature()
    } else {
        usage.allows_key_encipherment()
    };

    if permitted || allow_violation {
        Ok(())
    } else {
        Err(Error::KeyUsageViolation)
    }
}

/// Read DER certificates out of a PEM stream.
pub fn load_pem_certs(rd: &mut dyn io::BufRead) -> Result<Vec<Certificate>, Error> {
    let certs = rustls_pemfile::certs(rd).map_err(|e| Error::FileError(e.to_string()))?;
    Ok(certs.into_iter().map(Certificate).collect())
}

/// Read the first private key out of a PEM stream, accepting PKCS#8,
/// RSA (PKCS#1) and SEC1 encodings.
pub fn load_pem_private_key(rd: &mut dyn io::BufRead) -> Result<PrivateKey, Error> {
    loop {
        match rustls_pemfile::read_one(rd).map_err(|e| Error::FileError(e.to_string()))? {
            Some(rustls_pemfile::Item::PKCS8Key(der))
            | Some(rustls_pemfile::Item::RSAKey(der))
            | Some(rustls_pemfile::Item::ECKey(der)) => return Ok(PrivateKey(der)),
            Some(_) => continue,
            None => return Err(Error::General("no private key found".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_normalized_and_bounded() {
        let id = PskIdentity::new("alice\u{00a0}smith".as_bytes(), false).unwrap();
        assert_eq!(id.as_bytes(), b"alice smith");

        let long = vec![b'a'; MAX_USERNAME_SIZE + 1];
        assert!(matches!(
            PskIdentity::new(&long, false),
            Err(Error::IllegalSrpUsername)
        ));
        assert!(matches!(
            PskIdentity::from_wire(&long),
            Err(Error::IllegalSrpUsername)
        ));
    }

    #[test]
    fn psk_store_lookup() {
        let mut store = InMemoryPskStore::new();
        store.insert(&b"client-1"[..], &b"secret"[..]);
        store.set_hint(&b"please use client-1"[..]);

        assert_eq!(store.psk(b"client-1"), Some(b"secret".to_vec()));
        assert_eq!(store.psk(b"client-2"), None);
        assert_eq!(store.hint(), Some(b"please use client-1".to_vec()));
    }

    #[test]
    fn key_usage_rules() {
        use tls_core::x509::KeyUsage;
        // a synthetic check through the permission logic: certificates
        // without the extension always pass
        let bare = Certificate(vec![0x30, 0x03, 0x30, 0x01, 0x00]);
        assert!(check_key_usage(&bare, KeyExchangeAlgorithm::EcdheRsa, false).is_ok());

        // sanity of the bit helpers the check relies on
        let signing_only = KeyUsage(KeyUsage::DIGITAL_SIGNATURE);
        assert!(signing_only.allows_digital_signature());
        assert!(!signing_only.allows_key_encipherment());
    }
}

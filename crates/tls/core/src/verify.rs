use std::{fmt, time::SystemTime};

use crate::{
    anchors::RootCertStore,
    dns::{DnsName, ServerName},
    error::Error,
    key::Certificate,
    msgs::{
        enums::SignatureScheme,
        handshake::DigitallySignedStruct,
    },
};

/// Which signature verification mechanisms we support.  No particular
/// order.
static SUPPORTED_SIG_ALGS: &[&webpki::SignatureAlgorithm] = &[
    &webpki::ECDSA_P256_SHA256,
    &webpki::ECDSA_P256_SHA384,
    &webpki::ECDSA_P384_SHA256,
    &webpki::ECDSA_P384_SHA384,
    &webpki::ED25519,
    &webpki::RSA_PSS_2048_8192_SHA256_LEGACY_KEY,
    &webpki::RSA_PSS_2048_8192_SHA384_LEGACY_KEY,
    &webpki::RSA_PSS_2048_8192_SHA512_LEGACY_KEY,
    &webpki::RSA_PKCS1_2048_8192_SHA256,
    &webpki::RSA_PKCS1_2048_8192_SHA384,
    &webpki::RSA_PKCS1_2048_8192_SHA512,
];

/// The verification status bitmask.  A zero value means the chain is
/// trusted; any set bit names a reason it is not.  A non-zero status
/// is data, not an error: the verification itself succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CertStatus(pub u32);

impl CertStatus {
    pub const REVOKED: Self = Self(1 << 0);
    pub const SIGNER_NOT_FOUND: Self = Self(1 << 1);
    pub const SIGNER_NOT_CA: Self = Self(1 << 2);
    pub const INSECURE_ALGORITHM: Self = Self(1 << 3);
    pub const SIGNER_CONSTRAINTS_FAILURE: Self = Self(1 << 4);
    pub const PURPOSE_MISMATCH: Self = Self(1 << 5);
    pub const NOT_ACTIVATED: Self = Self(1 << 6);
    pub const EXPIRED: Self = Self(1 << 7);
    pub const SIGNATURE_FAILURE: Self = Self(1 << 8);
    pub const UNEXPECTED_OWNER: Self = Self(1 << 9);
    pub const MISSING_OCSP_STATUS: Self = Self(1 << 10);
    pub const INVALID_OCSP_STATUS: Self = Self(1 << 11);
    pub const MISMATCH: Self = Self(1 << 12);

    pub fn trusted() -> Self {
        Self(0)
    }

    pub fn is_trusted(&self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

static STATUS_TEXT: &[(CertStatus, &str)] = &[
    (CertStatus::REVOKED, "The certificate chain is revoked."),
    (CertStatus::SIGNER_NOT_FOUND, "The certificate issuer is unknown."),
    (CertStatus::SIGNER_NOT_CA, "The certificate issuer is not a CA."),
    (CertStatus::INSECURE_ALGORITHM, "The certificate chain uses an insecure algorithm."),
    (CertStatus::SIGNER_CONSTRAINTS_FAILURE, "The certificate chain violates the signer's constraints."),
    (CertStatus::PURPOSE_MISMATCH, "The certificate chain does not match the intended purpose."),
    (CertStatus::NOT_ACTIVATED, "The certificate chain uses a not yet valid certificate."),
    (CertStatus::EXPIRED, "The certificate chain uses an expired certificate."),
    (CertStatus::SIGNATURE_FAILURE, "The signature in the certificate is invalid."),
    (CertStatus::UNEXPECTED_OWNER, "The name in the certificate does not match the expected."),
    (CertStatus::MISSING_OCSP_STATUS, "The server did not include the required OCSP status in its response."),
    (CertStatus::INVALID_OCSP_STATUS, "The received OCSP status response is invalid."),
    (CertStatus::MISMATCH, "The certificate differs from the one registered for this host."),
];

impl fmt::Display for CertStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_trusted() {
            return f.write_str("The certificate is trusted.");
        }

        let mut first = true;
        for (bit, text) in STATUS_TEXT {
            if self.contains(*bit) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(text)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Additional flags that alter chain verification, OR'd into the
/// credential's own flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VerifyFlags(pub u32);

impl VerifyFlags {
    /// Skip activation/expiration checks.
    pub const DISABLE_TIME_CHECKS: Self = Self(1 << 0);
    /// Skip the hostname check.
    pub const DISABLE_HOSTNAME_CHECK: Self = Self(1 << 1);
    /// A stapled OCSP response is required; its absence is a status
    /// flag.
    pub const REQUIRE_STAPLED_OCSP: Self = Self(1 << 2);

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Zero-sized marker type representing verification of a server cert chain.
#[derive(Debug)]
pub struct ServerCertVerified(());

impl ServerCertVerified {
    /// Make a `ServerCertVerified`
    pub fn assertion() -> Self {
        Self(())
    }
}

/// Zero-sized marker type representing verification of a signature.
#[derive(Debug)]
pub struct HandshakeSignatureValid(());

impl HandshakeSignatureValid {
    /// Make a `HandshakeSignatureValid`
    pub fn assertion() -> Self {
        Self(())
    }
}

/// Zero-sized marker type representing verification of a client cert chain.
#[derive(Debug)]
pub struct ClientCertVerified(());

impl ClientCertVerified {
    /// Make a `ClientCertVerified`
    pub fn assertion() -> Self {
        Self(())
    }
}

/// Something that can verify a server certificate chain, and verify
/// signatures made by certificates.  Expressed as a strategy object
/// so alternate implementations (a pin store, a hardware token) can
/// be swapped in.
pub trait ServerCertVerifier: Send + Sync {
    /// Verify the end-entity certificate `end_entity` is valid for the
    /// hostname `server_name` and chains to at least one trust anchor.
    ///
    /// `intermediates` contains all certificates other than
    /// `end_entity` that were sent as part of the server's Certificate
    /// message, in the same order.
    fn verify_server_cert(
        &self,
        end_entity: &Certificate,
        intermediates: &[Certificate],
        server_name: &ServerName,
        ocsp_response: &[u8],
        now: SystemTime,
    ) -> Result<ServerCertVerified, Error>;

    /// Verify a signature allegedly by the given server certificate.
    ///
    /// `message` is not hashed, and needs hashing during the
    /// verification.  The signature and algorithm are within `dss`.
    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &Certificate,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        verify_signed_struct(message, cert, dss)
    }

    /// Verify a signature allegedly by the given server certificate,
    /// using the TLS1.3 rules (restricted schemes, no RSA-PKCS1).
    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &Certificate,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        verify_tls13(message, cert, dss)
    }

    /// Return the list of SignatureSchemes that this verifier will
    /// handle, in `verify_tls12_signature` and `verify_tls13_signature`
    /// calls.
    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        default_supported_verify_schemes()
    }
}

/// Something that can verify a client certificate chain.
pub trait ClientCertVerifier: Send + Sync {
    /// Returns `true` to enable the server to request a client
    /// certificate.
    fn offer_client_auth(&self) -> bool {
        true
    }

    /// Return `true` to require a client certificate.  A missing
    /// certificate then aborts the handshake with
    /// `certificate_required`.
    fn client_auth_mandatory(&self) -> bool {
        false
    }

    /// Verify the client's certificate chain.
    fn verify_client_cert(
        &self,
        end_entity: &Certificate,
        intermediates: &[Certificate],
        now: SystemTime,
    ) -> Result<ClientCertVerified, Error>;
}

/// Turns off client authentication.
pub struct NoClientAuth;

impl ClientCertVerifier for NoClientAuth {
    fn offer_client_auth(&self) -> bool {
        false
    }

    fn verify_client_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _now: SystemTime,
    ) -> Result<ClientCertVerified, Error> {
        unimplemented!();
    }
}

/// The default `ServerCertVerifier`, delegating chain validation to
/// webpki over a trust list.
pub struct WebPkiVerifier {
    roots: RootCertStore,
    flags: VerifyFlags,
}

impl WebPkiVerifier {
    /// Constructs a new `WebPkiVerifier`.
    pub fn new(roots: RootCertStore, flags: VerifyFlags) -> Self {
        Self { roots, flags }
    }

    /// The full status-producing verification: evaluates the chain,
    /// hostname and OCSP binding and reports a [`CertStatus`]
    /// bitmask.  A negative return means verification could not be
    /// performed at all (e.g. the certificate would not parse);
    /// callers must inspect the returned bitmask otherwise.
    pub fn verify_status(
        &self,
        end_entity: &Certificate,
        intermediates: &[Certificate],
        server_name: Option<&ServerName>,
        ocsp_response: &[u8],
        now: SystemTime,
    ) -> Result<CertStatus, Error> {
        let mut status = CertStatus::trusted();

        let cert = webpki::EndEntityCert::try_from(end_entity.0.as_ref())
            .map_err(|e| Error::InvalidCertificateData(format!("invalid peer certificate: {:?}", e)))?;

        let chain: Vec<&[u8]> = intermediates.iter().map(|c| c.0.as_ref()).collect();
        let anchors = self.roots.usable_anchors();
        let trust_roots = webpki::TlsServerTrustAnchors(&anchors);

        let webpki_now = webpki::Time::try_from(now).map_err(|_| {
            Error::General("current time conversion failed".into())
        })?;

        if let Err(e) =
            cert.verify_is_valid_tls_server_cert(SUPPORTED_SIG_ALGS, &trust_roots, &chain, webpki_now)
        {
            match webpki_error_to_status(e, self.flags) {
                Some(bits) => status.insert(bits),
                None => {}
            }
        }

        if !self.flags.contains(VerifyFlags::DISABLE_HOSTNAME_CHECK) {
            if let Some(ServerName::DnsName(name)) = server_name {
                if !cert_matches_name(&cert, name) {
                    status.insert(CertStatus::UNEXPECTED_OWNER);
                }
            }
        }

        if self.flags.contains(VerifyFlags::REQUIRE_STAPLED_OCSP) && ocsp_response.is_empty() {
            status.insert(CertStatus::MISSING_OCSP_STATUS);
        }

        Ok(status)
    }
}

fn cert_matches_name(cert: &webpki::EndEntityCert, name: &DnsName) -> bool {
    cert.verify_is_valid_for_dns_name(name.as_webpki()).is_ok()
}

fn webpki_error_to_status(e: webpki::Error, flags: VerifyFlags) -> Option<CertStatus> {
    use webpki::Error as E;
    let disable_time = flags.contains(VerifyFlags::DISABLE_TIME_CHECKS);
    Some(match e {
        E::CertExpired | E::InvalidCertValidity if disable_time => return None,
        E::CertNotValidYet if disable_time => return None,
        E::CertExpired | E::InvalidCertValidity => CertStatus::EXPIRED,
        E::CertNotValidYet => CertStatus::NOT_ACTIVATED,
        E::UnknownIssuer => CertStatus::SIGNER_NOT_FOUND,
        E::CaUsedAsEndEntity | E::EndEntityUsedAsCa => CertStatus::SIGNER_NOT_CA,
        E::PathLenConstraintViolated | E::NameConstraintViolation => {
            CertStatus::SIGNER_CONSTRAINTS_FAILURE
        }
        E::RequiredEkuNotFound => CertStatus::PURPOSE_MISMATCH,
        E::UnsupportedSignatureAlgorithm | E::UnsupportedSignatureAlgorithmForPublicKey => {
            CertStatus::INSECURE_ALGORITHM
        }
        E::InvalidSignatureForPublicKey => CertStatus::SIGNATURE_FAILURE,
        E::CertNotValidForName => CertStatus::UNEXPECTED_OWNER,
        _ => CertStatus::SIGNATURE_FAILURE,
    })
}

impl ServerCertVerifier for WebPkiVerifier {
    /// Will verify the certificate is valid in the following ways:
    /// - Signed by a trusted `RootCertStore` CA
    /// - Not Expired
    /// - Valid for DNS entry
    fn verify_server_cert(
        &self,
        end_entity: &Certificate,
        intermediates: &[Certificate],
        server_name: &ServerName,
        ocsp_response: &[u8],
        now: SystemTime,
    ) -> Result<ServerCertVerified, Error> {
        let status =
            self.verify_status(end_entity, intermediates, Some(server_name), ocsp_response, now)?;

        if status.is_trusted() {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(Error::InvalidCertificateData(status.to_string()))
        }
    }
}

fn convert_scheme(scheme: SignatureScheme) -> Result<&'static webpki::SignatureAlgorithm, Error> {
    match scheme {
        SignatureScheme::ECDSA_NISTP256_SHA256 => Ok(&webpki::ECDSA_P256_SHA256),
        SignatureScheme::ECDSA_NISTP384_SHA384 => Ok(&webpki::ECDSA_P384_SHA384),
        SignatureScheme::ED25519 => Ok(&webpki::ED25519),
        SignatureScheme::RSA_PKCS1_SHA256 => Ok(&webpki::RSA_PKCS1_2048_8192_SHA256),
        SignatureScheme::RSA_PKCS1_SHA384 => Ok(&webpki::RSA_PKCS1_2048_8192_SHA384),
        SignatureScheme::RSA_PKCS1_SHA512 => Ok(&webpki::RSA_PKCS1_2048_8192_SHA512),
        SignatureScheme::RSA_PSS_SHA256 => Ok(&webpki::RSA_PSS_2048_8192_SHA256_LEGACY_KEY),
        SignatureScheme::RSA_PSS_SHA384 => Ok(&webpki::RSA_PSS_2048_8192_SHA384_LEGACY_KEY),
        SignatureScheme::RSA_PSS_SHA512 => Ok(&webpki::RSA_PSS_2048_8192_SHA512_LEGACY_KEY),
        _ => Err(Error::PeerMisbehavedError(
            "signature scheme is not supported".to_string(),
        )),
    }
}

/// The signature schemes the default verifier can cope with.
pub fn default_supported_verify_schemes() -> Vec<SignatureScheme> {
    vec![
        SignatureScheme::ECDSA_NISTP384_SHA384,
        SignatureScheme::ECDSA_NISTP256_SHA256,
        SignatureScheme::ED25519,
        SignatureScheme::RSA_PSS_SHA512,
        SignatureScheme::RSA_PSS_SHA384,
        SignatureScheme::RSA_PSS_SHA256,
        SignatureScheme::RSA_PKCS1_SHA512,
        SignatureScheme::RSA_PKCS1_SHA384,
        SignatureScheme::RSA_PKCS1_SHA256,
    ]
}

/// Verify a TLS1.2 signature over `message` using the public key of
/// `cert`.
pub fn verify_signed_struct(
    message: &[u8],
    cert: &Certificate,
    dss: &DigitallySignedStruct,
) -> Result<HandshakeSignatureValid, Error> {
    let alg = convert_scheme(dss.scheme)?;
    let cert = webpki::EndEntityCert::try_from(cert.0.as_ref())
        .map_err(|e| Error::InvalidCertificateData(format!("{:?}", e)))?;

    cert.verify_signature(alg, message, &dss.sig.0)
        .map_err(|_| Error::SignatureVerifyFailed)
        .map(|_| HandshakeSignatureValid::assertion())
}

fn verify_tls13_scheme(scheme: SignatureScheme) -> Result<(), Error> {
    // The TLS1.3 rules: RSA-PKCS1 and legacy SHA1 schemes are banned
    // from CertificateVerify.
    match scheme {
        SignatureScheme::ECDSA_NISTP256_SHA256
        | SignatureScheme::ECDSA_NISTP384_SHA384
        | SignatureScheme::ED25519
        | SignatureScheme::RSA_PSS_SHA256
        | SignatureScheme::RSA_PSS_SHA384
        | SignatureScheme::RSA_PSS_SHA512 => Ok(()),
        _ => Err(Error::PeerMisbehavedError(
            "signature scheme is not allowed in TLS1.3".to_string(),
        )),
    }
}

/// Constructs the bytes a TLS1.3 CertificateVerify signature covers.
pub fn construct_tls13_verify_message(
    handshake_hash: &[u8],
    context_string_with_0: &[u8],
) -> Vec<u8> {
    let mut msg = Vec::new();
    msg.resize(64, 0x20u8);
    msg.extend_from_slice(context_string_with_0);
    msg.extend_from_slice(handshake_hash);
    msg
}

/// The server flavour of [`construct_tls13_verify_message`].
pub fn construct_tls13_server_verify_message(handshake_hash: &[u8]) -> Vec<u8> {
    construct_tls13_verify_message(handshake_hash, b"TLS 1.3, server CertificateVerify\x00")
}

/// The client flavour of [`construct_tls13_verify_message`].
pub fn construct_tls13_client_verify_message(handshake_hash: &[u8]) -> Vec<u8> {
    construct_tls13_verify_message(handshake_hash, b"TLS 1.3, client CertificateVerify\x00")
}

/// Verify a TLS1.3 CertificateVerify-style signature.
pub fn verify_tls13(
    msg: &[u8],
    cert: &Certificate,
    dss: &DigitallySignedStruct,
) -> Result<HandshakeSignatureValid, Error> {
    verify_tls13_scheme(dss.scheme)?;
    verify_signed_struct(msg, cert, dss)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_lists_each_flag() {
        let mut status = CertStatus::trusted();
        assert_eq!(status.to_string(), "The certificate is trusted.");

        status.insert(CertStatus::EXPIRED);
        status.insert(CertStatus::SIGNER_NOT_FOUND);
        let text = status.to_string();
        assert!(text.contains("expired certificate"));
        assert!(text.contains("issuer is unknown"));
        assert!(!status.is_trusted());
    }

    #[test]
    fn status_bit_operations() {
        let mut status = CertStatus::trusted();
        status.insert(CertStatus::MISMATCH);
        assert!(status.contains(CertStatus::MISMATCH));
        assert!(!status.contains(CertStatus::REVOKED));
    }

    #[test]
    fn tls13_rejects_pkcs1() {
        let dss = DigitallySignedStruct::new(SignatureScheme::RSA_PKCS1_SHA256, vec![0; 32]);
        let cert = Certificate(vec![0x30, 0x00]);
        assert!(verify_tls13(b"message", &cert, &dss).is_err());
    }

    #[test]
    fn tls13_verify_message_layout() {
        let msg = construct_tls13_server_verify_message(&[0xab; 32]);
        assert_eq!(&msg[..64], &[0x20u8; 64][..]);
        assert!(msg
            .windows(b"server CertificateVerify".len())
            .any(|w| w == b"server CertificateVerify"));
        assert_eq!(&msg[msg.len() - 32..], &[0xab; 32][..]);
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        assert!(convert_scheme(SignatureScheme::ECDSA_SHA1_Legacy).is_err());
    }
}

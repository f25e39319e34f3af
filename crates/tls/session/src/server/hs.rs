#[cfg(feature = "logging")]
use crate::log::{debug, trace};
use std::sync::Arc;

use tls_core::{
    msgs::{
        enums::{
            AlertDescription, CipherSuite, Compression, HandshakeType, NamedGroup,
            ProtocolVersion, SignatureScheme,
        },
        handshake::{ClientHelloPayload, ConvertServerNameList, HandshakePayload},
        message::{Message, MessagePayload},
    },
    suites::SupportedCipherSuite,
    Error,
};

use crate::{
    conn::{Context, State},
    credentials::{check_key_usage, ClientHello},
    hash_hs::{HandshakeHash, HandshakeHashBuffer},
    hs_ext::GroupNegotiation,
    server::{ServerConfig, ServerConnectionData},
    sign::CertifiedKey,
};

pub(super) type NextState = Box<dyn State<ServerConnectionData>>;
pub(super) type NextStateOrError = Result<NextState, Error>;

/// The negotiation outcome handed to the version-specific handlers.
pub(super) struct Negotiated {
    pub(super) suite: SupportedCipherSuite,
    pub(super) groups: GroupNegotiation,
    pub(super) sigschemes: Vec<SignatureScheme>,
    pub(super) cert: Option<Arc<CertifiedKey>>,
    pub(super) alpn: Option<Vec<u8>>,
}

pub(crate) struct ExpectClientHello {
    config: Arc<ServerConfig>,
    /// Set after a HelloRetryRequest; the second hello must then
    /// complete with the group we asked for.
    pub(super) retried: Option<(NamedGroup, HandshakeHash)>,
}

impl ExpectClientHello {
    pub(crate) fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            config,
            retried: None,
        }
    }
}

static DEFAULT_SIGSCHEMES: &[SignatureScheme] = &[
    SignatureScheme::RSA_PKCS1_SHA256,
    SignatureScheme::ECDSA_NISTP256_SHA256,
];

fn select_version(
    config: &ServerConfig,
    client_hello: &ClientHelloPayload,
) -> Result<ProtocolVersion, Error> {
    // RFC8446: when supported_versions is present, legacy_version is
    // dead weight and the list alone decides.
    if let Some(versions) = client_hello.get_versions_extension() {
        if versions.contains(&ProtocolVersion::TLSv1_3)
            && config.supports_version(ProtocolVersion::TLSv1_3)
        {
            return Ok(ProtocolVersion::TLSv1_3);
        }
        #[cfg(feature = "tls12")]
        if versions.contains(&ProtocolVersion::TLSv1_2)
            && config.supports_version(ProtocolVersion::TLSv1_2)
        {
            return Ok(ProtocolVersion::TLSv1_2);
        }
    } else {
        #[cfg(feature = "tls12")]
        if client_hello.client_version.get_u16() >= ProtocolVersion::TLSv1_2.get_u16()
            && config.supports_version(ProtocolVersion::TLSv1_2)
        {
            return Ok(ProtocolVersion::TLSv1_2);
        }
    }

    Err(Error::PeerIncompatibleError(
        "no supported protocol version in common".to_string(),
    ))
}

/// Does the configured credential material make `suite` usable for
/// this hello?
fn suite_usable(
    config: &ServerConfig,
    suite: &SupportedCipherSuite,
    cert: &Option<Arc<CertifiedKey>>,
    groups: &GroupNegotiation,
    sigschemes: &[SignatureScheme],
) -> bool {
    let kx = suite.kx_algorithm();

    if kx.uses_certificate() {
        let ck = match cert {
            Some(ck) => ck,
            None => return false,
        };
        if !suite.usable_for_signature_algorithm(ck.key.algorithm()) {
            return false;
        }
        #[cfg(feature = "tls12")]
        if let Some(suite12) = suite.tls12() {
            if kx.requires_signing_key() && suite12.resolve_sig_schemes(sigschemes).is_empty() {
                return false;
            }
        }
    }

    if kx.uses_psk() && config.psk_store.is_none() {
        return false;
    }

    match kx {
        tls_core::msgs::enums::KeyExchangeAlgorithm::EcdheRsa
        | tls_core::msgs::enums::KeyExchangeAlgorithm::EcdheEcdsa
        | tls_core::msgs::enums::KeyExchangeAlgorithm::EcdhePsk => {
            if groups.ec_candidate.is_none() {
                return false;
            }
        }
        tls_core::msgs::enums::KeyExchangeAlgorithm::DheRsa
        | tls_core::msgs::enums::KeyExchangeAlgorithm::DhePsk
        | tls_core::msgs::enums::KeyExchangeAlgorithm::DhAnon => {
            if config.active_dh_params().is_none() {
                return false;
            }
        }
        _ => {}
    }

    // TLS1.3 always key-exchanges through shares.
    if suite.tls13().is_some() && cert.is_none() {
        return false;
    }

    true
}

fn choose_suite(
    config: &ServerConfig,
    client_suites: &[CipherSuite],
    version: ProtocolVersion,
    cert: &Option<Arc<CertifiedKey>>,
    groups: &GroupNegotiation,
    sigschemes: &[SignatureScheme],
) -> Result<SupportedCipherSuite, Error> {
    let usable: Vec<SupportedCipherSuite> = config
        .cipher_suites
        .iter()
        .filter(|suite| suite.version().version == version)
        .filter(|suite| suite_usable(config, suite, cert, groups, sigschemes))
        .copied()
        .collect();

    let chosen = if config.ignore_client_order {
        tls_core::suites::choose_ciphersuite_preferring_server(client_suites, &usable)
    } else {
        tls_core::suites::choose_ciphersuite_preferring_client(client_suites, &usable)
    };

    chosen.ok_or_else(|| Error::HandshakeFailure("no common cipher suite".to_string()))
}

impl State<ServerConnectionData> for ExpectClientHello {
    fn handle(
        self: Box<Self>,
        cx: &mut Context<'_, ServerConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        let client_hello = require_handshake_msg!(
            m,
            HandshakeType::ClientHello,
            HandshakePayload::ClientHello
        )?;
        trace!("we got a clienthello {:?}", client_hello);

        if !client_hello
            .compression_methods
            .contains(&Compression::Null)
        {
            return Err(cx
                .common
                .illegal_param("client did not offer Null compression"));
        }

        if client_hello.has_duplicate_extension() {
            cx.common
                .send_fatal_alert(AlertDescription::DecodeError);
            return Err(Error::PeerMisbehavedError("client sent duplicate extensions".into()));
        }

        // Extract and remember the SNI hostname.
        if let Some(sni) = client_hello.get_sni_extension() {
            if sni.has_duplicate_names_for_type() {
                cx.common
                    .send_fatal_alert(AlertDescription::DecodeError);
                return Err(Error::PeerMisbehavedError(
                    "malformed server name extension".into(),
                ));
            }
            cx.data.sni = sni.get_single_hostname();
        }

        let version = select_version(&self.config, client_hello)?;

        // A client racing ahead of a downgrade: it told us it was
        // falling back, yet we could have done better.
        if client_hello
            .cipher_suites
            .contains(&CipherSuite::TLS_FALLBACK_SCSV)
        {
            let best = if self.config.supports_version(ProtocolVersion::TLSv1_3) {
                ProtocolVersion::TLSv1_3
            } else {
                ProtocolVersion::TLSv1_2
            };
            if version.get_u16() < best.get_u16() {
                return Err(Error::InappropriateFallback);
            }
        }

        let sigschemes = client_hello
            .get_sigalgs_extension()
            .unwrap_or(DEFAULT_SIGSCHEMES)
            .to_vec();

        let mut groups = GroupNegotiation::new(
            &self.config.kx_groups,
            self.config.ignore_client_order,
            self.config.min_dh_bits,
        );
        groups.receive(client_hello.get_namedgroups_extension().unwrap_or(&[]))?;

        // ALPN: our preference list against the client's offer.
        let client_protocols = client_hello.get_alpn_extension().map(|protos| {
            protos
                .iter()
                .map(|name| name.as_ref().to_vec())
                .collect::<Vec<_>>()
        });
        let alpn = match (&client_protocols, self.config.alpn_protocols.is_empty()) {
            (Some(theirs), false) => {
                let chosen = self
                    .config
                    .alpn_protocols
                    .iter()
                    .find(|ours| theirs.contains(ours))
                    .cloned();
                match chosen {
                    Some(proto) => Some(proto),
                    None => return Err(Error::NoApplicationProtocol),
                }
            }
            _ => None,
        };

        // Resolve a certificate slot against the hello.
        let cert = match &self.config.cert_resolver {
            Some(resolver) => {
                let alpn_slices: Option<Vec<&[u8]>> = client_protocols
                    .as_ref()
                    .map(|protos| protos.iter().map(|p| p.as_slice()).collect());
                let info = ClientHello {
                    server_name: &cx.data.sni,
                    signature_schemes: &sigschemes,
                    alpn: alpn_slices.as_deref(),
                };
                resolver.resolve(info)
            }
            None => None,
        };

        let suite = match choose_suite(
            &self.config,
            &client_hello.cipher_suites,
            version,
            &cert,
            &groups,
            &sigschemes,
        ) {
            Ok(suite) => suite,
            // A resolver that recognized no name is a better
            // explanation than "no common suite".
            Err(_)
                if self.config.cert_resolver.is_some()
                    && cert.is_none()
                    && cx.data.sni.is_some() =>
            {
                return Err(Error::UnrecognizedName);
            }
            Err(e) => return Err(e),
        };

        // A chain selected for a key exchange its KeyUsage forbids is
        // refused outright.
        if suite.kx_algorithm().uses_certificate() {
            let ck = cert.as_ref().expect("checked by suite_usable");
            check_key_usage(
                ck.end_entity_cert()?,
                suite.kx_algorithm(),
                self.config.allow_key_usage_violation,
            )?;
        }

        cx.common.negotiated_version = Some(version);
        cx.common.suite = Some(suite);
        cx.common.alpn_protocol = alpn.clone();

        debug!("decided upon suite {:?}", suite);

        let negotiated = Negotiated {
            suite,
            groups,
            sigschemes,
            cert,
            alpn,
        };

        let mut transcript_buffer = HandshakeHashBuffer::new();
        if self.config.verifier.offer_client_auth() {
            transcript_buffer.set_client_auth_enabled();
        }

        match version {
            ProtocolVersion::TLSv1_3 => super::tls13::handle_client_hello(
                self.config,
                cx,
                client_hello,
                &m,
                negotiated,
                transcript_buffer,
                self.retried,
            ),
            #[cfg(feature = "tls12")]
            ProtocolVersion::TLSv1_2 => super::tls12::handle_client_hello(
                self.config,
                cx,
                client_hello,
                &m,
                negotiated,
                transcript_buffer,
            ),
            _ => Err(Error::PeerIncompatibleError(
                "no supported protocol version in common".to_string(),
            )),
        }
    }
}


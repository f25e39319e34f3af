//! The uniform interface of the per-algorithm key-exchange modules,
//! and the dispatch from the negotiated algorithm to the module.
//!
//! Every module implements the same four operations: generate and
//! process of the server and client key-exchange bodies.  The
//! handshake machines own a per-side context carrying the negotiated
//! inputs and the authentication info the module fills in.

use tls_core::{
    key::{Certificate, PrivateKey},
    msgs::enums::{KeyExchangeAlgorithm, NamedGroup},
    verify::ServerCertVerifier,
    Error,
};

use crate::{
    conn::ConnectionRandoms,
    credentials::PskStore,
    kx::{DhParams, KeyExchange, SupportedKxGroup},
    sign::Signer,
};

/// What the client learned from the ServerKeyExchange.
pub(crate) enum ServerKxParams {
    Ec {
        group: NamedGroup,
        peer_public: Vec<u8>,
    },
    Dh {
        params: DhParams,
        peer_public: Vec<u8>,
    },
    None,
}

/// Server-side key-exchange context.  The module fills `kx` during
/// `gen_server_kx` and consumes it in `proc_client_kx`; `psk_identity`
/// is the per-side authentication info for the PSK families.
pub(crate) struct ServerKxCtx<'a> {
    pub(crate) randoms: &'a ConnectionRandoms,
    /// The group elected by the supported-groups engine, for the
    /// elliptic families.
    pub(crate) ec_group: Option<NamedGroup>,
    pub(crate) kx_groups: &'a [&'static SupportedKxGroup],
    pub(crate) dh_params: Option<&'a DhParams>,
    pub(crate) psk_store: Option<&'a dyn PskStore>,
    /// Pre-chosen signer for the signed families.
    pub(crate) signer: Option<Box<dyn Signer>>,
    /// The key-transport private key, for RSA decryption.
    pub(crate) kx_key: Option<&'a PrivateKey>,
    /// The version the client claimed in its hello; the RSA premaster
    /// embeds it.
    pub(crate) client_hello_version: u16,

    /// The in-flight ephemeral exchange.
    pub(crate) kx: Option<KeyExchange>,
    /// Authentication info: the PSK identity the client used.
    pub(crate) psk_identity: Option<Vec<u8>>,
}

/// Client-side key-exchange context.
pub(crate) struct ClientKxCtx<'a> {
    pub(crate) randoms: &'a ConnectionRandoms,
    pub(crate) kx_groups: &'a [&'static SupportedKxGroup],
    pub(crate) min_dh_bits: usize,
    pub(crate) server_cert: Option<&'a Certificate>,
    pub(crate) verifier: &'a dyn ServerCertVerifier,
    /// Our PSK identity and key, for the PSK families.
    pub(crate) psk: Option<(&'a [u8], &'a [u8])>,
    pub(crate) client_hello_version: u16,

    /// What proc_server_kx learned.
    pub(crate) server_params: ServerKxParams,
    /// Authentication info: the identity hint the server sent.
    pub(crate) psk_hint: Option<Vec<u8>>,
    /// The premaster secret gen_client_kx produced.
    pub(crate) premaster: Option<Vec<u8>>,
}

impl<'a> ClientKxCtx<'a> {
    pub(crate) fn new(
        randoms: &'a ConnectionRandoms,
        kx_groups: &'a [&'static SupportedKxGroup],
        min_dh_bits: usize,
        server_cert: Option<&'a Certificate>,
        verifier: &'a dyn ServerCertVerifier,
        psk: Option<(&'a [u8], &'a [u8])>,
        client_hello_version: u16,
    ) -> Self {
        Self {
            randoms,
            kx_groups,
            min_dh_bits,
            server_cert,
            verifier,
            psk,
            client_hello_version,
            server_params: ServerKxParams::None,
            psk_hint: None,
            premaster: None,
        }
    }
}

/// One key-exchange algorithm's message handling.
pub(crate) trait KxModule: Send + Sync {
    /// Server: produce the ServerKeyExchange body, or `None` when the
    /// algorithm sends none in the current configuration.
    fn gen_server_kx(&self, ctx: &mut ServerKxCtx) -> Result<Option<Vec<u8>>, Error>;

    /// Client: consume the ServerKeyExchange body.
    fn proc_server_kx(&self, ctx: &mut ClientKxCtx, body: &[u8]) -> Result<(), Error>;

    /// Client: produce the ClientKeyExchange body, leaving the
    /// premaster in the context.
    fn gen_client_kx(&self, ctx: &mut ClientKxCtx) -> Result<Vec<u8>, Error>;

    /// Server: consume the ClientKeyExchange body, returning the
    /// premaster.
    fn proc_client_kx(&self, ctx: &mut ServerKxCtx, body: &[u8]) -> Result<Vec<u8>, Error>;
}

/// Sign client_random ‖ server_random ‖ params with the slot's key,
/// yielding the encoded DigitallySignedStruct that trails the
/// parameters on the wire.
pub(crate) fn sign_kx_params(
    signer: Box<dyn Signer>,
    randoms: &ConnectionRandoms,
    params: &[u8],
) -> Result<Vec<u8>, Error> {
    use tls_core::codec::Codec;
    use tls_core::msgs::handshake::DigitallySignedStruct;

    let mut message = Vec::with_capacity(64 + params.len());
    message.extend_from_slice(&randoms.client);
    message.extend_from_slice(&randoms.server);
    message.extend_from_slice(params);

    let scheme = signer.scheme();
    let sig = signer.sign(&message)?;
    Ok(DigitallySignedStruct::new(scheme, sig).get_encoding())
}

/// The client-side counterpart: verify the signature over the
/// parameter span against the server's certificate.
pub(crate) fn verify_kx_params(
    ctx: &ClientKxCtx,
    params: &[u8],
    dss: &tls_core::msgs::handshake::DigitallySignedStruct,
) -> Result<(), Error> {
    let cert = ctx.server_cert.ok_or(Error::NoCertificatesPresented)?;

    let mut message = Vec::with_capacity(64 + params.len());
    message.extend_from_slice(&ctx.randoms.client);
    message.extend_from_slice(&ctx.randoms.server);
    message.extend_from_slice(params);

    ctx.verifier
        .verify_tls12_signature(&message, cert, dss)
        .map(|_| ())
}

pub(crate) fn kx_module(alg: KeyExchangeAlgorithm) -> &'static dyn KxModule {
    match alg {
        KeyExchangeAlgorithm::Rsa => &super::rsa::RsaKeyTransport,
        KeyExchangeAlgorithm::DhAnon => &super::dhe::DheExchange { signed: false },
        KeyExchangeAlgorithm::DheRsa => &super::dhe::DheExchange { signed: true },
        KeyExchangeAlgorithm::EcdheRsa | KeyExchangeAlgorithm::EcdheEcdsa => {
            &super::ecdhe::EcdheExchange { signed: true }
        }
        KeyExchangeAlgorithm::Psk => &super::psk::PskExchange {
            mix: super::psk::Mix::None,
        },
        KeyExchangeAlgorithm::DhePsk => &super::psk::PskExchange {
            mix: super::psk::Mix::Dhe,
        },
        KeyExchangeAlgorithm::EcdhePsk => &super::psk::PskExchange {
            mix: super::psk::Mix::Ecdhe,
        },
    }
}

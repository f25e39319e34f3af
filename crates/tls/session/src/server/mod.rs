use std::{fmt, marker::PhantomData, ops::{Deref, DerefMut}, sync::Arc};

use tls_core::{
    dns::DnsName,
    key::{Certificate, PrivateKey},
    suites::SupportedCipherSuite,
    verify::{ClientCertVerifier, NoClientAuth},
    versions, Error,
};

use crate::{
    builder::{ConfigBuilder, WantsCipherSuites, WantsVerifier},
    conn::{CommonState, ConnectionCommon, Side},
    credentials::{AlwaysResolvesChain, PskStore, ResolvesServerCert},
    kx::{DhParams, SupportedKxGroup},
};

mod hs;
#[cfg(feature = "tls12")]
mod tls12;
mod tls13;

pub use crate::credentials::{ClientHello, ResolvesServerCertUsingSni};

/// Common configuration for a set of server sessions.
///
/// Making one of these is cheap, though one of the inputs may be
/// expensive: gathering trust roots from the operating system to add
/// to the [`RootCertStore`] passed to a `ClientCertVerifier` builder
/// may take on the order of a few hundred milliseconds.
///
/// These must be created via the [`ServerConfig::builder()`] function.
///
/// # Defaults
///
/// * [`ServerConfig::max_fragment_size`]: the default is `None`: TLS packets are not fragmented to a specific size.
/// * [`ServerConfig::alpn_protocols`]: the default is empty -- no ALPN protocol is negotiated.
/// * [`ServerConfig::ignore_client_order`]: the default is false: the server picks the client's
///   most-preferred mutually supported cipher suite and group.
///
/// [`RootCertStore`]: crate::RootCertStore
pub struct ServerConfig {
    /// List of ciphersuites, in preference order.
    pub cipher_suites: Vec<SupportedCipherSuite>,

    /// List of supported key exchange groups, in preference order.
    pub kx_groups: Vec<&'static SupportedKxGroup>,

    /// Supported protocol versions, in no particular order.
    pub(crate) versions: versions::EnabledVersions,

    /// How to verify client certificates.
    pub(crate) verifier: Arc<dyn ClientCertVerifier>,

    /// How to choose a server cert and key.  `None` for the
    /// certificate-less (PSK and anonymous) configurations.
    pub(crate) cert_resolver: Option<Arc<dyn ResolvesServerCert>>,

    /// The private key DER kept for the key-transport decryption
    /// path.
    pub(crate) kx_key: Option<PrivateKey>,

    /// The PSK lookup, for the pre-shared-key suites.
    pub(crate) psk_store: Option<Arc<dyn PskStore>>,

    /// Explicitly configured Diffie-Hellman parameters for the
    /// finite-field suites.
    pub(crate) dh_params: Option<DhParams>,

    /// Parameters recorded by the legacy per-mode setters.  Kept for
    /// inspection, and used only when nothing better is configured.
    pub(crate) legacy_dh_params: Option<DhParams>,

    /// Which ALPN protocols we accept, in preference order.
    /// If empty, no ALPN is done.
    pub alpn_protocols: Vec<Vec<u8>>,

    /// Settings for session resumption are absent: this server does
    /// not issue resumable state.  The maximum size of TLS message
    /// we'll emit; `None` applies only the standard's own limit.
    pub max_fragment_size: Option<usize>,

    /// Whether to choose ciphersuites and groups in our order of
    /// preference, rather than the client's.
    pub ignore_client_order: bool,

    /// The smallest DH prime, in bits, the supported-groups engine
    /// will entertain.
    pub min_dh_bits: usize,

    /// Accept certificates whose KeyUsage does not match the chosen
    /// key exchange.
    pub allow_key_usage_violation: bool,

    /// Accept peer-initiated renegotiation.  The default answers a
    /// rehandshake request with a no_renegotiation warning instead.
    pub enable_rehandshake: bool,
}

impl ServerConfig {
    /// Create builder to build up the server configuration.
    ///
    /// For more information, see the [`ConfigBuilder`] documentation.
    pub fn builder() -> ConfigBuilder<Self, WantsCipherSuites> {
        ConfigBuilder {
            state: WantsCipherSuites(()),
            side: PhantomData,
        }
    }

    /// Install the PSK lookup for the pre-shared-key suites.
    pub fn set_psk_store(&mut self, store: Arc<dyn PskStore>) {
        self.psk_store = Some(store);
    }

    /// Configure Diffie-Hellman parameters for the finite-field
    /// suites.
    pub fn set_dh_params(&mut self, params: DhParams) {
        self.dh_params = Some(params);
    }

    /// Record DH parameters for anonymous sessions.
    ///
    /// Retained for callers of the historical per-mode interface:
    /// the value is recorded, but group negotiation and
    /// [`ServerConfig::set_dh_params`] take precedence.
    pub fn set_anon_dh_params(&mut self, params: DhParams) {
        self.legacy_dh_params = Some(params);
    }

    /// Record DH parameters for PSK sessions.  See
    /// [`ServerConfig::set_anon_dh_params`].
    pub fn set_psk_dh_params(&mut self, params: DhParams) {
        self.legacy_dh_params = Some(params);
    }

    /// Record DH parameters for certificate sessions.  See
    /// [`ServerConfig::set_anon_dh_params`].
    pub fn set_cert_dh_params(&mut self, params: DhParams) {
        self.legacy_dh_params = Some(params);
    }

    /// The parameters recorded by the legacy setters, if any.
    pub fn legacy_dh_params(&self) -> Option<&DhParams> {
        self.legacy_dh_params.as_ref()
    }

    pub(crate) fn active_dh_params(&self) -> Option<&DhParams> {
        self.dh_params.as_ref().or(self.legacy_dh_params.as_ref())
    }

    pub(crate) fn supports_version(
        &self,
        v: tls_core::msgs::enums::ProtocolVersion,
    ) -> bool {
        self.versions.contains(v)
    }
}

impl ConfigBuilder<ServerConfig, WantsVerifier> {
    /// Choose how to verify client certificates.
    pub fn with_client_cert_verifier(
        self,
        verifier: Arc<dyn ClientCertVerifier>,
    ) -> ConfigBuilder<ServerConfig, WantsServerCert> {
        ConfigBuilder {
            state: WantsServerCert {
                cipher_suites: self.state.cipher_suites,
                kx_groups: self.state.kx_groups,
                versions: self.state.versions,
                verifier,
            },
            side: PhantomData,
        }
    }

    /// Disable client authentication.
    pub fn with_no_client_auth(self) -> ConfigBuilder<ServerConfig, WantsServerCert> {
        self.with_client_cert_verifier(Arc::new(NoClientAuth))
    }
}

/// Config builder state where the caller must supply how to provide a
/// server certificate to clients requesting one, or declare there is
/// none.
///
/// For more information, see the [`ConfigBuilder`] documentation.
pub struct WantsServerCert {
    cipher_suites: Vec<SupportedCipherSuite>,
    kx_groups: Vec<&'static SupportedKxGroup>,
    versions: versions::EnabledVersions,
    verifier: Arc<dyn ClientCertVerifier>,
}

impl ConfigBuilder<ServerConfig, WantsServerCert> {
    /// Sets a single certificate chain and matching private key.  This
    /// certificate and key is used for all subsequent connections,
    /// irrespective of things like SNI hostname.
    ///
    /// `cert_chain` is a vector of DER-encoded certificates.
    /// `key_der` is a DER-encoded private key in PKCS#8 or PKCS#1
    /// format.
    pub fn with_single_cert(
        self,
        cert_chain: Vec<Certificate>,
        key_der: PrivateKey,
    ) -> Result<ServerConfig, Error> {
        let resolver = AlwaysResolvesChain::new(cert_chain, &key_der)?;
        Ok(self.build(Some(Arc::new(resolver)), Some(key_der)))
    }

    /// Same as [`ConfigBuilder::with_single_cert`], carrying an OCSP
    /// response to staple.
    pub fn with_single_cert_with_ocsp(
        self,
        cert_chain: Vec<Certificate>,
        key_der: PrivateKey,
        ocsp: Vec<u8>,
    ) -> Result<ServerConfig, Error> {
        let resolver = AlwaysResolvesChain::new_with_ocsp(cert_chain, &key_der, ocsp)?;
        Ok(self.build(Some(Arc::new(resolver)), Some(key_der)))
    }

    /// Sets a custom [`ResolvesServerCert`].
    pub fn with_cert_resolver(
        self,
        cert_resolver: Arc<dyn ResolvesServerCert>,
    ) -> ServerConfig {
        self.build(Some(cert_resolver), None)
    }

    /// Build a server without any certificate.  Only the pre-shared
    /// key and anonymous suites can then be negotiated.
    pub fn with_no_certificate(self) -> ServerConfig {
        self.build(None, None)
    }

    fn build(
        self,
        cert_resolver: Option<Arc<dyn ResolvesServerCert>>,
        kx_key: Option<PrivateKey>,
    ) -> ServerConfig {
        ServerConfig {
            cipher_suites: self.state.cipher_suites,
            kx_groups: self.state.kx_groups,
            versions: self.state.versions,
            verifier: self.state.verifier,
            cert_resolver,
            kx_key,
            psk_store: None,
            dh_params: None,
            legacy_dh_params: None,
            alpn_protocols: Vec::new(),
            max_fragment_size: None,
            ignore_client_order: false,
            min_dh_bits: 1024,
            allow_key_usage_violation: false,
            enable_rehandshake: false,
        }
    }
}

/// State associated with a server connection.
pub struct ServerConnectionData {
    pub(crate) sni: Option<DnsName>,
    pub(crate) psk_identity: Option<Vec<u8>>,
}

impl ServerConnectionData {
    pub(crate) fn new() -> Self {
        Self {
            sni: None,
            psk_identity: None,
        }
    }
}

/// This represents a single TLS server connection.
///
/// Send TLS-protected data to the peer using the `io::Write` trait
/// implementation.  Read data from the peer using the `io::Read` trait
/// implementation.
pub struct ServerConnection {
    inner: ConnectionCommon<ServerConnectionData>,
}

impl fmt::Debug for ServerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConnection").finish()
    }
}

impl ServerConnection {
    /// Make a new ServerConnection.  `config` controls how
    /// we behave in the TLS protocol.
    pub fn new(config: Arc<ServerConfig>) -> Result<Self, Error> {
        let mut common_state = CommonState::new(config.max_fragment_size, Side::Server)?;
        common_state.enable_rehandshake = config.enable_rehandshake;

        let state = Box::new(hs::ExpectClientHello::new(config));

        Ok(Self {
            inner: ConnectionCommon::new(state, ServerConnectionData::new(), common_state),
        })
    }

    /// Retrieves the SNI hostname, if any, used to select the certificate and
    /// private key.
    ///
    /// This returns `None` until some time after the client's SNI extension
    /// value is processed during the handshake.  It will never be `None` when
    /// the connection is ready to send or process application data, unless the
    /// client does not support SNI.
    pub fn sni_hostname(&self) -> Option<&str> {
        self.inner.data.sni.as_ref().map(|dns| dns.as_str())
    }

    /// The PSK identity the client authenticated with, for the
    /// pre-shared-key suites.
    pub fn psk_identity(&self) -> Option<&[u8]> {
        self.inner.data.psk_identity.as_deref()
    }
}

impl Deref for ServerConnection {
    type Target = ConnectionCommon<ServerConnectionData>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ServerConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

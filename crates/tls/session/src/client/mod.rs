use std::{fmt, marker::PhantomData, ops::{Deref, DerefMut}, sync::Arc};

use tls_core::{
    anchors::RootCertStore,
    dns::ServerName,
    msgs::enums::CipherSuite,
    strings,
    suites::SupportedCipherSuite,
    verify::{ServerCertVerifier, VerifyFlags, WebPkiVerifier},
    versions, Error,
};

use crate::{
    builder::{ConfigBuilder, WantsCipherSuites, WantsVerifier},
    conn::{CommonState, ConnectionCommon, Side},
    credentials::PskIdentity,
    kx::SupportedKxGroup,
};

mod hs;
#[cfg(feature = "tls12")]
mod tls12;
mod tls13;

/// Common configuration for (typically) all connections made by
/// a program.
///
/// Making one of these can be expensive, and should be
/// once per process rather than once per connection.
///
/// These must be created via the [`ClientConfig::builder()`] function.
///
/// # Defaults
///
/// * [`ClientConfig::max_fragment_size`]: the default is `None`: TLS packets are not fragmented to a specific size.
/// * [`ClientConfig::alpn_protocols`]: the default is empty -- no ALPN protocol is negotiated.
/// * [`ClientConfig::enable_sni`]: the default is true: the SNI extension is sent.
/// * [`ClientConfig::min_dh_bits`]: the default is 1024 bits.
pub struct ClientConfig {
    /// List of ciphersuites, in preference order.
    pub cipher_suites: Vec<SupportedCipherSuite>,

    /// List of supported key exchange groups, in preference order.
    pub kx_groups: Vec<&'static SupportedKxGroup>,

    /// Which ALPN protocols we include in our client hello.
    /// If empty, no ALPN extension is sent.
    pub alpn_protocols: Vec<Vec<u8>>,

    /// Supported versions, in no particular order.  The default
    /// is all supported versions.
    pub(crate) versions: versions::EnabledVersions,

    /// How to verify the server certificate chain.
    pub(crate) verifier: Arc<dyn ServerCertVerifier>,

    /// The maximum size of TLS message we'll emit.  If None, we don't limit TLS
    /// message lengths except to the 2**16 limit specified in the standard.
    pub max_fragment_size: Option<usize>,

    /// Whether to send the Server Name Indication (SNI) extension
    /// during the client handshake.
    pub enable_sni: bool,

    /// The smallest acceptable DH prime, in bits, for the finite
    /// field suites.
    pub min_dh_bits: usize,

    /// Accept peer-initiated renegotiation.  The default answers a
    /// rehandshake request with a no_renegotiation warning instead.
    pub enable_rehandshake: bool,

    /// Advertise TLS_FALLBACK_SCSV.  Only to be set when this
    /// connection is a downgrade retry of an earlier failed one.
    pub send_fallback_scsv: bool,

    /// When normalizing PSK usernames, pass invalid UTF-8 through
    /// raw instead of failing.
    pub utf8_ignore_errs: bool,

    /// Never fall back to IDNA transitional mapping for hostnames.
    pub idna_force_2008: bool,

    /// The PSK identity and key for the pre-shared-key suites.
    pub(crate) psk: Option<(Vec<u8>, Vec<u8>)>,
}

impl ClientConfig {
    /// Create a builder to build up the client configuration.
    ///
    /// For more information, see the [`ConfigBuilder`] documentation.
    pub fn builder() -> ConfigBuilder<Self, WantsCipherSuites> {
        ConfigBuilder {
            state: WantsCipherSuites(()),
            side: PhantomData,
        }
    }

    /// Install a PSK identity and key for the pre-shared-key cipher
    /// suites.  The username is normalized with the password rules
    /// before use.
    pub fn set_psk(&mut self, username: &[u8], key: impl Into<Vec<u8>>) -> Result<(), Error> {
        let identity = PskIdentity::new(username, self.utf8_ignore_errs)?;
        self.psk = Some((identity.as_bytes().to_vec(), key.into()));
        Ok(())
    }

    pub(crate) fn psk(&self) -> Option<(&[u8], &[u8])> {
        self.psk
            .as_ref()
            .map(|(id, key)| (id.as_slice(), key.as_slice()))
    }

    /// Map a possibly-internationalized hostname into a
    /// [`ServerName`], applying the configured IDNA profile.
    pub fn server_name(&self, name: &str) -> Result<ServerName, Error> {
        let ascii = strings::idna_map(name, self.idna_force_2008)?;
        ServerName::try_from(ascii.as_str()).map_err(|_| Error::InvalidUtf8String)
    }

    pub(crate) fn find_cipher_suite(&self, suite: CipherSuite) -> Option<SupportedCipherSuite> {
        self.cipher_suites
            .iter()
            .copied()
            .find(|&scs| scs.suite() == suite)
    }

    pub(crate) fn supports_version(
        &self,
        v: tls_core::msgs::enums::ProtocolVersion,
    ) -> bool {
        self.versions.contains(v)
    }
}

impl ConfigBuilder<ClientConfig, WantsVerifier> {
    /// Choose how to verify server certificates: against a set of
    /// trust anchors.
    pub fn with_root_certificates(self, root_store: RootCertStore) -> ClientConfig {
        self.with_custom_certificate_verifier(Arc::new(WebPkiVerifier::new(
            root_store,
            VerifyFlags::default(),
        )))
    }

    /// Choose how to verify server certificates using a custom
    /// strategy object, e.g. a TOFU pin check or hardware-backed
    /// verification.
    pub fn with_custom_certificate_verifier(
        self,
        verifier: Arc<dyn ServerCertVerifier>,
    ) -> ClientConfig {
        ClientConfig {
            cipher_suites: self.state.cipher_suites,
            kx_groups: self.state.kx_groups,
            alpn_protocols: Vec::new(),
            versions: self.state.versions,
            verifier,
            max_fragment_size: None,
            enable_sni: true,
            min_dh_bits: 1024,
            enable_rehandshake: false,
            send_fallback_scsv: false,
            utf8_ignore_errs: false,
            idna_force_2008: false,
            psk: None,
        }
    }
}

/// State associated with a client connection.
pub struct ClientConnectionData {
    pub(crate) _private: (),
}

impl ClientConnectionData {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// This represents a single TLS client connection.
pub struct ClientConnection {
    inner: ConnectionCommon<ClientConnectionData>,
}

impl fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConnection").finish()
    }
}

impl ClientConnection {
    /// Make a new ClientConnection.  `config` controls how
    /// we behave in the TLS protocol, `name` is the
    /// name of the server we want to talk to.
    pub fn new(config: Arc<ClientConfig>, name: ServerName) -> Result<Self, Error> {
        let mut common_state = CommonState::new(config.max_fragment_size, Side::Client)?;
        common_state.enable_rehandshake = config.enable_rehandshake;
        let mut data = ClientConnectionData::new();

        let state = hs::start_handshake(name, config, &mut common_state, &mut data)?;

        Ok(Self {
            inner: ConnectionCommon::new(state, data, common_state),
        })
    }
}

impl Deref for ClientConnection {
    type Target = ConnectionCommon<ClientConnectionData>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ClientConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

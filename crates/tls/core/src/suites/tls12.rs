use crate::{
    msgs::enums::{CipherSuite, KeyExchangeAlgorithm, SignatureScheme},
    suites::{AEADAlgorithm, CipherSuiteCommon, HashAlgorithm, SupportedCipherSuite},
};

/// A TLS 1.2 cipher suite supported by the library.
#[derive(PartialEq)]
pub struct Tls12CipherSuite {
    /// Common cipher suite fields.
    pub common: CipherSuiteCommon,

    /// The key-exchange family.
    pub kx: KeyExchangeAlgorithm,

    /// How to sign the ServerKeyExchange for this suite.  Empty for
    /// the unauthenticated and pre-shared families.
    pub sign: &'static [SignatureScheme],

    /// How long the implicit part of the AEAD nonce is, taken from
    /// the key block.
    pub fixed_iv_len: usize,

    /// How long the explicit, per-record part of the nonce is.
    pub explicit_nonce_len: usize,
}

impl Tls12CipherSuite {
    /// Resolve the set of supported `SignatureScheme`s from the
    /// offered signature schemes.  Keeps the peer's order.
    pub fn resolve_sig_schemes(&self, offered: &[SignatureScheme]) -> Vec<SignatureScheme> {
        offered
            .iter()
            .filter(|offered| self.sign.contains(offered))
            .cloned()
            .collect()
    }

    pub fn hash_algorithm(&self) -> &'static HashAlgorithm {
        self.common.hash_algorithm
    }
}

static TLS12_ECDSA_SCHEMES: &[SignatureScheme] = &[
    SignatureScheme::ECDSA_NISTP384_SHA384,
    SignatureScheme::ECDSA_NISTP256_SHA256,
];

static TLS12_RSA_SCHEMES: &[SignatureScheme] = &[
    SignatureScheme::RSA_PSS_SHA512,
    SignatureScheme::RSA_PSS_SHA384,
    SignatureScheme::RSA_PSS_SHA256,
    SignatureScheme::RSA_PKCS1_SHA512,
    SignatureScheme::RSA_PKCS1_SHA384,
    SignatureScheme::RSA_PKCS1_SHA256,
];

/// The TLS1.2 ciphersuite TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256.
pub static TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256: SupportedCipherSuite =
    SupportedCipherSuite::Tls12(&Tls12CipherSuite {
        common: CipherSuiteCommon {
            suite: CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            aead_algorithm: &AEADAlgorithm::AES_128_GCM,
            hash_algorithm: &HashAlgorithm::SHA256,
        },
        kx: KeyExchangeAlgorithm::EcdheEcdsa,
        sign: TLS12_ECDSA_SCHEMES,
        fixed_iv_len: 4,
        explicit_nonce_len: 8,
    });

/// The TLS1.2 ciphersuite TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384.
pub static TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384: SupportedCipherSuite =
    SupportedCipherSuite::Tls12(&Tls12CipherSuite {
        common: CipherSuiteCommon {
            suite: CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
            aead_algorithm: &AEADAlgorithm::AES_256_GCM,
            hash_algorithm: &HashAlgorithm::SHA384,
        },
        kx: KeyExchangeAlgorithm::EcdheEcdsa,
        sign: TLS12_ECDSA_SCHEMES,
        fixed_iv_len: 4,
        explicit_nonce_len: 8,
    });

/// The TLS1.2 ciphersuite TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256.
pub static TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256: SupportedCipherSuite =
    SupportedCipherSuite::Tls12(&Tls12CipherSuite {
        common: CipherSuiteCommon {
            suite: CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
            aead_algorithm: &AEADAlgorithm::CHACHA20_POLY1305,
            hash_algorithm: &HashAlgorithm::SHA256,
        },
        kx: KeyExchangeAlgorithm::EcdheEcdsa,
        sign: TLS12_ECDSA_SCHEMES,
        fixed_iv_len: 12,
        explicit_nonce_len: 0,
    });

/// The TLS1.2 ciphersuite TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256.
pub static TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256: SupportedCipherSuite =
    SupportedCipherSuite::Tls12(&Tls12CipherSuite {
        common: CipherSuiteCommon {
            suite: CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            aead_algorithm: &AEADAlgorithm::AES_128_GCM,
            hash_algorithm: &HashAlgorithm::SHA256,
        },
        kx: KeyExchangeAlgorithm::EcdheRsa,
        sign: TLS12_RSA_SCHEMES,
        fixed_iv_len: 4,
        explicit_nonce_len: 8,
    });

/// The TLS1.2 ciphersuite TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384.
pub static TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384: SupportedCipherSuite =
    SupportedCipherSuite::Tls12(&Tls12CipherSuite {
        common: CipherSuiteCommon {
            suite: CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            aead_algorithm: &AEADAlgorithm::AES_256_GCM,
            hash_algorithm: &HashAlgorithm::SHA384,
        },
        kx: KeyExchangeAlgorithm::EcdheRsa,
        sign: TLS12_RSA_SCHEMES,
        fixed_iv_len: 4,
        explicit_nonce_len: 8,
    });

/// The TLS1.2 ciphersuite TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256.
pub static TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256: SupportedCipherSuite =
    SupportedCipherSuite::Tls12(&Tls12CipherSuite {
        common: CipherSuiteCommon {
            suite: CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
            aead_algorithm: &AEADAlgorithm::CHACHA20_POLY1305,
            hash_algorithm: &HashAlgorithm::SHA256,
        },
        kx: KeyExchangeAlgorithm::EcdheRsa,
        sign: TLS12_RSA_SCHEMES,
        fixed_iv_len: 12,
        explicit_nonce_len: 0,
    });

/// The TLS1.2 ciphersuite TLS_DHE_RSA_WITH_AES_128_GCM_SHA256.
pub static TLS_DHE_RSA_WITH_AES_128_GCM_SHA256: SupportedCipherSuite =
    SupportedCipherSuite::Tls12(&Tls12CipherSuite {
        common: CipherSuiteCommon {
            suite: CipherSuite::TLS_DHE_RSA_WITH_AES_128_GCM_SHA256,
            aead_algorithm: &AEADAlgorithm::AES_128_GCM,
            hash_algorithm: &HashAlgorithm::SHA256,
        },
        kx: KeyExchangeAlgorithm::DheRsa,
        sign: TLS12_RSA_SCHEMES,
        fixed_iv_len: 4,
        explicit_nonce_len: 8,
    });

/// The TLS1.2 ciphersuite TLS_RSA_WITH_AES_128_GCM_SHA256, using RSA
/// key transport.
pub static TLS_RSA_WITH_AES_128_GCM_SHA256: SupportedCipherSuite =
    SupportedCipherSuite::Tls12(&Tls12CipherSuite {
        common: CipherSuiteCommon {
            suite: CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256,
            aead_algorithm: &AEADAlgorithm::AES_128_GCM,
            hash_algorithm: &HashAlgorithm::SHA256,
        },
        kx: KeyExchangeAlgorithm::Rsa,
        sign: &[],
        fixed_iv_len: 4,
        explicit_nonce_len: 8,
    });

/// The TLS1.2 ciphersuite TLS_PSK_WITH_AES_128_GCM_SHA256.
pub static TLS_PSK_WITH_AES_128_GCM_SHA256: SupportedCipherSuite =
    SupportedCipherSuite::Tls12(&Tls12CipherSuite {
        common: CipherSuiteCommon {
            suite: CipherSuite::TLS_PSK_WITH_AES_128_GCM_SHA256,
            aead_algorithm: &AEADAlgorithm::AES_128_GCM,
            hash_algorithm: &HashAlgorithm::SHA256,
        },
        kx: KeyExchangeAlgorithm::Psk,
        sign: &[],
        fixed_iv_len: 4,
        explicit_nonce_len: 8,
    });

/// The TLS1.2 ciphersuite TLS_DHE_PSK_WITH_AES_128_GCM_SHA256.
pub static TLS_DHE_PSK_WITH_AES_128_GCM_SHA256: SupportedCipherSuite =
    SupportedCipherSuite::Tls12(&Tls12CipherSuite {
        common: CipherSuiteCommon {
            suite: CipherSuite::TLS_DHE_PSK_WITH_AES_128_GCM_SHA256,
            aead_algorithm: &AEADAlgorithm::AES_128_GCM,
            hash_algorithm: &HashAlgorithm::SHA256,
        },
        kx: KeyExchangeAlgorithm::DhePsk,
        sign: &[],
        fixed_iv_len: 4,
        explicit_nonce_len: 8,
    });

/// The TLS1.2 ciphersuite TLS_ECDHE_PSK_WITH_AES_128_GCM_SHA256.
pub static TLS_ECDHE_PSK_WITH_AES_128_GCM_SHA256: SupportedCipherSuite =
    SupportedCipherSuite::Tls12(&Tls12CipherSuite {
        common: CipherSuiteCommon {
            suite: CipherSuite::TLS_ECDHE_PSK_WITH_AES_128_GCM_SHA256,
            aead_algorithm: &AEADAlgorithm::AES_128_GCM,
            hash_algorithm: &HashAlgorithm::SHA256,
        },
        kx: KeyExchangeAlgorithm::EcdhePsk,
        sign: &[],
        fixed_iv_len: 4,
        explicit_nonce_len: 8,
    });

/// The TLS1.2 ciphersuite TLS_DH_anon_WITH_AES_128_GCM_SHA256, the
/// opportunistic-encryption mode without any peer authentication.
#[allow(non_upper_case_globals)]
pub static TLS_DH_anon_WITH_AES_128_GCM_SHA256: SupportedCipherSuite =
    SupportedCipherSuite::Tls12(&Tls12CipherSuite {
        common: CipherSuiteCommon {
            suite: CipherSuite::TLS_DH_anon_WITH_AES_128_GCM_SHA256,
            aead_algorithm: &AEADAlgorithm::AES_128_GCM,
            hash_algorithm: &HashAlgorithm::SHA256,
        },
        kx: KeyExchangeAlgorithm::DhAnon,
        sign: &[],
        fixed_iv_len: 4,
        explicit_nonce_len: 8,
    });

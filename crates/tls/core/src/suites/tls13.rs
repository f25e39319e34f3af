use crate::{
    msgs::enums::CipherSuite,
    suites::{AEADAlgorithm, CipherSuiteCommon, HashAlgorithm, SupportedCipherSuite},
};

/// A TLS 1.3 cipher suite supported by the library.
#[derive(PartialEq)]
pub struct Tls13CipherSuite {
    /// Common cipher suite fields.
    pub common: CipherSuiteCommon,
}

impl Tls13CipherSuite {
    pub fn hash_algorithm(&self) -> &'static HashAlgorithm {
        self.common.hash_algorithm
    }

    /// Can a session using suite self resume from suite prev?
    pub fn can_resume_from(&self, prev: &'static Self) -> Option<&'static Self> {
        (prev.common.hash_algorithm == self.common.hash_algorithm).then_some(prev)
    }
}

/// The TLS1.3 ciphersuite TLS_AES_128_GCM_SHA256.
pub static TLS13_AES_128_GCM_SHA256: SupportedCipherSuite =
    SupportedCipherSuite::Tls13(&Tls13CipherSuite {
        common: CipherSuiteCommon {
            suite: CipherSuite::TLS13_AES_128_GCM_SHA256,
            aead_algorithm: &AEADAlgorithm::AES_128_GCM,
            hash_algorithm: &HashAlgorithm::SHA256,
        },
    });

/// The TLS1.3 ciphersuite TLS_AES_256_GCM_SHA384.
pub static TLS13_AES_256_GCM_SHA384: SupportedCipherSuite =
    SupportedCipherSuite::Tls13(&Tls13CipherSuite {
        common: CipherSuiteCommon {
            suite: CipherSuite::TLS13_AES_256_GCM_SHA384,
            aead_algorithm: &AEADAlgorithm::AES_256_GCM,
            hash_algorithm: &HashAlgorithm::SHA384,
        },
    });

/// The TLS1.3 ciphersuite TLS_CHACHA20_POLY1305_SHA256.
pub static TLS13_CHACHA20_POLY1305_SHA256: SupportedCipherSuite =
    SupportedCipherSuite::Tls13(&Tls13CipherSuite {
        common: CipherSuiteCommon {
            suite: CipherSuite::TLS13_CHACHA20_POLY1305_SHA256,
            aead_algorithm: &AEADAlgorithm::CHACHA20_POLY1305,
            hash_algorithm: &HashAlgorithm::SHA256,
        },
    });

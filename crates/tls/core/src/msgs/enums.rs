#![allow(clippy::upper_case_acronyms)]
#![allow(non_camel_case_types)]
use crate::codec::{Codec, Reader};

enum_builder! {
    /// The `ProtocolVersion` TLS protocol enum.  Values in this enum are taken
    /// from the various RFCs covering TLS, and are listed by IANA.
    /// The `Unknown` item is used when processing unrecognised ordinals.
    @U16
    EnumName: ProtocolVersion;
    EnumVal{
        SSLv2 => 0x0002,
        SSLv3 => 0x0300,
        TLSv1_0 => 0x0301,
        TLSv1_1 => 0x0302,
        TLSv1_2 => 0x0303,
        TLSv1_3 => 0x0304
    }
}

enum_builder! {
    /// The `ContentType` TLS protocol enum.
    @U8
    EnumName: ContentType;
    EnumVal{
        ChangeCipherSpec => 0x14,
        Alert => 0x15,
        Handshake => 0x16,
        ApplicationData => 0x17,
        Heartbeat => 0x18
    }
}

enum_builder! {
    /// The `HandshakeType` TLS protocol enum.
    @U8
    EnumName: HandshakeType;
    EnumVal{
        HelloRequest => 0x00,
        ClientHello => 0x01,
        ServerHello => 0x02,
        NewSessionTicket => 0x04,
        EndOfEarlyData => 0x05,
        HelloRetryRequest => 0x06,
        EncryptedExtensions => 0x08,
        Certificate => 0x0b,
        ServerKeyExchange => 0x0c,
        CertificateRequest => 0x0d,
        ServerHelloDone => 0x0e,
        CertificateVerify => 0x0f,
        ClientKeyExchange => 0x10,
        Finished => 0x14,
        CertificateStatus => 0x16,
        KeyUpdate => 0x18,
        MessageHash => 0xfe
    }
}

enum_builder! {
    /// The `AlertLevel` TLS protocol enum.
    @U8
    EnumName: AlertLevel;
    EnumVal{
        Warning => 0x01,
        Fatal => 0x02
    }
}

enum_builder! {
    /// The `AlertDescription` TLS protocol enum.  Values match the IANA
    /// TLS Alert Registry.
    @U8
    EnumName: AlertDescription;
    EnumVal{
        CloseNotify => 0x00,
        UnexpectedMessage => 0x0a,
        BadRecordMac => 0x14,
        DecryptionFailed => 0x15,
        RecordOverflow => 0x16,
        DecompressionFailure => 0x1e,
        HandshakeFailure => 0x28,
        NoCertificate => 0x29,
        BadCertificate => 0x2a,
        UnsupportedCertificate => 0x2b,
        CertificateRevoked => 0x2c,
        CertificateExpired => 0x2d,
        CertificateUnknown => 0x2e,
        IllegalParameter => 0x2f,
        UnknownCA => 0x30,
        AccessDenied => 0x31,
        DecodeError => 0x32,
        DecryptError => 0x33,
        ExportRestriction => 0x3c,
        ProtocolVersion => 0x46,
        InsufficientSecurity => 0x47,
        InternalError => 0x50,
        InappropriateFallback => 0x56,
        UserCanceled => 0x5a,
        NoRenegotiation => 0x64,
        MissingExtension => 0x6d,
        UnsupportedExtension => 0x6e,
        CertificateUnobtainable => 0x6f,
        UnrecognisedName => 0x70,
        BadCertificateStatusResponse => 0x71,
        BadCertificateHashValue => 0x72,
        UnknownPSKIdentity => 0x73,
        CertificateRequired => 0x74,
        NoApplicationProtocol => 0x78
    }
}

enum_builder! {
    /// The `CipherSuite` TLS protocol enum.  Values match IANA assignments.
    @U16
    EnumName: CipherSuite;
    EnumVal{
        TLS_NULL_WITH_NULL_NULL => 0x0000,
        TLS_RSA_WITH_AES_128_GCM_SHA256 => 0x009c,
        TLS_RSA_WITH_AES_256_GCM_SHA384 => 0x009d,
        TLS_DHE_RSA_WITH_AES_128_GCM_SHA256 => 0x009e,
        TLS_DHE_RSA_WITH_AES_256_GCM_SHA384 => 0x009f,
        TLS_DH_anon_WITH_AES_128_GCM_SHA256 => 0x00a6,
        TLS_DH_anon_WITH_AES_256_GCM_SHA384 => 0x00a7,
        TLS_PSK_WITH_AES_128_GCM_SHA256 => 0x00a8,
        TLS_PSK_WITH_AES_256_GCM_SHA384 => 0x00a9,
        TLS_DHE_PSK_WITH_AES_128_GCM_SHA256 => 0x00aa,
        TLS_DHE_PSK_WITH_AES_256_GCM_SHA384 => 0x00ab,
        TLS_EMPTY_RENEGOTIATION_INFO_SCSV => 0x00ff,
        TLS13_AES_128_GCM_SHA256 => 0x1301,
        TLS13_AES_256_GCM_SHA384 => 0x1302,
        TLS13_CHACHA20_POLY1305_SHA256 => 0x1303,
        TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 => 0xc02b,
        TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 => 0xc02c,
        TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 => 0xc02f,
        TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 => 0xc030,
        TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256 => 0xcca8,
        TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256 => 0xcca9,
        TLS_ECDHE_PSK_WITH_AES_128_GCM_SHA256 => 0xd001,
        TLS_ECDHE_PSK_WITH_AES_256_GCM_SHA384 => 0xd002,
        TLS_FALLBACK_SCSV => 0x5600
    }
}

enum_builder! {
    /// The `SignatureAlgorithm` enum, from the TLS 1.2
    /// SignatureAndHashAlgorithm registry.
    @U8
    EnumName: SignatureAlgorithm;
    EnumVal{
        Anonymous => 0x00,
        RSA => 0x01,
        DSA => 0x02,
        ECDSA => 0x03,
        ED25519 => 0x07
    }
}

enum_builder! {
    /// The `HashAlgorithm` enum, from the TLS 1.2
    /// SignatureAndHashAlgorithm registry.
    @U8
    EnumName: HashAlgorithm;
    EnumVal{
        NONE => 0x00,
        MD5 => 0x01,
        SHA1 => 0x02,
        SHA224 => 0x03,
        SHA256 => 0x04,
        SHA384 => 0x05,
        SHA512 => 0x06
    }
}

enum_builder! {
    /// The `SignatureScheme` TLS protocol enum.
    @U16
    EnumName: SignatureScheme;
    EnumVal{
        RSA_PKCS1_SHA1 => 0x0201,
        ECDSA_SHA1_Legacy => 0x0203,
        RSA_PKCS1_SHA256 => 0x0401,
        ECDSA_NISTP256_SHA256 => 0x0403,
        RSA_PKCS1_SHA384 => 0x0501,
        ECDSA_NISTP384_SHA384 => 0x0503,
        RSA_PKCS1_SHA512 => 0x0601,
        ECDSA_NISTP521_SHA512 => 0x0603,
        RSA_PSS_SHA256 => 0x0804,
        RSA_PSS_SHA384 => 0x0805,
        RSA_PSS_SHA512 => 0x0806,
        ED25519 => 0x0807
    }
}

impl SignatureScheme {
    pub fn sign(&self) -> SignatureAlgorithm {
        match *self {
            Self::RSA_PKCS1_SHA1
            | Self::RSA_PKCS1_SHA256
            | Self::RSA_PKCS1_SHA384
            | Self::RSA_PKCS1_SHA512
            | Self::RSA_PSS_SHA256
            | Self::RSA_PSS_SHA384
            | Self::RSA_PSS_SHA512 => SignatureAlgorithm::RSA,
            Self::ECDSA_SHA1_Legacy
            | Self::ECDSA_NISTP256_SHA256
            | Self::ECDSA_NISTP384_SHA384
            | Self::ECDSA_NISTP521_SHA512 => SignatureAlgorithm::ECDSA,
            Self::ED25519 => SignatureAlgorithm::ED25519,
            _ => SignatureAlgorithm::Unknown(0),
        }
    }

    /// The TLS 1.2 SignatureAndHashAlgorithm view of this scheme.
    pub fn split(&self) -> (HashAlgorithm, SignatureAlgorithm) {
        let hash = match *self {
            Self::RSA_PKCS1_SHA1 | Self::ECDSA_SHA1_Legacy => HashAlgorithm::SHA1,
            Self::RSA_PKCS1_SHA256 | Self::ECDSA_NISTP256_SHA256 | Self::RSA_PSS_SHA256 => {
                HashAlgorithm::SHA256
            }
            Self::RSA_PKCS1_SHA384 | Self::ECDSA_NISTP384_SHA384 | Self::RSA_PSS_SHA384 => {
                HashAlgorithm::SHA384
            }
            Self::RSA_PKCS1_SHA512 | Self::ECDSA_NISTP521_SHA512 | Self::RSA_PSS_SHA512 => {
                HashAlgorithm::SHA512
            }
            _ => HashAlgorithm::NONE,
        };
        (hash, self.sign())
    }

    pub fn make(alg: SignatureAlgorithm, hash: HashAlgorithm) -> Self {
        Self::from(((hash.get_u8() as u16) << 8) | alg.get_u8() as u16)
    }
}

enum_builder! {
    /// The `NamedGroup` TLS protocol enum, from the IANA
    /// TLS Supported Groups registry.
    @U16
    EnumName: NamedGroup;
    EnumVal{
        secp256r1 => 0x0017,
        secp384r1 => 0x0018,
        secp521r1 => 0x0019,
        X25519 => 0x001d,
        X448 => 0x001e,
        FFDHE2048 => 0x0100,
        FFDHE3072 => 0x0101,
        FFDHE4096 => 0x0102,
        FFDHE6144 => 0x0103,
        FFDHE8192 => 0x0104
    }
}

impl NamedGroup {
    /// FFDHE groups occupy 0x0100 and up in the registry.
    pub fn is_ffdhe(&self) -> bool {
        self.get_u16() >= 0x0100 && self.get_u16() < 0x0200
    }

    /// Size of the group's prime (FFDHE) or field (EC), in bits.
    pub fn bits(&self) -> Option<usize> {
        match self {
            Self::secp256r1 => Some(256),
            Self::secp384r1 => Some(384),
            Self::secp521r1 => Some(521),
            Self::X25519 => Some(255),
            Self::X448 => Some(448),
            Self::FFDHE2048 => Some(2048),
            Self::FFDHE3072 => Some(3072),
            Self::FFDHE4096 => Some(4096),
            Self::FFDHE6144 => Some(6144),
            Self::FFDHE8192 => Some(8192),
            _ => None,
        }
    }
}

enum_builder! {
    /// The `ECPointFormat` TLS protocol enum.
    @U8
    EnumName: ECPointFormat;
    EnumVal{
        Uncompressed => 0x00,
        ANSIX962CompressedPrime => 0x01,
        ANSIX962CompressedChar2 => 0x02
    }
}

enum_builder! {
    /// The `ECCurveType` TLS protocol enum, used in the TLS 1.2
    /// ServerKeyExchange for ECDHE suites.
    @U8
    EnumName: ECCurveType;
    EnumVal{
        ExplicitPrime => 0x01,
        ExplicitChar2 => 0x02,
        NamedCurve => 0x03
    }
}

enum_builder! {
    /// The `ExtensionType` TLS protocol enum.  Values match the IANA
    /// TLS ExtensionType registry.
    @U16
    EnumName: ExtensionType;
    EnumVal{
        ServerName => 0x0000,
        StatusRequest => 0x0005,
        EllipticCurves => 0x000a,
        ECPointFormats => 0x000b,
        SignatureAlgorithms => 0x000d,
        Heartbeat => 0x000f,
        ALProtocolNegotiation => 0x0010,
        ExtendedMasterSecret => 0x0017,
        SessionTicket => 0x0023,
        PreSharedKey => 0x0029,
        EarlyData => 0x002a,
        SupportedVersions => 0x002b,
        Cookie => 0x002c,
        PSKKeyExchangeModes => 0x002d,
        CertificateAuthorities => 0x002f,
        SignatureAlgorithmsCert => 0x0032,
        KeyShare => 0x0033,
        RenegotiationInfo => 0xff01
    }
}

enum_builder! {
    /// The `Compression` TLS protocol enum.
    @U8
    EnumName: Compression;
    EnumVal{
        Null => 0x00,
        Deflate => 0x01,
        LSZ => 0x40
    }
}

enum_builder! {
    /// The `ServerNameType` enum from the server_name extension.
    @U8
    EnumName: ServerNameType;
    EnumVal{
        HostName => 0x00
    }
}

enum_builder! {
    /// The `ClientCertificateType` enum from the TLS 1.2 CertificateRequest.
    @U8
    EnumName: ClientCertificateType;
    EnumVal{
        RSASign => 0x01,
        DSSSign => 0x02,
        RSAFixedDH => 0x03,
        DSSFixedDH => 0x04,
        ECDSASign => 0x40
    }
}

enum_builder! {
    /// The `KeyUpdateRequest` TLS 1.3 protocol enum.
    @U8
    EnumName: KeyUpdateRequest;
    EnumVal{
        UpdateNotRequested => 0x00,
        UpdateRequested => 0x01
    }
}

enum_builder! {
    /// The TLS 1.3 `PskKeyExchangeMode` enum.
    @U8
    EnumName: PSKKeyExchangeMode;
    EnumVal{
        PSK_KE => 0x00,
        PSK_DHE_KE => 0x01
    }
}

enum_builder! {
    /// The `CertificateStatusType` enum from the status_request extension.
    @U8
    EnumName: CertificateStatusType;
    EnumVal{
        OCSP => 0x01
    }
}

/// The key-exchange family a cipher suite uses.  This is the dispatch
/// axis for the per-algorithm key-exchange modules.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum KeyExchangeAlgorithm {
    /// RSA key transport: the client encrypts the premaster under the
    /// server's RSA key.
    Rsa,
    /// Ephemeral finite-field DH without authentication.
    DhAnon,
    /// Ephemeral finite-field DH signed by an RSA key.
    DheRsa,
    /// Ephemeral EC DH signed by an RSA key.
    EcdheRsa,
    /// Ephemeral EC DH signed by an ECDSA key.
    EcdheEcdsa,
    /// Plain pre-shared key.
    Psk,
    /// Pre-shared key mixed with ephemeral finite-field DH.
    DhePsk,
    /// Pre-shared key mixed with ephemeral EC DH.
    EcdhePsk,
}

impl KeyExchangeAlgorithm {
    /// True for the families that authenticate with a certificate.
    pub fn uses_certificate(&self) -> bool {
        matches!(
            self,
            Self::Rsa | Self::DheRsa | Self::EcdheRsa | Self::EcdheEcdsa
        )
    }

    /// True for the families that involve a PSK identity.
    pub fn uses_psk(&self) -> bool {
        matches!(self, Self::Psk | Self::DhePsk | Self::EcdhePsk)
    }

    /// True if the server sends a ServerKeyExchange message for this
    /// family under TLS 1.2.
    pub fn sends_server_kx(&self) -> bool {
        !matches!(self, Self::Rsa)
    }

    /// The role the server's certificate key plays, for key-usage
    /// enforcement: `true` when the key signs (ephemeral modes),
    /// `false` when it deciphers (RSA key transport).
    pub fn requires_signing_key(&self) -> bool {
        matches!(self, Self::DheRsa | Self::EcdheRsa | Self::EcdheEcdsa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;

    #[test]
    fn unknown_ordinals_survive_round_trip() {
        let alert = AlertDescription::from(0xfb);
        assert_eq!(alert, AlertDescription::Unknown(0xfb));
        assert_eq!(
            AlertDescription::read_bytes(&alert.get_encoding()),
            Some(alert)
        );
    }

    #[test]
    fn named_group_classification() {
        assert!(NamedGroup::FFDHE2048.is_ffdhe());
        assert!(!NamedGroup::X25519.is_ffdhe());
        assert_eq!(NamedGroup::FFDHE2048.bits(), Some(2048));
        assert_eq!(NamedGroup::Unknown(0x4242).bits(), None);
    }

    #[test]
    fn sigscheme_split() {
        let (hash, sign) = SignatureScheme::RSA_PKCS1_SHA256.split();
        assert_eq!(hash, HashAlgorithm::SHA256);
        assert_eq!(sign, SignatureAlgorithm::RSA);
        assert_eq!(
            SignatureScheme::make(SignatureAlgorithm::ECDSA, HashAlgorithm::SHA256),
            SignatureScheme::ECDSA_NISTP256_SHA256
        );
    }
}

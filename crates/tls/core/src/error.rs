use std::{error::Error as StdError, fmt};

use crate::msgs::enums::{AlertDescription, AlertLevel, ContentType, HandshakeType};

/// The library reports protocol errors using this type.
#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    /// We received a TLS message that isn't valid right now.
    /// `expect_types` lists the message types we can expect right now.
    /// `got_type` is the type we found.  This error is typically
    /// caused by a buggy TLS stack (the peer or this one), a broken
    /// network, or an attack.
    InappropriateMessage {
        /// Which types we expected
        expect_types: Vec<ContentType>,
        /// What type we received
        got_type: ContentType,
    },

    /// We received a TLS handshake message that isn't valid right now.
    InappropriateHandshakeMessage {
        /// Which handshake type we expected
        expect_types: Vec<HandshakeType>,
        /// What handshake type we received
        got_type: HandshakeType,
    },

    /// The peer sent us a syntactically incorrect TLS message.
    CorruptMessage,

    /// The peer sent us a TLS message with invalid contents.
    CorruptMessagePayload(ContentType),

    /// The peer didn't give us any certificates.
    NoCertificatesPresented,

    /// The peer sent a record larger than the protocol permits.
    PeerSentOversizedRecord,

    /// A handshake message spilled over the permitted maximum size.
    OversizedHandshakeMessage,

    /// We couldn't decrypt a message.  This is invariably fatal.
    DecryptError,

    /// We failed to encrypt a message: the sequence space is exhausted.
    EncryptError,

    /// The peer doesn't support a protocol version/feature we require.
    PeerIncompatibleError(String),

    /// The peer deviated from the standard TLS protocol.
    PeerMisbehavedError(String),

    /// We received a fatal alert.
    AlertReceived(AlertDescription),

    /// The presented certificate chain is invalid.  The string names
    /// the first failure.
    InvalidCertificateData(String),

    /// The signature over the handshake transcript did not verify.
    SignatureVerifyFailed,

    /// A length-prefixed field had an impossible length.
    UnexpectedPacketLength,

    /// The selected certificate's KeyUsage forbids the negotiated
    /// key exchange.
    KeyUsageViolation,

    /// The server has no key for the PSK identity the client sent.
    UnknownPskIdentity,

    /// A PSK/SRP identity exceeded the permitted size.
    IllegalSrpUsername,

    /// Negotiation produced no common cipher suite, group or share.
    HandshakeFailure(String),

    /// The peer's parameters fall below the configured security
    /// floor, e.g. a too-small DH prime.
    InsufficientSecurity,

    /// The negotiated mode needs credential material the registry
    /// does not hold (a PSK, DH parameters, a certificate slot).
    InsufficientCredentials,

    /// A downgrade-protection signal was present but the negotiated
    /// version was lower than the peer supports.
    InappropriateFallback,

    /// The server does not recognize the name the client asked for.
    UnrecognizedName,

    /// A certificate was required from the peer but none was given.
    CertificateRequired,

    /// No ALPN protocol was agreed.
    NoApplicationProtocol,

    /// The peer asked to renegotiate and the session does not allow it.
    RehandshakeRequested,

    /// Buffer capacity arithmetic overflowed or allocation failed.
    MemoryError,

    /// A string was not valid UTF-8, or failed profile normalization.
    InvalidUtf8String,

    /// TOFU: the stored key for this host/service differs.
    CertificateKeyMismatch,

    /// TOFU: no entry for this host/service.
    NoCertificateFound,

    /// The operation was attempted on a dead session.
    InvalidSession,

    /// The handshake has not finished.
    HandshakeNotComplete,

    /// The maximum fragment size is out of range.
    BadMaxFragmentSize,

    /// The operating system failed to provide randomness.
    FailedToGetRandomBytes,

    /// A credential file or the TOFU database could not be accessed.
    FileError(String),

    /// Any other error.  The catalog classifies this as internal.
    General(String),
}

fn join<T: fmt::Debug>(items: &[T]) -> String {
    items
        .iter()
        .map(|x| format!("{:?}", x))
        .collect::<Vec<String>>()
        .join(" or ")
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InappropriateMessage {
                expect_types,
                got_type,
            } => write!(
                f,
                "received unexpected message: got {:?} when expecting {}",
                got_type,
                join::<ContentType>(expect_types)
            ),
            Self::InappropriateHandshakeMessage {
                expect_types,
                got_type,
            } => write!(
                f,
                "received unexpected handshake message: got {:?} when expecting {}",
                got_type,
                join::<HandshakeType>(expect_types)
            ),
            Self::CorruptMessagePayload(typ) => {
                write!(f, "received corrupt message of type {:?}", typ)
            }
            Self::PeerIncompatibleError(why) => write!(f, "peer is incompatible: {}", why),
            Self::PeerMisbehavedError(why) => write!(f, "peer misbehaved: {}", why),
            Self::AlertReceived(alert) => write!(f, "received fatal alert: {:?}", alert),
            Self::InvalidCertificateData(why) => write!(f, "invalid peer certificate: {}", why),
            Self::HandshakeFailure(why) => write!(f, "handshake failure: {}", why),
            Self::FileError(why) => write!(f, "file access failed: {}", why),
            Self::General(why) => write!(f, "unexpected error: {}", why),
            other => write!(f, "{}", other.code().strerror()),
        }
    }
}

impl StdError for Error {}

impl From<crate::rand::GetRandomFailed> for Error {
    fn from(_: crate::rand::GetRandomFailed) -> Self {
        Self::FailedToGetRandomBytes
    }
}

impl Error {
    /// Project this error onto the flat catalog.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InappropriateMessage { .. } => ErrorCode::UnexpectedPacket,
            Self::InappropriateHandshakeMessage { .. } => ErrorCode::UnexpectedHandshakePacket,
            Self::CorruptMessage | Self::CorruptMessagePayload(_) => ErrorCode::ParsingError,
            Self::NoCertificatesPresented => ErrorCode::NoCertificateFoundInChain,
            Self::PeerSentOversizedRecord => ErrorCode::RecordOverflow,
            Self::OversizedHandshakeMessage => ErrorCode::HandshakeTooLarge,
            Self::DecryptError => ErrorCode::BadRecordMac,
            Self::EncryptError => ErrorCode::RecordLimitReached,
            Self::PeerIncompatibleError(_) => ErrorCode::UnsupportedVersionPacket,
            Self::PeerMisbehavedError(_) => ErrorCode::IllegalParameter,
            Self::AlertReceived(_) => ErrorCode::FatalAlertReceived,
            Self::InvalidCertificateData(_) => ErrorCode::CertificateError,
            Self::SignatureVerifyFailed => ErrorCode::PkSigVerifyFailed,
            Self::UnexpectedPacketLength => ErrorCode::UnexpectedPacketLength,
            Self::KeyUsageViolation => ErrorCode::KeyUsageViolation,
            Self::UnknownPskIdentity => ErrorCode::UnknownPskIdentity,
            Self::IllegalSrpUsername => ErrorCode::IllegalSrpUsername,
            Self::HandshakeFailure(_) => ErrorCode::NoCipherSuites,
            Self::InsufficientSecurity => ErrorCode::InsufficientSecurity,
            Self::InsufficientCredentials => ErrorCode::InsufficientCredentials,
            Self::InappropriateFallback => ErrorCode::InappropriateFallback,
            Self::UnrecognizedName => ErrorCode::UnrecognizedName,
            Self::CertificateRequired => ErrorCode::CertificateRequired,
            Self::NoApplicationProtocol => ErrorCode::NoApplicationProtocol,
            Self::RehandshakeRequested => ErrorCode::Rehandshake,
            Self::MemoryError => ErrorCode::MemoryError,
            Self::InvalidUtf8String => ErrorCode::InvalidUtf8String,
            Self::CertificateKeyMismatch => ErrorCode::CertificateKeyMismatch,
            Self::NoCertificateFound => ErrorCode::NoCertificateFound,
            Self::InvalidSession => ErrorCode::InvalidSession,
            Self::HandshakeNotComplete => ErrorCode::HandshakeNotComplete,
            Self::BadMaxFragmentSize => ErrorCode::InvalidRequest,
            Self::FailedToGetRandomBytes => ErrorCode::RandomFailed,
            Self::FileError(_) => ErrorCode::FileError,
            Self::General(_) => ErrorCode::InternalError,
        }
    }

    /// True when this error terminates the session.
    pub fn is_fatal(&self) -> bool {
        self.code().is_fatal()
    }
}

/// The flat error catalog.  Every kind carries a stable negative code,
/// a symbolic name, a description, and a fatality class; `to_alert`
/// yields the alert the record layer sends for it.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    InternalError = -1,
    MemoryError = -2,
    Again = -3,
    Interrupted = -4,
    LargePacket = -5,
    PushError = -6,
    PullError = -7,
    FileError = -8,
    ParsingError = -9,
    Asn1DerError = -10,
    Base64DecodingError = -11,
    UnexpectedPacket = -12,
    UnexpectedHandshakePacket = -13,
    UnexpectedPacketLength = -14,
    RecordOverflow = -15,
    PrematureTermination = -16,
    Rehandshake = -17,
    UnsupportedVersionPacket = -18,
    DecryptionFailed = -19,
    BadRecordMac = -20,
    MacVerifyFailed = -21,
    PkSigVerifyFailed = -22,
    PkDecryptionFailed = -23,
    RandomFailed = -24,
    InsufficientCredentials = -25,
    KeyUsageViolation = -26,
    InsufficientSecurity = -27,
    InappropriateFallback = -28,
    UnimplementedFeature = -29,
    UnsupportedCertificateType = -30,
    UserError = -31,
    TimedOut = -32,
    FatalAlertReceived = -33,
    WarningAlertReceived = -34,
    IllegalParameter = -35,
    ReceivedDisallowedName = -36,
    PkInvalidPubkey = -37,
    UnknownPskIdentity = -38,
    IllegalSrpUsername = -39,
    CertificateError = -40,
    NoCertificateFoundInChain = -41,
    NoCipherSuites = -42,
    NoCommonKeyShare = -43,
    EccNoSupportedCurves = -44,
    UnsafeRenegotiationDenied = -45,
    NoApplicationProtocol = -46,
    UnrecognizedName = -47,
    CertificateRequired = -48,
    NoCertificateFound = -49,
    CertificateKeyMismatch = -50,
    HandshakeTooLarge = -51,
    InvalidSession = -52,
    InvalidUtf8String = -53,
    HeartbeatPingReceived = -54,
    HeartbeatPongReceived = -55,
    ReauthRequest = -56,
    MissingExtension = -57,
    RecordLimitReached = -58,
    HandshakeNotComplete = -59,
    InvalidRequest = -60,
    ExpiredEntry = -61,
    HashFailed = -62,
}

struct ErrorEntry {
    code: ErrorCode,
    name: &'static str,
    desc: &'static str,
}

static ERROR_CATALOG: &[ErrorEntry] = &[
    ErrorEntry { code: ErrorCode::Success, name: "E_SUCCESS", desc: "Success." },
    ErrorEntry { code: ErrorCode::InternalError, name: "E_INTERNAL_ERROR", desc: "Internal error." },
    ErrorEntry { code: ErrorCode::MemoryError, name: "E_MEMORY_ERROR", desc: "Internal memory error." },
    ErrorEntry { code: ErrorCode::Again, name: "E_AGAIN", desc: "Resource temporarily unavailable, try again." },
    ErrorEntry { code: ErrorCode::Interrupted, name: "E_INTERRUPTED", desc: "Function was interrupted." },
    ErrorEntry { code: ErrorCode::LargePacket, name: "E_LARGE_PACKET", desc: "A large TLS record packet was received." },
    ErrorEntry { code: ErrorCode::PushError, name: "E_PUSH_ERROR", desc: "Error in the push function." },
    ErrorEntry { code: ErrorCode::PullError, name: "E_PULL_ERROR", desc: "Error in the pull function." },
    ErrorEntry { code: ErrorCode::FileError, name: "E_FILE_ERROR", desc: "Error while reading file." },
    ErrorEntry { code: ErrorCode::ParsingError, name: "E_PARSING_ERROR", desc: "An error occurred while parsing the message." },
    ErrorEntry { code: ErrorCode::Asn1DerError, name: "E_ASN1_DER_ERROR", desc: "ASN1 parser: error in DER parsing." },
    ErrorEntry { code: ErrorCode::Base64DecodingError, name: "E_BASE64_DECODING_ERROR", desc: "Base64 decoding error." },
    ErrorEntry { code: ErrorCode::UnexpectedPacket, name: "E_UNEXPECTED_PACKET", desc: "An unexpected TLS packet was received." },
    ErrorEntry { code: ErrorCode::UnexpectedHandshakePacket, name: "E_UNEXPECTED_HANDSHAKE_PACKET", desc: "An unexpected TLS handshake packet was received." },
    ErrorEntry { code: ErrorCode::UnexpectedPacketLength, name: "E_UNEXPECTED_PACKET_LENGTH", desc: "A TLS packet with unexpected length was received." },
    ErrorEntry { code: ErrorCode::RecordOverflow, name: "E_RECORD_OVERFLOW", desc: "A TLS record packet exceeding the permitted size was received." },
    ErrorEntry { code: ErrorCode::PrematureTermination, name: "E_PREMATURE_TERMINATION", desc: "The TLS connection was non-properly terminated." },
    ErrorEntry { code: ErrorCode::Rehandshake, name: "E_REHANDSHAKE", desc: "Rehandshake was requested by the peer." },
    ErrorEntry { code: ErrorCode::UnsupportedVersionPacket, name: "E_UNSUPPORTED_VERSION_PACKET", desc: "A record packet with illegal version was received." },
    ErrorEntry { code: ErrorCode::DecryptionFailed, name: "E_DECRYPTION_FAILED", desc: "Decryption has failed." },
    ErrorEntry { code: ErrorCode::BadRecordMac, name: "E_BAD_RECORD_MAC", desc: "A record with bad message authentication code was received." },
    ErrorEntry { code: ErrorCode::MacVerifyFailed, name: "E_MAC_VERIFY_FAILED", desc: "Verifying the message authentication code failed." },
    ErrorEntry { code: ErrorCode::PkSigVerifyFailed, name: "E_PK_SIG_VERIFY_FAILED", desc: "Public key signature verification has failed." },
    ErrorEntry { code: ErrorCode::PkDecryptionFailed, name: "E_PK_DECRYPTION_FAILED", desc: "Public key decryption has failed." },
    ErrorEntry { code: ErrorCode::RandomFailed, name: "E_RANDOM_FAILED", desc: "Failed to acquire random data." },
    ErrorEntry { code: ErrorCode::InsufficientCredentials, name: "E_INSUFFICIENT_CREDENTIALS", desc: "Insufficient credentials for this request." },
    ErrorEntry { code: ErrorCode::KeyUsageViolation, name: "E_KEY_USAGE_VIOLATION", desc: "The certificate's key usage does not permit this operation." },
    ErrorEntry { code: ErrorCode::InsufficientSecurity, name: "E_INSUFFICIENT_SECURITY", desc: "The request exceeds the configured security level." },
    ErrorEntry { code: ErrorCode::InappropriateFallback, name: "E_INAPPROPRIATE_FALLBACK", desc: "An inappropriate protocol fallback was attempted." },
    ErrorEntry { code: ErrorCode::UnimplementedFeature, name: "E_UNIMPLEMENTED_FEATURE", desc: "The request is not implemented." },
    ErrorEntry { code: ErrorCode::UnsupportedCertificateType, name: "E_UNSUPPORTED_CERTIFICATE_TYPE", desc: "The certificate type is not supported." },
    ErrorEntry { code: ErrorCode::UserError, name: "E_USER_ERROR", desc: "An error was reported by the application callback." },
    ErrorEntry { code: ErrorCode::TimedOut, name: "E_TIMEDOUT", desc: "The operation timed out." },
    ErrorEntry { code: ErrorCode::FatalAlertReceived, name: "E_FATAL_ALERT_RECEIVED", desc: "A TLS fatal alert has been received." },
    ErrorEntry { code: ErrorCode::WarningAlertReceived, name: "E_WARNING_ALERT_RECEIVED", desc: "A TLS warning alert has been received." },
    ErrorEntry { code: ErrorCode::IllegalParameter, name: "E_ILLEGAL_PARAMETER", desc: "An illegal parameter has been received." },
    ErrorEntry { code: ErrorCode::ReceivedDisallowedName, name: "E_RECEIVED_DISALLOWED_NAME", desc: "A disallowed name was received from the peer." },
    ErrorEntry { code: ErrorCode::PkInvalidPubkey, name: "E_PK_INVALID_PUBKEY", desc: "An illegal public key was received." },
    ErrorEntry { code: ErrorCode::UnknownPskIdentity, name: "E_UNKNOWN_PSK_IDENTITY", desc: "The PSK identity is not known." },
    ErrorEntry { code: ErrorCode::IllegalSrpUsername, name: "E_ILLEGAL_SRP_USERNAME", desc: "The username exceeds the permitted size." },
    ErrorEntry { code: ErrorCode::CertificateError, name: "E_CERTIFICATE_ERROR", desc: "Error in the certificate." },
    ErrorEntry { code: ErrorCode::NoCertificateFoundInChain, name: "E_NO_CERTIFICATE_FOUND_IN_CHAIN", desc: "The peer did not send any certificate." },
    ErrorEntry { code: ErrorCode::NoCipherSuites, name: "E_NO_CIPHER_SUITES", desc: "No supported cipher suites have been found." },
    ErrorEntry { code: ErrorCode::NoCommonKeyShare, name: "E_NO_COMMON_KEY_SHARE", desc: "No common key share was found." },
    ErrorEntry { code: ErrorCode::EccNoSupportedCurves, name: "E_ECC_NO_SUPPORTED_CURVES", desc: "No supported elliptic curves have been found." },
    ErrorEntry { code: ErrorCode::UnsafeRenegotiationDenied, name: "E_UNSAFE_RENEGOTIATION_DENIED", desc: "Unsafe renegotiation was denied." },
    ErrorEntry { code: ErrorCode::NoApplicationProtocol, name: "E_NO_APPLICATION_PROTOCOL", desc: "No common application protocol could be negotiated." },
    ErrorEntry { code: ErrorCode::UnrecognizedName, name: "E_UNRECOGNIZED_NAME", desc: "The server name sent was not recognized." },
    ErrorEntry { code: ErrorCode::CertificateRequired, name: "E_CERTIFICATE_REQUIRED", desc: "A certificate was required but none was sent." },
    ErrorEntry { code: ErrorCode::NoCertificateFound, name: "E_NO_CERTIFICATE_FOUND", desc: "No certificate was found in the trust database." },
    ErrorEntry { code: ErrorCode::CertificateKeyMismatch, name: "E_CERTIFICATE_KEY_MISMATCH", desc: "The stored public key does not match the presented one." },
    ErrorEntry { code: ErrorCode::HandshakeTooLarge, name: "E_HANDSHAKE_TOO_LARGE", desc: "The handshake data size is too large." },
    ErrorEntry { code: ErrorCode::InvalidSession, name: "E_INVALID_SESSION", desc: "The specified session has been invalidated for some reason." },
    ErrorEntry { code: ErrorCode::InvalidUtf8String, name: "E_INVALID_UTF8_STRING", desc: "The given string contains invalid UTF-8 characters." },
    ErrorEntry { code: ErrorCode::HeartbeatPingReceived, name: "E_HEARTBEAT_PING_RECEIVED", desc: "A heartbeat ping was received." },
    ErrorEntry { code: ErrorCode::HeartbeatPongReceived, name: "E_HEARTBEAT_PONG_RECEIVED", desc: "A heartbeat pong was received." },
    ErrorEntry { code: ErrorCode::ReauthRequest, name: "E_REAUTH_REQUEST", desc: "Re-authentication was requested by the peer." },
    ErrorEntry { code: ErrorCode::MissingExtension, name: "E_MISSING_EXTENSION", desc: "A mandatory extension was not sent." },
    ErrorEntry { code: ErrorCode::RecordLimitReached, name: "E_RECORD_LIMIT_REACHED", desc: "The upper limit of record sequence numbers has been reached." },
    ErrorEntry { code: ErrorCode::HandshakeNotComplete, name: "E_HANDSHAKE_NOT_COMPLETE", desc: "The handshake has not yet completed." },
    ErrorEntry { code: ErrorCode::InvalidRequest, name: "E_INVALID_REQUEST", desc: "The request is invalid." },
    ErrorEntry { code: ErrorCode::ExpiredEntry, name: "E_EXPIRED_ENTRY", desc: "The stored entry has expired." },
    ErrorEntry { code: ErrorCode::HashFailed, name: "E_HASH_FAILED", desc: "Hashing has failed." },
];

/// The errors a caller may retry without tearing the session down.
static NON_FATAL: &[ErrorCode] = &[
    ErrorCode::Success,
    ErrorCode::Again,
    ErrorCode::Interrupted,
    ErrorCode::LargePacket,
    ErrorCode::WarningAlertReceived,
    ErrorCode::HeartbeatPingReceived,
    ErrorCode::HeartbeatPongReceived,
    ErrorCode::Rehandshake,
    ErrorCode::ReauthRequest,
];

impl ErrorCode {
    /// The stable negative code (0 for success).
    pub fn num(&self) -> i32 {
        *self as i32
    }

    /// Symbolic name, always prefixed `E_`.
    pub fn strerror_name(&self) -> &'static str {
        self.entry().name
    }

    /// Human-readable description.
    pub fn strerror(&self) -> &'static str {
        self.entry().desc
    }

    /// Fatality classification: everything is fatal unless on the
    /// retryable allowlist.
    pub fn is_fatal(&self) -> bool {
        !NON_FATAL.contains(self)
    }

    /// The alert this error maps onto, if any.  Errors without a
    /// protocol-visible cause yield `internal_error` when fatal and
    /// nothing otherwise.
    pub fn to_alert(&self) -> Option<(AlertDescription, AlertLevel)> {
        use AlertDescription as A;
        use AlertLevel::{Fatal, Warning};

        let alert = match self {
            Self::DecryptionFailed | Self::BadRecordMac | Self::MacVerifyFailed
            | Self::PkDecryptionFailed => (A::BadRecordMac, Fatal),
            Self::ParsingError
            | Self::UnexpectedPacketLength
            | Self::NoCertificateFoundInChain
            | Self::HandshakeTooLarge => (A::DecodeError, Fatal),
            Self::IllegalParameter
            | Self::ReceivedDisallowedName
            | Self::PkInvalidPubkey
            | Self::KeyUsageViolation => (A::IllegalParameter, Fatal),
            Self::UnknownPskIdentity | Self::IllegalSrpUsername => (A::UnknownPSKIdentity, Fatal),
            Self::Asn1DerError | Self::CertificateError => (A::BadCertificate, Fatal),
            Self::NoCipherSuites | Self::NoCommonKeyShare | Self::EccNoSupportedCurves => {
                (A::HandshakeFailure, Fatal)
            }
            Self::Rehandshake | Self::UnsafeRenegotiationDenied => (A::NoRenegotiation, Warning),
            Self::UnexpectedPacket | Self::UnexpectedHandshakePacket => {
                (A::UnexpectedMessage, Fatal)
            }
            Self::UnsupportedVersionPacket => (A::ProtocolVersion, Fatal),
            Self::InappropriateFallback => (A::InappropriateFallback, Fatal),
            Self::NoApplicationProtocol => (A::NoApplicationProtocol, Fatal),
            Self::UnrecognizedName => (A::UnrecognisedName, Fatal),
            Self::CertificateRequired => (A::CertificateRequired, Fatal),
            Self::RecordOverflow => (A::RecordOverflow, Fatal),
            Self::InsufficientSecurity => (A::InsufficientSecurity, Fatal),
            Self::PkSigVerifyFailed => (A::DecryptError, Fatal),
            Self::MissingExtension => (A::MissingExtension, Fatal),
            _ if self.is_fatal() => (A::InternalError, Fatal),
            _ => return None,
        };
        Some(alert)
    }

    fn entry(&self) -> &'static ErrorEntry {
        ERROR_CATALOG
            .iter()
            .find(|e| e.code == *self)
            .expect("catalog covers every code")
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.strerror())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::enums::{AlertDescription, AlertLevel};

    const ALL_CODES: &[ErrorCode] = &[
        ErrorCode::Success,
        ErrorCode::InternalError,
        ErrorCode::MemoryError,
        ErrorCode::Again,
        ErrorCode::Interrupted,
        ErrorCode::LargePacket,
        ErrorCode::PushError,
        ErrorCode::PullError,
        ErrorCode::FileError,
        ErrorCode::ParsingError,
        ErrorCode::Asn1DerError,
        ErrorCode::Base64DecodingError,
        ErrorCode::UnexpectedPacket,
        ErrorCode::UnexpectedHandshakePacket,
        ErrorCode::UnexpectedPacketLength,
        ErrorCode::RecordOverflow,
        ErrorCode::PrematureTermination,
        ErrorCode::Rehandshake,
        ErrorCode::UnsupportedVersionPacket,
        ErrorCode::DecryptionFailed,
        ErrorCode::BadRecordMac,
        ErrorCode::MacVerifyFailed,
        ErrorCode::PkSigVerifyFailed,
        ErrorCode::PkDecryptionFailed,
        ErrorCode::RandomFailed,
        ErrorCode::InsufficientCredentials,
        ErrorCode::KeyUsageViolation,
        ErrorCode::InsufficientSecurity,
        ErrorCode::InappropriateFallback,
        ErrorCode::UnimplementedFeature,
        ErrorCode::UnsupportedCertificateType,
        ErrorCode::UserError,
        ErrorCode::TimedOut,
        ErrorCode::FatalAlertReceived,
        ErrorCode::WarningAlertReceived,
        ErrorCode::IllegalParameter,
        ErrorCode::ReceivedDisallowedName,
        ErrorCode::PkInvalidPubkey,
        ErrorCode::UnknownPskIdentity,
        ErrorCode::IllegalSrpUsername,
        ErrorCode::CertificateError,
        ErrorCode::NoCertificateFoundInChain,
        ErrorCode::NoCipherSuites,
        ErrorCode::NoCommonKeyShare,
        ErrorCode::EccNoSupportedCurves,
        ErrorCode::UnsafeRenegotiationDenied,
        ErrorCode::NoApplicationProtocol,
        ErrorCode::UnrecognizedName,
        ErrorCode::CertificateRequired,
        ErrorCode::NoCertificateFound,
        ErrorCode::CertificateKeyMismatch,
        ErrorCode::HandshakeTooLarge,
        ErrorCode::InvalidSession,
        ErrorCode::InvalidUtf8String,
        ErrorCode::HeartbeatPingReceived,
        ErrorCode::HeartbeatPongReceived,
        ErrorCode::ReauthRequest,
        ErrorCode::MissingExtension,
        ErrorCode::RecordLimitReached,
        ErrorCode::HandshakeNotComplete,
        ErrorCode::InvalidRequest,
        ErrorCode::ExpiredEntry,
        ErrorCode::HashFailed,
    ];

    #[test]
    fn every_code_has_name_and_description() {
        for code in ALL_CODES {
            assert!(code.strerror_name().starts_with("E_"), "{:?}", code);
            assert!(!code.strerror().is_empty(), "{:?}", code);
        }
    }

    #[test]
    fn fatality_matches_allowlist() {
        for code in ALL_CODES {
            assert_eq!(code.is_fatal(), !NON_FATAL.contains(code), "{:?}", code);
        }
        assert!(!ErrorCode::Success.is_fatal());
        assert!(!ErrorCode::Again.is_fatal());
        assert!(!ErrorCode::Rehandshake.is_fatal());
        assert!(ErrorCode::FatalAlertReceived.is_fatal());
        assert!(ErrorCode::BadRecordMac.is_fatal());
    }

    #[test]
    fn alert_mapping_rows() {
        use AlertDescription as A;
        let rows = [
            (ErrorCode::DecryptionFailed, A::BadRecordMac, AlertLevel::Fatal),
            (ErrorCode::MacVerifyFailed, A::BadRecordMac, AlertLevel::Fatal),
            (ErrorCode::UnexpectedPacketLength, A::DecodeError, AlertLevel::Fatal),
            (ErrorCode::HandshakeTooLarge, A::DecodeError, AlertLevel::Fatal),
            (ErrorCode::IllegalParameter, A::IllegalParameter, AlertLevel::Fatal),
            (ErrorCode::ReceivedDisallowedName, A::IllegalParameter, AlertLevel::Fatal),
            (ErrorCode::PkInvalidPubkey, A::IllegalParameter, AlertLevel::Fatal),
            (ErrorCode::UnknownPskIdentity, A::UnknownPSKIdentity, AlertLevel::Fatal),
            (ErrorCode::Asn1DerError, A::BadCertificate, AlertLevel::Fatal),
            (ErrorCode::CertificateError, A::BadCertificate, AlertLevel::Fatal),
            (ErrorCode::NoCipherSuites, A::HandshakeFailure, AlertLevel::Fatal),
            (ErrorCode::NoCommonKeyShare, A::HandshakeFailure, AlertLevel::Fatal),
            (ErrorCode::EccNoSupportedCurves, A::HandshakeFailure, AlertLevel::Fatal),
            (ErrorCode::Rehandshake, A::NoRenegotiation, AlertLevel::Warning),
            (ErrorCode::UnsafeRenegotiationDenied, A::NoRenegotiation, AlertLevel::Warning),
            (ErrorCode::UnexpectedPacket, A::UnexpectedMessage, AlertLevel::Fatal),
            (ErrorCode::UnsupportedVersionPacket, A::ProtocolVersion, AlertLevel::Fatal),
            (ErrorCode::InappropriateFallback, A::InappropriateFallback, AlertLevel::Fatal),
            (ErrorCode::NoApplicationProtocol, A::NoApplicationProtocol, AlertLevel::Fatal),
            (ErrorCode::UnrecognizedName, A::UnrecognisedName, AlertLevel::Fatal),
            (ErrorCode::CertificateRequired, A::CertificateRequired, AlertLevel::Fatal),
            (ErrorCode::InternalError, A::InternalError, AlertLevel::Fatal),
            (ErrorCode::TimedOut, A::InternalError, AlertLevel::Fatal),
        ];
        for (code, alert, level) in rows {
            assert_eq!(code.to_alert(), Some((alert, level)), "{:?}", code);
        }
    }

    #[test]
    fn non_fatal_codes_without_mapping_send_nothing() {
        assert_eq!(ErrorCode::Success.to_alert(), None);
        assert_eq!(ErrorCode::Again.to_alert(), None);
        assert_eq!(ErrorCode::Interrupted.to_alert(), None);
        assert_eq!(ErrorCode::HeartbeatPingReceived.to_alert(), None);
    }

    #[test]
    fn scenario_error_to_alert() {
        let (alert, level) = ErrorCode::DecryptionFailed.to_alert().unwrap();
        assert_eq!(alert.get_u8(), 20);
        assert_eq!(level, AlertLevel::Fatal);
    }

    #[test]
    fn rich_error_projection() {
        assert_eq!(Error::DecryptError.code(), ErrorCode::BadRecordMac);
        assert_eq!(
            Error::UnexpectedPacketLength.code(),
            ErrorCode::UnexpectedPacketLength
        );
        assert_eq!(
            Error::AlertReceived(AlertDescription::CloseNotify).code(),
            ErrorCode::FatalAlertReceived
        );
        assert!(Error::DecryptError.is_fatal());
        assert!(!Error::RehandshakeRequested.is_fatal());
    }
}

use crate::{
    codec::{Codec, Reader},
    msgs::enums::{AlertDescription, AlertLevel},
};

#[derive(Debug, Clone)]
pub struct AlertMessagePayload {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Codec for AlertMessagePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.level.encode(bytes);
        self.description.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let level = AlertLevel::read(r)?;
        let description = AlertDescription::read(r)?;

        Some(Self { level, description })
    }
}

/// One row of the alert catalog.
struct AlertEntry {
    desc: AlertDescription,
    strname: &'static str,
    name: &'static str,
}

static ALERT_CATALOG: &[AlertEntry] = &[
    AlertEntry { desc: AlertDescription::CloseNotify, strname: "A_CLOSE_NOTIFY", name: "Close notify" },
    AlertEntry { desc: AlertDescription::UnexpectedMessage, strname: "A_UNEXPECTED_MESSAGE", name: "Unexpected message" },
    AlertEntry { desc: AlertDescription::BadRecordMac, strname: "A_BAD_RECORD_MAC", name: "Bad record MAC" },
    AlertEntry { desc: AlertDescription::DecryptionFailed, strname: "A_DECRYPTION_FAILED", name: "Decryption failed" },
    AlertEntry { desc: AlertDescription::RecordOverflow, strname: "A_RECORD_OVERFLOW", name: "Record overflow" },
    AlertEntry { desc: AlertDescription::DecompressionFailure, strname: "A_DECOMPRESSION_FAILURE", name: "Decompression failed" },
    AlertEntry { desc: AlertDescription::HandshakeFailure, strname: "A_HANDSHAKE_FAILURE", name: "Handshake failed" },
    AlertEntry { desc: AlertDescription::NoCertificate, strname: "A_SSL3_NO_CERTIFICATE", name: "No certificate (SSL 3.0)" },
    AlertEntry { desc: AlertDescription::BadCertificate, strname: "A_BAD_CERTIFICATE", name: "Certificate is bad" },
    AlertEntry { desc: AlertDescription::UnsupportedCertificate, strname: "A_UNSUPPORTED_CERTIFICATE", name: "Certificate is not supported" },
    AlertEntry { desc: AlertDescription::CertificateRevoked, strname: "A_CERTIFICATE_REVOKED", name: "Certificate was revoked" },
    AlertEntry { desc: AlertDescription::CertificateExpired, strname: "A_CERTIFICATE_EXPIRED", name: "Certificate is expired" },
    AlertEntry { desc: AlertDescription::CertificateUnknown, strname: "A_CERTIFICATE_UNKNOWN", name: "Unknown certificate" },
    AlertEntry { desc: AlertDescription::IllegalParameter, strname: "A_ILLEGAL_PARAMETER", name: "Illegal parameter" },
    AlertEntry { desc: AlertDescription::UnknownCA, strname: "A_UNKNOWN_CA", name: "CA is unknown" },
    AlertEntry { desc: AlertDescription::AccessDenied, strname: "A_ACCESS_DENIED", name: "Access was denied" },
    AlertEntry { desc: AlertDescription::DecodeError, strname: "A_DECODE_ERROR", name: "Decode error" },
    AlertEntry { desc: AlertDescription::DecryptError, strname: "A_DECRYPT_ERROR", name: "Decrypt error" },
    AlertEntry { desc: AlertDescription::ExportRestriction, strname: "A_EXPORT_RESTRICTION", name: "Export restriction" },
    AlertEntry { desc: AlertDescription::ProtocolVersion, strname: "A_PROTOCOL_VERSION", name: "Error in protocol version" },
    AlertEntry { desc: AlertDescription::InsufficientSecurity, strname: "A_INSUFFICIENT_SECURITY", name: "Insufficient security" },
    AlertEntry { desc: AlertDescription::InternalError, strname: "A_INTERNAL_ERROR", name: "Internal error" },
    AlertEntry { desc: AlertDescription::InappropriateFallback, strname: "A_INAPPROPRIATE_FALLBACK", name: "Inappropriate fallback" },
    AlertEntry { desc: AlertDescription::UserCanceled, strname: "A_USER_CANCELED", name: "User canceled" },
    AlertEntry { desc: AlertDescription::NoRenegotiation, strname: "A_NO_RENEGOTIATION", name: "No renegotiation is allowed" },
    AlertEntry { desc: AlertDescription::MissingExtension, strname: "A_MISSING_EXTENSION", name: "An extension was expected but was not seen" },
    AlertEntry { desc: AlertDescription::UnsupportedExtension, strname: "A_UNSUPPORTED_EXTENSION", name: "An unsupported extension was sent" },
    AlertEntry { desc: AlertDescription::CertificateUnobtainable, strname: "A_CERTIFICATE_UNOBTAINABLE", name: "Could not retrieve the specified certificate" },
    AlertEntry { desc: AlertDescription::UnrecognisedName, strname: "A_UNRECOGNIZED_NAME", name: "The server name sent was not recognized" },
    AlertEntry { desc: AlertDescription::BadCertificateStatusResponse, strname: "A_BAD_CERTIFICATE_STATUS_RESPONSE", name: "The SCVP/OCSP response was invalid" },
    AlertEntry { desc: AlertDescription::BadCertificateHashValue, strname: "A_BAD_CERTIFICATE_HASH_VALUE", name: "The hash presented in the certificate did not verify" },
    AlertEntry { desc: AlertDescription::UnknownPSKIdentity, strname: "A_UNKNOWN_PSK_IDENTITY", name: "The SRP/PSK username is missing or not known" },
    AlertEntry { desc: AlertDescription::CertificateRequired, strname: "A_CERTIFICATE_REQUIRED", name: "Certificate is required" },
    AlertEntry { desc: AlertDescription::NoApplicationProtocol, strname: "A_NO_APPLICATION_PROTOCOL", name: "No supported application protocol could be negotiated" },
];

impl AlertDescription {
    /// Human-readable description of the alert, e.g. alert 20 yields
    /// "Bad record MAC".  Unknown alerts yield `None`.
    pub fn name(&self) -> Option<&'static str> {
        ALERT_CATALOG
            .iter()
            .find(|e| e.desc == *self)
            .map(|e| e.name)
    }

    /// Symbolic name of the alert sans library prefix, e.g. alert 20
    /// yields "A_BAD_RECORD_MAC".
    pub fn strname(&self) -> Option<&'static str> {
        ALERT_CATALOG
            .iter()
            .find(|e| e.desc == *self)
            .map(|e| e.strname)
    }
}

/// Catalog lookup by wire number.
pub fn alert_get_name(num: u8) -> Option<&'static str> {
    AlertDescription::from(num).name()
}

/// Catalog lookup by wire number, symbolic form.
pub fn alert_get_strname(num: u8) -> Option<&'static str> {
    AlertDescription::from(num).strname()
}

/// Reverse catalog lookup: symbolic name to alert.
pub fn alert_by_strname(name: &str) -> Option<AlertDescription> {
    ALERT_CATALOG
        .iter()
        .find(|e| e.strname == name)
        .map(|e| e.desc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_round_trip() {
        assert_eq!(alert_get_name(20), Some("Bad record MAC"));
        assert_eq!(alert_get_strname(20), Some("A_BAD_RECORD_MAC"));
        assert_eq!(alert_get_name(0), Some("Close notify"));
        assert_eq!(alert_get_name(0xfb), None);
        assert_eq!(
            alert_by_strname("A_BAD_RECORD_MAC"),
            Some(AlertDescription::BadRecordMac)
        );
        assert_eq!(alert_by_strname("A_NO_SUCH_ALERT"), None);
    }

    #[test]
    fn every_entry_has_text() {
        for e in ALERT_CATALOG {
            assert!(e.strname.starts_with("A_"));
            assert!(!e.name.is_empty());
        }
    }
}

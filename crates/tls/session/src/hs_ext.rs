//! The hello-extension engine: a static registry describing which
//! extensions we understand and where they may appear, plus the
//! supported-groups negotiation it drives.

use tls_core::{
    codec::{decode_u16, Reader},
    msgs::enums::{ExtensionType, HandshakeType, NamedGroup},
    Error,
};

use crate::kx::SupportedKxGroup;

/// A static description of one hello extension.
pub(crate) struct ExtensionDescriptor {
    pub(crate) ext_type: ExtensionType,
    pub(crate) name: &'static str,
    /// The handshake messages this extension may ride in.
    pub(crate) messages: &'static [HandshakeType],
    /// Extensions the library owns outright: application code cannot
    /// replace their handling.
    pub(crate) cannot_be_overridden: bool,
}

use HandshakeType::{
    Certificate, CertificateRequest, ClientHello, EncryptedExtensions, HelloRetryRequest,
    NewSessionTicket, ServerHello,
};

pub(crate) static EXTENSION_REGISTRY: &[ExtensionDescriptor] = &[
    ExtensionDescriptor {
        ext_type: ExtensionType::ServerName,
        name: "server_name",
        messages: &[ClientHello, ServerHello, EncryptedExtensions],
        cannot_be_overridden: false,
    },
    ExtensionDescriptor {
        ext_type: ExtensionType::StatusRequest,
        name: "status_request",
        messages: &[ClientHello, ServerHello, Certificate],
        cannot_be_overridden: false,
    },
    ExtensionDescriptor {
        ext_type: ExtensionType::EllipticCurves,
        name: "supported_groups",
        messages: &[ClientHello, EncryptedExtensions],
        cannot_be_overridden: true,
    },
    ExtensionDescriptor {
        ext_type: ExtensionType::ECPointFormats,
        name: "ec_point_formats",
        messages: &[ClientHello, ServerHello],
        cannot_be_overridden: false,
    },
    ExtensionDescriptor {
        ext_type: ExtensionType::SignatureAlgorithms,
        name: "signature_algorithms",
        messages: &[ClientHello, CertificateRequest],
        cannot_be_overridden: true,
    },
    ExtensionDescriptor {
        ext_type: ExtensionType::ALProtocolNegotiation,
        name: "application_layer_protocol_negotiation",
        messages: &[ClientHello, ServerHello, EncryptedExtensions],
        cannot_be_overridden: false,
    },
    ExtensionDescriptor {
        ext_type: ExtensionType::ExtendedMasterSecret,
        name: "extended_master_secret",
        messages: &[ClientHello, ServerHello],
        cannot_be_overridden: false,
    },
    ExtensionDescriptor {
        ext_type: ExtensionType::SessionTicket,
        name: "session_ticket",
        messages: &[ClientHello, ServerHello, NewSessionTicket],
        cannot_be_overridden: false,
    },
    ExtensionDescriptor {
        ext_type: ExtensionType::SupportedVersions,
        name: "supported_versions",
        messages: &[ClientHello, ServerHello, HelloRetryRequest],
        cannot_be_overridden: true,
    },
    ExtensionDescriptor {
        ext_type: ExtensionType::PSKKeyExchangeModes,
        name: "psk_key_exchange_modes",
        messages: &[ClientHello],
        cannot_be_overridden: true,
    },
    ExtensionDescriptor {
        ext_type: ExtensionType::KeyShare,
        name: "key_share",
        messages: &[ClientHello, ServerHello, HelloRetryRequest],
        cannot_be_overridden: true,
    },
    ExtensionDescriptor {
        ext_type: ExtensionType::Cookie,
        name: "cookie",
        messages: &[ClientHello, HelloRetryRequest],
        cannot_be_overridden: true,
    },
    ExtensionDescriptor {
        ext_type: ExtensionType::RenegotiationInfo,
        name: "renegotiation_info",
        messages: &[ClientHello, ServerHello],
        cannot_be_overridden: true,
    },
];

pub(crate) fn descriptor_for(ext_type: ExtensionType) -> Option<&'static ExtensionDescriptor> {
    EXTENSION_REGISTRY.iter().find(|d| d.ext_type == ext_type)
}

/// True when a known extension appears in a message it may not ride
/// in.  Unknown extensions are always tolerated; they are someone
/// else's business.
pub(crate) fn misplaced_in(ext_type: ExtensionType, msg: HandshakeType) -> bool {
    match descriptor_for(ext_type) {
        Some(desc) => !desc.messages.contains(&msg),
        None => false,
    }
}

/// The supported-groups negotiation (RFC 7919 / RFC 8422).
///
/// Maintains one candidate per group family while the peer's list is
/// read, then publishes a single elected group, preferring the
/// elliptic family.
pub(crate) struct GroupNegotiation {
    kx_groups: Vec<&'static SupportedKxGroup>,
    server_precedence: bool,
    min_dh_bits: usize,

    pub(crate) dh_candidate: Option<NamedGroup>,
    pub(crate) ec_candidate: Option<NamedGroup>,
    /// Set when the peer offered any FFDHE group at all, supported or
    /// not.
    pub(crate) ffdhe_offered: bool,
}

impl GroupNegotiation {
    pub(crate) fn new(
        kx_groups: &[&'static SupportedKxGroup],
        server_precedence: bool,
        min_dh_bits: usize,
    ) -> Self {
        Self {
            kx_groups: kx_groups.to_vec(),
            server_precedence,
            min_dh_bits,
            dh_candidate: None,
            ec_candidate: None,
            ffdhe_offered: false,
        }
    }

    /// Consume the raw extension body: a 2-byte length-prefixed list
    /// of 16-bit group ids.
    pub(crate) fn receive_raw(&mut self, body: &[u8]) -> Result<(), Error> {
        let mut r = Reader::init(body);
        let len = r
            .take(2)
            .and_then(decode_u16)
            .ok_or(Error::UnexpectedPacketLength)? as usize;

        if len != r.left() || len % 2 != 0 {
            return Err(Error::UnexpectedPacketLength);
        }

        let mut offered = Vec::with_capacity(len / 2);
        while r.any_left() {
            let id = r
                .take(2)
                .and_then(decode_u16)
                .ok_or(Error::UnexpectedPacketLength)?;
            offered.push(NamedGroup::from(id));
        }

        self.receive(&offered)
    }

    /// Consume the peer's offered list in its preference order.
    pub(crate) fn receive(&mut self, offered: &[NamedGroup]) -> Result<(), Error> {
        let mut dh_offers = Vec::new();
        let mut ec_offers = Vec::new();

        for group in offered {
            if group.is_ffdhe() {
                self.ffdhe_offered = true;
            }

            // skip ids we have no descriptor for
            let known = self.kx_groups.iter().any(|g| g.name == *group);
            if !known {
                continue;
            }

            if group.is_ffdhe() {
                // skip DH groups with primes below the floor
                if group.bits().unwrap_or(0) < self.min_dh_bits {
                    continue;
                }
                dh_offers.push(*group);
            } else {
                ec_offers.push(*group);
            }
        }

        self.dh_candidate = self.elect(&dh_offers);
        self.ec_candidate = self.elect(&ec_offers);
        Ok(())
    }

    fn elect(&self, offers: &[NamedGroup]) -> Option<NamedGroup> {
        if self.server_precedence {
            self.kx_groups
                .iter()
                .map(|g| g.name)
                .find(|name| offers.contains(name))
        } else {
            offers.first().copied()
        }
    }

    /// The elected group: the elliptic candidate when present,
    /// otherwise the finite-field one.
    pub(crate) fn cand_group(&self) -> Option<NamedGroup> {
        self.ec_candidate.or(self.dh_candidate)
    }

    /// The list to emit in our own hello, in preference order.
    pub(crate) fn send(&self) -> Vec<NamedGroup> {
        self.kx_groups.iter().map(|g| g.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kx::{FFDHE2048, SECP256R1, X25519};

    fn engine(server_precedence: bool) -> GroupNegotiation {
        GroupNegotiation::new(&[&X25519, &SECP256R1, &FFDHE2048], server_precedence, 1024)
    }

    #[test]
    fn elects_both_families_and_prefers_ec() {
        let mut neg = engine(false);
        neg.receive(&[NamedGroup::FFDHE2048, NamedGroup::secp256r1])
            .unwrap();
        assert_eq!(neg.dh_candidate, Some(NamedGroup::FFDHE2048));
        assert_eq!(neg.ec_candidate, Some(NamedGroup::secp256r1));
        assert_eq!(neg.cand_group(), Some(NamedGroup::secp256r1));
        assert!(neg.ffdhe_offered);
    }

    #[test]
    fn client_preference_order_wins_by_default() {
        let mut neg = engine(false);
        neg.receive(&[NamedGroup::secp256r1, NamedGroup::X25519])
            .unwrap();
        assert_eq!(neg.cand_group(), Some(NamedGroup::secp256r1));
    }

    #[test]
    fn server_precedence_overrides_client_order() {
        let mut neg = engine(true);
        neg.receive(&[NamedGroup::secp256r1, NamedGroup::X25519])
            .unwrap();
        assert_eq!(neg.cand_group(), Some(NamedGroup::X25519));
    }

    #[test]
    fn unknown_ids_are_skipped_silently() {
        let mut neg = engine(false);
        neg.receive(&[
            NamedGroup::Unknown(0x4242),
            NamedGroup::secp521r1,
            NamedGroup::X25519,
        ])
        .unwrap();
        assert_eq!(neg.cand_group(), Some(NamedGroup::X25519));
        assert!(!neg.ffdhe_offered);
    }

    #[test]
    fn small_dh_groups_are_skipped() {
        let mut neg = GroupNegotiation::new(&[&X25519, &FFDHE2048], false, 3072);
        neg.receive(&[NamedGroup::FFDHE2048]).unwrap();
        assert_eq!(neg.dh_candidate, None);
        assert!(neg.ffdhe_offered);
    }

    #[test]
    fn raw_body_round_trip() {
        let mut neg = engine(false);
        // [secp256r1, X25519] as a wire list
        neg.receive_raw(&[0x00, 0x04, 0x00, 0x17, 0x00, 0x1d]).unwrap();
        assert_eq!(neg.cand_group(), Some(NamedGroup::secp256r1));
    }

    #[test]
    fn odd_length_list_is_rejected() {
        let mut neg = engine(false);
        assert!(matches!(
            neg.receive_raw(&[0x00, 0x03, 0x00, 0x17, 0x00]),
            Err(Error::UnexpectedPacketLength)
        ));
        // inner length disagreeing with the body is also a length error
        assert!(matches!(
            neg.receive_raw(&[0x00, 0x06, 0x00, 0x17]),
            Err(Error::UnexpectedPacketLength)
        ));
    }

    #[test]
    fn registry_marks_group_engine_unoverridable() {
        let desc = descriptor_for(ExtensionType::EllipticCurves).unwrap();
        assert!(desc.cannot_be_overridden);
        assert_eq!(desc.name, "supported_groups");
        assert!(!misplaced_in(ExtensionType::EllipticCurves, ClientHello));
        assert!(misplaced_in(ExtensionType::EllipticCurves, ServerHello));
    }
}

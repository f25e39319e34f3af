#[cfg(feature = "logging")]
use crate::log::{debug, trace};
use std::sync::Arc;

use tls_core::{
    dns::ServerName,
    msgs::{
        enums::{
            CipherSuite, Compression, ECPointFormat, ExtensionType, HandshakeType,
            PSKKeyExchangeMode, ProtocolVersion,
        },
        handshake::{
            ClientExtension, ClientHelloPayload, ConvertProtocolNameList, HandshakeMessagePayload,
            HandshakePayload, HelloRetryRequest, KeyShareEntry, ProtocolNameList, Random,
            ServerHelloPayload, SessionID,
        },
        message::{Message, MessagePayload},
    },
    Error,
};

use crate::{
    check::inappropriate_handshake_message,
    client::{ClientConfig, ClientConnectionData},
    conn::{CommonState, ConnectionRandoms, Context, State},
    hash_hs::HandshakeHashBuffer,
    hs_ext::GroupNegotiation,
    kx::KeyExchange,
};

pub(super) type NextState = Box<dyn State<ClientConnectionData>>;
pub(super) type NextStateOrError = Result<NextState, Error>;

fn find_session_suite(
    config: &ClientConfig,
    suite: CipherSuite,
    version: ProtocolVersion,
) -> Result<tls_core::suites::SupportedCipherSuite, Error> {
    match config.find_cipher_suite(suite) {
        Some(scs) if scs.version().version == version => Ok(scs),
        _ => Err(Error::HandshakeFailure(
            "server chose an unofferable ciphersuite".into(),
        )),
    }
}

pub(crate) fn start_handshake(
    server_name: ServerName,
    config: Arc<ClientConfig>,
    common: &mut CommonState,
    _data: &mut ClientConnectionData,
) -> Result<Box<dyn State<ClientConnectionData>>, Error> {
    let support_tls12 = config.supports_version(ProtocolVersion::TLSv1_2);
    let support_tls13 = config.supports_version(ProtocolVersion::TLSv1_3);

    let random = Random::new()?;
    let session_id = SessionID::random()?;

    // Generate our first key share from the preferred elliptic group;
    // HelloRetryRequest switches it if the server wants another.
    let offered_key_share = if support_tls13 {
        let skxg = config
            .kx_groups
            .iter()
            .find(|g| g.has_ec_backend())
            .ok_or_else(|| Error::General("no elliptic kx group configured".into()))?;
        Some(KeyExchange::start(skxg).ok_or(Error::FailedToGetRandomBytes)?)
    } else {
        None
    };

    let ch = build_client_hello(
        &config,
        &server_name,
        &random,
        &session_id,
        offered_key_share.as_ref(),
        None,
    );

    let sent_extensions = match &ch.payload {
        MessagePayload::Handshake(HandshakeMessagePayload {
            payload: HandshakePayload::ClientHello(chp),
            ..
        }) => chp.extensions.iter().map(|ext| ext.get_type()).collect(),
        _ => unreachable!(),
    };

    let mut transcript_buffer = HandshakeHashBuffer::new();
    transcript_buffer.add_message(&ch);

    trace!("Sending ClientHello {:#?}", ch);
    common.send_msg(ch, false)?;

    Ok(Box::new(ExpectServerHello {
        config,
        server_name,
        random,
        session_id,
        sent_extensions,
        offered_key_share,
        transcript_buffer,
        retried: false,
    }))
}

fn build_client_hello(
    config: &ClientConfig,
    server_name: &ServerName,
    random: &Random,
    session_id: &SessionID,
    key_share: Option<&KeyExchange>,
    cookie: Option<tls_core::msgs::base::PayloadU16>,
) -> Message {
    let support_tls12 = config.supports_version(ProtocolVersion::TLSv1_2);
    let support_tls13 = config.supports_version(ProtocolVersion::TLSv1_3);

    let groups = GroupNegotiation::new(&config.kx_groups, false, config.min_dh_bits);

    let mut exts = vec![
        ClientExtension::ECPointFormats(vec![ECPointFormat::Uncompressed]),
        ClientExtension::NamedGroups(groups.send()),
        ClientExtension::SignatureAlgorithms(config.verifier.supported_verify_schemes()),
        ClientExtension::CertificateStatusRequest(
            tls_core::msgs::handshake::CertificateStatusRequest::build_ocsp(),
        ),
        ClientExtension::RenegotiationInfo(tls_core::msgs::base::PayloadU8::empty()),
    ];

    if let (true, Some(dns)) = (config.enable_sni, server_name.for_sni()) {
        exts.push(ClientExtension::make_sni(dns));
    }

    if support_tls13 {
        let mut versions = vec![ProtocolVersion::TLSv1_3];
        if support_tls12 {
            versions.push(ProtocolVersion::TLSv1_2);
        }
        exts.push(ClientExtension::SupportedVersions(versions));

        if let Some(kx) = key_share {
            exts.push(ClientExtension::KeyShare(vec![KeyShareEntry::new(
                kx.group().expect("elliptic shares are named"),
                &kx.pubkey,
            )]));
        }
        exts.push(ClientExtension::PresharedKeyModes(vec![
            PSKKeyExchangeMode::PSK_DHE_KE,
        ]));
    }

    if let Some(cookie) = cookie {
        exts.push(ClientExtension::Cookie(cookie));
    }

    if support_tls12 {
        exts.push(ClientExtension::ExtendedMasterSecretRequest);
    }

    if !config.alpn_protocols.is_empty() {
        exts.push(ClientExtension::Protocols(ProtocolNameList::from_slices(
            &config
                .alpn_protocols
                .iter()
                .map(|proto| proto.as_slice())
                .collect::<Vec<_>>(),
        )));
    }

    let mut cipher_suites: Vec<CipherSuite> =
        config.cipher_suites.iter().map(|cs| cs.suite()).collect();
    cipher_suites.push(CipherSuite::TLS_EMPTY_RENEGOTIATION_INFO_SCSV);
    if config.send_fallback_scsv {
        cipher_suites.push(CipherSuite::TLS_FALLBACK_SCSV);
    }

    let chp = HandshakeMessagePayload {
        typ: HandshakeType::ClientHello,
        payload: HandshakePayload::ClientHello(ClientHelloPayload {
            client_version: ProtocolVersion::TLSv1_2,
            random: *random,
            session_id: *session_id,
            cipher_suites,
            compression_methods: vec![Compression::Null],
            extensions: exts,
        }),
    };

    Message {
        version: ProtocolVersion::TLSv1_0,
        payload: MessagePayload::Handshake(chp),
    }
}

/// Send the post-HelloRetryRequest hello, echoing the server's cookie
/// and carrying the replacement key share.
fn emit_retried_client_hello(
    cx: &mut Context<'_, ClientConnectionData>,
    config: &ClientConfig,
    server_name: &ServerName,
    random: &Random,
    session_id: &SessionID,
    new_share: &KeyExchange,
    hrr: &HelloRetryRequest,
) -> Result<Message, Error> {
    let ch = build_client_hello(
        config,
        server_name,
        random,
        session_id,
        Some(new_share),
        hrr.get_cookie().cloned(),
    );

    trace!("Sending retried ClientHello {:#?}", ch);
    cx.common.send_msg(ch.clone(), false)?;
    Ok(ch)
}

pub(super) struct ExpectServerHello {
    pub(super) config: Arc<ClientConfig>,
    pub(super) server_name: ServerName,
    pub(super) random: Random,
    pub(super) session_id: SessionID,
    pub(super) sent_extensions: Vec<ExtensionType>,
    pub(super) offered_key_share: Option<KeyExchange>,
    pub(super) transcript_buffer: HandshakeHashBuffer,
    pub(super) retried: bool,
}

impl ExpectServerHello {
    fn handle_server_hello(
        mut self,
        cx: &mut Context<'_, ClientConnectionData>,
        server_hello: &ServerHelloPayload,
        msg: &Message,
    ) -> NextStateOrError {
        if server_hello.compression_method != Compression::Null {
            return Err(cx
                .common
                .illegal_param("server chose non-Null compression"));
        }

        if server_hello.has_duplicate_extension() {
            cx.common
                .send_fatal_alert(tls_core::msgs::enums::AlertDescription::DecodeError);
            return Err(Error::PeerMisbehavedError("server sent duplicate extensions".into()));
        }

        // Extensions we didn't solicit may not appear, except
        // renegotiation_info, which RFC5746 lets the server volunteer.
        let allowed_unsolicited = [ExtensionType::RenegotiationInfo];
        if server_hello
            .extensions
            .iter()
            .map(|ext| ext.get_type())
            .any(|typ| !self.sent_extensions.contains(&typ) && !allowed_unsolicited.contains(&typ))
        {
            cx.common
                .send_fatal_alert(tls_core::msgs::enums::AlertDescription::UnsupportedExtension);
            return Err(Error::PeerMisbehavedError("server sent unsolicited extension".into()));
        }

        let version = match server_hello.get_supported_versions() {
            Some(ProtocolVersion::TLSv1_3)
                if self.config.supports_version(ProtocolVersion::TLSv1_3) =>
            {
                ProtocolVersion::TLSv1_3
            }
            Some(_) => {
                return Err(cx
                    .common
                    .illegal_param("server chose unusable version in supported_versions"));
            }
            None if server_hello.legacy_version == ProtocolVersion::TLSv1_2
                && self.config.supports_version(ProtocolVersion::TLSv1_2) =>
            {
                ProtocolVersion::TLSv1_2
            }
            None => {
                return Err(Error::PeerIncompatibleError(
                    "server does not support any offered version".into(),
                ));
            }
        };

        let suite = find_session_suite(&self.config, server_hello.cipher_suite, version)?;

        debug!("Using ciphersuite {:?}", suite);
        cx.common.negotiated_version = Some(version);
        cx.common.suite = Some(suite);

        let mut transcript = self
            .transcript_buffer
            .start_hash(suite.hash_algorithm());
        transcript.add_message(msg);

        let randoms = ConnectionRandoms::new(self.random, server_hello.random);

        match version {
            ProtocolVersion::TLSv1_3 => {
                let suite13 = suite.tls13().expect("checked by find_session_suite");
                let key_share = self
                    .offered_key_share
                    .take()
                    .expect("offered for tls13");
                super::tls13::handle_server_hello(
                    self.config,
                    cx,
                    server_hello,
                    self.server_name,
                    randoms,
                    suite13,
                    transcript,
                    key_share,
                )
            }
            #[cfg(feature = "tls12")]
            ProtocolVersion::TLSv1_2 => {
                let suite12 = suite.tls12().expect("checked by find_session_suite");
                super::tls12::begin(
                    self.config,
                    cx,
                    server_hello,
                    self.server_name,
                    randoms,
                    suite12,
                    transcript,
                )
            }
            #[cfg(not(feature = "tls12"))]
            _ => Err(Error::PeerIncompatibleError("TLS1.2 is disabled".into())),
            #[cfg(feature = "tls12")]
            _ => unreachable!(),
        }
    }

    fn handle_hello_retry(
        mut self,
        cx: &mut Context<'_, ClientConnectionData>,
        hrr: &HelloRetryRequest,
        msg: &Message,
    ) -> NextStateOrError {
        trace!("Got HelloRetryRequest {:#?}", hrr);

        // A second retry is never legal.
        if self.retried {
            return Err(cx
                .common
                .illegal_param("server sent two HelloRetryRequests"));
        }

        if hrr.has_duplicate_extension() {
            return Err(cx.common.illegal_param("server sent duplicate hrr extensions"));
        }

        if hrr.get_supported_versions() != Some(ProtocolVersion::TLSv1_3) {
            return Err(cx
                .common
                .illegal_param("server requested retry for unsupported version"));
        }

        let group = match hrr.get_requested_key_share_group() {
            Some(group) => group,
            None => {
                return Err(cx.common.illegal_param("hrr did not request a new group"));
            }
        };

        // The request must actually change something.
        if Some(group) == self.offered_key_share.as_ref().and_then(|kx| kx.group()) {
            return Err(cx
                .common
                .illegal_param("server requested the group we already offered"));
        }

        let skxg = match KeyExchange::choose(group, &self.config.kx_groups) {
            Some(skxg) if skxg.has_ec_backend() => skxg,
            _ => {
                return Err(cx.common.illegal_param("server requested unsupported group"));
            }
        };

        let new_share = KeyExchange::start(skxg).ok_or(Error::FailedToGetRandomBytes)?;

        // The transcript restarts with a synthetic message_hash of
        // the first hello.
        let suite = find_session_suite(
            &self.config,
            hrr.cipher_suite,
            ProtocolVersion::TLSv1_3,
        )?;
        let mut transcript = {
            let buffer =
                std::mem::replace(&mut self.transcript_buffer, HandshakeHashBuffer::new());
            let mut hash = buffer.start_hash(suite.hash_algorithm());
            hash.rollup_for_hrr();
            hash.add_message(msg);
            hash
        };

        // Re-issue the hello with the new share; everything else is
        // unchanged.
        let retry_hello = emit_retried_client_hello(
            cx,
            &self.config,
            &self.server_name,
            &self.random,
            &self.session_id,
            &new_share,
            hrr,
        )?;
        transcript.add_message(&retry_hello);

        Ok(Box::new(ExpectServerHelloAfterRetry {
            inner: ExpectServerHello {
                offered_key_share: Some(new_share),
                retried: true,
                ..self
            },
            transcript,
        }))
    }
}

impl State<ClientConnectionData> for ExpectServerHello {
    fn handle(
        self: Box<Self>,
        cx: &mut Context<'_, ClientConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        match m.payload {
            MessagePayload::Handshake(HandshakeMessagePayload {
                payload: HandshakePayload::ServerHello(ref server_hello),
                ..
            }) => {
                trace!("Got ServerHello {:#?}", server_hello);
                let msg = m.clone();
                (*self).handle_server_hello(cx, server_hello, &msg)
            }
            MessagePayload::Handshake(HandshakeMessagePayload {
                payload: HandshakePayload::HelloRetryRequest(ref hrr),
                ..
            }) => {
                let msg = m.clone();
                (*self).handle_hello_retry(cx, hrr, &msg)
            }
            _ => Err(inappropriate_handshake_message(
                &m,
                &[HandshakeType::ServerHello, HandshakeType::HelloRetryRequest],
            )),
        }
    }
}

/// After a HelloRetryRequest the transcript is already running; the
/// next ServerHello joins it instead of starting one.
struct ExpectServerHelloAfterRetry {
    inner: ExpectServerHello,
    transcript: crate::hash_hs::HandshakeHash,
}

impl State<ClientConnectionData> for ExpectServerHelloAfterRetry {
    fn handle(
        self: Box<Self>,
        cx: &mut Context<'_, ClientConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        let server_hello = require_handshake_msg!(
            m,
            HandshakeType::ServerHello,
            HandshakePayload::ServerHello
        )?;
        trace!("Got ServerHello (after retry) {:#?}", server_hello);

        let inner = self.inner;

        if server_hello.compression_method != Compression::Null {
            return Err(cx.common.illegal_param("server chose non-Null compression"));
        }

        if server_hello.get_supported_versions() != Some(ProtocolVersion::TLSv1_3) {
            return Err(cx
                .common
                .illegal_param("server changed its mind about the version"));
        }

        let suite = find_session_suite(
            &inner.config,
            server_hello.cipher_suite,
            ProtocolVersion::TLSv1_3,
        )?;
        let suite13 = suite.tls13().expect("tls13 suite");

        cx.common.negotiated_version = Some(ProtocolVersion::TLSv1_3);
        cx.common.suite = Some(suite);

        let mut transcript = self.transcript;
        transcript.add_message(&m);

        let randoms = ConnectionRandoms::new(inner.random, server_hello.random);

        super::tls13::handle_server_hello(
            inner.config,
            cx,
            server_hello,
            inner.server_name,
            randoms,
            suite13,
            transcript,
            inner.offered_key_share.expect("kept across retry"),
        )
    }
}

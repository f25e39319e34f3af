#[cfg(feature = "logging")]
use crate::log::trace;
use std::sync::Arc;
use std::time::SystemTime;

use ring::constant_time;
use tls_core::{
    key::Certificate,
    msgs::{
        base::{Payload, PayloadU8},
        ccs::ChangeCipherSpecPayload,
        enums::{
            AlertDescription, HandshakeType, KeyUpdateRequest, NamedGroup, ProtocolVersion,
            SignatureScheme,
        },
        handshake::{
            CertReqExtension, CertificateEntry, CertificatePayloadTLS13,
            CertificateRequestPayloadTLS13, CertificateStatus, CertificateExtension,
            ClientHelloPayload, DigitallySignedStruct, HandshakeMessagePayload, HandshakePayload,
            HelloRetryExtension, HelloRetryRequest, KeyShareEntry, Random, ServerExtension,
            ServerHelloPayload,
        },
        message::{Message, MessagePayload},
    },
    suites::Tls13CipherSuite,
    verify, Error,
};

use crate::{
    check::inappropriate_handshake_message,
    cipher::{new_tls13_decrypter, new_tls13_encrypter},
    conn::{CommonState, Context, State},
    hash_hs::{HandshakeHash, HandshakeHashBuffer},
    key_schedule::{derive_traffic_keys, KeySchedule},
    kx::KeyExchange,
    server::{
        hs::{ExpectClientHello, Negotiated, NextStateOrError},
        ServerConfig, ServerConnectionData,
    },
};

fn install_read_keys(common: &mut CommonState, suite: &'static Tls13CipherSuite, secret: &[u8]) {
    let keys = derive_traffic_keys(suite.hash_algorithm(), suite.common.aead_algorithm, secret);
    common
        .record_layer
        .set_message_decrypter(new_tls13_decrypter(suite, &keys.key, &keys.iv));
}

fn install_write_keys(common: &mut CommonState, suite: &'static Tls13CipherSuite, secret: &[u8]) {
    let keys = derive_traffic_keys(suite.hash_algorithm(), suite.common.aead_algorithm, secret);
    common
        .record_layer
        .set_message_encrypter(new_tls13_encrypter(suite, &keys.key, &keys.iv));
}

/// The signature schemes TLS 1.3 permits in CertificateVerify.
fn tls13_sigschemes(offered: &[SignatureScheme]) -> Vec<SignatureScheme> {
    offered
        .iter()
        .copied()
        .filter(|scheme| {
            matches!(
                scheme,
                SignatureScheme::ECDSA_NISTP256_SHA256
                    | SignatureScheme::ECDSA_NISTP384_SHA384
                    | SignatureScheme::ED25519
                    | SignatureScheme::RSA_PSS_SHA256
                    | SignatureScheme::RSA_PSS_SHA384
                    | SignatureScheme::RSA_PSS_SHA512
            )
        })
        .collect()
}

pub(super) fn handle_client_hello(
    config: Arc<ServerConfig>,
    cx: &mut Context<'_, ServerConnectionData>,
    client_hello: &ClientHelloPayload,
    chm: &Message,
    negotiated: Negotiated,
    transcript_buffer: HandshakeHashBuffer,
    retried: Option<(NamedGroup, HandshakeHash)>,
) -> NextStateOrError {
    let suite = negotiated
        .suite
        .tls13()
        .expect("version selection picked a tls13 suite");

    let shares = client_hello.get_keyshare_extension().ok_or_else(|| {
        cx.common
            .send_fatal_alert(AlertDescription::MissingExtension);
        Error::PeerIncompatibleError("client did not offer key shares".to_string())
    })?;

    // Find a share for a group we can run, our preference order.
    let usable_share = config
        .kx_groups
        .iter()
        .filter(|skxg| skxg.has_ec_backend())
        .find_map(|skxg| {
            shares
                .iter()
                .find(|share| share.group == skxg.name)
                .map(|share| (*skxg, share))
        });

    let (skxg, their_share) = match usable_share {
        Some(found) => found,
        None => {
            // No usable share.  If we could agree on a group, ask for
            // it with a HelloRetryRequest; a second miss is fatal.
            if retried.is_some() {
                return Err(Error::HandshakeFailure(
                    "no common key share after retry".to_string(),
                ));
            }

            let offered_groups = client_hello.get_namedgroups_extension().unwrap_or(&[]);
            let wanted = config
                .kx_groups
                .iter()
                .filter(|skxg| skxg.has_ec_backend())
                .map(|skxg| skxg.name)
                .find(|name| offered_groups.contains(name));

            let wanted = match wanted {
                Some(group) => group,
                None => {
                    return Err(Error::HandshakeFailure(
                        "no common key share group".to_string(),
                    ))
                }
            };

            return emit_hello_retry_request(
                config,
                cx,
                client_hello,
                chm,
                suite,
                transcript_buffer,
                wanted,
            );
        }
    };

    if let Some((requested_group, _)) = &retried {
        if *requested_group != their_share.group {
            return Err(cx
                .common
                .illegal_param("client ignored our HelloRetryRequest group"));
        }
    }

    let mut transcript = match retried {
        Some((_, transcript)) => transcript,
        None => transcript_buffer.start_hash(suite.hash_algorithm()),
    };
    transcript.add_message(chm);

    // Run our half of the exchange.
    let our_share =
        KeyExchange::start(skxg).ok_or(Error::FailedToGetRandomBytes)?;
    let our_public = our_share.pubkey.clone();
    let shared = our_share.complete(&their_share.payload.0, |secret| Ok(secret.to_vec()))?;

    let randoms_server = Random::new()?;

    let sh = Message {
        version: ProtocolVersion::TLSv1_2,
        payload: MessagePayload::Handshake(HandshakeMessagePayload {
            typ: HandshakeType::ServerHello,
            payload: HandshakePayload::ServerHello(ServerHelloPayload {
                legacy_version: ProtocolVersion::TLSv1_2,
                random: randoms_server,
                session_id: client_hello.session_id,
                cipher_suite: suite.common.suite,
                compression_method: tls_core::msgs::enums::Compression::Null,
                extensions: vec![
                    ServerExtension::KeyShare(KeyShareEntry::new(skxg.name, &our_public)),
                    ServerExtension::SupportedVersions(ProtocolVersion::TLSv1_3),
                ],
            }),
        }),
    };
    trace!("sending serverhello {:?}", sh);
    transcript.add_message(&sh);
    cx.common.send_msg(sh, false)?;

    // Middlebox compatibility.
    cx.common.send_msg(
        Message {
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::ChangeCipherSpec(ChangeCipherSpecPayload),
        },
        false,
    )?;

    let mut key_schedule = KeySchedule::new(suite.hash_algorithm(), None);
    key_schedule.input_shared_secret(&shared);

    let hs_hash = transcript.get_current_hash();
    let client_hs_secret = key_schedule.derive_secret(b"c hs traffic", hs_hash.as_ref());
    let server_hs_secret = key_schedule.derive_secret(b"s hs traffic", hs_hash.as_ref());

    install_write_keys(cx.common, suite, &server_hs_secret);
    install_read_keys(cx.common, suite, &client_hs_secret);

    // EncryptedExtensions
    let mut ee_exts = Vec::new();
    if let Some(proto) = &negotiated.alpn {
        ee_exts.push(ServerExtension::make_alpn(&[proto.as_slice()]));
    }
    if cx.data.sni.is_some() {
        ee_exts.push(ServerExtension::ServerNameAck);
    }
    let ee = Message {
        version: ProtocolVersion::TLSv1_3,
        payload: MessagePayload::Handshake(HandshakeMessagePayload {
            typ: HandshakeType::EncryptedExtensions,
            payload: HandshakePayload::EncryptedExtensions(ee_exts),
        }),
    };
    transcript.add_message(&ee);
    cx.common.send_msg(ee, true)?;

    // Optionally ask for a client certificate.
    let client_auth_offered = config.verifier.offer_client_auth();
    if client_auth_offered {
        let cr = Message {
            version: ProtocolVersion::TLSv1_3,
            payload: MessagePayload::Handshake(HandshakeMessagePayload {
                typ: HandshakeType::CertificateRequest,
                payload: HandshakePayload::CertificateRequestTLS13(
                    CertificateRequestPayloadTLS13 {
                        context: PayloadU8::empty(),
                        extensions: vec![CertReqExtension::SignatureAlgorithms(
                            verify::default_supported_verify_schemes(),
                        )],
                    },
                ),
            }),
        };
        transcript.add_message(&cr);
        cx.common.send_msg(cr, true)?;
    }

    // Certificate
    let cert = negotiated.cert.as_ref().expect("tls13 requires a chain");
    let mut entries: Vec<CertificateEntry> = cert
        .cert
        .iter()
        .map(|c| CertificateEntry::new(c.clone()))
        .collect();
    if client_hello.ocsp_stapling_offered() {
        if let (Some(entry), Some(ocsp)) = (entries.first_mut(), &cert.ocsp) {
            entry.exts.push(CertificateExtension::CertificateStatus(
                CertificateStatus::new(ocsp.clone()),
            ));
        }
    }
    let cert_msg = Message {
        version: ProtocolVersion::TLSv1_3,
        payload: MessagePayload::Handshake(HandshakeMessagePayload {
            typ: HandshakeType::Certificate,
            payload: HandshakePayload::CertificateTLS13(CertificatePayloadTLS13::new(entries)),
        }),
    };
    transcript.add_message(&cert_msg);
    cx.common.send_msg(cert_msg, true)?;

    // CertificateVerify
    let schemes = tls13_sigschemes(&negotiated.sigschemes);
    let signer = cert
        .key
        .choose_scheme(&schemes)
        .ok_or_else(|| Error::HandshakeFailure("no overlapping signature scheme".to_string()))?;

    let vh = transcript.get_current_hash();
    let message = verify::construct_tls13_server_verify_message(vh.as_ref());
    let sig = signer.sign(&message)?;
    let cv = Message {
        version: ProtocolVersion::TLSv1_3,
        payload: MessagePayload::Handshake(HandshakeMessagePayload {
            typ: HandshakeType::CertificateVerify,
            payload: HandshakePayload::CertificateVerify(DigitallySignedStruct::new(
                signer.scheme(),
                sig,
            )),
        }),
    };
    transcript.add_message(&cv);
    cx.common.send_msg(cv, true)?;

    // Finished
    let vh = transcript.get_current_hash();
    let verify_data = key_schedule.finished_verify_data(&server_hs_secret, vh.as_ref());
    let fin = Message {
        version: ProtocolVersion::TLSv1_3,
        payload: MessagePayload::Handshake(HandshakeMessagePayload {
            typ: HandshakeType::Finished,
            payload: HandshakePayload::Finished(Payload::new(verify_data)),
        }),
    };
    transcript.add_message(&fin);
    cx.common.send_msg(fin, true)?;

    // Application secrets bind the transcript through our Finished.
    let hash_at_server_fin = transcript.get_current_hash();
    key_schedule.into_master_secret();
    let client_ap_secret =
        key_schedule.derive_secret(b"c ap traffic", hash_at_server_fin.as_ref());
    let server_ap_secret =
        key_schedule.derive_secret(b"s ap traffic", hash_at_server_fin.as_ref());

    install_write_keys(cx.common, suite, &server_ap_secret);

    if client_auth_offered {
        Ok(Box::new(ExpectCertificate {
            config,
            suite,
            transcript,
            key_schedule,
            client_hs_secret,
            client_ap_secret,
            server_ap_secret,
        }))
    } else {
        Ok(Box::new(ExpectFinished {
            suite,
            transcript,
            key_schedule,
            client_hs_secret,
            client_ap_secret,
            server_ap_secret,
        }))
    }
}

fn emit_hello_retry_request(
    config: Arc<ServerConfig>,
    cx: &mut Context<'_, ServerConnectionData>,
    client_hello: &ClientHelloPayload,
    chm: &Message,
    suite: &'static Tls13CipherSuite,
    transcript_buffer: HandshakeHashBuffer,
    wanted: NamedGroup,
) -> NextStateOrError {
    let mut transcript = transcript_buffer.start_hash(suite.hash_algorithm());
    transcript.add_message(chm);
    transcript.rollup_for_hrr();

    let hrr = Message {
        version: ProtocolVersion::TLSv1_2,
        payload: MessagePayload::Handshake(HandshakeMessagePayload {
            typ: HandshakeType::HelloRetryRequest,
            payload: HandshakePayload::HelloRetryRequest(HelloRetryRequest {
                legacy_version: ProtocolVersion::TLSv1_2,
                session_id: client_hello.session_id,
                cipher_suite: suite.common.suite,
                extensions: vec![
                    HelloRetryExtension::KeyShare(wanted),
                    HelloRetryExtension::SupportedVersions(ProtocolVersion::TLSv1_3),
                ],
            }),
        }),
    };
    trace!("sending hello retry request {:?}", hrr);
    transcript.add_message(&hrr);
    cx.common.send_msg(hrr, false)?;

    cx.common.send_msg(
        Message {
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::ChangeCipherSpec(ChangeCipherSpecPayload),
        },
        false,
    )?;

    let mut next = ExpectClientHello::new(config);
    next.retried = Some((wanted, transcript));
    Ok(Box::new(next))
}

struct ExpectCertificate {
    config: Arc<ServerConfig>,
    suite: &'static Tls13CipherSuite,
    transcript: HandshakeHash,
    key_schedule: KeySchedule,
    client_hs_secret: Vec<u8>,
    client_ap_secret: Vec<u8>,
    server_ap_secret: Vec<u8>,
}

impl State<ServerConnectionData> for ExpectCertificate {
    fn handle(
        mut self: Box<Self>,
        cx: &mut Context<'_, ServerConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        self.transcript.add_message(&m);
        let cert_payload = require_handshake_msg_move!(
            m,
            HandshakeType::Certificate,
            HandshakePayload::CertificateTLS13
        )?;

        let chain = cert_payload.convert();

        if chain.is_empty() {
            if self.config.verifier.client_auth_mandatory() {
                return Err(Error::CertificateRequired);
            }
            // An empty chain is a polite refusal; continue without
            // authentication.
            self.transcript.abandon_client_auth();
            return Ok(Box::new(ExpectFinished {
                suite: self.suite,
                transcript: self.transcript,
                key_schedule: self.key_schedule,
                client_hs_secret: self.client_hs_secret,
                client_ap_secret: self.client_ap_secret,
                server_ap_secret: self.server_ap_secret,
            }));
        }

        let (end_entity, intermediates) = chain.split_first().unwrap();
        self.config
            .verifier
            .verify_client_cert(end_entity, intermediates, SystemTime::now())
            .map_err(|err| {
                cx.common
                    .send_fatal_alert(AlertDescription::BadCertificate);
                err
            })?;

        Ok(Box::new(ExpectCertificateVerify {
            suite: self.suite,
            transcript: self.transcript,
            key_schedule: self.key_schedule,
            client_hs_secret: self.client_hs_secret,
            client_ap_secret: self.client_ap_secret,
            server_ap_secret: self.server_ap_secret,
            client_cert: chain,
        }))
    }
}

struct ExpectCertificateVerify {
    suite: &'static Tls13CipherSuite,
    transcript: HandshakeHash,
    key_schedule: KeySchedule,
    client_hs_secret: Vec<u8>,
    client_ap_secret: Vec<u8>,
    server_ap_secret: Vec<u8>,
    client_cert: Vec<Certificate>,
}

impl State<ServerConnectionData> for ExpectCertificateVerify {
    fn handle(
        mut self: Box<Self>,
        cx: &mut Context<'_, ServerConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        let dss = require_handshake_msg!(
            m,
            HandshakeType::CertificateVerify,
            HandshakePayload::CertificateVerify
        )?;

        let handshake_hash = self.transcript.get_current_hash();
        let message = verify::construct_tls13_client_verify_message(handshake_hash.as_ref());

        verify::verify_tls13(&message, &self.client_cert[0], dss).map_err(|err| {
            cx.common
                .send_fatal_alert(AlertDescription::DecryptError);
            err
        })?;

        cx.common.peer_certificates = Some(self.client_cert.clone());
        self.transcript.add_message(&m);

        Ok(Box::new(ExpectFinished {
            suite: self.suite,
            transcript: self.transcript,
            key_schedule: self.key_schedule,
            client_hs_secret: self.client_hs_secret,
            client_ap_secret: self.client_ap_secret,
            server_ap_secret: self.server_ap_secret,
        }))
    }
}

struct ExpectFinished {
    suite: &'static Tls13CipherSuite,
    transcript: HandshakeHash,
    key_schedule: KeySchedule,
    client_hs_secret: Vec<u8>,
    client_ap_secret: Vec<u8>,
    server_ap_secret: Vec<u8>,
}

impl State<ServerConnectionData> for ExpectFinished {
    fn handle(
        mut self: Box<Self>,
        cx: &mut Context<'_, ServerConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        let finished =
            require_handshake_msg!(m, HandshakeType::Finished, HandshakePayload::Finished)?;

        let handshake_hash = self.transcript.get_current_hash();
        let expect_verify_data = self
            .key_schedule
            .finished_verify_data(&self.client_hs_secret, handshake_hash.as_ref());

        constant_time::verify_slices_are_equal(&expect_verify_data, &finished.0)
            .map_err(|_| {
                cx.common
                    .send_fatal_alert(AlertDescription::DecryptError);
                Error::DecryptError
            })?;

        self.transcript.add_message(&m);

        // The client moves to its application keys after Finished.
        install_read_keys(cx.common, self.suite, &self.client_ap_secret);
        cx.common.start_traffic()?;

        Ok(Box::new(ExpectTraffic {
            suite: self.suite,
            key_schedule: self.key_schedule,
            client_ap_secret: self.client_ap_secret,
            server_ap_secret: self.server_ap_secret,
            want_write_key_update: false,
        }))
    }
}

struct ExpectTraffic {
    suite: &'static Tls13CipherSuite,
    key_schedule: KeySchedule,
    client_ap_secret: Vec<u8>,
    server_ap_secret: Vec<u8>,
    want_write_key_update: bool,
}

impl ExpectTraffic {
    fn handle_key_update(
        &mut self,
        common: &mut CommonState,
        key_update_request: &KeyUpdateRequest,
    ) -> Result<(), Error> {
        common.check_aligned_handshake()?;

        match key_update_request {
            KeyUpdateRequest::UpdateNotRequested => {}
            KeyUpdateRequest::UpdateRequested => {
                self.want_write_key_update = true;
            }
            _ => {
                return Err(common.illegal_param("unknown KeyUpdate request"));
            }
        }

        self.client_ap_secret = self
            .key_schedule
            .next_application_secret(&self.client_ap_secret);
        install_read_keys(common, self.suite, &self.client_ap_secret);
        Ok(())
    }
}

impl State<ServerConnectionData> for ExpectTraffic {
    fn handle(
        mut self: Box<Self>,
        cx: &mut Context<'_, ServerConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        match m.payload {
            MessagePayload::ApplicationData(payload) => {
                cx.common.take_received_plaintext(payload);
            }
            MessagePayload::Handshake(HandshakeMessagePayload {
                payload: HandshakePayload::KeyUpdate(ref key_update),
                ..
            }) => {
                self.handle_key_update(cx.common, key_update)?;
            }
            _ => {
                return Err(inappropriate_handshake_message(
                    &m,
                    &[HandshakeType::KeyUpdate],
                ));
            }
        }

        Ok(self)
    }

    fn perhaps_write_key_update(&mut self, common: &mut CommonState) {
        if self.want_write_key_update {
            self.want_write_key_update = false;
            let _ = common.send_msg(Message::build_key_update_notify(), true);

            self.server_ap_secret = self
                .key_schedule
                .next_application_secret(&self.server_ap_secret);
            install_write_keys(common, self.suite, &self.server_ap_secret);
        }
    }
}

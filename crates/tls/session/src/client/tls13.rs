#[cfg(feature = "logging")]
use crate::log::{debug, trace};
use std::sync::Arc;
use std::time::SystemTime;

use ring::constant_time;
use tls_core::{
    dns::ServerName,
    key::Certificate,
    msgs::{
        base::{Payload, PayloadU8},
        ccs::ChangeCipherSpecPayload,
        enums::{AlertDescription, HandshakeType, KeyUpdateRequest, ProtocolVersion},
        handshake::{
            CertificatePayloadTLS13, DigitallySignedStruct, HandshakeMessagePayload,
            HandshakePayload, ServerExtension, ServerHelloPayload,
        },
        message::{Message, MessagePayload},
    },
    suites::Tls13CipherSuite,
    verify,
    Error,
};

use crate::{
    check::inappropriate_handshake_message,
    cipher::{new_tls13_decrypter, new_tls13_encrypter},
    client::{ClientConfig, ClientConnectionData},
    conn::{CommonState, ConnectionRandoms, Context, State},
    hash_hs::HandshakeHash,
    key_schedule::{derive_traffic_keys, KeySchedule},
    kx::KeyExchange,
};

use super::hs::{NextState, NextStateOrError};

fn install_read_keys(
    common: &mut CommonState,
    suite: &'static Tls13CipherSuite,
    secret: &[u8],
) {
    let keys = derive_traffic_keys(
        suite.hash_algorithm(),
        suite.common.aead_algorithm,
        secret,
    );
    common
        .record_layer
        .set_message_decrypter(new_tls13_decrypter(suite, &keys.key, &keys.iv));
}

fn install_write_keys(
    common: &mut CommonState,
    suite: &'static Tls13CipherSuite,
    secret: &[u8],
) {
    let keys = derive_traffic_keys(
        suite.hash_algorithm(),
        suite.common.aead_algorithm,
        secret,
    );
    common
        .record_layer
        .set_message_encrypter(new_tls13_encrypter(suite, &keys.key, &keys.iv));
}

#[allow(clippy::too_many_arguments)]
pub(super) fn handle_server_hello(
    config: Arc<ClientConfig>,
    cx: &mut Context<'_, ClientConnectionData>,
    server_hello: &ServerHelloPayload,
    server_name: ServerName,
    _randoms: ConnectionRandoms,
    suite: &'static Tls13CipherSuite,
    transcript: HandshakeHash,
    our_key_share: KeyExchange,
) -> NextStateOrError {
    let their_key_share = server_hello
        .get_key_share()
        .ok_or_else(|| {
            cx.common
                .send_fatal_alert(AlertDescription::MissingExtension);
            Error::PeerMisbehavedError("missing key share".to_string())
        })?;

    if Some(their_key_share.group) != our_key_share.group() {
        return Err(cx
            .common
            .illegal_param("wrong group for key share"));
    }

    let mut key_schedule = KeySchedule::new(suite.hash_algorithm(), None);
    let shared = our_key_share.complete(&their_key_share.payload.0, |secret| {
        Ok(secret.to_vec())
    })?;
    key_schedule.input_shared_secret(&shared);

    let hs_hash = transcript.get_current_hash();
    let client_hs_secret = key_schedule.derive_secret(b"c hs traffic", hs_hash.as_ref());
    let server_hs_secret = key_schedule.derive_secret(b"s hs traffic", hs_hash.as_ref());

    install_read_keys(cx.common, suite, &server_hs_secret);
    install_write_keys(cx.common, suite, &client_hs_secret);

    Ok(Box::new(ExpectEncryptedExtensions {
        config,
        server_name,
        suite,
        transcript,
        key_schedule,
        client_hs_secret,
        server_hs_secret,
    }))
}

struct ExpectEncryptedExtensions {
    config: Arc<ClientConfig>,
    server_name: ServerName,
    suite: &'static Tls13CipherSuite,
    transcript: HandshakeHash,
    key_schedule: KeySchedule,
    client_hs_secret: Vec<u8>,
    server_hs_secret: Vec<u8>,
}

impl State<ClientConnectionData> for ExpectEncryptedExtensions {
    fn handle(
        mut self: Box<Self>,
        cx: &mut Context<'_, ClientConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        let exts = require_handshake_msg!(
            m,
            HandshakeType::EncryptedExtensions,
            HandshakePayload::EncryptedExtensions
        )?;
        debug!("TLS1.3 encrypted extensions: {:?}", exts);
        self.transcript.add_message(&m);

        // ALPN is agreed inside EncryptedExtensions in TLS1.3.
        for ext in exts {
            if let ServerExtension::Protocols(protos) = ext {
                use tls_core::msgs::handshake::ConvertProtocolNameList as _;
                match protos.as_single_slice().map(|p| p.to_vec()) {
                    Some(proto) if self.config.alpn_protocols.contains(&proto) => {
                        cx.common.alpn_protocol = Some(proto);
                    }
                    _ => return Err(Error::NoApplicationProtocol),
                }
            }
        }

        Ok(Box::new(ExpectCertificateOrCertReq {
            config: self.config,
            server_name: self.server_name,
            suite: self.suite,
            transcript: self.transcript,
            key_schedule: self.key_schedule,
            client_hs_secret: self.client_hs_secret,
            server_hs_secret: self.server_hs_secret,
            client_auth_requested: false,
        }))
    }
}

struct ExpectCertificateOrCertReq {
    config: Arc<ClientConfig>,
    server_name: ServerName,
    suite: &'static Tls13CipherSuite,
    transcript: HandshakeHash,
    key_schedule: KeySchedule,
    client_hs_secret: Vec<u8>,
    server_hs_secret: Vec<u8>,
    client_auth_requested: bool,
}

impl ExpectCertificateOrCertReq {
    fn into_expect_certificate_verify(
        self,
        server_cert_chain: Vec<Certificate>,
        ocsp_response: Vec<u8>,
    ) -> NextState {
        Box::new(ExpectCertificateVerify {
            config: self.config,
            server_name: self.server_name,
            suite: self.suite,
            transcript: self.transcript,
            key_schedule: self.key_schedule,
            client_hs_secret: self.client_hs_secret,
            server_hs_secret: self.server_hs_secret,
            client_auth_requested: self.client_auth_requested,
            server_cert_chain,
            ocsp_response,
        })
    }
}

impl State<ClientConnectionData> for ExpectCertificateOrCertReq {
    fn handle(
        mut self: Box<Self>,
        cx: &mut Context<'_, ClientConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        match m.payload {
            MessagePayload::Handshake(HandshakeMessagePayload {
                payload: HandshakePayload::CertificateRequestTLS13(_),
                ..
            }) => {
                // We answer with an empty Certificate; client keys are
                // not part of this configuration.
                self.transcript.add_message(&m);
                self.client_auth_requested = true;
                Ok(self)
            }
            MessagePayload::Handshake(HandshakeMessagePayload {
                payload: HandshakePayload::CertificateTLS13(ref cert_payload),
                ..
            }) => {
                self.transcript.add_message(&m);
                handle_certificate(cx, cert_payload).map(|(chain, ocsp)| {
                    self.into_expect_certificate_verify(chain, ocsp)
                })
            }
            _ => Err(inappropriate_handshake_message(
                &m,
                &[
                    HandshakeType::Certificate,
                    HandshakeType::CertificateRequest,
                ],
            )),
        }
    }
}

fn handle_certificate(
    cx: &mut Context<'_, ClientConnectionData>,
    cert_payload: &CertificatePayloadTLS13,
) -> Result<(Vec<Certificate>, Vec<u8>), Error> {
    if cert_payload.any_entry_has_duplicate_extension() {
        cx.common
            .send_fatal_alert(AlertDescription::DecodeError);
        return Err(Error::PeerMisbehavedError(
            "bad cert chain extensions".to_string(),
        ));
    }

    let chain = cert_payload.convert();
    if chain.is_empty() {
        cx.common
            .send_fatal_alert(AlertDescription::DecodeError);
        return Err(Error::NoCertificatesPresented);
    }

    Ok((chain, cert_payload.get_end_entity_ocsp()))
}

struct ExpectCertificateVerify {
    config: Arc<ClientConfig>,
    server_name: ServerName,
    suite: &'static Tls13CipherSuite,
    transcript: HandshakeHash,
    key_schedule: KeySchedule,
    client_hs_secret: Vec<u8>,
    server_hs_secret: Vec<u8>,
    client_auth_requested: bool,
    server_cert_chain: Vec<Certificate>,
    ocsp_response: Vec<u8>,
}

impl State<ClientConnectionData> for ExpectCertificateVerify {
    fn handle(
        mut self: Box<Self>,
        cx: &mut Context<'_, ClientConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        let cert_verify: &DigitallySignedStruct = require_handshake_msg!(
            m,
            HandshakeType::CertificateVerify,
            HandshakePayload::CertificateVerify
        )?;

        trace!("Server cert is {:?}", self.server_cert_chain);

        // The signature covers the transcript up to, but not
        // including, this message.
        let handshake_hash = self.transcript.get_current_hash();
        let message =
            verify::construct_tls13_server_verify_message(handshake_hash.as_ref());

        let end_entity = &self.server_cert_chain[0];
        self.config
            .verifier
            .verify_tls13_signature(&message, end_entity, cert_verify)
            .map_err(|err| {
                cx.common
                    .send_fatal_alert(AlertDescription::DecryptError);
                err
            })?;

        let (end_entity, intermediates) = self.server_cert_chain.split_first().unwrap();
        self.config
            .verifier
            .verify_server_cert(
                end_entity,
                intermediates,
                &self.server_name,
                &self.ocsp_response,
                SystemTime::now(),
            )
            .map_err(|err| {
                cx.common
                    .send_fatal_alert(AlertDescription::BadCertificate);
                err
            })?;

        cx.common.peer_certificates = Some(self.server_cert_chain.clone());
        self.transcript.add_message(&m);

        Ok(Box::new(ExpectFinished {
            config: self.config,
            suite: self.suite,
            transcript: self.transcript,
            key_schedule: self.key_schedule,
            client_hs_secret: self.client_hs_secret,
            server_hs_secret: self.server_hs_secret,
            client_auth_requested: self.client_auth_requested,
        }))
    }
}

struct ExpectFinished {
    config: Arc<ClientConfig>,
    suite: &'static Tls13CipherSuite,
    transcript: HandshakeHash,
    key_schedule: KeySchedule,
    client_hs_secret: Vec<u8>,
    server_hs_secret: Vec<u8>,
    client_auth_requested: bool,
}

impl State<ClientConnectionData> for ExpectFinished {
    fn handle(
        mut self: Box<Self>,
        cx: &mut Context<'_, ClientConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        let finished =
            require_handshake_msg!(m, HandshakeType::Finished, HandshakePayload::Finished)?;

        let handshake_hash = self.transcript.get_current_hash();
        let expect_verify_data = self
            .key_schedule
            .finished_verify_data(&self.server_hs_secret, handshake_hash.as_ref());

        constant_time::verify_slices_are_equal(&expect_verify_data, &finished.0)
            .map_err(|_| {
                cx.common
                    .send_fatal_alert(AlertDescription::DecryptError);
                Error::DecryptError
            })?;

        self.transcript.add_message(&m);

        // The application secrets bind the transcript through the
        // server Finished.
        let hash_at_server_fin = self.transcript.get_current_hash();
        self.key_schedule.into_master_secret();
        let client_ap_secret = self
            .key_schedule
            .derive_secret(b"c ap traffic", hash_at_server_fin.as_ref());
        let server_ap_secret = self
            .key_schedule
            .derive_secret(b"s ap traffic", hash_at_server_fin.as_ref());

        // Middlebox compatibility: a bare CCS precedes our first
        // protected flight.
        cx.common.send_msg(
            Message {
                version: ProtocolVersion::TLSv1_2,
                payload: MessagePayload::ChangeCipherSpec(ChangeCipherSpecPayload),
            },
            false,
        )?;

        if self.client_auth_requested {
            let empty = Message {
                version: ProtocolVersion::TLSv1_3,
                payload: MessagePayload::Handshake(HandshakeMessagePayload {
                    typ: HandshakeType::Certificate,
                    payload: HandshakePayload::CertificateTLS13(CertificatePayloadTLS13 {
                        context: PayloadU8::empty(),
                        entries: Vec::new(),
                    }),
                }),
            };
            self.transcript.add_message(&empty);
            cx.common.send_msg(empty, true)?;
        }

        let handshake_hash = self.transcript.get_current_hash();
        let verify_data = self
            .key_schedule
            .finished_verify_data(&self.client_hs_secret, handshake_hash.as_ref());

        let finished_msg = Message {
            version: ProtocolVersion::TLSv1_3,
            payload: MessagePayload::Handshake(HandshakeMessagePayload {
                typ: HandshakeType::Finished,
                payload: HandshakePayload::Finished(Payload::new(verify_data)),
            }),
        };

        self.transcript.add_message(&finished_msg);
        cx.common.send_msg(finished_msg, true)?;

        install_write_keys(cx.common, self.suite, &client_ap_secret);
        install_read_keys(cx.common, self.suite, &server_ap_secret);

        cx.common.start_traffic()?;

        Ok(Box::new(ExpectTraffic {
            suite: self.suite,
            key_schedule: self.key_schedule,
            client_ap_secret,
            server_ap_secret,
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

        // Rekey our read side to the peer's next generation.
        self.server_ap_secret = self
            .key_schedule
            .next_application_secret(&self.server_ap_secret);
        install_read_keys(common, self.suite, &self.server_ap_secret);
        Ok(())
    }
}

impl State<ClientConnectionData> for ExpectTraffic {
    fn handle(
        mut self: Box<Self>,
        cx: &mut Context<'_, ClientConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        match m.payload {
            MessagePayload::ApplicationData(payload) => {
                cx.common.take_received_plaintext(payload);
            }
            MessagePayload::Handshake(HandshakeMessagePayload {
                payload: HandshakePayload::NewSessionTicketTLS13(ref ticket),
                ..
            }) => {
                // Resumption is not stored; the ticket is dropped on
                // the floor.
                debug!("Ignoring NewSessionTicket with lifetime {}", ticket.lifetime);
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
                    &[HandshakeType::NewSessionTicket, HandshakeType::KeyUpdate],
                ));
            }
        }

        Ok(self)
    }

    fn perhaps_write_key_update(&mut self, common: &mut CommonState) {
        if self.want_write_key_update {
            self.want_write_key_update = false;
            let _ = common.send_msg(Message::build_key_update_notify(), true);

            self.client_ap_secret = self
                .key_schedule
                .next_application_secret(&self.client_ap_secret);
            install_write_keys(common, self.suite, &self.client_ap_secret);
        }
    }
}

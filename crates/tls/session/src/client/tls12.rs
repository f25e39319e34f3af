use std::sync::Arc;
use std::time::SystemTime;

use ring::constant_time;
use tls_core::{
    dns::ServerName,
    key::Certificate,
    msgs::{
        base::Payload,
        ccs::ChangeCipherSpecPayload,
        enums::{AlertDescription, ContentType, HandshakeType, ProtocolVersion},
        handshake::{
            HandshakeMessagePayload, HandshakePayload, KeyExchangePayload, ServerHelloPayload,
        },
        message::{Message, MessagePayload},
    },
    suites::Tls12CipherSuite,
    Error,
};

use crate::{
    check::{check_message, inappropriate_handshake_message},
    client::{ClientConfig, ClientConnectionData},
    conn::{ConnectionRandoms, Context, State},
    hash_hs::HandshakeHash,
    kx::{kx_module, ClientKxCtx},
    tls12::ConnectionSecrets,
};

use super::hs::NextStateOrError;

pub(super) fn begin(
    config: Arc<ClientConfig>,
    cx: &mut Context<'_, ClientConnectionData>,
    server_hello: &ServerHelloPayload,
    server_name: ServerName,
    randoms: ConnectionRandoms,
    suite: &'static Tls12CipherSuite,
    transcript: HandshakeHash,
) -> NextStateOrError {
    let using_ems = server_hello.ems_support_acked();

    if let Some(proto) = server_hello.get_alpn_protocol() {
        if !config.alpn_protocols.iter().any(|p| p.as_slice() == proto) {
            return Err(Error::NoApplicationProtocol);
        }
        cx.common.alpn_protocol = Some(proto.to_vec());
    }

    let hs = Tls12Handshake {
        config,
        server_name,
        randoms,
        suite,
        transcript,
        using_ems,
        server_cert: None,
        ocsp_response: Vec::new(),
        server_kx_body: None,
        client_auth_requested: false,
    };

    if suite.kx.uses_certificate() {
        Ok(Box::new(ExpectCertificate { hs }))
    } else {
        Ok(Box::new(ExpectServerFlight {
            hs,
            stage: Stage::PostStatus,
        }))
    }
}

struct Tls12Handshake {
    config: Arc<ClientConfig>,
    server_name: ServerName,
    randoms: ConnectionRandoms,
    suite: &'static Tls12CipherSuite,
    transcript: HandshakeHash,
    using_ems: bool,
    server_cert: Option<Vec<Certificate>>,
    ocsp_response: Vec<u8>,
    server_kx_body: Option<Vec<u8>>,
    client_auth_requested: bool,
}

struct ExpectCertificate {
    hs: Tls12Handshake,
}

impl State<ClientConnectionData> for ExpectCertificate {
    fn handle(
        mut self: Box<Self>,
        cx: &mut Context<'_, ClientConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        self.hs.transcript.add_message(&m);
        let cert_chain = require_handshake_msg_move!(
            m,
            HandshakeType::Certificate,
            HandshakePayload::Certificate
        )?;

        if cert_chain.is_empty() {
            cx.common
                .send_fatal_alert(AlertDescription::DecodeError);
            return Err(Error::NoCertificatesPresented);
        }

        self.hs.server_cert = Some(cert_chain);
        Ok(Box::new(ExpectServerFlight {
            hs: self.hs,
            stage: Stage::PreStatus,
        }))
    }
}

/// Where we are in the server's first flight; used to hold the
/// one-message-kind-per-state ordering rules of RFC 5246 section
/// 7.3.
#[derive(PartialEq, PartialOrd)]
enum Stage {
    /// CertificateStatus may still arrive.
    PreStatus,
    /// ServerKeyExchange may still arrive.
    PostStatus,
    /// CertificateRequest may still arrive.
    PostKx,
    /// Only ServerHelloDone is left.
    PostCertReq,
}

struct ExpectServerFlight {
    hs: Tls12Handshake,
    stage: Stage,
}

impl ExpectServerFlight {
    fn finish(
        mut self,
        cx: &mut Context<'_, ClientConnectionData>,
    ) -> NextStateOrError {
        let kx_alg = self.hs.suite.kx;

        // A missing ServerKeyExchange is legal only for key transport
        // and hint-less plain PSK.
        if self.hs.server_kx_body.is_none()
            && kx_alg.sends_server_kx()
            && kx_alg != tls_core::msgs::enums::KeyExchangeAlgorithm::Psk
        {
            return Err(Error::InappropriateHandshakeMessage {
                expect_types: vec![HandshakeType::ServerKeyExchange],
                got_type: HandshakeType::ServerHelloDone,
            });
        }

        if let Some(chain) = &self.hs.server_cert {
            let (end_entity, intermediates) = chain.split_first().unwrap();
            self.hs
                .config
                .verifier
                .verify_server_cert(
                    end_entity,
                    intermediates,
                    &self.hs.server_name,
                    &self.hs.ocsp_response,
                    SystemTime::now(),
                )
                .map_err(|err| {
                    cx.common
                        .send_fatal_alert(AlertDescription::BadCertificate);
                    err
                })?;
            cx.common.peer_certificates = Some(chain.clone());
        }

        let psk = self.hs.config.psk();
        let mut kx_ctx = ClientKxCtx::new(
            &self.hs.randoms,
            &self.hs.config.kx_groups,
            self.hs.config.min_dh_bits,
            self.hs.server_cert.as_ref().and_then(|c| c.first()),
            self.hs.config.verifier.as_ref(),
            psk,
            ProtocolVersion::TLSv1_2.get_u16(),
        );

        let module = kx_module(kx_alg);

        if let Some(body) = &self.hs.server_kx_body {
            module.proc_server_kx(&mut kx_ctx, body)?;
        }

        // The polite refusal: an empty certificate list when client
        // auth was requested.
        if self.hs.client_auth_requested {
            let empty = Message {
                version: ProtocolVersion::TLSv1_2,
                payload: MessagePayload::Handshake(HandshakeMessagePayload {
                    typ: HandshakeType::Certificate,
                    payload: HandshakePayload::Certificate(Vec::new()),
                }),
            };
            self.hs.transcript.add_message(&empty);
            cx.common.send_msg(empty, false)?;
        }

        let ckx_body = module.gen_client_kx(&mut kx_ctx)?;
        let ckx = Message {
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::Handshake(HandshakeMessagePayload {
                typ: HandshakeType::ClientKeyExchange,
                payload: HandshakePayload::ClientKeyExchange(KeyExchangePayload::new(ckx_body)),
            }),
        };
        self.hs.transcript.add_message(&ckx);
        cx.common.send_msg(ckx, false)?;

        let pms = kx_ctx
            .premaster
            .take()
            .ok_or_else(|| Error::General("key exchange produced no premaster".into()))?;

        let secrets = if self.hs.using_ems {
            let session_hash = self.hs.transcript.get_current_hash();
            ConnectionSecrets::new_ems(
                self.hs.randoms,
                session_hash.as_ref(),
                self.hs.suite,
                &pms,
            )?
        } else {
            ConnectionSecrets::new(self.hs.randoms, self.hs.suite, &pms)?
        };

        let pair = secrets.make_cipher_pair()?;
        cx.common
            .record_layer
            .prepare_message_encrypter(pair.client_write);
        cx.common
            .record_layer
            .prepare_message_decrypter(pair.server_read);

        cx.common.send_msg(
            Message {
                version: ProtocolVersion::TLSv1_2,
                payload: MessagePayload::ChangeCipherSpec(ChangeCipherSpecPayload),
            },
            false,
        )?;
        cx.common.record_layer.start_encrypting();

        let vh = self.hs.transcript.get_current_hash();
        let verify_data = secrets.client_verify_data(vh.as_ref())?;
        let fin = Message {
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::Handshake(HandshakeMessagePayload {
                typ: HandshakeType::Finished,
                payload: HandshakePayload::Finished(Payload::new(verify_data)),
            }),
        };
        self.hs.transcript.add_message(&fin);
        cx.common.send_msg(fin, true)?;

        Ok(Box::new(ExpectCcs {
            secrets,
            transcript: self.hs.transcript,
        }))
    }
}

impl State<ClientConnectionData> for ExpectServerFlight {
    fn handle(
        mut self: Box<Self>,
        cx: &mut Context<'_, ClientConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        match m.payload {
            MessagePayload::Handshake(HandshakeMessagePayload {
                payload: HandshakePayload::CertificateStatus(ref status),
                ..
            }) if self.stage == Stage::PreStatus && self.hs.server_cert.is_some() => {
                self.hs.transcript.add_message(&m);
                self.hs.ocsp_response = status.clone().into_inner();
                self.stage = Stage::PostStatus;
                Ok(self)
            }
            MessagePayload::Handshake(HandshakeMessagePayload {
                payload: HandshakePayload::ServerKeyExchange(ref skx),
                ..
            }) if self.stage <= Stage::PostStatus && self.hs.suite.kx.sends_server_kx() => {
                self.hs.transcript.add_message(&m);
                self.hs.server_kx_body = Some(skx.body().to_vec());
                self.stage = Stage::PostKx;
                Ok(self)
            }
            MessagePayload::Handshake(HandshakeMessagePayload {
                payload: HandshakePayload::CertificateRequest(_),
                ..
            }) if self.stage <= Stage::PostKx && self.hs.suite.kx.uses_certificate() => {
                self.hs.transcript.add_message(&m);
                self.hs.client_auth_requested = true;
                self.stage = Stage::PostCertReq;
                Ok(self)
            }
            MessagePayload::Handshake(HandshakeMessagePayload {
                payload: HandshakePayload::ServerHelloDone,
                ..
            }) => {
                self.hs.transcript.add_message(&m);
                (*self).finish(cx)
            }
            _ => Err(inappropriate_handshake_message(
                &m,
                &[
                    HandshakeType::ServerKeyExchange,
                    HandshakeType::ServerHelloDone,
                ],
            )),
        }
    }
}

struct ExpectCcs {
    secrets: ConnectionSecrets,
    transcript: HandshakeHash,
}

impl State<ClientConnectionData> for ExpectCcs {
    fn handle(
        self: Box<Self>,
        cx: &mut Context<'_, ClientConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        check_message(&m, &[ContentType::ChangeCipherSpec])?;
        cx.common.check_aligned_handshake()?;

        // The server's second flight is protected from here on.
        cx.common.record_layer.start_decrypting();

        Ok(Box::new(ExpectFinished {
            secrets: self.secrets,
            transcript: self.transcript,
        }))
    }
}

struct ExpectFinished {
    secrets: ConnectionSecrets,
    transcript: HandshakeHash,
}

impl State<ClientConnectionData> for ExpectFinished {
    fn handle(
        mut self: Box<Self>,
        cx: &mut Context<'_, ClientConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        let finished =
            require_handshake_msg!(m, HandshakeType::Finished, HandshakePayload::Finished)?;

        cx.common.check_aligned_handshake()?;

        let vh = self.transcript.get_current_hash();
        let expect_verify_data = self.secrets.server_verify_data(vh.as_ref())?;

        constant_time::verify_slices_are_equal(&expect_verify_data, &finished.0)
            .map_err(|_| {
                cx.common
                    .send_fatal_alert(AlertDescription::DecryptError);
                Error::DecryptError
            })?;

        self.transcript.add_message(&m);
        cx.common.start_traffic()?;

        Ok(Box::new(ExpectTraffic))
    }
}

struct ExpectTraffic;

impl State<ClientConnectionData> for ExpectTraffic {
    fn handle(
        self: Box<Self>,
        cx: &mut Context<'_, ClientConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        match m.payload {
            MessagePayload::ApplicationData(payload) => {
                cx.common.take_received_plaintext(payload);
            }
            _ => {
                return Err(crate::check::inappropriate_message(
                    &m,
                    &[ContentType::ApplicationData],
                ));
            }
        }

        Ok(self)
    }
}

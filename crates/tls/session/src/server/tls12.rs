#[cfg(feature = "logging")]
use crate::log::trace;
use std::sync::Arc;
use std::time::SystemTime;

use ring::constant_time;
use tls_core::{
    key::Certificate,
    msgs::{
        base::Payload,
        ccs::ChangeCipherSpecPayload,
        enums::{
            AlertDescription, ClientCertificateType, ContentType, HandshakeType,
            ProtocolVersion,
        },
        handshake::{
            CertificateRequestPayload, CertificateStatus, ClientHelloPayload,
            HandshakeMessagePayload, HandshakePayload, KeyExchangePayload, Random,
            ServerExtension, ServerHelloPayload, SessionID,
        },
        message::{Message, MessagePayload},
    },
    suites::Tls12CipherSuite,
    verify, Error,
};

use crate::{
    check::check_message,
    conn::{ConnectionRandoms, Context, State},
    hash_hs::{HandshakeHash, HandshakeHashBuffer},
    kx::{kx_module, KeyExchange, ServerKxCtx},
    server::{
        hs::{Negotiated, NextStateOrError},
        ServerConfig, ServerConnectionData,
    },
    tls12::ConnectionSecrets,
};

pub(super) fn handle_client_hello(
    config: Arc<ServerConfig>,
    cx: &mut Context<'_, ServerConnectionData>,
    client_hello: &ClientHelloPayload,
    chm: &Message,
    negotiated: Negotiated,
    transcript_buffer: HandshakeHashBuffer,
) -> NextStateOrError {
    let suite = negotiated
        .suite
        .tls12()
        .expect("version selection picked a tls12 suite");
    let kx_alg = suite.kx;

    let mut transcript = transcript_buffer.start_hash(suite.hash_algorithm());
    transcript.add_message(chm);

    let using_ems = client_hello.ems_support_offered();
    let randoms = ConnectionRandoms::new(client_hello.random, Random::new()?);

    // ---- ServerHello
    let mut extensions = Vec::new();
    let secure_reneg_offered = client_hello
        .find_extension(tls_core::msgs::enums::ExtensionType::RenegotiationInfo)
        .is_some()
        || client_hello
            .cipher_suites
            .contains(&tls_core::msgs::enums::CipherSuite::TLS_EMPTY_RENEGOTIATION_INFO_SCSV);
    if secure_reneg_offered {
        extensions.push(ServerExtension::make_empty_renegotiation_info());
    }
    if using_ems {
        extensions.push(ServerExtension::ExtendedMasterSecretAck);
    }
    if let Some(proto) = &negotiated.alpn {
        extensions.push(ServerExtension::make_alpn(&[proto.as_slice()]));
    }

    let will_staple = kx_alg.uses_certificate()
        && client_hello.ocsp_stapling_offered()
        && negotiated
            .cert
            .as_ref()
            .map(|ck| ck.ocsp.is_some())
            .unwrap_or(false);
    if will_staple {
        extensions.push(ServerExtension::CertificateStatusAck);
    }

    let sh = Message {
        version: ProtocolVersion::TLSv1_2,
        payload: MessagePayload::Handshake(HandshakeMessagePayload {
            typ: HandshakeType::ServerHello,
            payload: HandshakePayload::ServerHello(ServerHelloPayload {
                legacy_version: ProtocolVersion::TLSv1_2,
                random: Random(randoms.server),
                session_id: SessionID::empty(),
                cipher_suite: suite.common.suite,
                compression_method: tls_core::msgs::enums::Compression::Null,
                extensions,
            }),
        }),
    };
    trace!("sending serverhello {:?}", sh);
    transcript.add_message(&sh);
    cx.common.send_msg(sh, false)?;

    // ---- Certificate
    if kx_alg.uses_certificate() {
        let cert = negotiated.cert.as_ref().expect("checked in suite choice");
        let c = Message {
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::Handshake(HandshakeMessagePayload {
                typ: HandshakeType::Certificate,
                payload: HandshakePayload::Certificate(cert.cert.clone()),
            }),
        };
        transcript.add_message(&c);
        cx.common.send_msg(c, false)?;
    }

    // ---- CertificateStatus
    if will_staple {
        let cert = negotiated.cert.as_ref().expect("staple implies chain");
        let st = Message {
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::Handshake(HandshakeMessagePayload {
                typ: HandshakeType::CertificateStatus,
                payload: HandshakePayload::CertificateStatus(CertificateStatus::new(
                    cert.ocsp.clone().expect("staple implies response"),
                )),
            }),
        };
        transcript.add_message(&st);
        cx.common.send_msg(st, false)?;
    }

    // ---- ServerKeyExchange, through the negotiated module
    let signer = if kx_alg.requires_signing_key() {
        let cert = negotiated.cert.as_ref().expect("checked in suite choice");
        let schemes = suite.resolve_sig_schemes(&negotiated.sigschemes);
        Some(cert.key.choose_scheme(&schemes).ok_or_else(|| {
            Error::HandshakeFailure("no overlapping signature scheme".to_string())
        })?)
    } else {
        None
    };

    let mut kx_ctx = ServerKxCtx {
        randoms: &randoms,
        ec_group: negotiated.groups.ec_candidate,
        kx_groups: &config.kx_groups,
        dh_params: config.active_dh_params(),
        psk_store: config.psk_store.as_deref(),
        signer,
        kx_key: config.kx_key.as_ref(),
        client_hello_version: client_hello.client_version.get_u16(),
        kx: None,
        psk_identity: None,
    };

    let module = kx_module(kx_alg);
    if let Some(body) = module.gen_server_kx(&mut kx_ctx)? {
        let skx = Message {
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::Handshake(HandshakeMessagePayload {
                typ: HandshakeType::ServerKeyExchange,
                payload: HandshakePayload::ServerKeyExchange(KeyExchangePayload::new(body)),
            }),
        };
        transcript.add_message(&skx);
        cx.common.send_msg(skx, false)?;
    }

    // ---- CertificateRequest
    let client_auth_requested = kx_alg.uses_certificate() && config.verifier.offer_client_auth();
    if client_auth_requested {
        let cr = Message {
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::Handshake(HandshakeMessagePayload {
                typ: HandshakeType::CertificateRequest,
                payload: HandshakePayload::CertificateRequest(CertificateRequestPayload {
                    certtypes: vec![
                        ClientCertificateType::RSASign,
                        ClientCertificateType::ECDSASign,
                    ],
                    sigschemes: verify::default_supported_verify_schemes(),
                    canames: Vec::new(),
                }),
            }),
        };
        transcript.add_message(&cr);
        cx.common.send_msg(cr, false)?;
    }

    // ---- ServerHelloDone
    let done = Message {
        version: ProtocolVersion::TLSv1_2,
        payload: MessagePayload::Handshake(HandshakeMessagePayload {
            typ: HandshakeType::ServerHelloDone,
            payload: HandshakePayload::ServerHelloDone,
        }),
    };
    transcript.add_message(&done);
    cx.common.send_msg(done, false)?;

    let server_kx = kx_ctx.kx.take();

    let flight = ServerFlightState {
        config,
        suite,
        randoms,
        transcript,
        using_ems,
        server_kx,
        client_cert: None,
    };

    if client_auth_requested {
        Ok(Box::new(ExpectCertificate { flight }))
    } else {
        Ok(Box::new(ExpectClientKx { flight }))
    }
}

struct ServerFlightState {
    config: Arc<ServerConfig>,
    suite: &'static Tls12CipherSuite,
    randoms: ConnectionRandoms,
    transcript: HandshakeHash,
    using_ems: bool,
    server_kx: Option<KeyExchange>,
    client_cert: Option<Vec<Certificate>>,
}

struct ExpectCertificate {
    flight: ServerFlightState,
}

impl State<ServerConnectionData> for ExpectCertificate {
    fn handle(
        mut self: Box<Self>,
        cx: &mut Context<'_, ServerConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        self.flight.transcript.add_message(&m);
        let chain = require_handshake_msg_move!(
            m,
            HandshakeType::Certificate,
            HandshakePayload::Certificate
        )?;

        if chain.is_empty() {
            if self.flight.config.verifier.client_auth_mandatory() {
                return Err(Error::CertificateRequired);
            }
            self.flight.transcript.abandon_client_auth();
        } else {
            let (end_entity, intermediates) = chain.split_first().unwrap();
            self.flight
                .config
                .verifier
                .verify_client_cert(end_entity, intermediates, SystemTime::now())
                .map_err(|err| {
                    cx.common
                        .send_fatal_alert(AlertDescription::BadCertificate);
                    err
                })?;
            self.flight.client_cert = Some(chain);
        }

        Ok(Box::new(ExpectClientKx {
            flight: self.flight,
        }))
    }
}

struct ExpectClientKx {
    flight: ServerFlightState,
}

impl State<ServerConnectionData> for ExpectClientKx {
    fn handle(
        mut self: Box<Self>,
        cx: &mut Context<'_, ServerConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        let ckx = require_handshake_msg!(
            m,
            HandshakeType::ClientKeyExchange,
            HandshakePayload::ClientKeyExchange
        )?;

        let flight = &mut self.flight;

        let mut kx_ctx = ServerKxCtx {
            randoms: &flight.randoms,
            ec_group: None,
            kx_groups: &flight.config.kx_groups,
            dh_params: flight.config.active_dh_params(),
            psk_store: flight.config.psk_store.as_deref(),
            signer: None,
            kx_key: flight.config.kx_key.as_ref(),
            client_hello_version: ProtocolVersion::TLSv1_2.get_u16(),
            kx: flight.server_kx.take(),
            psk_identity: None,
        };

        let module = kx_module(flight.suite.kx);
        let pms = module.proc_client_kx(&mut kx_ctx, ckx.body())?;

        // Authentication info for the PSK families: the identity the
        // client proved knowledge for.
        cx.data.psk_identity = kx_ctx.psk_identity.take();

        flight.transcript.add_message(&m);

        let secrets = if flight.using_ems {
            let session_hash = flight.transcript.get_current_hash();
            ConnectionSecrets::new_ems(
                ConnectionRandoms {
                    client: flight.randoms.client,
                    server: flight.randoms.server,
                },
                session_hash.as_ref(),
                flight.suite,
                &pms,
            )?
        } else {
            ConnectionSecrets::new(
                ConnectionRandoms {
                    client: flight.randoms.client,
                    server: flight.randoms.server,
                },
                flight.suite,
                &pms,
            )?
        };

        let pair = secrets.make_cipher_pair()?;
        cx.common
            .record_layer
            .prepare_message_decrypter(pair.client_read);
        cx.common
            .record_layer
            .prepare_message_encrypter(pair.server_write);

        if self.flight.client_cert.is_some() {
            Ok(Box::new(ExpectCertificateVerify {
                flight: self.flight,
                secrets,
            }))
        } else {
            Ok(Box::new(ExpectCcs {
                flight: self.flight,
                secrets,
            }))
        }
    }
}

struct ExpectCertificateVerify {
    flight: ServerFlightState,
    secrets: ConnectionSecrets,
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

        // The signature covers every handshake message so far.
        let handshake_msgs = self
            .flight
            .transcript
            .take_handshake_buf()
            .ok_or_else(|| Error::General("missing handshake transcript".into()))?;
        let cert = self
            .flight
            .client_cert
            .as_ref()
            .and_then(|chain| chain.first())
            .ok_or(Error::NoCertificatesPresented)?;

        verify::verify_signed_struct(&handshake_msgs, cert, dss).map_err(|err| {
            cx.common
                .send_fatal_alert(AlertDescription::DecryptError);
            err
        })?;

        cx.common.peer_certificates = self.flight.client_cert.clone();
        self.flight.transcript.add_message(&m);

        Ok(Box::new(ExpectCcs {
            flight: self.flight,
            secrets: self.secrets,
        }))
    }
}

struct ExpectCcs {
    flight: ServerFlightState,
    secrets: ConnectionSecrets,
}

impl State<ServerConnectionData> for ExpectCcs {
    fn handle(
        self: Box<Self>,
        cx: &mut Context<'_, ServerConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        check_message(&m, &[ContentType::ChangeCipherSpec])?;
        cx.common.check_aligned_handshake()?;

        cx.common.record_layer.start_decrypting();

        Ok(Box::new(ExpectFinished {
            flight: self.flight,
            secrets: self.secrets,
        }))
    }
}

struct ExpectFinished {
    flight: ServerFlightState,
    secrets: ConnectionSecrets,
}

impl State<ServerConnectionData> for ExpectFinished {
    fn handle(
        mut self: Box<Self>,
        cx: &mut Context<'_, ServerConnectionData>,
        m: Message,
    ) -> NextStateOrError {
        let finished =
            require_handshake_msg!(m, HandshakeType::Finished, HandshakePayload::Finished)?;

        cx.common.check_aligned_handshake()?;

        let vh = self.flight.transcript.get_current_hash();
        let expect_verify_data = self.secrets.client_verify_data(vh.as_ref())?;

        constant_time::verify_slices_are_equal(&expect_verify_data, &finished.0)
            .map_err(|_| {
                cx.common
                    .send_fatal_alert(AlertDescription::DecryptError);
                Error::DecryptError
            })?;

        self.flight.transcript.add_message(&m);

        // Our CCS and Finished complete the handshake.
        cx.common.send_msg(
            Message {
                version: ProtocolVersion::TLSv1_2,
                payload: MessagePayload::ChangeCipherSpec(ChangeCipherSpecPayload),
            },
            false,
        )?;
        cx.common.record_layer.start_encrypting();

        let vh = self.flight.transcript.get_current_hash();
        let verify_data = self.secrets.server_verify_data(vh.as_ref())?;
        let fin = Message {
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::Handshake(HandshakeMessagePayload {
                typ: HandshakeType::Finished,
                payload: HandshakePayload::Finished(Payload::new(verify_data)),
            }),
        };
        self.flight.transcript.add_message(&fin);
        cx.common.send_msg(fin, true)?;

        cx.common.start_traffic()?;

        Ok(Box::new(ExpectTraffic))
    }
}

struct ExpectTraffic;

impl State<ServerConnectionData> for ExpectTraffic {
    fn handle(
        self: Box<Self>,
        cx: &mut Context<'_, ServerConnectionData>,
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

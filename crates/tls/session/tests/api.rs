//! Loopback tests: a client and a server talking through in-memory
//! buffers, exercising every negotiable family end to end.

use std::{
    io::{Read, Write},
    sync::Arc,
    time::SystemTime,
};

use tls_session::{
    verify_api::ServerCertVerifier, version, ClientConfig, ClientConnection, Certificate,
    ConnectionCommon, DhParams, Error, InMemoryPskStore, PrivateKey, ResolvesServerCertUsingSni,
    ServerConfig, ServerConnection, ServerName,
};

use tls_core::{
    msgs::enums::AlertDescription,
    msgs::handshake::DigitallySignedStruct,
    verify::{HandshakeSignatureValid, ServerCertVerified},
};

/// A verifier for test chains: the certificates in these tests carry
/// real keys inside synthetic DER, so chain validation and signature
/// checks are bypassed.
struct AcceptAnything;

impl ServerCertVerifier for AcceptAnything {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &Certificate,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &Certificate,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        Ok(HandshakeSignatureValid::assertion())
    }
}

fn der_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    if content.len() < 0x80 {
        out.push(content.len() as u8);
    } else {
        let len_bytes = content.len().to_be_bytes();
        let first = len_bytes.iter().position(|b| *b != 0).unwrap();
        out.push(0x80 | (len_bytes.len() - first) as u8);
        out.extend_from_slice(&len_bytes[first..]);
    }
    out.extend_from_slice(content);
    out
}

/// A syntactically-plausible certificate wrapping a real
/// SubjectPublicKeyInfo.  Enough structure for the SPKI extractor;
/// the test verifier skips everything else.
fn fake_cert(spki: &[u8]) -> Certificate {
    let mut tbs = Vec::new();
    tbs.extend_from_slice(&der_tlv(0x02, &[0x01])); // serialNumber
    tbs.extend_from_slice(&der_tlv(0x30, &[])); // signature algorithm
    tbs.extend_from_slice(&der_tlv(0x30, &[])); // issuer
    tbs.extend_from_slice(&der_tlv(0x30, &[])); // validity
    tbs.extend_from_slice(&der_tlv(0x30, &[])); // subject
    tbs.extend_from_slice(spki); // subjectPublicKeyInfo

    let mut cert = der_tlv(0x30, &tbs);
    cert.extend_from_slice(&der_tlv(0x30, &[]));
    cert.extend_from_slice(&der_tlv(0x03, &[0x00]));
    Certificate(der_tlv(0x30, &cert))
}

/// A fresh P-256 key and a fake certificate naming it.
fn ecdsa_key_and_cert() -> (PrivateKey, Certificate) {
    let rng = ring::rand::SystemRandom::new();
    let pkcs8 = ring::signature::EcdsaKeyPair::generate_pkcs8(
        &ring::signature::ECDSA_P256_SHA256_ASN1_SIGNING,
        &rng,
    )
    .unwrap();

    // the SPKI itself is irrelevant to the ECDSA tests
    let spki = der_tlv(0x30, &der_tlv(0x03, &[0x00]));
    (
        PrivateKey(pkcs8.as_ref().to_vec()),
        fake_cert(&spki),
    )
}

fn transfer<A, B>(from: &mut ConnectionCommon<A>, to: &mut ConnectionCommon<B>) -> usize {
    let mut buf = Vec::new();
    while from.wants_write() {
        from.write_tls(&mut buf).unwrap();
    }
    let mut rd = std::io::Cursor::new(&buf);
    let mut taken = 0;
    while rd.position() < buf.len() as u64 {
        taken += to.read_tls(&mut rd).unwrap();
    }
    taken
}

fn do_handshake(client: &mut ClientConnection, server: &mut ServerConnection) {
    while client.is_handshaking() || server.is_handshaking() {
        transfer(client, server);
        server.process_new_packets().unwrap();
        transfer(server, client);
        client.process_new_packets().unwrap();
    }
}

fn exchange_data(client: &mut ClientConnection, server: &mut ServerConnection) {
    client.writer().write_all(b"hello from client").unwrap();
    transfer(client, server);
    server.process_new_packets().unwrap();
    let mut received = Vec::new();
    server.reader().read_to_end(&mut received).unwrap_err(); // WouldBlock after draining
    assert_eq!(&received[..], b"hello from client");

    server.writer().write_all(b"hello from server").unwrap();
    transfer(server, client);
    client.process_new_packets().unwrap();
    let mut received = Vec::new();
    client.reader().read_to_end(&mut received).unwrap_err();
    assert_eq!(&received[..], b"hello from server");
}

fn client_config_with(
    suites: &[tls_session::SupportedCipherSuite],
    versions: &[&'static tls_session::SupportedProtocolVersion],
) -> ClientConfig {
    ClientConfig::builder()
        .with_cipher_suites(suites)
        .with_safe_default_kx_groups()
        .with_protocol_versions(versions)
        .unwrap()
        .with_custom_certificate_verifier(Arc::new(AcceptAnything))
}

fn connect(config: ClientConfig, name: &str) -> ClientConnection {
    ClientConnection::new(
        Arc::new(config),
        ServerName::try_from(name).unwrap(),
    )
    .unwrap()
}

#[test]
fn tls13_handshake_and_data() {
    let (key, cert) = ecdsa_key_and_cert();
    let server_config = ServerConfig::builder()
        .with_safe_default_cipher_suites()
        .with_safe_default_kx_groups()
        .with_protocol_versions(&[&version::TLS13])
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .unwrap();

    let client_config = client_config_with(
        tls_session::DEFAULT_CIPHER_SUITES,
        &[&version::TLS13],
    );

    let mut client = connect(client_config, "localhost");
    let mut server = ServerConnection::new(Arc::new(server_config)).unwrap();

    do_handshake(&mut client, &mut server);

    assert_eq!(
        client.protocol_version(),
        Some(tls_session::ProtocolVersion::TLSv1_3)
    );
    assert!(client.negotiated_cipher_suite().is_some());
    assert_eq!(server.sni_hostname(), Some("localhost"));

    exchange_data(&mut client, &mut server);
}

#[test]
fn tls13_close_notify_half_closes() {
    let (key, cert) = ecdsa_key_and_cert();
    let server_config = ServerConfig::builder()
        .with_safe_default_cipher_suites()
        .with_safe_default_kx_groups()
        .with_protocol_versions(&[&version::TLS13])
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .unwrap();

    let client_config =
        client_config_with(tls_session::DEFAULT_CIPHER_SUITES, &[&version::TLS13]);

    let mut client = connect(client_config, "localhost");
    let mut server = ServerConnection::new(Arc::new(server_config)).unwrap();
    do_handshake(&mut client, &mut server);

    client.send_close_notify();
    transfer(&mut client, &mut server);
    let state = server.process_new_packets().unwrap();
    assert!(state.peer_has_closed());
    assert_eq!(server.reader().read(&mut [0u8; 16]).unwrap(), 0);
}

#[cfg(feature = "tls12")]
mod tls12 {
    use super::*;
    use tls_core::suites::{
        TLS_DHE_PSK_WITH_AES_128_GCM_SHA256, TLS_DHE_RSA_WITH_AES_128_GCM_SHA256,
        TLS_DH_anon_WITH_AES_128_GCM_SHA256, TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        TLS_ECDHE_PSK_WITH_AES_128_GCM_SHA256, TLS_PSK_WITH_AES_128_GCM_SHA256,
        TLS_RSA_WITH_AES_128_GCM_SHA256,
    };

    // 2^1279 - 1: a prime with no business in production, every
    // business in a test.
    fn test_dh_params() -> DhParams {
        let mut p = vec![0xffu8; 160];
        p[0] = 0x7f;
        DhParams::new(p, vec![0x02])
    }

    #[test]
    fn ecdhe_ecdsa_handshake() {
        let (key, cert) = ecdsa_key_and_cert();
        let server_config = ServerConfig::builder()
            .with_cipher_suites(&[TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256])
            .with_safe_default_kx_groups()
            .with_protocol_versions(&[&version::TLS12])
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert], key)
            .unwrap();

        let client_config = client_config_with(
            &[TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256],
            &[&version::TLS12],
        );

        let mut client = connect(client_config, "localhost");
        let mut server = ServerConnection::new(Arc::new(server_config)).unwrap();
        do_handshake(&mut client, &mut server);
        assert_eq!(
            client.protocol_version(),
            Some(tls_session::ProtocolVersion::TLSv1_2)
        );
        exchange_data(&mut client, &mut server);
    }

    fn psk_server(suite: tls_session::SupportedCipherSuite) -> ServerConfig {
        let mut store = InMemoryPskStore::new();
        store.insert(&b"client-1"[..], &b"sesame"[..]);
        store.set_hint(&b"hint"[..]);

        let mut config = ServerConfig::builder()
            .with_cipher_suites(&[suite])
            .with_safe_default_kx_groups()
            .with_protocol_versions(&[&version::TLS12])
            .unwrap()
            .with_no_client_auth()
            .with_no_certificate();
        config.set_psk_store(Arc::new(store));
        config.set_dh_params(test_dh_params());
        config
    }

    fn psk_client(suite: tls_session::SupportedCipherSuite) -> ClientConfig {
        let mut config = client_config_with(&[suite], &[&version::TLS12]);
        config.min_dh_bits = 1024;
        config.set_psk(b"client-1", &b"sesame"[..]).unwrap();
        config
    }

    #[test]
    fn psk_handshake() {
        let mut client = connect(psk_client(TLS_PSK_WITH_AES_128_GCM_SHA256), "localhost");
        let mut server =
            ServerConnection::new(Arc::new(psk_server(TLS_PSK_WITH_AES_128_GCM_SHA256)))
                .unwrap();
        do_handshake(&mut client, &mut server);
        assert_eq!(server.psk_identity(), Some(&b"client-1"[..]));
        exchange_data(&mut client, &mut server);
    }

    #[test]
    fn dhe_psk_handshake() {
        let mut client = connect(
            psk_client(TLS_DHE_PSK_WITH_AES_128_GCM_SHA256),
            "localhost",
        );
        let mut server = ServerConnection::new(Arc::new(psk_server(
            TLS_DHE_PSK_WITH_AES_128_GCM_SHA256,
        )))
        .unwrap();
        do_handshake(&mut client, &mut server);
        exchange_data(&mut client, &mut server);
    }

    #[test]
    fn ecdhe_psk_handshake() {
        let mut client = connect(
            psk_client(TLS_ECDHE_PSK_WITH_AES_128_GCM_SHA256),
            "localhost",
        );
        let mut server = ServerConnection::new(Arc::new(psk_server(
            TLS_ECDHE_PSK_WITH_AES_128_GCM_SHA256,
        )))
        .unwrap();
        do_handshake(&mut client, &mut server);
        exchange_data(&mut client, &mut server);
    }

    #[test]
    fn unknown_psk_identity_is_fatal() {
        let mut client_config =
            client_config_with(&[TLS_PSK_WITH_AES_128_GCM_SHA256], &[&version::TLS12]);
        client_config
            .set_psk(b"who-is-this", &b"sesame"[..])
            .unwrap();
        let mut client = connect(client_config, "localhost");
        let mut server =
            ServerConnection::new(Arc::new(psk_server(TLS_PSK_WITH_AES_128_GCM_SHA256)))
                .unwrap();

        // drive until the server rejects the identity
        let err = loop {
            transfer(&mut client, &mut server);
            if let Err(e) = server.process_new_packets() {
                break e;
            }
            transfer(&mut server, &mut client);
            client.process_new_packets().unwrap();
        };
        assert_eq!(err, Error::UnknownPskIdentity);

        // the client observes the matching fatal alert
        transfer(&mut server, &mut client);
        let client_err = client.process_new_packets().unwrap_err();
        assert_eq!(
            client_err,
            Error::AlertReceived(AlertDescription::UnknownPSKIdentity)
        );
    }

    #[test]
    fn dh_anon_handshake() {
        let mut server_config = ServerConfig::builder()
            .with_cipher_suites(&[TLS_DH_anon_WITH_AES_128_GCM_SHA256])
            .with_safe_default_kx_groups()
            .with_protocol_versions(&[&version::TLS12])
            .unwrap()
            .with_no_client_auth()
            .with_no_certificate();
        server_config.set_anon_dh_params(test_dh_params());
        assert!(server_config.legacy_dh_params().is_some());

        let client_config = client_config_with(
            &[TLS_DH_anon_WITH_AES_128_GCM_SHA256],
            &[&version::TLS12],
        );

        let mut client = connect(client_config, "localhost");
        let mut server = ServerConnection::new(Arc::new(server_config)).unwrap();
        do_handshake(&mut client, &mut server);
        // opportunistic encryption: no certificate was exchanged
        assert!(client.peer_certificates().is_none());
        exchange_data(&mut client, &mut server);
    }

    #[test]
    fn dhe_rsa_handshake_with_rsa_key() {
        let (key, cert) = rsa_key_and_cert();
        let mut server_config = ServerConfig::builder()
            .with_cipher_suites(&[TLS_DHE_RSA_WITH_AES_128_GCM_SHA256])
            .with_safe_default_kx_groups()
            .with_protocol_versions(&[&version::TLS12])
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert], key)
            .unwrap();
        server_config.set_dh_params(test_dh_params());

        let client_config = client_config_with(
            &[TLS_DHE_RSA_WITH_AES_128_GCM_SHA256],
            &[&version::TLS12],
        );

        let mut client = connect(client_config, "localhost");
        let mut server = ServerConnection::new(Arc::new(server_config)).unwrap();
        do_handshake(&mut client, &mut server);
        exchange_data(&mut client, &mut server);
    }

    fn rsa_key_and_cert() -> (PrivateKey, Certificate) {
        use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};

        let mut rng = rand::rngs::OsRng;
        let private = rsa::RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public = rsa::RsaPublicKey::from(&private);

        let key = PrivateKey(private.to_pkcs8_der().unwrap().as_bytes().to_vec());
        let spki = public.to_public_key_der().unwrap();
        (key, fake_cert(spki.as_bytes()))
    }

    #[test]
    fn rsa_key_transport_handshake() {
        let (key, cert) = rsa_key_and_cert();
        let server_config = ServerConfig::builder()
            .with_cipher_suites(&[TLS_RSA_WITH_AES_128_GCM_SHA256])
            .with_safe_default_kx_groups()
            .with_protocol_versions(&[&version::TLS12])
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert], key)
            .unwrap();

        let client_config =
            client_config_with(&[TLS_RSA_WITH_AES_128_GCM_SHA256], &[&version::TLS12]);

        let mut client = connect(client_config, "localhost");
        let mut server = ServerConnection::new(Arc::new(server_config)).unwrap();
        do_handshake(&mut client, &mut server);
        exchange_data(&mut client, &mut server);
    }
}

#[test]
fn suite_mismatch_sends_handshake_failure() {
    let (key, cert) = ecdsa_key_and_cert();
    let server_config = ServerConfig::builder()
        .with_cipher_suites(&[tls_core::suites::TLS13_AES_256_GCM_SHA384])
        .with_safe_default_kx_groups()
        .with_protocol_versions(&[&version::TLS13])
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .unwrap();

    let client_config = client_config_with(
        &[tls_core::suites::TLS13_AES_128_GCM_SHA256],
        &[&version::TLS13],
    );

    let mut client = connect(client_config, "localhost");
    let mut server = ServerConnection::new(Arc::new(server_config)).unwrap();

    transfer(&mut client, &mut server);
    let err = server.process_new_packets().unwrap_err();
    assert!(matches!(err, Error::HandshakeFailure(_)));

    transfer(&mut server, &mut client);
    let client_err = client.process_new_packets().unwrap_err();
    assert_eq!(
        client_err,
        Error::AlertReceived(AlertDescription::HandshakeFailure)
    );
}

#[test]
fn version_mismatch_sends_protocol_version() {
    let (key, cert) = ecdsa_key_and_cert();
    let server_config = ServerConfig::builder()
        .with_safe_default_cipher_suites()
        .with_safe_default_kx_groups()
        .with_protocol_versions(&[&version::TLS12])
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .unwrap();

    // TLS1.3-only client
    let client_config = client_config_with(
        &[tls_core::suites::TLS13_AES_128_GCM_SHA256],
        &[&version::TLS13],
    );

    let mut client = connect(client_config, "localhost");
    let mut server = ServerConnection::new(Arc::new(server_config)).unwrap();

    transfer(&mut client, &mut server);
    let err = server.process_new_packets().unwrap_err();
    assert!(matches!(err, Error::PeerIncompatibleError(_)));

    transfer(&mut server, &mut client);
    let client_err = client.process_new_packets().unwrap_err();
    assert_eq!(
        client_err,
        Error::AlertReceived(AlertDescription::ProtocolVersion)
    );
}

#[cfg(feature = "tls12")]
#[test]
fn fallback_scsv_is_answered_with_inappropriate_fallback() {
    let (key, cert) = ecdsa_key_and_cert();
    // The server could do TLS1.3...
    let server_config = ServerConfig::builder()
        .with_safe_default_cipher_suites()
        .with_safe_default_kx_groups()
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .unwrap();

    // ...but the client claims to be retrying at TLS1.2.
    let mut client_config = client_config_with(
        &[tls_core::suites::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256],
        &[&version::TLS12],
    );
    client_config.send_fallback_scsv = true;

    let mut client = connect(client_config, "localhost");
    let mut server = ServerConnection::new(Arc::new(server_config)).unwrap();

    transfer(&mut client, &mut server);
    let err = server.process_new_packets().unwrap_err();
    assert_eq!(err, Error::InappropriateFallback);

    transfer(&mut server, &mut client);
    let client_err = client.process_new_packets().unwrap_err();
    assert_eq!(
        client_err,
        Error::AlertReceived(AlertDescription::InappropriateFallback)
    );
}

#[test]
fn sni_resolver_selects_and_reports_name() {
    let (key, cert) = ecdsa_key_and_cert();
    let signing_key = tls_session::sign_api::any_supported_type(&key).unwrap();
    let mut resolver = ResolvesServerCertUsingSni::new();
    resolver
        .add(
            "www.example.com",
            tls_session::CertifiedKey::new(vec![cert], signing_key),
        )
        .unwrap();

    let server_config = ServerConfig::builder()
        .with_safe_default_cipher_suites()
        .with_safe_default_kx_groups()
        .with_protocol_versions(&[&version::TLS13])
        .unwrap()
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(resolver));

    let client_config =
        client_config_with(tls_session::DEFAULT_CIPHER_SUITES, &[&version::TLS13]);

    let mut client = connect(client_config, "www.example.com");
    let mut server = ServerConnection::new(Arc::new(server_config)).unwrap();
    do_handshake(&mut client, &mut server);
    assert_eq!(server.sni_hostname(), Some("www.example.com"));
}

#[test]
fn unknown_sni_name_is_refused() {
    let (key, cert) = ecdsa_key_and_cert();
    let signing_key = tls_session::sign_api::any_supported_type(&key).unwrap();
    let mut resolver = ResolvesServerCertUsingSni::new();
    resolver
        .add(
            "www.example.com",
            tls_session::CertifiedKey::new(vec![cert], signing_key),
        )
        .unwrap();

    let server_config = ServerConfig::builder()
        .with_safe_default_cipher_suites()
        .with_safe_default_kx_groups()
        .with_protocol_versions(&[&version::TLS13])
        .unwrap()
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(resolver));

    let client_config =
        client_config_with(tls_session::DEFAULT_CIPHER_SUITES, &[&version::TLS13]);

    let mut client = connect(client_config, "other.example.com");
    let mut server = ServerConnection::new(Arc::new(server_config)).unwrap();

    transfer(&mut client, &mut server);
    let err = server.process_new_packets().unwrap_err();
    assert_eq!(err, Error::UnrecognizedName);

    transfer(&mut server, &mut client);
    let client_err = client.process_new_packets().unwrap_err();
    assert_eq!(
        client_err,
        Error::AlertReceived(AlertDescription::UnrecognisedName)
    );
}

#[test]
fn idna_hostnames_map_before_sni() {
    let config = client_config_with(tls_session::DEFAULT_CIPHER_SUITES, &[&version::TLS13]);
    let name = config.server_name("bücher.de").unwrap();
    let ServerName::DnsName(dns) = name else {
        panic!("expected a DnsName");
    };
    assert_eq!(dns.as_str(), "xn--bcher-kva.de");
}

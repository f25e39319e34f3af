//! RSA key transport: the client picks the premaster and sends it
//! encrypted under the server's RSA key.  A failed decryption is
//! never reported where an attacker could measure it; the server
//! substitutes a random premaster and lets the Finished check fail,
//! which the peer observes as a record MAC error.

use rsa::{
    pkcs1::DecodeRsaPrivateKey, pkcs8::DecodePrivateKey, pkcs8::DecodePublicKey, Pkcs1v15Encrypt,
    RsaPrivateKey, RsaPublicKey,
};
use tls_core::{
    codec::{Codec, Reader},
    msgs::base::PayloadU16,
    x509, Error,
};

use crate::{
    kx::dispatch::{ClientKxCtx, KxModule, ServerKxCtx},
    tls12::rsa_premaster,
};

pub(crate) struct RsaKeyTransport;

impl KxModule for RsaKeyTransport {
    fn gen_server_kx(&self, _ctx: &mut ServerKxCtx) -> Result<Option<Vec<u8>>, Error> {
        // key transport has no server parameters
        Ok(None)
    }

    fn proc_server_kx(&self, _ctx: &mut ClientKxCtx, _body: &[u8]) -> Result<(), Error> {
        Err(Error::PeerMisbehavedError(
            "unexpected ServerKeyExchange for RSA key transport".into(),
        ))
    }

    fn gen_client_kx(&self, ctx: &mut ClientKxCtx) -> Result<Vec<u8>, Error> {
        let cert = ctx.server_cert.ok_or(Error::NoCertificatesPresented)?;
        let spki = x509::extract_spki(&cert.0)
            .ok_or_else(|| Error::InvalidCertificateData("malformed certificate".into()))?;
        let public = RsaPublicKey::from_public_key_der(spki)
            .map_err(|_| Error::InvalidCertificateData("not an RSA public key".into()))?;

        let pms = rsa_premaster(ctx.client_hello_version)?;

        let mut rng = rand::rngs::OsRng;
        let encrypted = public
            .encrypt(&mut rng, Pkcs1v15Encrypt, &pms)
            .map_err(|_| Error::General("RSA encryption failed".into()))?;

        ctx.premaster = Some(pms);
        Ok(PayloadU16::new(encrypted).get_encoding())
    }

    fn proc_client_kx(&self, ctx: &mut ServerKxCtx, body: &[u8]) -> Result<Vec<u8>, Error> {
        let key_der = ctx.kx_key.ok_or(Error::InsufficientCredentials)?;
        let key = RsaPrivateKey::from_pkcs8_der(&key_der.0)
            .or_else(|_| RsaPrivateKey::from_pkcs1_der(&key_der.0))
            .map_err(|_| Error::InsufficientCredentials)?;

        let mut r = Reader::init(body);
        let encrypted = PayloadU16::read(&mut r).ok_or(Error::CorruptMessage)?;
        if r.any_left() {
            return Err(Error::UnexpectedPacketLength);
        }

        // The Bleichenbacher countermeasure: on any padding or
        // version surprise continue with a random premaster, keeping
        // the failure indistinguishable from a MAC error.
        let fake = rsa_premaster(ctx.client_hello_version)?;

        let pms = match key.decrypt(Pkcs1v15Encrypt, &encrypted.0) {
            Ok(pms)
                if pms.len() == 48
                    && pms[0] == (ctx.client_hello_version >> 8) as u8
                    && pms[1] == ctx.client_hello_version as u8 =>
            {
                pms
            }
            _ => fake,
        };

        Ok(pms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::ConnectionRandoms;
    use tls_core::key::PrivateKey;

    fn server_ctx<'a>(
        randoms: &'a ConnectionRandoms,
        key: Option<&'a PrivateKey>,
    ) -> ServerKxCtx<'a> {
        ServerKxCtx {
            randoms,
            ec_group: None,
            kx_groups: &[],
            dh_params: None,
            psk_store: None,
            signer: None,
            kx_key: key,
            client_hello_version: 0x0303,
            kx: None,
            psk_identity: None,
        }
    }

    #[test]
    fn decrypt_round_trip_with_generated_key() {
        use rsa::pkcs8::EncodePrivateKey;

        let mut rng = rand::rngs::OsRng;
        let private = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let der = PrivateKey(private.to_pkcs8_der().unwrap().as_bytes().to_vec());
        let public = RsaPublicKey::from(&private);

        // encrypt a premaster the way the client module does
        let pms = rsa_premaster(0x0303).unwrap();
        let encrypted = public.encrypt(&mut rng, Pkcs1v15Encrypt, &pms).unwrap();
        let body = PayloadU16::new(encrypted).get_encoding();

        let randoms = ConnectionRandoms {
            client: [1; 32],
            server: [2; 32],
        };
        let mut ctx = server_ctx(&randoms, Some(&der));
        let out = RsaKeyTransport.proc_client_kx(&mut ctx, &body).unwrap();
        assert_eq!(out, pms);
    }

    #[test]
    fn garbage_ciphertext_yields_substitute_premaster() {
        let mut rng = rand::rngs::OsRng;
        let private = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let der = PrivateKey(
            rsa::pkcs8::EncodePrivateKey::to_pkcs8_der(&private)
                .unwrap()
                .as_bytes()
                .to_vec(),
        );

        let body = PayloadU16::new(vec![0x5a; 256]).get_encoding();
        let randoms = ConnectionRandoms {
            client: [1; 32],
            server: [2; 32],
        };
        let mut ctx = server_ctx(&randoms, Some(&der));

        // no error: the failure must be indistinguishable here
        let out = RsaKeyTransport.proc_client_kx(&mut ctx, &body).unwrap();
        assert_eq!(out.len(), 48);
        assert_eq!(&out[..2], &[0x03, 0x03]);
    }
}

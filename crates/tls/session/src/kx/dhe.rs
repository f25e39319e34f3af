//! Ephemeral finite-field Diffie-Hellman: the DHE_RSA module and the
//! anonymous variant, plus the parameter plumbing the DHE_PSK flow
//! reuses.  Server parameters come from the credentials; the client
//! enforces the configured prime-size floor.

use tls_core::{
    codec::{Codec, Reader},
    msgs::{
        base::PayloadU16,
        handshake::{DigitallySignedStruct, ServerDHParams},
    },
    Error,
};

use crate::kx::{
    dispatch::{sign_kx_params, verify_kx_params, ClientKxCtx, KxModule, ServerKxCtx},
    DhParams, KeyExchange, ServerKxParams,
};

pub(crate) struct DheExchange {
    /// Signed by the server's certificate key; false for the
    /// anonymous, opportunistic-encryption mode.
    pub(crate) signed: bool,
}

/// Build the ServerDHParams from the credential parameters, leaving
/// the ephemeral exchange in the context.  Shared with the PSK
/// module.
pub(crate) fn gen_server_params(ctx: &mut ServerKxCtx) -> Result<Vec<u8>, Error> {
    let params = ctx.dh_params.ok_or(Error::InsufficientCredentials)?;
    let kx = KeyExchange::start_dh(params)?;

    let wire = ServerDHParams {
        dh_p: PayloadU16::new(params.prime().to_vec()),
        dh_g: PayloadU16::new(params.generator().to_vec()),
        dh_ys: PayloadU16::new(kx.pubkey.clone()),
    };
    ctx.kx = Some(kx);
    Ok(wire.get_encoding())
}

/// Parse ServerDHParams from the reader into the context, enforcing
/// the prime-size floor.  Shared with the PSK module.
pub(crate) fn proc_server_params(ctx: &mut ClientKxCtx, r: &mut Reader) -> Result<(), Error> {
    let wire = ServerDHParams::read(r).ok_or(Error::CorruptMessage)?;
    let params = DhParams::new(wire.dh_p.0, wire.dh_g.0);

    if params.prime_bits() < ctx.min_dh_bits {
        return Err(Error::InsufficientSecurity);
    }

    ctx.server_params = ServerKxParams::Dh {
        params,
        peer_public: wire.dh_ys.0,
    };
    Ok(())
}

/// Run our half of the exchange: returns (wire public, shared
/// secret).  Shared with the PSK module.
pub(crate) fn gen_client_public(ctx: &mut ClientKxCtx) -> Result<(Vec<u8>, Vec<u8>), Error> {
    let (params, peer_public) = match &ctx.server_params {
        ServerKxParams::Dh {
            params,
            peer_public,
        } => (params.clone(), peer_public.clone()),
        _ => {
            return Err(Error::PeerMisbehavedError(
                "missing server DH parameters".into(),
            ))
        }
    };

    let kx = KeyExchange::start_dh(&params)?;
    let our_public = kx.pubkey.clone();
    let shared = kx.complete(&peer_public, |secret| Ok(secret.to_vec()))?;

    Ok((PayloadU16::new(our_public).get_encoding(), shared))
}

/// Complete the exchange with the client's public value.  Shared with
/// the PSK module.
pub(crate) fn proc_client_public(ctx: &mut ServerKxCtx, r: &mut Reader) -> Result<Vec<u8>, Error> {
    let peer = PayloadU16::read(r).ok_or(Error::CorruptMessage)?;
    let kx = ctx
        .kx
        .take()
        .ok_or_else(|| Error::General("no key exchange in flight".into()))?;
    kx.complete(&peer.0, |secret| Ok(secret.to_vec()))
}

impl KxModule for DheExchange {
    fn gen_server_kx(&self, ctx: &mut ServerKxCtx) -> Result<Option<Vec<u8>>, Error> {
        let params = gen_server_params(ctx)?;
        let mut body = params.clone();

        if self.signed {
            let signer = ctx
                .signer
                .take()
                .ok_or(Error::InsufficientCredentials)?;
            body.extend_from_slice(&sign_kx_params(signer, ctx.randoms, &params)?);
        }

        Ok(Some(body))
    }

    fn proc_server_kx(&self, ctx: &mut ClientKxCtx, body: &[u8]) -> Result<(), Error> {
        let mut r = Reader::init(body);
        proc_server_params(ctx, &mut r)?;
        let params_span = &body[..r.used()];

        if self.signed {
            let dss = DigitallySignedStruct::read(&mut r).ok_or(Error::CorruptMessage)?;
            if r.any_left() {
                return Err(Error::UnexpectedPacketLength);
            }
            verify_kx_params(ctx, params_span, &dss)?;
        } else if r.any_left() {
            return Err(Error::UnexpectedPacketLength);
        }

        Ok(())
    }

    fn gen_client_kx(&self, ctx: &mut ClientKxCtx) -> Result<Vec<u8>, Error> {
        let (body, shared) = gen_client_public(ctx)?;
        ctx.premaster = Some(shared);
        Ok(body)
    }

    fn proc_client_kx(&self, ctx: &mut ServerKxCtx, body: &[u8]) -> Result<Vec<u8>, Error> {
        let mut r = Reader::init(body);
        let shared = proc_client_public(ctx, &mut r)?;
        if r.any_left() {
            return Err(Error::UnexpectedPacketLength);
        }
        Ok(shared)
    }
}

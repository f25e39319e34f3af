//! Ephemeral elliptic Diffie-Hellman: the ECDHE_RSA / ECDHE_ECDSA
//! modules, and the unsigned variant the ECDHE_PSK and anonymous
//! flows reuse.

use tls_core::{
    codec::{Codec, Reader},
    msgs::{
        base::PayloadU8,
        handshake::{DigitallySignedStruct, ServerECDHParams},
    },
    Error,
};

use crate::kx::{
    dispatch::{sign_kx_params, verify_kx_params, ClientKxCtx, KxModule, ServerKxCtx},
    KeyExchange, ServerKxParams,
};

pub(crate) struct EcdheExchange {
    /// Signed by the server's certificate key; false for the variants
    /// that authenticate some other way.
    pub(crate) signed: bool,
}

/// Build the ServerECDHParams over the elected group, leaving the
/// ephemeral exchange in the context.  Shared with the PSK module.
pub(crate) fn gen_server_params(ctx: &mut ServerKxCtx) -> Result<Vec<u8>, Error> {
    let group = ctx
        .ec_group
        .ok_or_else(|| Error::HandshakeFailure("no common elliptic group".into()))?;
    let skxg = KeyExchange::choose(group, ctx.kx_groups)
        .ok_or_else(|| Error::HandshakeFailure("elected group not configured".into()))?;
    let kx = KeyExchange::start(skxg)
        .ok_or_else(|| Error::HandshakeFailure("group has no agreement backend".into()))?;

    let params = ServerECDHParams::new(group, &kx.pubkey);
    ctx.kx = Some(kx);
    Ok(params.get_encoding())
}

/// Parse the ServerECDHParams from the reader into the context.
/// Shared with the PSK module.
pub(crate) fn proc_server_params(ctx: &mut ClientKxCtx, r: &mut Reader) -> Result<(), Error> {
    let params = ServerECDHParams::read(r).ok_or(Error::CorruptMessage)?;
    let group = params.curve_params.named_group;

    match KeyExchange::choose(group, ctx.kx_groups) {
        Some(skxg) if skxg.has_ec_backend() => {}
        _ => {
            return Err(Error::HandshakeFailure(
                "server chose an unsupported curve".into(),
            ))
        }
    }

    ctx.server_params = ServerKxParams::Ec {
        group,
        peer_public: params.public.0,
    };
    Ok(())
}

/// Run our half of the exchange: returns (wire ECPoint, shared
/// secret).  Shared with the PSK module.
pub(crate) fn gen_client_public(ctx: &mut ClientKxCtx) -> Result<(Vec<u8>, Vec<u8>), Error> {
    let (group, peer_public) = match &ctx.server_params {
        ServerKxParams::Ec { group, peer_public } => (*group, peer_public.clone()),
        _ => {
            return Err(Error::PeerMisbehavedError(
                "missing server ECDH parameters".into(),
            ))
        }
    };

    let skxg = KeyExchange::choose(group, ctx.kx_groups)
        .ok_or_else(|| Error::HandshakeFailure("server chose an unsupported curve".into()))?;
    let kx = KeyExchange::start(skxg)
        .ok_or_else(|| Error::HandshakeFailure("group has no agreement backend".into()))?;

    let our_public = kx.pubkey.clone();
    let shared = kx.complete(&peer_public, |secret| Ok(secret.to_vec()))?;

    Ok((PayloadU8::new(our_public).get_encoding(), shared))
}

/// Complete the exchange with the client's ECPoint.  Shared with the
/// PSK module.
pub(crate) fn proc_client_public(ctx: &mut ServerKxCtx, r: &mut Reader) -> Result<Vec<u8>, Error> {
    let peer = PayloadU8::read(r).ok_or(Error::CorruptMessage)?;
    let kx = ctx
        .kx
        .take()
        .ok_or_else(|| Error::General("no key exchange in flight".into()))?;
    kx.complete(&peer.0, |secret| Ok(secret.to_vec()))
}

impl KxModule for EcdheExchange {
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

//! The pre-shared-key modules: plain PSK, DHE_PSK and ECDHE_PSK
//! (RFC 4279 / RFC 8442).  The identity travels length-prefixed in
//! both directions; the premaster interleaves the other secret with
//! the PSK.

use tls_core::{
    codec::{Codec, Reader},
    msgs::base::PayloadU16,
    Error,
};

use crate::{
    credentials::MAX_USERNAME_SIZE,
    kx::{
        dhe, ecdhe,
        dispatch::{ClientKxCtx, KxModule, ServerKxCtx},
    },
};

#[derive(Clone, Copy, PartialEq)]
pub(crate) enum Mix {
    /// Plain PSK: the other secret is a string of zeroes.
    None,
    /// Mixed with ephemeral finite-field DH.
    Dhe,
    /// Mixed with ephemeral elliptic DH.
    Ecdhe,
}

pub(crate) struct PskExchange {
    pub(crate) mix: Mix,
}

/// RFC 4279 section 2: the premaster is
/// len(other_secret) ‖ other_secret ‖ len(psk) ‖ psk, where
/// other_secret is the (EC)DHE shared secret, or for plain PSK a run
/// of zeroes as long as the PSK itself.
fn premaster(other_secret: Option<&[u8]>, psk: &[u8]) -> Vec<u8> {
    let zeroes;
    let other = match other_secret {
        Some(z) => z,
        None => {
            zeroes = vec![0u8; psk.len()];
            &zeroes
        }
    };

    let mut pms = Vec::with_capacity(4 + other.len() + psk.len());
    PayloadU16::encode_slice(other, &mut pms);
    PayloadU16::encode_slice(psk, &mut pms);
    pms
}

fn read_bounded_identity(r: &mut Reader) -> Result<Vec<u8>, Error> {
    let identity = PayloadU16::read(r).ok_or(Error::CorruptMessage)?;
    if identity.0.len() > MAX_USERNAME_SIZE {
        return Err(Error::IllegalSrpUsername);
    }
    Ok(identity.0)
}

impl KxModule for PskExchange {
    fn gen_server_kx(&self, ctx: &mut ServerKxCtx) -> Result<Option<Vec<u8>>, Error> {
        let store = ctx.psk_store.ok_or(Error::InsufficientCredentials)?;
        let hint = store.hint();

        // Plain PSK sends a ServerKeyExchange only to carry a hint.
        if self.mix == Mix::None && hint.is_none() {
            return Ok(None);
        }

        let hint = hint.unwrap_or_default();
        if hint.len() > MAX_USERNAME_SIZE {
            return Err(Error::IllegalSrpUsername);
        }

        let mut body = Vec::new();
        PayloadU16::encode_slice(&hint, &mut body);

        match self.mix {
            Mix::None => {}
            Mix::Dhe => body.extend_from_slice(&dhe::gen_server_params(ctx)?),
            Mix::Ecdhe => body.extend_from_slice(&ecdhe::gen_server_params(ctx)?),
        }

        Ok(Some(body))
    }

    fn proc_server_kx(&self, ctx: &mut ClientKxCtx, body: &[u8]) -> Result<(), Error> {
        let mut r = Reader::init(body);
        let hint = read_bounded_identity(&mut r)?;
        if !hint.is_empty() {
            ctx.psk_hint = Some(hint);
        }

        match self.mix {
            Mix::None => {}
            Mix::Dhe => dhe::proc_server_params(ctx, &mut r)?,
            Mix::Ecdhe => ecdhe::proc_server_params(ctx, &mut r)?,
        }

        if r.any_left() {
            return Err(Error::UnexpectedPacketLength);
        }
        Ok(())
    }

    fn gen_client_kx(&self, ctx: &mut ClientKxCtx) -> Result<Vec<u8>, Error> {
        let (identity, key) = ctx.psk.ok_or(Error::InsufficientCredentials)?;
        if identity.len() > MAX_USERNAME_SIZE {
            return Err(Error::IllegalSrpUsername);
        }
        let key = key.to_vec();

        let mut body = Vec::new();
        PayloadU16::encode_slice(identity, &mut body);

        let other = match self.mix {
            Mix::None => None,
            Mix::Dhe => {
                let (public, shared) = dhe::gen_client_public(ctx)?;
                body.extend_from_slice(&public);
                Some(shared)
            }
            Mix::Ecdhe => {
                let (public, shared) = ecdhe::gen_client_public(ctx)?;
                body.extend_from_slice(&public);
                Some(shared)
            }
        };

        ctx.premaster = Some(premaster(other.as_deref(), &key));
        Ok(body)
    }

    fn proc_client_kx(&self, ctx: &mut ServerKxCtx, body: &[u8]) -> Result<Vec<u8>, Error> {
        let store = ctx.psk_store.ok_or(Error::InsufficientCredentials)?;

        let mut r = Reader::init(body);
        let identity = read_bounded_identity(&mut r)?;

        let psk = store.psk(&identity).ok_or(Error::UnknownPskIdentity)?;
        ctx.psk_identity = Some(identity);

        let other = match self.mix {
            Mix::None => None,
            Mix::Dhe => Some(dhe::proc_client_public(ctx, &mut r)?),
            Mix::Ecdhe => Some(ecdhe::proc_client_public(ctx, &mut r)?),
        };

        if r.any_left() {
            return Err(Error::UnexpectedPacketLength);
        }

        Ok(premaster(other.as_deref(), &psk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_psk_premaster_layout() {
        let pms = premaster(None, &[0xaa, 0xbb]);
        assert_eq!(pms, vec![0x00, 0x02, 0x00, 0x00, 0x00, 0x02, 0xaa, 0xbb]);
    }

    #[test]
    fn mixed_premaster_carries_shared_secret() {
        let pms = premaster(Some(&[1, 2, 3]), &[0xaa]);
        assert_eq!(pms, vec![0x00, 0x03, 1, 2, 3, 0x00, 0x01, 0xaa]);
    }
}

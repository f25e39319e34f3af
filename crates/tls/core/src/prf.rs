//! Implementation of the TLS Pseudo-Random Function (PRF) as defined in RFC 5246.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid prf key length")]
pub struct InvalidKeyLength;

fn prf_with<M: Mac + Clone>(keyed_hmac: M, out: &mut [u8], label: &[u8], seed: &[u8]) {
    // A(1) = HMAC_hash(secret, label + seed)
    let mut current_a = keyed_hmac.clone();
    current_a.update(label);
    current_a.update(seed);
    let mut a = current_a.finalize().into_bytes();

    for chunk in out.chunks_mut(a.len()) {
        // P_hash[i] = HMAC_hash(secret, A(i) + label + seed)
        let mut p_term = keyed_hmac.clone();
        p_term.update(&a);
        p_term.update(label);
        p_term.update(seed);
        chunk.copy_from_slice(&p_term.finalize().into_bytes()[..chunk.len()]);

        // A(i+1) = HMAC_hash(secret, A(i))
        let mut next_a = keyed_hmac.clone();
        next_a.update(&a);
        a = next_a.finalize().into_bytes();
    }
}

/// Fills the given buffer with the output of the TLS 1.2 PRF over
/// HMAC-SHA256.
///
/// # Arguments
///
/// * `out` - The buffer to fill with the output.
/// * `secret` - prf secret.
/// * `label` - prf label, e.g. "master secret".
/// * `seed` - prf seed, e.g. client_random + server_random.
pub fn prf(
    out: &mut [u8],
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
) -> Result<(), InvalidKeyLength> {
    let keyed_hmac = Hmac::<Sha256>::new_from_slice(secret).map_err(|_| InvalidKeyLength)?;
    prf_with(keyed_hmac, out, label, seed);
    Ok(())
}

/// The PRF over HMAC-SHA384, for the SHA384 cipher suites.
pub fn prf_sha384(
    out: &mut [u8],
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
) -> Result<(), InvalidKeyLength> {
    let keyed_hmac = Hmac::<Sha384>::new_from_slice(secret).map_err(|_| InvalidKeyLength)?;
    prf_with(keyed_hmac, out, label, seed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test vector from the TLS 1.2 PRF reference computation
    // (https://mailarchive.ietf.org/arch/msg/tls/fzVCzk-z3FShgGJ6DOXqM1ydxms/)
    #[test]
    fn sha256_reference_vector() {
        let secret = hex::decode("9bbe436ba940f017b17652849a71db35").unwrap();
        let seed = hex::decode("a0ba9f936cda311827a6f796ffd5198c").unwrap();
        let label = b"test label";
        let expect = hex::decode(
            "e3f229ba727be17b8d122620557cd453c2aab21d07c3d495329b52d4e61edb5a\
             6b301791e90d35c9c9a46b4e14baf9af0fa022f7077def17abfd3797c0564bab\
             4fbc91666e9def9b97fced26088f0a88",
        )
        .unwrap();

        let mut out = vec![0u8; expect.len()];
        prf(&mut out, &secret, label, &seed).unwrap();
        assert_eq!(out, expect);
    }

    #[test]
    fn output_is_deterministic() {
        let mut a = [0u8; 48];
        let mut b = [0u8; 48];
        prf_sha384(&mut a, &[1, 2, 3], b"master secret", &[4, 5, 6]).unwrap();
        prf_sha384(&mut b, &[1, 2, 3], b"master secret", &[4, 5, 6]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, [0u8; 48]);
    }
}

use ring::agreement;
use tls_core::{bigint::Mpi, msgs::enums::NamedGroup, rand, Error};

pub(crate) mod dhe;
pub(crate) mod ecdhe;
pub(crate) mod psk;
pub(crate) mod rsa;

pub(crate) use dispatch::{kx_module, ClientKxCtx, KxModule, ServerKxCtx, ServerKxParams};

mod dispatch;

/// A key-exchange group supported by the library.
///
/// All possible instances of this class are provided by the library in
/// the `ALL_KX_GROUPS` array.
pub struct SupportedKxGroup {
    /// The IANA "TLS Supported Groups" name of the group
    pub name: NamedGroup,

    /// The agreement backend, for the elliptic groups.  The FFDHE
    /// groups run over the big-integer surface instead.
    agreement: Option<&'static agreement::Algorithm>,
}

impl SupportedKxGroup {
    /// True for the groups the elliptic agreement backend can run.
    pub(crate) fn has_ec_backend(&self) -> bool {
        self.agreement.is_some()
    }
}

impl std::fmt::Debug for SupportedKxGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name.fmt(f)
    }
}

/// Ephemeral ECDH on curve25519 (see RFC7748)
pub static X25519: SupportedKxGroup = SupportedKxGroup {
    name: NamedGroup::X25519,
    agreement: Some(&agreement::X25519),
};

/// Ephemeral ECDH on secp256r1 (aka NIST-P256)
pub static SECP256R1: SupportedKxGroup = SupportedKxGroup {
    name: NamedGroup::secp256r1,
    agreement: Some(&agreement::ECDH_P256),
};

/// Ephemeral ECDH on secp384r1 (aka NIST-P384)
pub static SECP384R1: SupportedKxGroup = SupportedKxGroup {
    name: NamedGroup::secp384r1,
    agreement: Some(&agreement::ECDH_P384),
};

/// The RFC7919 2048-bit group, negotiable by id.  The server-side
/// parameters come from the credentials.
pub static FFDHE2048: SupportedKxGroup = SupportedKxGroup {
    name: NamedGroup::FFDHE2048,
    agreement: None,
};

/// The RFC7919 3072-bit group, negotiable by id.
pub static FFDHE3072: SupportedKxGroup = SupportedKxGroup {
    name: NamedGroup::FFDHE3072,
    agreement: None,
};

/// A list of all the key exchange groups supported by the library.
pub static ALL_KX_GROUPS: [&SupportedKxGroup; 5] =
    [&X25519, &SECP256R1, &SECP384R1, &FFDHE2048, &FFDHE3072];

/// Finite-field Diffie-Hellman parameters: a prime modulus and a
/// generator.  Servers doing DHE take these from their credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhParams {
    p: Vec<u8>,
    g: Vec<u8>,
}

impl DhParams {
    pub fn new(p: impl Into<Vec<u8>>, g: impl Into<Vec<u8>>) -> Self {
        Self {
            p: p.into(),
            g: g.into(),
        }
    }

    pub fn prime(&self) -> &[u8] {
        &self.p
    }

    pub fn generator(&self) -> &[u8] {
        &self.g
    }

    /// Size of the prime, in bits.
    pub fn prime_bits(&self) -> usize {
        Mpi::from_bytes_be(&self.p).bits()
    }
}

enum KxInner {
    Ec(agreement::EphemeralPrivateKey, &'static agreement::Algorithm),
    Dh { x: Mpi, p: Mpi },
}

/// An in-progress key exchange.  This has the algorithm,
/// our private key, and our public key.
pub(crate) struct KeyExchange {
    name: Option<NamedGroup>,
    inner: KxInner,
    pub(crate) pubkey: Vec<u8>,
}

impl KeyExchange {
    /// Choose a SupportedKxGroup by name, from a list of supported groups.
    pub(crate) fn choose(
        name: NamedGroup,
        supported: &[&'static SupportedKxGroup],
    ) -> Option<&'static SupportedKxGroup> {
        supported.iter().find(|skxg| skxg.name == name).cloned()
    }

    /// Start an elliptic key exchange, using the given SupportedKxGroup.
    ///
    /// This generates an ephemeral key pair and stores it in the returned
    /// KeyExchange object.
    pub(crate) fn start(skxg: &'static SupportedKxGroup) -> Option<Self> {
        let alg = skxg.agreement?;
        let rng = ring::rand::SystemRandom::new();

        let ours = agreement::EphemeralPrivateKey::generate(alg, &rng).ok()?;
        let pubkey = ours.compute_public_key().ok()?;

        Some(Self {
            name: Some(skxg.name),
            inner: KxInner::Ec(ours, alg),
            pubkey: pubkey.as_ref().to_vec(),
        })
    }

    /// Start a finite-field key exchange over the given parameters.
    pub(crate) fn start_dh(params: &DhParams) -> Result<Self, Error> {
        let p = Mpi::from_bytes_be(params.prime());
        let g = Mpi::from_bytes_be(params.generator());
        if p.is_zero() || g.is_zero() {
            return Err(Error::PeerMisbehavedError("invalid DH parameters".into()));
        }

        let x_bytes = rand::random_vec(p.bits().div_ceil(8))?;
        let x = Mpi::from_bytes_be(&x_bytes);
        let public = g.modpow(&x, &p);

        Ok(Self {
            name: None,
            inner: KxInner::Dh { x, p },
            pubkey: public.to_bytes_be(),
        })
    }

    /// Return the group being used, when one was negotiated by name.
    pub(crate) fn group(&self) -> Option<NamedGroup> {
        self.name
    }

    /// Completes the key exchange, given the peer's public key.
    ///
    /// The shared secret is passed into the closure passed down in `f`, and
    /// the result of calling `f` is returned to the caller.
    pub(crate) fn complete<T>(
        self,
        peer: &[u8],
        f: impl FnOnce(&[u8]) -> Result<T, ()>,
    ) -> Result<T, Error> {
        match self.inner {
            KxInner::Ec(privkey, alg) => {
                let peer_key = agreement::UnparsedPublicKey::new(alg, peer);
                agreement::agree_ephemeral(privkey, &peer_key, |secret| f(secret))
                    .map_err(|_| {
                        Error::PeerMisbehavedError("parsing peer's public key failed".to_string())
                    })?
                    .map_err(|()| {
                        Error::PeerMisbehavedError("key agreement failed".to_string())
                    })
            }
            KxInner::Dh { x, p } => {
                let peer_public = Mpi::from_bytes_be(peer);
                // Reject the degenerate publics: 0, 1 and p-1 confine
                // the shared secret to a guessable set.
                let one = Mpi::from_u64(1);
                if peer_public.cmp_value(&one) != std::cmp::Ordering::Greater
                    || peer_public.cmp_value(&p.sub(&one)) != std::cmp::Ordering::Less
                {
                    return Err(Error::PeerMisbehavedError(
                        "illegal DH public value".to_string(),
                    ));
                }

                let secret = peer_public.modpow(&x, &p);
                // RFC5246 8.1.2: the negotiated secret is used with
                // leading zero bytes stripped.
                f(&secret.to_bytes_be())
                    .map_err(|()| Error::PeerMisbehavedError("key agreement failed".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2^1279 - 1, a Mersenne prime: big enough to pass size floors,
    // cheap to write down.
    fn test_prime() -> Vec<u8> {
        let mut p = vec![0xffu8; 160];
        p[0] = 0x7f;
        p
    }

    #[test]
    fn choose_by_name() {
        assert!(KeyExchange::choose(NamedGroup::X25519, &ALL_KX_GROUPS).is_some());
        assert!(KeyExchange::choose(NamedGroup::Unknown(0x9999), &ALL_KX_GROUPS).is_none());
    }

    #[test]
    fn ecdhe_agreement_matches() {
        let a = KeyExchange::start(&X25519).unwrap();
        let b = KeyExchange::start(&X25519).unwrap();
        let b_pub = b.pubkey.clone();
        let a_pub = a.pubkey.clone();

        let s1 = a.complete(&b_pub, |s| Ok(s.to_vec())).unwrap();
        let s2 = b.complete(&a_pub, |s| Ok(s.to_vec())).unwrap();
        assert_eq!(s1, s2);
        assert!(!s1.is_empty());
    }

    #[test]
    fn dh_agreement_matches() {
        let params = DhParams::new(test_prime(), vec![2u8]);
        assert_eq!(params.prime_bits(), 1279);

        let a = KeyExchange::start_dh(&params).unwrap();
        let b = KeyExchange::start_dh(&params).unwrap();
        let b_pub = b.pubkey.clone();
        let a_pub = a.pubkey.clone();

        let s1 = a.complete(&b_pub, |s| Ok(s.to_vec())).unwrap();
        let s2 = b.complete(&a_pub, |s| Ok(s.to_vec())).unwrap();
        assert_eq!(s1, s2);
    }

    #[test]
    fn dh_rejects_degenerate_publics() {
        let params = DhParams::new(test_prime(), vec![2u8]);
        let kx = KeyExchange::start_dh(&params).unwrap();
        assert!(kx.complete(&[1], |s| Ok(s.to_vec())).is_err());

        let kx = KeyExchange::start_dh(&params).unwrap();
        assert!(kx.complete(&[0], |s| Ok(s.to_vec())).is_err());

        let kx = KeyExchange::start_dh(&params).unwrap();
        let mut p_minus_1 = test_prime();
        *p_minus_1.last_mut().unwrap() = 0xfe;
        assert!(kx.complete(&p_minus_1, |s| Ok(s.to_vec())).is_err());
    }

    #[test]
    fn ffdhe_groups_have_no_ec_backend() {
        assert!(KeyExchange::start(&FFDHE2048).is_none());
    }
}

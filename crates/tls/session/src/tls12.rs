//! TLS 1.2 secret derivation: premaster → master secret → key block,
//! and the Finished verify_data values.

use tls_core::{
    prf,
    suites::{HashAlgorithm, Tls12CipherSuite},
    Error,
};

use crate::{
    cipher::{new_tls12_decrypter, new_tls12_encrypter, MessageDecrypter, MessageEncrypter},
    conn::ConnectionRandoms,
};

fn prf_for(
    alg: &HashAlgorithm,
    out: &mut [u8],
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
) -> Result<(), Error> {
    let rc = match alg {
        HashAlgorithm::SHA384 => prf::prf_sha384(out, secret, label, seed),
        _ => prf::prf(out, secret, label, seed),
    };
    rc.map_err(|_| Error::General("prf failure".into()))
}

fn concat_randoms(a: &[u8; 32], b: &[u8; 32]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(a);
    out[32..].copy_from_slice(b);
    out
}

/// The master secret and its derivations for one TLS 1.2 session.
pub(crate) struct ConnectionSecrets {
    pub(crate) randoms: ConnectionRandoms,
    suite: &'static Tls12CipherSuite,
    pub(crate) master_secret: [u8; 48],
}

impl ConnectionSecrets {
    /// Derive the master secret the classic way, from the randoms.
    pub(crate) fn new(
        randoms: ConnectionRandoms,
        suite: &'static Tls12CipherSuite,
        pms: &[u8],
    ) -> Result<Self, Error> {
        let mut ret = Self {
            randoms,
            suite,
            master_secret: [0u8; 48],
        };

        let seed = concat_randoms(&ret.randoms.client, &ret.randoms.server);
        prf_for(
            suite.hash_algorithm(),
            &mut ret.master_secret,
            pms,
            b"master secret",
            &seed,
        )?;
        Ok(ret)
    }

    /// Derive the master secret under RFC 7627 extended-master-secret
    /// rules, binding the session hash.
    pub(crate) fn new_ems(
        randoms: ConnectionRandoms,
        hs_hash: &[u8],
        suite: &'static Tls12CipherSuite,
        pms: &[u8],
    ) -> Result<Self, Error> {
        let mut ret = Self {
            randoms,
            suite,
            master_secret: [0u8; 48],
        };

        prf_for(
            suite.hash_algorithm(),
            &mut ret.master_secret,
            pms,
            b"extended master secret",
            hs_hash,
        )?;
        Ok(ret)
    }

    pub(crate) fn suite(&self) -> &'static Tls12CipherSuite {
        self.suite
    }

    fn make_key_block(&self) -> Result<Vec<u8>, Error> {
        let aead = self.suite.common.aead_algorithm;
        let len = (aead.key_len() + self.suite.fixed_iv_len) * 2;

        let mut out = vec![0u8; len];

        // the key expansion seed is swapped relative to the master
        // secret seed
        let seed = concat_randoms(&self.randoms.server, &self.randoms.client);
        prf_for(
            self.suite.hash_algorithm(),
            &mut out,
            &self.master_secret,
            b"key expansion",
            &seed,
        )?;

        Ok(out)
    }

    /// Cut the key block into (client-write, server-write) cipher
    /// halves.
    pub(crate) fn make_cipher_pair(
        &self,
    ) -> Result<CipherPair, Error> {
        let key_block = self.make_key_block()?;

        let aead = self.suite.common.aead_algorithm;
        let (client_key, rest) = key_block.split_at(aead.key_len());
        let (server_key, rest) = rest.split_at(aead.key_len());
        let (client_iv, server_iv) = rest.split_at(self.suite.fixed_iv_len);

        Ok(CipherPair {
            client_write: new_tls12_encrypter(self.suite, client_key, client_iv),
            client_read: new_tls12_decrypter(self.suite, client_key, client_iv),
            server_write: new_tls12_encrypter(self.suite, server_key, server_iv),
            server_read: new_tls12_decrypter(self.suite, server_key, server_iv),
        })
    }

    pub(crate) fn client_verify_data(&self, hs_hash: &[u8]) -> Result<Vec<u8>, Error> {
        self.verify_data(b"client finished", hs_hash)
    }

    pub(crate) fn server_verify_data(&self, hs_hash: &[u8]) -> Result<Vec<u8>, Error> {
        self.verify_data(b"server finished", hs_hash)
    }

    fn verify_data(&self, label: &[u8], hs_hash: &[u8]) -> Result<Vec<u8>, Error> {
        let mut out = vec![0u8; 12];
        prf_for(
            self.suite.hash_algorithm(),
            &mut out,
            &self.master_secret,
            label,
            hs_hash,
        )?;
        Ok(out)
    }
}

/// Both directions of a freshly keyed epoch.  Each side installs the
/// halves that face it.
pub(crate) struct CipherPair {
    pub(crate) client_write: Box<dyn MessageEncrypter>,
    pub(crate) client_read: Box<dyn MessageDecrypter>,
    pub(crate) server_write: Box<dyn MessageEncrypter>,
    pub(crate) server_read: Box<dyn MessageDecrypter>,
}

/// Build the RSA key-transport premaster: the offered protocol
/// version followed by 46 random bytes.
pub(crate) fn rsa_premaster(client_hello_version: u16) -> Result<Vec<u8>, Error> {
    let mut pms = vec![0u8; 48];
    pms[0] = (client_hello_version >> 8) as u8;
    pms[1] = client_hello_version as u8;
    tls_core::rand::fill_random(&mut pms[2..])?;
    Ok(pms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tls_core::suites::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256;

    fn randoms() -> ConnectionRandoms {
        ConnectionRandoms {
            client: [1u8; 32],
            server: [2u8; 32],
        }
    }

    #[test]
    fn derivation_is_symmetric() {
        let suite = TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256.tls12().unwrap();
        let a = ConnectionSecrets::new(randoms(), suite, b"premaster").unwrap();
        let b = ConnectionSecrets::new(randoms(), suite, b"premaster").unwrap();
        assert_eq!(a.master_secret, b.master_secret);

        let vd_c = a.client_verify_data(&[9u8; 32]).unwrap();
        let vd_s = a.server_verify_data(&[9u8; 32]).unwrap();
        assert_eq!(vd_c.len(), 12);
        assert_ne!(vd_c, vd_s);
    }

    #[test]
    fn ems_differs_from_classic() {
        let suite = TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256.tls12().unwrap();
        let classic = ConnectionSecrets::new(randoms(), suite, b"premaster").unwrap();
        let ems =
            ConnectionSecrets::new_ems(randoms(), &[7u8; 32], suite, b"premaster").unwrap();
        assert_ne!(classic.master_secret, ems.master_secret);
    }

    #[test]
    fn rsa_premaster_embeds_version() {
        let pms = rsa_premaster(0x0303).unwrap();
        assert_eq!(pms.len(), 48);
        assert_eq!(&pms[..2], &[0x03, 0x03]);
    }
}

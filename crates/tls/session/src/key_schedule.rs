//! The TLS 1.3 key schedule (RFC 8446 section 7.1), built over HKDF.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha384, Sha512};
use tls_core::suites::{AEADAlgorithm, HashAlgorithm};

fn hmac(alg: &HashAlgorithm, key: &[u8], chunks: &[&[u8]]) -> Vec<u8> {
    match alg {
        HashAlgorithm::SHA256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("any key length works");
            for c in chunks {
                mac.update(c);
            }
            mac.finalize().into_bytes().to_vec()
        }
        HashAlgorithm::SHA384 => {
            let mut mac = Hmac::<Sha384>::new_from_slice(key).expect("any key length works");
            for c in chunks {
                mac.update(c);
            }
            mac.finalize().into_bytes().to_vec()
        }
        HashAlgorithm::SHA512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key).expect("any key length works");
            for c in chunks {
                mac.update(c);
            }
            mac.finalize().into_bytes().to_vec()
        }
    }
}

fn empty_hash(alg: &HashAlgorithm) -> Vec<u8> {
    match alg {
        HashAlgorithm::SHA256 => Sha256::digest([]).to_vec(),
        HashAlgorithm::SHA384 => Sha384::digest([]).to_vec(),
        HashAlgorithm::SHA512 => Sha512::digest([]).to_vec(),
    }
}

pub(crate) fn hkdf_extract(alg: &HashAlgorithm, salt: &[u8], ikm: &[u8]) -> Vec<u8> {
    hmac(alg, salt, &[ikm])
}

pub(crate) fn hkdf_expand(
    alg: &HashAlgorithm,
    prk: &[u8],
    info: &[u8],
    out_len: usize,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(out_len);
    let mut t: Vec<u8> = Vec::new();
    let mut counter = 1u8;

    while out.len() < out_len {
        t = hmac(alg, prk, &[&t, info, &[counter]]);
        let take = std::cmp::min(t.len(), out_len - out.len());
        out.extend_from_slice(&t[..take]);
        counter += 1;
    }

    out
}

/// HKDF-Expand-Label as specified for TLS 1.3: the label carries a
/// "tls13 " prefix and the hash context rides along in the info.
pub(crate) fn hkdf_expand_label(
    alg: &HashAlgorithm,
    secret: &[u8],
    label: &[u8],
    context: &[u8],
    out_len: usize,
) -> Vec<u8> {
    const PREFIX: &[u8] = b"tls13 ";

    let mut info = Vec::with_capacity(2 + 1 + PREFIX.len() + label.len() + 1 + context.len());
    info.extend_from_slice(&(out_len as u16).to_be_bytes());
    info.push((PREFIX.len() + label.len()) as u8);
    info.extend_from_slice(PREFIX);
    info.extend_from_slice(label);
    info.push(context.len() as u8);
    info.extend_from_slice(context);

    hkdf_expand(alg, secret, &info, out_len)
}

/// Traffic keys for one direction of one epoch.
pub(crate) struct TrafficKeys {
    pub(crate) key: Vec<u8>,
    pub(crate) iv: Vec<u8>,
}

pub(crate) fn derive_traffic_keys(
    alg: &HashAlgorithm,
    aead: &AEADAlgorithm,
    secret: &[u8],
) -> TrafficKeys {
    TrafficKeys {
        key: hkdf_expand_label(alg, secret, b"key", &[], aead.key_len()),
        iv: hkdf_expand_label(alg, secret, b"iv", &[], 12),
    }
}

/// The running secret ladder of one TLS 1.3 session.
pub(crate) struct KeySchedule {
    alg: &'static HashAlgorithm,
    current: Vec<u8>,
}

impl KeySchedule {
    /// Start the schedule at the Early Secret, from an external PSK or
    /// (commonly) all zeroes.
    pub(crate) fn new(alg: &'static HashAlgorithm, psk: Option<&[u8]>) -> Self {
        let zeroes = vec![0u8; alg.output_len()];
        let ikm = psk.unwrap_or(&zeroes);
        Self {
            alg,
            current: hkdf_extract(alg, &[], ikm),
        }
    }

    pub(crate) fn algorithm(&self) -> &'static HashAlgorithm {
        self.alg
    }

    fn derived(&self) -> Vec<u8> {
        hkdf_expand_label(
            self.alg,
            &self.current,
            b"derived",
            &empty_hash(self.alg),
            self.alg.output_len(),
        )
    }

    /// Mix in the (EC)DHE shared secret, moving to the Handshake
    /// Secret.
    pub(crate) fn input_shared_secret(&mut self, shared: &[u8]) {
        self.current = hkdf_extract(self.alg, &self.derived(), shared);
    }

    /// Move from the Handshake Secret to the Master Secret.
    pub(crate) fn into_master_secret(&mut self) {
        let zeroes = vec![0u8; self.alg.output_len()];
        self.current = hkdf_extract(self.alg, &self.derived(), &zeroes);
    }

    /// Derive a traffic secret for the given label and transcript
    /// hash.
    pub(crate) fn derive_secret(&self, label: &[u8], hs_hash: &[u8]) -> Vec<u8> {
        hkdf_expand_label(self.alg, &self.current, label, hs_hash, self.alg.output_len())
    }

    /// The verify_data for a Finished message protected under
    /// `traffic_secret`.
    pub(crate) fn finished_verify_data(
        &self,
        traffic_secret: &[u8],
        hs_hash: &[u8],
    ) -> Vec<u8> {
        let finished_key = hkdf_expand_label(
            self.alg,
            traffic_secret,
            b"finished",
            &[],
            self.alg.output_len(),
        );
        hmac(self.alg, &finished_key, &[hs_hash])
    }

    /// The next generation of an application traffic secret, for
    /// KeyUpdate.
    pub(crate) fn next_application_secret(&self, secret: &[u8]) -> Vec<u8> {
        hkdf_expand_label(
            self.alg,
            secret,
            b"traffic upd",
            &[],
            self.alg.output_len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC5869 test case 1
    #[test]
    fn hkdf_sha256_reference_vector() {
        let ikm = [0x0bu8; 22];
        let salt: Vec<u8> = (0x00..=0x0c).collect();
        let info: Vec<u8> = (0xf0..=0xf9).collect();

        let prk = hkdf_extract(&HashAlgorithm::SHA256, &salt, &ikm);
        assert_eq!(
            hex::encode(&prk),
            "077709362c2e32df0ddc3f0dc47bba6390b6c73bb50f9c3122ec844ad7c2b3e5"
        );

        let okm = hkdf_expand(&HashAlgorithm::SHA256, &prk, &info, 42);
        assert_eq!(
            hex::encode(&okm),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
        );
    }

    #[test]
    fn expand_label_info_layout() {
        // both sides must derive identical keys
        let a = hkdf_expand_label(&HashAlgorithm::SHA256, &[1; 32], b"key", &[], 16);
        let b = hkdf_expand_label(&HashAlgorithm::SHA256, &[1; 32], b"key", &[], 16);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        // distinct labels diverge
        let c = hkdf_expand_label(&HashAlgorithm::SHA256, &[1; 32], b"iv", &[], 16);
        assert_ne!(a, c);
    }

    #[test]
    fn schedule_walk_is_deterministic() {
        let mut ks1 = KeySchedule::new(&HashAlgorithm::SHA256, None);
        let mut ks2 = KeySchedule::new(&HashAlgorithm::SHA256, None);
        ks1.input_shared_secret(b"shared");
        ks2.input_shared_secret(b"shared");

        let h = [0xaa; 32];
        assert_eq!(ks1.derive_secret(b"c hs traffic", &h), ks2.derive_secret(b"c hs traffic", &h));
        assert_ne!(
            ks1.derive_secret(b"c hs traffic", &h),
            ks1.derive_secret(b"s hs traffic", &h)
        );
    }
}

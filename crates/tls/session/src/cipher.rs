use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, NewAead, Payload as AeadPayload},
    Aes128Gcm, Aes256Gcm,
};
use chacha20poly1305::ChaCha20Poly1305;
use tls_core::{
    codec,
    msgs::{
        base::Payload,
        enums::{ContentType, ProtocolVersion},
        message::{OpaqueMessage, PlainMessage},
    },
    suites::AEADAlgorithm,
    Error,
};

#[cfg(feature = "tls12")]
use tls_core::suites::Tls12CipherSuite;
use tls_core::suites::Tls13CipherSuite;

/// Objects with this trait can decrypt TLS messages.
pub trait MessageDecrypter: Send + Sync {
    /// Perform the decryption over the concerned TLS message.
    fn decrypt(&self, m: OpaqueMessage, seq: u64) -> Result<PlainMessage, Error>;
}

/// Objects with this trait can encrypt TLS messages.
pub trait MessageEncrypter: Send + Sync {
    /// Perform the encryption over the concerned TLS message.
    fn encrypt(&self, m: PlainMessage, seq: u64) -> Result<OpaqueMessage, Error>;
}

/// A `MessageEncrypter` which doesn't work.
pub(crate) struct InvalidMessageEncrypter {}

impl MessageEncrypter for InvalidMessageEncrypter {
    fn encrypt(&self, _m: PlainMessage, _seq: u64) -> Result<OpaqueMessage, Error> {
        Err(Error::EncryptError)
    }
}

/// A `MessageDecrypter` which doesn't work.
pub(crate) struct InvalidMessageDecrypter {}

impl MessageDecrypter for InvalidMessageDecrypter {
    fn decrypt(&self, _m: OpaqueMessage, _seq: u64) -> Result<PlainMessage, Error> {
        Err(Error::DecryptError)
    }
}

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const MAX_FRAGMENT_LEN: usize = 16384;

/// A write or read IV.
#[derive(Default)]
pub(crate) struct Iv(pub(crate) [u8; NONCE_LEN]);

impl Iv {
    pub(crate) fn copy(value: &[u8]) -> Self {
        debug_assert_eq!(value.len(), NONCE_LEN);
        let mut iv = Self(Default::default());
        iv.0.copy_from_slice(value);
        iv
    }
}

pub(crate) fn make_nonce(iv: &Iv, seq: u64) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    codec::put_u64(seq, &mut nonce[4..]);

    nonce.iter_mut().zip(iv.0.iter()).for_each(|(nonce, iv)| {
        *nonce ^= *iv;
    });

    nonce
}

/// The negotiated AEAD, keyed for one direction.
pub(crate) enum AeadCipher {
    Aes128Gcm(Box<Aes128Gcm>),
    Aes256Gcm(Box<Aes256Gcm>),
    ChaCha20Poly1305(Box<ChaCha20Poly1305>),
}

impl AeadCipher {
    pub(crate) fn new(alg: &AEADAlgorithm, key: &[u8]) -> Self {
        debug_assert_eq!(key.len(), alg.key_len());
        match alg {
            AEADAlgorithm::AES_128_GCM => {
                Self::Aes128Gcm(Box::new(Aes128Gcm::new(GenericArray::from_slice(key))))
            }
            AEADAlgorithm::AES_256_GCM => {
                Self::Aes256Gcm(Box::new(Aes256Gcm::new(GenericArray::from_slice(key))))
            }
            AEADAlgorithm::CHACHA20_POLY1305 => Self::ChaCha20Poly1305(Box::new(
                ChaCha20Poly1305::new(GenericArray::from_slice(key)),
            )),
        }
    }

    fn seal(&self, nonce: &[u8; NONCE_LEN], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>, Error> {
        let nonce = GenericArray::from_slice(nonce);
        let payload = AeadPayload { msg, aad };
        match self {
            Self::Aes128Gcm(c) => c.encrypt(nonce, payload),
            Self::Aes256Gcm(c) => c.encrypt(nonce, payload),
            Self::ChaCha20Poly1305(c) => c.encrypt(nonce, payload),
        }
        .map_err(|_| Error::EncryptError)
    }

    fn open(&self, nonce: &[u8; NONCE_LEN], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>, Error> {
        let nonce = GenericArray::from_slice(nonce);
        let payload = AeadPayload { msg, aad };
        match self {
            Self::Aes128Gcm(c) => c.decrypt(nonce, payload),
            Self::Aes256Gcm(c) => c.decrypt(nonce, payload),
            Self::ChaCha20Poly1305(c) => c.decrypt(nonce, payload),
        }
        // A tag mismatch and a padding problem are indistinguishable
        // on purpose: both surface as a decrypt failure that the
        // record layer answers with bad_record_mac.
        .map_err(|_| Error::DecryptError)
    }
}

/// A TLS 1.3 write path: the entire record is AEAD-protected with the
/// content type hidden inside.
pub(crate) struct Tls13MessageEncrypter {
    cipher: AeadCipher,
    iv: Iv,
}

/// The corresponding TLS 1.3 read path.
pub(crate) struct Tls13MessageDecrypter {
    cipher: AeadCipher,
    iv: Iv,
}

fn make_tls13_aad(len: usize) -> [u8; 5] {
    [
        ContentType::ApplicationData.get_u8(),
        0x3,
        0x3,
        (len >> 8) as u8,
        len as u8,
    ]
}

pub(crate) fn new_tls13_encrypter(
    suite: &'static Tls13CipherSuite,
    key: &[u8],
    iv: &[u8],
) -> Box<dyn MessageEncrypter> {
    Box::new(Tls13MessageEncrypter {
        cipher: AeadCipher::new(suite.common.aead_algorithm, key),
        iv: Iv::copy(iv),
    })
}

pub(crate) fn new_tls13_decrypter(
    suite: &'static Tls13CipherSuite,
    key: &[u8],
    iv: &[u8],
) -> Box<dyn MessageDecrypter> {
    Box::new(Tls13MessageDecrypter {
        cipher: AeadCipher::new(suite.common.aead_algorithm, key),
        iv: Iv::copy(iv),
    })
}

impl MessageEncrypter for Tls13MessageEncrypter {
    fn encrypt(&self, msg: PlainMessage, seq: u64) -> Result<OpaqueMessage, Error> {
        let mut inner = msg.payload.0;
        inner.push(msg.typ.get_u8());

        let aad = make_tls13_aad(inner.len() + TAG_LEN);
        let nonce = make_nonce(&self.iv, seq);
        let buf = self.cipher.seal(&nonce, &aad, &inner)?;

        Ok(OpaqueMessage {
            typ: ContentType::ApplicationData,
            version: ProtocolVersion::TLSv1_2,
            payload: Payload::new(buf),
        })
    }
}

impl MessageDecrypter for Tls13MessageDecrypter {
    fn decrypt(&self, msg: OpaqueMessage, seq: u64) -> Result<PlainMessage, Error> {
        let payload = &msg.payload.0;
        if payload.len() < TAG_LEN {
            return Err(Error::DecryptError);
        }

        let nonce = make_nonce(&self.iv, seq);
        let aad = make_tls13_aad(payload.len());
        let mut plain = self.cipher.open(&nonce, &aad, payload)?;

        if plain.len() > MAX_FRAGMENT_LEN + 1 {
            return Err(Error::PeerSentOversizedRecord);
        }

        // strip the padding, then the true content type
        let typ = loop {
            match plain.pop() {
                Some(0) => {}
                Some(b) => break ContentType::from(b),
                None => {
                    return Err(Error::PeerMisbehavedError(
                        "illegal TLSInnerPlaintext".to_string(),
                    ))
                }
            }
        };

        Ok(PlainMessage {
            typ,
            version: ProtocolVersion::TLSv1_3,
            payload: Payload(plain),
        })
    }
}

#[cfg(feature = "tls12")]
fn make_tls12_aad(
    seq: u64,
    typ: ContentType,
    vers: ProtocolVersion,
    len: usize,
) -> [u8; 13] {
    let mut out = [0; 13];
    codec::put_u64(seq, &mut out[..8]);
    out[8] = typ.get_u8();
    codec::put_u16(vers.get_u16(), &mut out[9..11]);
    codec::put_u16(len as u16, &mut out[11..]);
    out
}

/// A TLS 1.2 AES-GCM write path: 4-byte salt from the key block, an
/// 8-byte explicit nonce on the wire.
#[cfg(feature = "tls12")]
pub(crate) struct Tls12GcmMessageEncrypter {
    cipher: AeadCipher,
    salt: [u8; 4],
}

#[cfg(feature = "tls12")]
pub(crate) struct Tls12GcmMessageDecrypter {
    cipher: AeadCipher,
    salt: [u8; 4],
}

#[cfg(feature = "tls12")]
impl MessageEncrypter for Tls12GcmMessageEncrypter {
    fn encrypt(&self, msg: PlainMessage, seq: u64) -> Result<OpaqueMessage, Error> {
        let mut nonce = [0u8; NONCE_LEN];
        nonce[..4].copy_from_slice(&self.salt);
        codec::put_u64(seq, &mut nonce[4..]);

        let aad = make_tls12_aad(seq, msg.typ, msg.version, msg.payload.0.len());
        let ciphertext = self.cipher.seal(&nonce, &aad, &msg.payload.0)?;

        let mut payload = Vec::with_capacity(8 + ciphertext.len());
        payload.extend_from_slice(&nonce[4..]);
        payload.extend_from_slice(&ciphertext);

        Ok(OpaqueMessage {
            typ: msg.typ,
            version: msg.version,
            payload: Payload::new(payload),
        })
    }
}

#[cfg(feature = "tls12")]
impl MessageDecrypter for Tls12GcmMessageDecrypter {
    fn decrypt(&self, msg: OpaqueMessage, seq: u64) -> Result<PlainMessage, Error> {
        let payload = &msg.payload.0;
        if payload.len() < 8 + TAG_LEN {
            return Err(Error::DecryptError);
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce[..4].copy_from_slice(&self.salt);
        nonce[4..].copy_from_slice(&payload[..8]);

        let plain_len = payload.len() - 8 - TAG_LEN;
        if plain_len > MAX_FRAGMENT_LEN {
            return Err(Error::PeerSentOversizedRecord);
        }

        let aad = make_tls12_aad(seq, msg.typ, msg.version, plain_len);
        let plain = self.cipher.open(&nonce, &aad, &payload[8..])?;

        Ok(PlainMessage {
            typ: msg.typ,
            version: msg.version,
            payload: Payload(plain),
        })
    }
}

/// The TLS 1.2 ChaCha20-Poly1305 paths use the TLS 1.3 nonce
/// construction and carry no explicit nonce.
#[cfg(feature = "tls12")]
pub(crate) struct Tls12ChaChaMessageEncrypter {
    cipher: AeadCipher,
    iv: Iv,
}

#[cfg(feature = "tls12")]
pub(crate) struct Tls12ChaChaMessageDecrypter {
    cipher: AeadCipher,
    iv: Iv,
}

#[cfg(feature = "tls12")]
impl MessageEncrypter for Tls12ChaChaMessageEncrypter {
    fn encrypt(&self, msg: PlainMessage, seq: u64) -> Result<OpaqueMessage, Error> {
        let nonce = make_nonce(&self.iv, seq);
        let aad = make_tls12_aad(seq, msg.typ, msg.version, msg.payload.0.len());
        let ciphertext = self.cipher.seal(&nonce, &aad, &msg.payload.0)?;

        Ok(OpaqueMessage {
            typ: msg.typ,
            version: msg.version,
            payload: Payload::new(ciphertext),
        })
    }
}

#[cfg(feature = "tls12")]
impl MessageDecrypter for Tls12ChaChaMessageDecrypter {
    fn decrypt(&self, msg: OpaqueMessage, seq: u64) -> Result<PlainMessage, Error> {
        let payload = &msg.payload.0;
        if payload.len() < TAG_LEN {
            return Err(Error::DecryptError);
        }

        let plain_len = payload.len() - TAG_LEN;
        if plain_len > MAX_FRAGMENT_LEN {
            return Err(Error::PeerSentOversizedRecord);
        }

        let nonce = make_nonce(&self.iv, seq);
        let aad = make_tls12_aad(seq, msg.typ, msg.version, plain_len);
        let plain = self.cipher.open(&nonce, &aad, payload)?;

        Ok(PlainMessage {
            typ: msg.typ,
            version: msg.version,
            payload: Payload(plain),
        })
    }
}

/// Build the write half for a TLS 1.2 suite from its slice of the key
/// block.
#[cfg(feature = "tls12")]
pub(crate) fn new_tls12_encrypter(
    suite: &'static Tls12CipherSuite,
    key: &[u8],
    iv: &[u8],
) -> Box<dyn MessageEncrypter> {
    let cipher = AeadCipher::new(suite.common.aead_algorithm, key);
    match suite.explicit_nonce_len {
        0 => Box::new(Tls12ChaChaMessageEncrypter {
            cipher,
            iv: Iv::copy(iv),
        }),
        _ => {
            let mut salt = [0u8; 4];
            salt.copy_from_slice(iv);
            Box::new(Tls12GcmMessageEncrypter { cipher, salt })
        }
    }
}

/// Build the read half for a TLS 1.2 suite from its slice of the key
/// block.
#[cfg(feature = "tls12")]
pub(crate) fn new_tls12_decrypter(
    suite: &'static Tls12CipherSuite,
    key: &[u8],
    iv: &[u8],
) -> Box<dyn MessageDecrypter> {
    let cipher = AeadCipher::new(suite.common.aead_algorithm, key);
    match suite.explicit_nonce_len {
        0 => Box::new(Tls12ChaChaMessageDecrypter {
            cipher,
            iv: Iv::copy(iv),
        }),
        _ => {
            let mut salt = [0u8; 4];
            salt.copy_from_slice(iv);
            Box::new(Tls12GcmMessageDecrypter { cipher, salt })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tls_core::suites::TLS13_AES_128_GCM_SHA256;

    fn plain(typ: ContentType, body: &[u8]) -> PlainMessage {
        PlainMessage {
            typ,
            version: ProtocolVersion::TLSv1_2,
            payload: Payload::new(body.to_vec()),
        }
    }

    #[test]
    fn tls13_seal_open_round_trip() {
        let suite = TLS13_AES_128_GCM_SHA256.tls13().unwrap();
        let key = [0x11u8; 16];
        let iv = [0x22u8; 12];
        let enc = new_tls13_encrypter(suite, &key, &iv);
        let dec = new_tls13_decrypter(suite, &key, &iv);

        let sealed = enc
            .encrypt(plain(ContentType::Handshake, b"finished"), 0)
            .unwrap();
        assert_eq!(sealed.typ, ContentType::ApplicationData);

        let opened = dec.decrypt(sealed, 0).unwrap();
        assert_eq!(opened.typ, ContentType::Handshake);
        assert_eq!(opened.payload.0, b"finished");
    }

    #[test]
    fn tls13_wrong_seq_fails() {
        let suite = TLS13_AES_128_GCM_SHA256.tls13().unwrap();
        let key = [0x11u8; 16];
        let iv = [0x22u8; 12];
        let enc = new_tls13_encrypter(suite, &key, &iv);
        let dec = new_tls13_decrypter(suite, &key, &iv);

        let sealed = enc.encrypt(plain(ContentType::ApplicationData, b"x"), 3).unwrap();
        assert!(matches!(dec.decrypt(sealed, 4), Err(Error::DecryptError)));
    }

    #[cfg(feature = "tls12")]
    #[test]
    fn tls12_gcm_round_trip() {
        use tls_core::suites::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256;
        let suite = TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256.tls12().unwrap();
        let key = [0x42u8; 16];
        let iv = [0x24u8; 4];
        let enc = new_tls12_encrypter(suite, &key, &iv);
        let dec = new_tls12_decrypter(suite, &key, &iv);

        let sealed = enc
            .encrypt(plain(ContentType::ApplicationData, b"ping"), 1)
            .unwrap();
        // explicit nonce is visible on the wire
        assert_eq!(sealed.payload.0.len(), 8 + 4 + TAG_LEN);

        let opened = dec.decrypt(sealed, 1).unwrap();
        assert_eq!(opened.payload.0, b"ping");
    }

    #[cfg(feature = "tls12")]
    #[test]
    fn tls12_chacha_round_trip() {
        use tls_core::suites::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256;
        let suite = TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256.tls12().unwrap();
        let key = [0x42u8; 32];
        let iv = [0x24u8; 12];
        let enc = new_tls12_encrypter(suite, &key, &iv);
        let dec = new_tls12_decrypter(suite, &key, &iv);

        let sealed = enc
            .encrypt(plain(ContentType::ApplicationData, b"pong"), 7)
            .unwrap();
        assert_eq!(sealed.payload.0.len(), 4 + TAG_LEN);
        let opened = dec.decrypt(sealed, 7).unwrap();
        assert_eq!(opened.payload.0, b"pong");
    }
}

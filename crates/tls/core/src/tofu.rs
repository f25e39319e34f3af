//! Trust-on-first-use storage for peer public keys.
//!
//! The database is a line-oriented text file.  Each line pins either
//! a full public key (`g0`) or a hash commitment to a future key
//! (`c0`) for a (host, service) pair:
//!
//! ```text
//! |g0|HOST|SERVICE|EXPIRATION|BASE64_SPKI
//! |c0|HOST|SERVICE|EXPIRATION|HASH_ALG_ID|HEX_DIGEST
//! ```
//!
//! `HOST` or `SERVICE` may be `*`.  `EXPIRATION` is decimal
//! epoch-seconds, 0 meaning never.  Unparseable lines are skipped.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::Error;

/// Permit commitments made with broken hash algorithms.
pub const SCOMMIT_FLAG_ALLOW_BROKEN: u32 = 1;

/// Hash algorithm identifiers used in `c0` lines.  The numbering
/// follows the digest registry of the known_hosts format, so
/// databases are interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitHashAlg {
    Md5 = 2,
    Sha1 = 3,
    Sha256 = 6,
    Sha384 = 7,
    Sha512 = 8,
}

impl CommitHashAlg {
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            2 => Some(Self::Md5),
            3 => Some(Self::Sha1),
            6 => Some(Self::Sha256),
            7 => Some(Self::Sha384),
            8 => Some(Self::Sha512),
            _ => None,
        }
    }

    /// MD5 and SHA-1 are not acceptable for new commitments.
    pub fn is_broken(&self) -> bool {
        matches!(self, Self::Md5 | Self::Sha1)
    }

    fn digest(&self, data: &[u8]) -> Option<Vec<u8>> {
        match self {
            Self::Sha256 => Some(Sha256::digest(data).to_vec()),
            Self::Sha384 => Some(Sha384::digest(data).to_vec()),
            Self::Sha512 => Some(Sha512::digest(data).to_vec()),
            // no digest support for the broken algorithms; entries
            // using them never match
            Self::Md5 | Self::Sha1 => None,
        }
    }
}

/// The storage strategy.  The default is [`FileDb`]; embedders can
/// substitute any other keeper of pins (a registry, a remote
/// service) by implementing this.
pub trait TofuBackend: Send + Sync {
    /// Look up (host, service); compare against `spki`.
    ///
    /// Returns success on a match, [`Error::CertificateKeyMismatch`]
    /// when an unexpired entry exists with different key material,
    /// and [`Error::NoCertificateFound`] when nothing matches.
    fn verify(&self, host: &str, service: &str, spki: &[u8]) -> Result<(), Error>;

    /// Pin `spki` for (host, service).  `expiration` is epoch-seconds,
    /// 0 for never.
    fn store(&self, host: &str, service: &str, expiration: u64, spki: &[u8])
        -> Result<(), Error>;

    /// Record a commitment to a key that will be presented later.
    fn store_commitment(
        &self,
        host: &str,
        service: &str,
        expiration: u64,
        alg: CommitHashAlg,
        digest: &[u8],
        flags: u32,
    ) -> Result<(), Error>;
}

/// Writers take this to serialize appends within the process.
static WRITE_LOCK: Mutex<()> = Mutex::new(());

/// The file-backed default database.
pub struct FileDb {
    path: PathBuf,
}

#[derive(Debug)]
enum Entry {
    Key {
        spki: Vec<u8>,
    },
    Commitment {
        alg: CommitHashAlg,
        digest: Vec<u8>,
    },
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn field_matches(entry: &str, wanted: &str) -> bool {
    entry == "*" || entry == wanted
}

fn parse_line(line: &str, host: &str, service: &str) -> Option<Entry> {
    let mut fields = line.strip_prefix('|')?.split('|');

    let tag = fields.next()?;
    let entry_host = fields.next()?;
    let entry_service = fields.next()?;
    let expiration: u64 = fields.next()?.parse().ok()?;

    if !field_matches(entry_host, host) || !field_matches(entry_service, service) {
        return None;
    }
    if expiration != 0 && expiration < now_secs() {
        return None;
    }

    match tag {
        "g0" => {
            let spki = B64.decode(fields.next()?).ok()?;
            Some(Entry::Key { spki })
        }
        "c0" => {
            let alg = CommitHashAlg::from_id(fields.next()?.parse().ok()?)?;
            let digest = hex::decode(fields.next()?).ok()?;
            Some(Entry::Commitment { alg, digest })
        }
        _ => None,
    }
}

impl FileDb {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The per-user database under the configuration directory:
    /// `$XDG_CONFIG_HOME/tern-tls/known_hosts`, falling back to
    /// `$HOME/.config/tern-tls/known_hosts`.
    pub fn open_default() -> Result<Self, Error> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|home| Path::new(&home).join(".config"))
            })
            .ok_or_else(|| Error::FileError("no configuration directory".into()))?;

        Ok(Self::new(base.join("tern-tls").join("known_hosts")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_line(&self, line: String) -> Result<(), Error> {
        let _guard = WRITE_LOCK.lock().unwrap();

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| Error::FileError(e.to_string()))?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::FileError(e.to_string()))?;

        file.write_all(line.as_bytes())
            .map_err(|e| Error::FileError(e.to_string()))
    }
}

impl TofuBackend for FileDb {
    fn verify(&self, host: &str, service: &str, spki: &[u8]) -> Result<(), Error> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NoCertificateFound)
            }
            Err(e) => return Err(Error::FileError(e.to_string())),
        };

        let mut found = false;
        for line in contents.lines() {
            let entry = match parse_line(line, host, service) {
                Some(e) => e,
                None => continue,
            };
            found = true;

            match entry {
                Entry::Key { spki: stored } => {
                    if stored == spki {
                        return Ok(());
                    }
                }
                Entry::Commitment { alg, digest } => {
                    if let Some(computed) = alg.digest(spki) {
                        if computed == digest {
                            return Ok(());
                        }
                    }
                }
            }
        }

        if found {
            Err(Error::CertificateKeyMismatch)
        } else {
            Err(Error::NoCertificateFound)
        }
    }

    fn store(
        &self,
        host: &str,
        service: &str,
        expiration: u64,
        spki: &[u8],
    ) -> Result<(), Error> {
        self.append_line(format!(
            "|g0|{}|{}|{}|{}\n",
            host,
            service,
            expiration,
            B64.encode(spki)
        ))
    }

    fn store_commitment(
        &self,
        host: &str,
        service: &str,
        expiration: u64,
        alg: CommitHashAlg,
        digest: &[u8],
        flags: u32,
    ) -> Result<(), Error> {
        if alg.is_broken() && flags & SCOMMIT_FLAG_ALLOW_BROKEN == 0 {
            return Err(Error::General(
                "commitment with broken hash algorithm refused".into(),
            ));
        }

        self.append_line(format!(
            "|c0|{}|{}|{}|{}|{}\n",
            host,
            service,
            expiration,
            alg as u32,
            hex::encode(digest)
        ))
    }
}

/// Project a TOFU lookup onto the verification-status bitmask: a
/// mismatching pin contributes the MISMATCH flag, a missing entry is
/// data for the caller's first-use policy, and everything else keeps
/// its error character.
pub fn verification_status(
    backend: &dyn TofuBackend,
    host: &str,
    service: &str,
    spki: &[u8],
) -> Result<crate::verify::CertStatus, Error> {
    use crate::verify::CertStatus;

    match backend.verify(host, service, spki) {
        Ok(()) => Ok(CertStatus::trusted()),
        Err(Error::CertificateKeyMismatch) => Ok(CertStatus::MISMATCH),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn scratch_db() -> FileDb {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "tern-tofu-test-{}-{}",
            std::process::id(),
            n
        ));
        let _ = fs::remove_file(&path);
        FileDb::new(path)
    }

    const SPKI: &[u8] = b"\x30\x82\x01\x0a\x02\x82fake-spki-bytes";

    #[test]
    fn verify_on_missing_db_finds_nothing() {
        let db = scratch_db();
        assert_eq!(
            db.verify("www.example.com", "443", SPKI),
            Err(Error::NoCertificateFound)
        );
    }

    #[test]
    fn store_then_verify_round_trip() {
        let db = scratch_db();
        db.store("www.example.com", "443", 0, SPKI).unwrap();
        assert_eq!(db.verify("www.example.com", "443", SPKI), Ok(()));

        // different key for the same host is a mismatch
        assert_eq!(
            db.verify("www.example.com", "443", b"other-key"),
            Err(Error::CertificateKeyMismatch)
        );

        // a different host finds nothing
        assert_eq!(
            db.verify("other.example.com", "443", SPKI),
            Err(Error::NoCertificateFound)
        );
    }

    #[test]
    fn wildcard_service_matches_any_port() {
        let db = scratch_db();
        db.store("www.example.com", "*", 0, SPKI).unwrap();
        assert_eq!(db.verify("www.example.com", "443", SPKI), Ok(()));
        assert_eq!(db.verify("www.example.com", "993", SPKI), Ok(()));
    }

    #[test]
    fn expired_entry_is_treated_as_absent() {
        let db = scratch_db();
        db.store("www.example.com", "443", 1, SPKI).unwrap();
        assert_eq!(
            db.verify("www.example.com", "443", SPKI),
            Err(Error::NoCertificateFound)
        );
    }

    #[test]
    fn commitment_matches_future_key() {
        let db = scratch_db();
        let digest = Sha256::digest(SPKI);
        db.store_commitment("www.example.com", "443", 0, CommitHashAlg::Sha256, &digest, 0)
            .unwrap();
        assert_eq!(db.verify("www.example.com", "443", SPKI), Ok(()));
        assert_eq!(
            db.verify("www.example.com", "443", b"not-the-committed-key"),
            Err(Error::CertificateKeyMismatch)
        );
    }

    #[test]
    fn broken_hash_commitments_are_refused() {
        let db = scratch_db();
        assert!(db
            .store_commitment("h", "s", 0, CommitHashAlg::Sha1, &[0u8; 20], 0)
            .is_err());
        assert!(db
            .store_commitment("h", "s", 0, CommitHashAlg::Sha1, &[0u8; 20], SCOMMIT_FLAG_ALLOW_BROKEN)
            .is_ok());
    }

    #[test]
    fn junk_lines_are_skipped() {
        let db = scratch_db();
        db.append_line("this is not an entry\n".to_string()).unwrap();
        db.append_line("|x9|www.example.com|443|0|AAAA\n".to_string())
            .unwrap();
        db.store("www.example.com", "443", 0, SPKI).unwrap();
        assert_eq!(db.verify("www.example.com", "443", SPKI), Ok(()));
    }

    #[test]
    fn status_projection() {
        let db = scratch_db();
        db.store("h", "443", 0, SPKI).unwrap();

        assert!(verification_status(&db, "h", "443", SPKI)
            .unwrap()
            .is_trusted());
        assert_eq!(
            verification_status(&db, "h", "443", b"other"),
            Ok(crate::verify::CertStatus::MISMATCH)
        );
        assert_eq!(
            verification_status(&db, "elsewhere", "443", SPKI),
            Err(Error::NoCertificateFound)
        );
    }

    #[test]
    fn line_format_is_stable() {
        let db = scratch_db();
        db.store("host", "443", 0, b"k").unwrap();
        let contents = fs::read_to_string(db.path()).unwrap();
        assert_eq!(contents, format!("|g0|host|443|0|{}\n", B64.encode(b"k")));
    }
}

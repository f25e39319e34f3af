//! Session machinery for the Tern TLS endpoint.
//!
//! This crate supplies the encrypted-pipe types: [`ClientConnection`]
//! and [`ServerConnection`].  You supply raw TLS traffic on one side
//! (via [`read_tls()`] and [`write_tls()`]) and read/write plaintext
//! on the other:
//!
//! [`read_tls()`]: ConnectionCommon::read_tls
//! [`write_tls()`]: CommonState::write_tls
//!
//! ```text
//!          TLS                                   Plaintext
//!          ===                                   =========
//!     read_tls()      +-----------------------+      reader() as io::Read
//!                     |                       |
//!           +--------->   ClientConnection    +--------->
//!                     |          or           |
//!           <---------+   ServerConnection    <---------+
//!                     |                       |
//!     write_tls()     +-----------------------+      writer() as io::Write
//! ```
//!
//! A connection performs no transport I/O of its own: it never makes
//! or accepts TCP connections, does DNS, or reads files.  The only
//! suspension points are the two transport-facing calls, which report
//! `WouldBlock`/`Interrupted` from the supplied stream untranslated;
//! resume by repeating the same call.  Everything else, including the
//! cryptography, runs synchronously.
//!
//! After each successful `read_tls()` call
//! [`process_new_packets()`][ConnectionCommon::process_new_packets]
//! parses and processes the buffered messages.  Any error it returns
//! is fatal to the connection: future calls do no new work and return
//! the same error.  The alert, if the error maps to one, has been
//! queued for a final `write_tls()` at that point.

#![forbid(unsafe_code)]
#![deny(
    clippy::clone_on_ref_ptr,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_extern_crates,
    unused_qualifications
)]
#![allow(clippy::new_without_default)]

// log for logging (optional).
#[cfg(feature = "logging")]
use log;

#[cfg(not(feature = "logging"))]
#[macro_use]
mod log {
    macro_rules! trace    ( ($($tt:tt)*) => {{}} );
    macro_rules! debug    ( ($($tt:tt)*) => {{}} );
    macro_rules! warn     ( ($($tt:tt)*) => {{}} );
    macro_rules! error    ( ($($tt:tt)*) => {{}} );
}

#[macro_use]
mod check;
mod builder;
mod cipher;
mod conn;
mod credentials;
mod hs_ext;
mod key_schedule;
mod kx;
mod record_layer;
mod sign;
#[cfg(feature = "tls12")]
mod tls12;
mod vecbuf;

pub(crate) mod hash_hs;

/// Items for use in a client.
pub mod client;

/// Items for use in a server.
pub mod server;

pub use builder::{
    ConfigBuilder, ConfigSide, WantsCipherSuites, WantsKxGroups, WantsVerifier, WantsVersions,
};
pub use cipher::{MessageDecrypter, MessageEncrypter};
pub use client::{ClientConfig, ClientConnection};
pub use conn::{CommonState, ConnectionCommon, IoState, Reader, Writer};
pub use credentials::{
    load_pem_certs, load_pem_private_key, ClientHello, InMemoryPskStore, PskIdentity, PskStore,
    ResolvesServerCert, ResolvesServerCertUsingSni, MAX_USERNAME_SIZE,
};
pub use kx::{DhParams, SupportedKxGroup, ALL_KX_GROUPS};
pub use server::{ServerConfig, ServerConnection};
pub use sign::CertifiedKey;

// The external interface of the core crate is re-exported here, so a
// session-crate dependency is enough for most applications.
pub use tls_core::{
    anchors::{OwnedTrustAnchor, RootCertStore},
    dns::ServerName,
    key::{Certificate, PrivateKey},
    msgs::enums::{CipherSuite, ProtocolVersion, SignatureScheme},
    suites::{SupportedCipherSuite, ALL_CIPHER_SUITES, DEFAULT_CIPHER_SUITES},
    verify::{CertStatus, VerifyFlags},
    versions::{SupportedProtocolVersion, ALL_VERSIONS, DEFAULT_VERSIONS},
    Error, ErrorCode,
};

/// All defined protocol versions appear in this module.
///
/// ALL_VERSIONS is a provided as an array of all of these values.
pub mod version {
    #[cfg(feature = "tls12")]
    pub use tls_core::versions::TLS12;
    pub use tls_core::versions::TLS13;
}

/// All defined key exchange groups appear in this module.
///
/// ALL_KX_GROUPS is provided as an array of all of these values.
pub mod kx_group {
    pub use crate::kx::{FFDHE2048, FFDHE3072, SECP256R1, SECP384R1, X25519};
}

/// Message signing interfaces and implementations.
pub mod sign_api {
    pub use crate::sign::{any_supported_type, CertifiedKey, Signer, SigningKey};
}

/// Certificate verification strategy objects.
pub mod verify_api {
    pub use tls_core::verify::{
        ClientCertVerifier, NoClientAuth, ServerCertVerifier, WebPkiVerifier,
    };
}

//! Protocol-neutral core of the Tern TLS endpoint: the wire codec and
//! message types, the alert and error catalogs, cipher-suite tables,
//! certificate and trust-anchor containers, the verification engine,
//! the buffer engine, string normalization, and the trust-on-first-use
//! store.  The connection machinery lives in the companion session
//! crate.

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

pub mod codec;
mod error;
pub mod key;
#[allow(missing_docs)]
#[macro_use]
pub mod msgs;
pub mod anchors;
pub mod bigint;
pub mod buffer;
pub mod dns;
pub mod prf;
pub mod rand;
pub mod strings;
pub mod suites;
pub mod tofu;
pub mod verify;
pub mod versions;
pub mod x509;

pub use error::{Error, ErrorCode};

#[macro_use]
mod macros;

pub mod alert;
pub mod base;
pub mod ccs;
pub mod deframer;
pub mod enums;
pub mod fragmenter;
pub mod handshake;
pub mod hsjoiner;
pub mod message;

#[cfg(feature = "logging")]
use crate::log::warn;
use tls_core::{
    msgs::enums::{ContentType, HandshakeType},
    msgs::message::{Message, MessagePayload},
    Error,
};

/// For a Message $m, and a HandshakePayload enum member $payload_type,
/// return Ok(payload) if $m is both a handshake message and one that
/// has the given $payload_type.  If not, return Err(Error) quoting
/// $handshake_type as the expected handshake type.
macro_rules! require_handshake_msg(
  ( $m:expr, $handshake_type:path, $payload_type:path ) => (
    match $m.payload {
        MessagePayload::Handshake(tls_core::msgs::handshake::HandshakeMessagePayload {
            payload: $payload_type(ref hsp), .. }) => Ok(hsp),
        _ => Err(crate::check::inappropriate_handshake_message(&$m, &[$handshake_type]))
    }
  )
);

/// Like require_handshake_msg, but moves the payload out of $m.
macro_rules! require_handshake_msg_move(
  ( $m:expr, $handshake_type:path, $payload_type:path ) => (
    match $m.payload {
        MessagePayload::Handshake(tls_core::msgs::handshake::HandshakeMessagePayload {
            payload: $payload_type(hsp), .. }) => Ok(hsp),
        _ => Err(crate::check::inappropriate_handshake_message(&$m, &[$handshake_type]))
    }
  )
);

/// Error out if the message doesn't carry one of the listed content
/// types.
pub(crate) fn check_message(
    m: &Message,
    content_types: &[ContentType],
) -> Result<(), Error> {
    if !content_types.contains(&m.payload.content_type()) {
        return Err(inappropriate_message(m, content_types));
    }

    Ok(())
}

pub(crate) fn inappropriate_message(m: &Message, content_types: &[ContentType]) -> Error {
    warn!(
        "Received a {:?} message while expecting {:?}",
        m.payload.content_type(),
        content_types
    );
    Error::InappropriateMessage {
        expect_types: content_types.to_vec(),
        got_type: m.payload.content_type(),
    }
}

pub(crate) fn inappropriate_handshake_message(
    m: &Message,
    handshake_types: &[HandshakeType],
) -> Error {
    match m.payload {
        MessagePayload::Handshake(ref hsp) => {
            warn!(
                "Received a {:?} handshake message while expecting {:?}",
                hsp.typ, handshake_types
            );
            Error::InappropriateHandshakeMessage {
                expect_types: handshake_types.to_vec(),
                got_type: hsp.typ,
            }
        }
        _ => inappropriate_message(m, &[ContentType::Handshake]),
    }
}

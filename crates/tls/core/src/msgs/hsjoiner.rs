use std::collections::VecDeque;

use crate::{
    codec,
    msgs::{
        enums::{ContentType, ProtocolVersion},
        handshake::HandshakeMessagePayload,
        message::{Message, MessagePayload, PlainMessage},
    },
};

const HEADER_SIZE: usize = 1 + 3;

/// TLS allows for handshake messages of up to 16MB.  We
/// restrict that to 64KB to limit potential for denial-of-
/// service.
const MAX_HANDSHAKE_SIZE: u32 = 0xffff;

/// This works to reconstruct TLS handshake messages
/// from individual TLS messages.  It's guaranteed that
/// TLS messages output from this layer contain precisely
/// one handshake payload.
pub struct HandshakeJoiner {
    /// Completed handshake frames for output.
    pub frames: VecDeque<Message>,

    /// The message payload we're currently accumulating.
    buf: Vec<u8>,
}

impl Default for HandshakeJoiner {
    fn default() -> Self {
        Self::new()
    }
}

impl HandshakeJoiner {
    /// Make a new HandshakeJoiner.
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
            buf: Vec::new(),
        }
    }

    /// Do we want to process this message?
    pub fn want_message(&self, msg: &PlainMessage) -> bool {
        msg.typ == ContentType::Handshake
    }

    /// Do we have any buffered data?
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the message, and join/split it as needed.
    /// Return the number of new messages added to the
    /// output deque as a result of this message.
    ///
    /// Returns None if msg or a preceding message was corrupt.
    /// You cannot recover from this situation.  Otherwise returns
    /// a count of how many messages we queued.
    pub fn take_message(&mut self, msg: PlainMessage) -> Option<usize> {
        // The vast majority of the time `self.buf` will be empty since most
        // handshake messages arrive in a single fragment. Avoid allocating and
        // copying in that common case.
        if self.buf.is_empty() {
            self.buf = msg.payload.0;
        } else {
            self.buf.extend_from_slice(&msg.payload.0[..]);
        }

        let mut count = 0;
        loop {
            match self.buf_contains_message() {
                BufferState::MessageTooLarge => return None,
                BufferState::NeedsMoreData => break,
                BufferState::OneMessage => {
                    if !self.deframe_one(msg.version) {
                        return None;
                    }

                    count += 1;
                }
            }
        }

        Some(count)
    }

    /// Does our internal buffer contain a full handshake payload?  It does if it is big
    /// enough to contain a header, and that header has a length which falls within `buf`.
    fn buf_contains_message(&self) -> BufferState {
        if self.buf.len() < HEADER_SIZE {
            return BufferState::NeedsMoreData;
        }

        let (header, rest) = self.buf.split_at(HEADER_SIZE);
        match codec::u24::decode(&header[1..]) {
            Some(len) if len.0 > MAX_HANDSHAKE_SIZE => BufferState::MessageTooLarge,
            Some(len) if rest.get(..len.into()).is_some() => BufferState::OneMessage,
            _ => BufferState::NeedsMoreData,
        }
    }

    /// Take a TLS handshake payload off the front of `buf`, and put it onto
    /// the back of our `frames` deque inside a normal `Message`.
    ///
    /// Returns false if the stream is desynchronised beyond repair.
    fn deframe_one(&mut self, version: ProtocolVersion) -> bool {
        let used = {
            let mut rd = codec::Reader::init(&self.buf);
            let parsed = match HandshakeMessagePayload::read_version(&mut rd, version) {
                Some(p) => p,
                None => return false,
            };

            let m = Message {
                version,
                payload: MessagePayload::Handshake(parsed),
            };
            self.frames.push_back(m);
            rd.used()
        };
        self.buf = self.buf.split_off(used);
        true
    }
}

enum BufferState {
    /// Buffer contains a header that introduces a message that is too long.
    MessageTooLarge,

    /// Buffer contains a full header and body.
    OneMessage,

    /// We need more data to see a header and complete body.
    NeedsMoreData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::base::Payload;

    fn hs_fragment(bytes: &[u8]) -> PlainMessage {
        PlainMessage {
            typ: ContentType::Handshake,
            version: ProtocolVersion::TLSv1_2,
            payload: Payload::new(bytes.to_vec()),
        }
    }

    // a complete HelloRequest
    const HELLO_REQUEST: &[u8] = &[0x00, 0x00, 0x00, 0x00];

    #[test]
    fn joins_split_message() {
        let mut hj = HandshakeJoiner::new();
        assert_eq!(hj.take_message(hs_fragment(&HELLO_REQUEST[..2])), Some(0));
        assert!(!hj.is_empty());
        assert_eq!(hj.take_message(hs_fragment(&HELLO_REQUEST[2..])), Some(1));
        assert!(hj.is_empty());
        assert_eq!(hj.frames.len(), 1);
    }

    #[test]
    fn splits_coalesced_messages() {
        let mut both = HELLO_REQUEST.to_vec();
        both.extend_from_slice(HELLO_REQUEST);

        let mut hj = HandshakeJoiner::new();
        assert_eq!(hj.take_message(hs_fragment(&both)), Some(2));
        assert_eq!(hj.frames.len(), 2);
    }

    #[test]
    fn rejects_oversize_message() {
        let mut hj = HandshakeJoiner::new();
        // Finished with a 16MB-1 length
        let huge = [0x14, 0xff, 0xff, 0xff];
        assert_eq!(hj.take_message(hs_fragment(&huge)), None);
    }
}

use std::collections::VecDeque;

use crate::msgs::{
    base::Payload,
    message::{BorrowedPlainMessage, PlainMessage},
};

pub const MAX_FRAGMENT_LEN: usize = 16384;
pub const PACKET_OVERHEAD: usize = 1 + 2 + 2;
pub const MAX_FRAGMENT_SIZE: usize = MAX_FRAGMENT_LEN + PACKET_OVERHEAD;

pub struct MessageFragmenter {
    max_frag: usize,
}

impl MessageFragmenter {
    /// Make a new fragmenter.  `max_fragment_size` is the maximum
    /// fragment size that will be produced -- this includes overhead.
    /// A `max_fragment_size` of `None` sets the highest allowed value.
    pub fn new(max_fragment_size: Option<usize>) -> Result<Self, InvalidMaxFragmentSizeError> {
        let mut new = Self {
            max_frag: MAX_FRAGMENT_LEN,
        };
        new.set_max_fragment_size(max_fragment_size)?;
        Ok(new)
    }

    /// Take the Message `msg` and re-fragment it into new
    /// messages whose fragment is no more than max_frag.
    /// The new messages are appended to the `out` deque.
    /// Payloads are copied.
    pub fn fragment(&self, msg: PlainMessage, out: &mut VecDeque<PlainMessage>) {
        // Non-fragment path
        if msg.payload.0.len() <= self.max_frag {
            out.push_back(msg);
            return;
        }

        for chunk in msg.payload.0.chunks(self.max_frag) {
            let m = PlainMessage {
                typ: msg.typ,
                version: msg.version,
                payload: Payload(chunk.to_vec()),
            };
            out.push_back(m);
        }
    }

    /// Enqueue borrowed fragments of (version, typ, payload) which
    /// are no longer than max_frag onto the `out` deque.
    pub fn fragment_borrow<'a>(
        &self,
        typ: crate::msgs::enums::ContentType,
        version: crate::msgs::enums::ProtocolVersion,
        payload: &'a [u8],
        out: &mut VecDeque<BorrowedPlainMessage<'a>>,
    ) {
        for chunk in payload.chunks(self.max_frag) {
            let cm = BorrowedPlainMessage {
                typ,
                version,
                payload: chunk,
            };
            out.push_back(cm);
        }
    }

    /// Set the maximum fragment size that will be produced.
    ///
    /// This includes overhead.  A `max_fragment_size` of None sets the highest allowed value.
    pub fn set_max_fragment_size(
        &mut self,
        max_fragment_size: Option<usize>,
    ) -> Result<(), InvalidMaxFragmentSizeError> {
        self.max_frag = match max_fragment_size {
            Some(sz @ 32..=MAX_FRAGMENT_SIZE) => sz - PACKET_OVERHEAD,
            None => MAX_FRAGMENT_LEN,
            _ => return Err(InvalidMaxFragmentSizeError),
        };
        Ok(())
    }
}

/// The `max_fragment_size` was out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid max_fragment_size")]
pub struct InvalidMaxFragmentSizeError;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::{
        base::Payload,
        enums::{ContentType, ProtocolVersion},
        message::PlainMessage,
    };

    fn msg(len: usize) -> PlainMessage {
        PlainMessage {
            typ: ContentType::ApplicationData,
            version: ProtocolVersion::TLSv1_2,
            payload: Payload(vec![0xaa; len]),
        }
    }

    #[test]
    fn smaller_fragments_than_max() {
        let frag = MessageFragmenter::new(Some(32 + PACKET_OVERHEAD)).unwrap();
        let mut q = VecDeque::new();
        frag.fragment(msg(70), &mut q);
        assert_eq!(q.len(), 3);
        assert_eq!(q[0].payload.0.len(), 32);
        assert_eq!(q[2].payload.0.len(), 6);
    }

    #[test]
    fn unfragmented_passthrough() {
        let frag = MessageFragmenter::new(None).unwrap();
        let mut q = VecDeque::new();
        frag.fragment(msg(100), &mut q);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn rejects_tiny_max() {
        assert!(MessageFragmenter::new(Some(8)).is_err());
    }
}

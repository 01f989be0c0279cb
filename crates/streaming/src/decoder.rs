//! Incremental frame decoding for the event-stream response.
//!
//! The feed may flush at any byte offset, so the decoder keeps an explicit
//! carry-over buffer and only emits text that was followed by a blank line.

use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};
use tracing::debug;

use crate::error::FeedError;

/// A frame ends at a blank line.
pub const FRAME_DELIMITER: &[u8] = b"\n\n";

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Leading bytes of `buffer` already searched without finding a delimiter.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every frame it completed, in order.
    ///
    /// Buffering is byte-level so a UTF-8 sequence split across chunks is
    /// reassembled before decoding. A completed frame that is not valid UTF-8
    /// comes back as a decode error in its place.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, FeedError>> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0usize;
        // A delimiter may straddle the previous chunk boundary.
        let mut from = self.scanned.saturating_sub(FRAME_DELIMITER.len() - 1);
        while let Some(pos) = find_delimiter(&self.buffer[from..]) {
            let end = from + pos;
            let frame = &self.buffer[start..end];
            if !frame.is_empty() {
                frames.push(
                    String::from_utf8(frame.to_vec())
                        .map_err(|err| FeedError::decode(format!("frame is not UTF-8: {err}"))),
                );
            }
            start = end + FRAME_DELIMITER.len();
            from = start;
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        frames
    }

    /// Bytes waiting for a delimiter.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Ends the stream. An unterminated tail is not a frame and is dropped;
    /// returns how many bytes were discarded.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.scanned = 0;
        dropped
    }
}

fn find_delimiter(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(FRAME_DELIMITER.len())
        .position(|w| w == FRAME_DELIMITER)
}

struct FrameState<S> {
    bytes: S,
    decoder: FrameDecoder,
    ready: VecDeque<Result<String, FeedError>>,
    finished: bool,
}

/// Lifts a [`FrameDecoder`] over an async byte stream.
///
/// A transport error or an undecodable frame is yielded once and ends the
/// frame stream.
pub fn decode_frames<S>(bytes: S) -> impl Stream<Item = Result<String, FeedError>>
where
    S: Stream<Item = Result<Bytes, FeedError>> + Unpin,
{
    let state = FrameState {
        bytes,
        decoder: FrameDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(frame) = st.ready.pop_front() {
                if frame.is_err() {
                    st.ready.clear();
                    st.finished = true;
                }
                return Some((frame, st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => st.ready.extend(st.decoder.push(&chunk)),
                Some(Err(err)) => {
                    st.finished = true;
                    return Some((Err(err), st));
                }
                None => {
                    let dropped = st.decoder.finish();
                    if dropped > 0 {
                        debug!("discarding {dropped} bytes of unterminated trailing frame");
                    }
                    st.finished = true;
                }
            }
        }
    })
}

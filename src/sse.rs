//! Server-Sent Events (SSE) frame decoding.
//!
//! The chat backend streams one JSON object per frame and closes with a
//! sentinel frame:
//! ```text
//! data: {"type": "token", "content": "Hel"}
//!
//! data: {"type": "token", "content": "lo"}
//!
//! data: [DONE]
//! ```
//!
//! Bytes arrive in arbitrary chunks. [`FrameDecoder`] owns the decode buffer
//! for one response: it decodes UTF-8 statefully (a character may be split
//! across chunks), cuts the text at every blank line and keeps the trailing
//! incomplete frame for the next chunk.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::client::ClientError;

/// Separator between two frames.
pub const FRAME_DELIMITER: &str = "\n\n";

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

/// A complete frame that carried a `data: ` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Payload after the `data: ` prefix, trimmed. Not yet parsed.
    Data(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Incremental UTF-8 decoder.
///
/// Holds back the bytes of a multi-byte sequence that is cut off at the end
/// of a chunk and prepends them to the next one. Invalid sequences become
/// U+FFFD instead of failing the stream.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `chunk` (plus held-back bytes) as forms complete characters.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let bytes = if self.pending.is_empty() {
            chunk.to_vec()
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(chunk);
            joined
        };

        let mut out = String::with_capacity(bytes.len());
        let mut rest = &bytes[..];

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));

                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            // Truncated sequence at the end: wait for more bytes.
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush held-back bytes at end of input.
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }
}

/// Splits a chunked byte stream into SSE frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    utf8: Utf8Decoder,
    buffer: String,
    // Bytes of `buffer` already known to hold no delimiter start.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every frame it completed, in order.
    ///
    /// Frames without a `data: ` prefix (comments, keep-alives, empty blocks)
    /// are dropped here.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let text = self.utf8.decode(chunk);
        self.buffer.push_str(&text);

        let mut frames = Vec::new();
        let mut start = 0;
        let mut scan_from = self.scanned;

        while let Some(offset) = self.buffer[scan_from..].find(FRAME_DELIMITER) {
            let end = scan_from + offset;
            if let Some(frame) = classify_frame(&self.buffer[start..end]) {
                frames.push(frame);
            }
            start = end + FRAME_DELIMITER.len();
            scan_from = start;
        }

        self.buffer.drain(..start);
        // A trailing '\n' may be the first half of the next delimiter.
        self.scanned = if self.buffer.ends_with('\n') {
            self.buffer.len() - 1
        } else {
            self.buffer.len()
        };
        frames
    }

    /// Text buffered after the last complete frame.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// End of input: give the unterminated remainder one last try.
    pub fn finish(mut self) -> Option<SseFrame> {
        let tail = self.utf8.finish();
        self.buffer.push_str(&tail);
        classify_frame(&self.buffer)
    }
}

fn classify_frame(raw: &str) -> Option<SseFrame> {
    let data = parse_sse_frame(raw.trim())?;
    if is_done_marker(data) {
        Some(SseFrame::Done)
    } else {
        Some(SseFrame::Data(data.to_string()))
    }
}

/// Extract the payload of a trimmed frame.
///
/// # Example
/// ```
/// use maichat::sse::parse_sse_frame;
///
/// assert_eq!(parse_sse_frame("data: {\"key\": \"value\"}"), Some("{\"key\": \"value\"}"));
/// assert_eq!(parse_sse_frame(": keep-alive"), None);
/// ```
pub fn parse_sse_frame(frame: &str) -> Option<&str> {
    frame.strip_prefix(DATA_PREFIX).map(|s| s.trim())
}

/// Check if a payload is the end-of-stream sentinel.
///
/// # Example
/// ```
/// use maichat::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker("{\"type\": \"token\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == DONE_MARKER
}

struct FrameState<S> {
    bytes: Pin<Box<S>>,
    // None once the stream is exhausted, failed or saw the sentinel.
    decoder: Option<FrameDecoder>,
    ready: VecDeque<SseFrame>,
}

/// Turn a byte stream into a stream of frames.
///
/// Frames are yielded in the order they complete. After `SseFrame::Done` or an
/// error the stream ends and the byte stream is not polled again. When the
/// bytes run out without a sentinel, the remainder of the buffer is offered as
/// a final frame before the stream ends.
pub fn sse_frames<S, E>(byte_stream: S) -> impl Stream<Item = Result<SseFrame, ClientError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send,
    E: Send,
    ClientError: From<E>,
{
    let state = FrameState {
        bytes: Box::pin(byte_stream),
        decoder: Some(FrameDecoder::new()),
        ready: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.ready.pop_front() {
                if frame == SseFrame::Done {
                    state.decoder = None;
                    state.ready.clear();
                }
                return Some((Ok(frame), state));
            }

            state.decoder.as_ref()?;

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    if let Some(decoder) = state.decoder.as_mut() {
                        state.ready.extend(decoder.push(&chunk));
                    }
                }
                Some(Err(e)) => {
                    state.decoder = None;
                    return Some((Err(ClientError::from(e)), state));
                }
                None => {
                    if let Some(decoder) = state.decoder.take() {
                        state.ready.extend(decoder.finish());
                    }
                }
            }
        }
    })
}

/// Extension trait for `reqwest::Response` to read the body as SSE frames.
///
/// # Example
/// ```ignore
/// use maichat::sse::SSEResponseExt;
///
/// let response = http.post(url).json(&body).send().await?;
/// let mut frames = response.sse();
/// while let Some(frame) = frames.next().await {
///     println!("{:?}", frame?);
/// }
/// ```
pub trait SSEResponseExt {
    fn sse(self) -> impl Stream<Item = Result<SseFrame, ClientError>> + Send;
}

impl SSEResponseExt for reqwest::Response {
    fn sse(self) -> impl Stream<Item = Result<SseFrame, ClientError>> + Send {
        sse_frames(self.bytes_stream())
    }
}

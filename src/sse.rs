//! Line-delimited event stream processing for chat replies.
//!
//! The chat endpoint answers with an open-ended body of `data: <json>` lines. This module turns
//! the raw byte chunks of that body into a lazy, in-order stream of [`StreamEvent`] values.
//!
//! Lines are framed over the raw bytes, so neither a JSON payload nor a multi-byte UTF-8
//! character is corrupted by where the network happened to split it. Lines that do not start
//! with `data: ` (blank keep-alive separators included) are discarded without being decoded.
//! Payload bytes that are not valid UTF-8 are replaced with U+FFFD.

use std::io;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tokio_util::io::StreamReader;

use crate::error::{Error, Result};
use crate::observability::{MALFORMED_EVENTS, STREAM_BYTES, STREAM_EVENTS};
use crate::types::StreamEvent;

/// Prefix that marks a line as carrying an event payload.
pub const DATA_PREFIX: &str = "data: ";

/// Longest line, in bytes, the parser buffers while waiting for its terminator.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Decode one line (without its `\n` terminator) into an event.
///
/// Returns `Ok(None)` for lines that carry no event. A `data: ` line whose payload is not a valid
/// event object is a [`Error::MalformedEvent`].
pub fn parse_data_line(line: &[u8]) -> Result<Option<StreamEvent>> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let Some(payload) = line.strip_prefix(DATA_PREFIX.as_bytes()) else {
        if !line.trim_ascii().is_empty() {
            tracing::trace!(line = %String::from_utf8_lossy(line), "discarding non-data line");
        }
        return Ok(None);
    };
    let payload = String::from_utf8_lossy(payload);
    serde_json::from_str::<StreamEvent>(&payload)
        .map(Some)
        .map_err(|e| {
            MALFORMED_EVENTS.click();
            Error::malformed_event(
                format!("Failed to parse event JSON: {e}"),
                payload.as_ref(),
                Some(Box::new(e)),
            )
        })
}

fn line_codec(max_line_length: usize) -> AnyDelimiterCodec {
    AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), max_line_length)
}

// Transport errors travel through the reader as `io::Error`; unwrap ours on the way out.
fn from_io_error(err: io::Error) -> Error {
    if let Some(inner) = err.get_ref().and_then(|e| e.downcast_ref::<Error>()) {
        return inner.clone();
    }
    Error::streaming(format!("Error in HTTP stream: {err}"), Some(Box::new(err)))
}

fn from_codec_error(err: AnyDelimiterCodecError, max_line_length: usize) -> Error {
    match err {
        AnyDelimiterCodecError::Io(err) => from_io_error(err),
        err @ AnyDelimiterCodecError::MaxChunkLengthExceeded => Error::streaming(
            format!("event line longer than {max_line_length} bytes"),
            Some(Box::new(err)),
        ),
    }
}

struct EventStreamState<L> {
    lines: L,
    max_line_length: usize,
    failed: bool,
}

/// Process a stream of body chunks into a stream of decoded events.
///
/// The returned stream ends when the body ends. The first error (a transport error from
/// `byte_stream`, an over-long line, or a malformed event) is yielded once and then the stream
/// ends.
pub fn process_events<S>(byte_stream: S) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = Result<Bytes>> + Unpin + Send + 'static,
{
    process_events_with_max_line_length(byte_stream, MAX_LINE_LENGTH)
}

/// Like [`process_events`], failing the stream once a line grows past `max_line_length` bytes.
pub fn process_events_with_max_line_length<S>(
    byte_stream: S,
    max_line_length: usize,
) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = Result<Bytes>> + Unpin + Send + 'static,
{
    let bytes = byte_stream.map(|chunk| {
        chunk
            .inspect(|chunk| STREAM_BYTES.count(chunk.len() as u64))
            .map_err(io::Error::other)
    });
    let state = EventStreamState {
        lines: FramedRead::new(StreamReader::new(bytes), line_codec(max_line_length)),
        max_line_length,
        failed: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.failed {
            return None;
        }
        while let Some(line) = state.lines.next().await {
            let decoded = line
                .map_err(|e| from_codec_error(e, state.max_line_length))
                .and_then(|line| parse_data_line(&line));
            match decoded {
                Ok(Some(event)) => {
                    STREAM_EVENTS.click();
                    tracing::debug!(?event, "decoded stream event");
                    return Some((Ok(event), state));
                }
                Ok(None) => {}
                Err(err) => {
                    state.failed = true;
                    return Some((Err(err), state));
                }
            }
        }
        None
    })
}

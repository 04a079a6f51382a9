//! Server-sent event framing for streamed responses
//!
//! Streaming endpoints are called with `alt=sse` and emit one JSON chunk
//! per `data:` frame. Frames may split across transport reads; the
//! eventsource parser reassembles them before JSON parsing.

use async_stream::try_stream;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::http::transport::ByteStream;

/// Parse a raw byte stream into a stream of JSON chunks. Blank frames are
/// skipped; a malformed frame ends the stream with an error.
pub(crate) fn json_chunks(bytes: ByteStream) -> impl Stream<Item = Result<Value>> + Send {
    try_stream! {
        let mut events = bytes.eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| Error::Parse(e.to_string()))?;
            if event.data.is_empty() {
                continue;
            }
            let chunk: Value = serde_json::from_str(&event.data)?;
            yield chunk;
        }
    }
}

//! Request bodies that can be sent again after paying.
//!
//! A paid request is sent twice, so one-shot streams are read into memory before the first
//! attempt. Text and byte bodies are already in memory and are reused without copying.

use std::{io, pin::Pin};

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, TryStreamExt};

/// A one-shot stream of body chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

#[derive(Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Text(String),
    Bytes(Bytes),
    Stream(BodyStream),
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            RequestBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            RequestBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl RequestBody {
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        RequestBody::Stream(Box::pin(stream))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, RequestBody::Stream(_))
    }

    /// Turn the body into bytes that can be sent any number of times.
    ///
    /// Streams are drained completely; `Empty` yields `None`.
    pub async fn into_replayable(self) -> io::Result<Option<Bytes>> {
        match self {
            RequestBody::Empty => Ok(None),
            RequestBody::Text(text) => Ok(Some(Bytes::from(text))),
            RequestBody::Bytes(bytes) => Ok(Some(bytes)),
            RequestBody::Stream(mut stream) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.try_next().await? {
                    buffer.extend_from_slice(&chunk);
                }
                Ok(Some(buffer.freeze()))
            }
        }
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(bytes))
    }
}

impl From<&serde_json::Value> for RequestBody {
    fn from(value: &serde_json::Value) -> Self {
        RequestBody::Text(value.to_string())
    }
}

//! Value serialization for [`DirMap`](super::DirMap) slot files.
//!
//! A codec is the pair of functions the map uses to turn a stored value into
//! bytes and back. The default [`JsonCodec`] writes pretty-printed JSON so
//! slot files stay human-readable.

use std::io::{Read, Write};
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors raised while encoding or decoding a slot file.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// The value could not be (de)serialized as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing the underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serializer/deserializer pair for values of type `V`.
pub trait Codec<V>: Send + Sync {
    /// Write `value` to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized or written.
    fn encode(&self, value: &V, writer: &mut dyn Write) -> Result<(), CodecError>;

    /// Read a value back from `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is unreadable or malformed.
    fn decode(&self, reader: &mut dyn Read) -> Result<V, CodecError>;
}

/// Human-readable JSON codec, the default for the hash cache.
pub struct JsonCodec<V> {
    pretty: bool,
    _marker: PhantomData<fn() -> V>,
}

impl<V> JsonCodec<V> {
    /// Create a codec writing indented JSON.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pretty: true,
            _marker: PhantomData,
        }
    }

    /// Create a codec writing single-line JSON.
    #[must_use]
    pub fn compact() -> Self {
        Self {
            pretty: false,
            _marker: PhantomData,
        }
    }
}

impl<V> Default for JsonCodec<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for JsonCodec<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonCodec")
            .field("pretty", &self.pretty)
            .finish()
    }
}

impl<V> Codec<V> for JsonCodec<V>
where
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &V, writer: &mut dyn Write) -> Result<(), CodecError> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut *writer, value)?;
        } else {
            serde_json::to_writer(&mut *writer, value)?;
        }
        Ok(())
    }

    fn decode(&self, reader: &mut dyn Read) -> Result<V, CodecError> {
        Ok(serde_json::from_reader(reader)?)
    }
}

//! Codec Boundary
//!
//! Every value crosses into the cache as a [`Payload`]: either raw bytes
//! written through the fast path, or the JSON encoding of a typed value.
//! Reading back is symmetric. A typed read only fails when the stored bytes
//! are not a valid value of the requested type, whichever path wrote them.

use bytes::Bytes;
use serde::de::{self, value::SeqDeserializer, DeserializeOwned, Unexpected, Visitor};
use serde::{forward_to_deserialize_any, Serialize};

use crate::error::{CacheError, Result};

const TAG_RAW: u8 = 0;
const TAG_ENCODED: u8 = 1;

// == Payload ==
/// Stored form of a cached value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Bytes stored verbatim (fast path for byte and string values)
    Raw(Bytes),
    /// Codec output
    Encoded(Bytes),
}

impl Payload {
    /// Encodes a typed value through the codec.
    pub fn encode<V: Serialize + ?Sized>(value: &V) -> Result<Self> {
        let bytes = serde_json::to_vec(value).map_err(CacheError::Encode)?;
        Ok(Payload::Encoded(Bytes::from(bytes)))
    }

    /// Wraps bytes for the raw fast path.
    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Payload::Raw(bytes.into())
    }

    /// Decodes the payload into `V`.
    pub fn decode<V: DeserializeOwned>(&self) -> Result<V> {
        match self {
            Payload::Encoded(bytes) => serde_json::from_slice(bytes).map_err(CacheError::decode),
            Payload::Raw(bytes) => V::deserialize(RawDeserializer { bytes }).map_err(CacheError::decode),
        }
    }

    /// Returns the stored bytes without decoding.
    pub fn bytes(&self) -> &Bytes {
        match self {
            Payload::Raw(bytes) | Payload::Encoded(bytes) => bytes,
        }
    }

    /// Returns the payload size in bytes.
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    /// Returns true if the payload holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    // == Record Format ==
    /// Serializes the payload as a durable record: one tag byte, then the body.
    pub fn to_record(&self) -> Vec<u8> {
        let (tag, bytes) = match self {
            Payload::Raw(bytes) => (TAG_RAW, bytes),
            Payload::Encoded(bytes) => (TAG_ENCODED, bytes),
        };
        let mut record = Vec::with_capacity(bytes.len() + 1);
        record.push(tag);
        record.extend_from_slice(bytes);
        record
    }

    /// Parses a durable record written by [`Payload::to_record`].
    pub fn from_record(record: impl Into<Bytes>) -> Result<Self> {
        let mut record = record.into();
        if record.is_empty() {
            return Err(CacheError::decode("truncated record: missing tag byte"));
        }
        let tag = record[0];
        let body = record.split_off(1);
        match tag {
            TAG_RAW => Ok(Payload::Raw(body)),
            TAG_ENCODED => Ok(Payload::Encoded(body)),
            other => Err(CacheError::Decode(format!("unknown record tag {other}"))),
        }
    }
}

// == Raw Deserializer ==
/// Presents raw bytes to serde so byte-like and string-like targets can read
/// values stored through the fast path.
struct RawDeserializer<'a> {
    bytes: &'a [u8],
}

impl<'de> de::Deserializer<'de> for RawDeserializer<'_> {
    type Error = de::value::Error;

    fn deserialize_any<W: Visitor<'de>>(self, visitor: W) -> std::result::Result<W::Value, Self::Error> {
        visitor.visit_bytes(self.bytes)
    }

    fn deserialize_str<W: Visitor<'de>>(self, visitor: W) -> std::result::Result<W::Value, Self::Error> {
        match std::str::from_utf8(self.bytes) {
            Ok(s) => visitor.visit_str(s),
            Err(_) => Err(de::Error::invalid_value(Unexpected::Bytes(self.bytes), &visitor)),
        }
    }

    fn deserialize_string<W: Visitor<'de>>(self, visitor: W) -> std::result::Result<W::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<W: Visitor<'de>>(self, visitor: W) -> std::result::Result<W::Value, Self::Error> {
        visitor.visit_bytes(self.bytes)
    }

    fn deserialize_byte_buf<W: Visitor<'de>>(self, visitor: W) -> std::result::Result<W::Value, Self::Error> {
        visitor.visit_byte_buf(self.bytes.to_vec())
    }

    fn deserialize_seq<W: Visitor<'de>>(self, visitor: W) -> std::result::Result<W::Value, Self::Error> {
        let mut seq = SeqDeserializer::<_, Self::Error>::new(self.bytes.iter().copied());
        let value = visitor.visit_seq(&mut seq)?;
        seq.end()?;
        Ok(value)
    }

    fn deserialize_option<W: Visitor<'de>>(self, visitor: W) -> std::result::Result<W::Value, Self::Error> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<W: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: W,
    ) -> std::result::Result<W::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char
        unit unit_struct tuple tuple_struct map struct enum identifier ignored_any
    }
}

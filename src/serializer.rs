// src/serializer.rs

//! Payload serialization seam.
//!
//! The bus converts messages to [`serde_json::Value`] first and hands the value
//! to a [`MessageSerializer`] to produce wire bytes. Swapping the serializer
//! changes the payload encoding without touching routing.

use crate::Result;
use bytes::Bytes;
use std::sync::Arc;

/// Encodes and decodes message payloads.
pub trait MessageSerializer: Send + Sync {
    /// Encode a message value into payload bytes.
    fn serialize(&self, value: &serde_json::Value) -> Result<Bytes>;

    /// Decode payload bytes into a message value.
    fn deserialize(&self, payload: &[u8]) -> Result<serde_json::Value>;
}

/// Shared serializer pointer.
pub type SerializerPtr = Arc<dyn MessageSerializer>;

/// JSON payloads via `serde_json`. The default serializer.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl MessageSerializer for JsonSerializer {
    fn serialize(&self, value: &serde_json::Value) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }

    fn deserialize(&self, payload: &[u8]) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Serialize a typed value through `serializer`.
pub(crate) fn encode<T: serde::Serialize>(serializer: &dyn MessageSerializer, value: &T) -> Result<Bytes> {
    let value = serde_json::to_value(value)?;
    serializer.serialize(&value)
}

/// Deserialize a typed value through `serializer`.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    serializer: &dyn MessageSerializer,
    payload: &[u8],
) -> Result<T> {
    let value = serializer.deserialize(payload)?;
    Ok(serde_json::from_value(value)?)
}

// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Codecs
//!
//! A [`Codec`] turns a typed value into an [`EncodedMessage`] and back. Two strategies are
//! provided: [`JsonCodec`] for human readable payloads and [`BinaryCodec`] for compact
//! MessagePack payloads. Decoding is selected purely from the content type attached by
//! the publisher; payloads are never sniffed.

use crate::errors::{DecodeError, EncodeError};
use serde::{de::DeserializeOwned, Serialize};

/// Content type attached to payloads produced by [`JsonCodec`]
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Content type attached to payloads produced by [`BinaryCodec`]
pub const BINARY_CONTENT_TYPE: &str = "application/x-msgpack";

/// Prefetch window used by default for binary subscriptions.
pub const BINARY_DEFAULT_PREFETCH: u16 = 10;

/// A payload together with the tag of the codec that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    pub content_type: &'static str,
    pub payload: Vec<u8>,
}

/// Serialization strategy shared by publishers and subscribers.
///
/// Implementations are pure and must round-trip every value of the type they
/// are used with: `decode(encode(v)) == v`.
pub trait Codec: Send + Sync + 'static {
    /// Tag attached to every payload this codec produces.
    fn content_type(&self) -> &'static str;

    fn encode<T>(&self, value: &T) -> Result<EncodedMessage, EncodeError>
    where
        T: Serialize + ?Sized;

    fn decode<T>(&self, content_type: Option<&str>, payload: &[u8]) -> Result<T, DecodeError>
    where
        T: DeserializeOwned;

    /// Prefetch window a subscriber uses unless told otherwise. `None` means unlimited.
    fn default_prefetch(&self) -> Option<u16> {
        None
    }

    /// Rejects payloads that were not tagged by this codec.
    fn check_content_type(&self, content_type: Option<&str>) -> Result<(), DecodeError> {
        let expected = self.content_type();
        match content_type {
            None => Err(DecodeError::MissingContentType { expected }),
            Some(found) if found != expected => Err(DecodeError::ContentTypeMismatch {
                expected,
                found: found.to_owned(),
            }),
            Some(_) => Ok(()),
        }
    }
}

/// Text codec backed by `serde_json`. Unknown fields are ignored on decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn encode<T>(&self, value: &T) -> Result<EncodedMessage, EncodeError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(value).map_err(|err| EncodeError {
            content_type: JSON_CONTENT_TYPE,
            reason: err.to_string(),
        })?;

        Ok(EncodedMessage {
            content_type: JSON_CONTENT_TYPE,
            payload,
        })
    }

    fn decode<T>(&self, content_type: Option<&str>, payload: &[u8]) -> Result<T, DecodeError>
    where
        T: DeserializeOwned,
    {
        self.check_content_type(content_type)?;

        serde_json::from_slice(payload).map_err(|err| DecodeError::Malformed {
            content_type: JSON_CONTENT_TYPE,
            reason: err.to_string(),
        })
    }
}

/// Binary codec backed by `rmp-serde`.
///
/// Structs are written positionally, so the decoding type must have the same
/// field layout as the encoding type.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl Codec for BinaryCodec {
    fn content_type(&self) -> &'static str {
        BINARY_CONTENT_TYPE
    }

    fn encode<T>(&self, value: &T) -> Result<EncodedMessage, EncodeError>
    where
        T: Serialize + ?Sized,
    {
        let payload = rmp_serde::to_vec(value).map_err(|err| EncodeError {
            content_type: BINARY_CONTENT_TYPE,
            reason: err.to_string(),
        })?;

        Ok(EncodedMessage {
            content_type: BINARY_CONTENT_TYPE,
            payload,
        })
    }

    fn decode<T>(&self, content_type: Option<&str>, payload: &[u8]) -> Result<T, DecodeError>
    where
        T: DeserializeOwned,
    {
        self.check_content_type(content_type)?;

        rmp_serde::from_slice(payload).map_err(|err| DecodeError::Malformed {
            content_type: BINARY_CONTENT_TYPE,
            reason: err.to_string(),
        })
    }

    fn default_prefetch(&self) -> Option<u16> {
        Some(BINARY_DEFAULT_PREFETCH)
    }
}

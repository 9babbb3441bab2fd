// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Pub/Sub Core
//!
//! Broker failures are reported through [`TransportError`] and always surface to the
//! caller of the operation that triggered them. Publishing wraps encode and transport
//! failures in [`PublishError`]. [`DecodeError`] is produced by codecs and is contained
//! by the subscriber loop instead of being propagated.

use thiserror::Error;

/// Represents connection and channel level failures reported by the broker.
///
/// This covers dialing, channel creation, topology declaration, consumer setup,
/// publishing and message resolution. Nothing in this crate retries these errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Error establishing a connection to the broker
    #[error("failure to connect: {0}")]
    ConnectionError(String),

    /// Error creating a channel from an established connection
    #[error("failure to create a channel: {0}")]
    ChannelError(String),

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue, including flag conflicts with an existing queue
    #[error("failure to declare a queue `{queue}`: {reason}")]
    DeclareQueueError { queue: String, reason: String },

    /// Error binding a queue to an exchange
    #[error("failure to binding exchange `{0}` to queue `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// Error configuring the prefetch window
    #[error("failure to configure qos `{0}`")]
    QoSDeclarationError(String),

    /// Error registering a consumer on a queue
    #[error("failure to declare consumer `{0}`")]
    BindingConsumerError(String),

    /// Error reported by the delivery stream itself
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),

    /// The channel refused a publish synchronously
    #[error("failure to publish: {0}")]
    PublishingError(String),

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message")]
    NackMessageError,

    /// Error closing a channel
    #[error("failure to close channel: {0}")]
    CloseChannelError(String),
}

/// Failures of the Topology Declarator are plain transport failures.
pub type TopologyError = TransportError;

/// A value could not be turned into a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failure to encode payload as `{content_type}`: {reason}")]
pub struct EncodeError {
    pub content_type: &'static str,
    pub reason: String,
}

/// A payload could not be reconstructed into the expected type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The delivery carried no content type tag
    #[error("message has no content type, expected `{expected}`")]
    MissingContentType { expected: &'static str },

    /// The delivery was tagged for another codec
    #[error("content type `{found}` does not match codec `{expected}`")]
    ContentTypeMismatch {
        expected: &'static str,
        found: String,
    },

    /// The payload is truncated or structurally incompatible with the target type
    #[error("failure to parse `{content_type}` payload: {reason}")]
    Malformed {
        content_type: &'static str,
        reason: String,
    },
}

/// Local failures of a publish call. When this is returned the message was not sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

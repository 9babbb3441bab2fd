// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Typed publish/subscribe over RabbitMQ for the Peril game.
//!
//! Queues are declared with a [`QueueDurability`] policy and a fixed dead-letter
//! exchange, values are published through a [`Codec`], and every subscription runs
//! its own delivery loop that resolves each message with the handler's [`AckOutcome`].

mod otel;

pub mod channel;
pub mod codec;
pub mod config;
pub mod errors;
pub mod exchange;
pub mod publisher;
pub mod queue;
pub mod routing;
pub mod subscriber;
pub mod topology;
pub mod transport;

#[cfg(test)]
mod testing;

pub use codec::{BinaryCodec, Codec, EncodedMessage, JsonCodec};
pub use errors::{DecodeError, EncodeError, PublishError, TopologyError, TransportError};
pub use publisher::{publish_binary, publish_json, Publisher};
pub use queue::{DeclaredQueue, QueueDurability};
pub use subscriber::{
    subscribe_binary, subscribe_json, AckOutcome, DecodeFailure, Subscriber, Subscription,
    HANDLER_PANIC_OUTCOME,
};
pub use topology::{declare_and_bind, DEAD_LETTER_EXCHANGE};

// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Typed Message Publisher
//!
//! Encodes a value with a [`Codec`] and hands the payload to a broker channel together
//! with its content type and the current OpenTelemetry context. Publishing is
//! fire-and-forget: only local failures are reported, broker-side routing is not awaited.

use crate::{
    codec::{BinaryCodec, Codec, JsonCodec},
    errors::PublishError,
    otel,
    transport::BrokerChannel,
};
use opentelemetry::Context;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

/// Publisher bound to one channel and one codec.
///
/// The channel is shared behind an `Arc`; lapin channels accept concurrent publishes.
pub struct Publisher<Ch, C> {
    channel: Arc<Ch>,
    codec: C,
}

impl<Ch, C> Publisher<Ch, C>
where
    Ch: BrokerChannel,
    C: Codec,
{
    /// Creates a publisher sending on `channel`.
    ///
    /// # Parameters
    /// * `channel` - The channel shared with other publishers
    /// * `codec` - The codec every published value is encoded with
    ///
    /// # Returns
    /// A new Publisher instance
    pub fn new(channel: Arc<Ch>, codec: C) -> Publisher<Ch, C> {
        Publisher { channel, codec }
    }

    /// The channel messages are published on.
    pub fn channel(&self) -> &Arc<Ch> {
        &self.channel
    }

    /// Publishes `value` to `exchange` with `routing_key`.
    ///
    /// # Parameters
    /// * `exchange` - The exchange receiving the message
    /// * `routing_key` - The routing key used by the exchange
    /// * `value` - The value to encode
    ///
    /// # Returns
    /// Ok once the message was handed to the channel, or the encode/transport error
    pub async fn publish<T>(
        &self,
        exchange: &str,
        routing_key: &str,
        value: &T,
    ) -> Result<(), PublishError>
    where
        T: Serialize + ?Sized,
    {
        publish_with(self.channel.as_ref(), &self.codec, exchange, routing_key, value).await
    }
}

/// Publishes `value` as JSON on `channel`.
pub async fn publish_json<Ch, T>(
    channel: &Ch,
    exchange: &str,
    routing_key: &str,
    value: &T,
) -> Result<(), PublishError>
where
    Ch: BrokerChannel,
    T: Serialize + ?Sized,
{
    publish_with(channel, &JsonCodec, exchange, routing_key, value).await
}

/// Publishes `value` as MessagePack on `channel`.
pub async fn publish_binary<Ch, T>(
    channel: &Ch,
    exchange: &str,
    routing_key: &str,
    value: &T,
) -> Result<(), PublishError>
where
    Ch: BrokerChannel,
    T: Serialize + ?Sized,
{
    publish_with(channel, &BinaryCodec, exchange, routing_key, value).await
}

async fn publish_with<Ch, C, T>(
    channel: &Ch,
    codec: &C,
    exchange: &str,
    routing_key: &str,
    value: &T,
) -> Result<(), PublishError>
where
    Ch: BrokerChannel,
    C: Codec,
    T: Serialize + ?Sized,
{
    let message = match codec.encode(value) {
        Ok(message) => message,
        Err(err) => {
            error!(error = err.to_string(), "error encoding message");
            return Err(err.into());
        }
    };

    let headers = otel::inject(&Context::current());

    channel
        .publish(exchange, routing_key, &message, headers)
        .await?;

    debug!(
        exchange,
        routing_key,
        content_type = message.content_type,
        "message published"
    );

    Ok(())
}

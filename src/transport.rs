// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Broker Transport Capabilities
//!
//! The pub/sub core talks to the broker only through the traits in this module:
//! a [`BrokerConnection`] opens channels, a [`BrokerChannel`] declares topology,
//! publishes and consumes, and every consumed message is an [`InboundDelivery`].
//! The production implementation lives in [`crate::channel`] on top of `lapin`.

use crate::{
    codec::EncodedMessage,
    errors::TransportError,
    exchange::ExchangeDefinition,
    queue::{DeclaredQueue, QueueBinding, QueueDefinition},
};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::BTreeMap;

/// String headers carried next to the payload (trace context, application headers).
pub type MessageHeaders = BTreeMap<String, String>;

/// Stream of deliveries for one consumer. It ends when the channel or connection closes.
pub type DeliveryStream<D> = BoxStream<'static, Result<D, TransportError>>;

/// A connection shared read-only for opening channels.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    type Channel: BrokerChannel;

    async fn open_channel(&self) -> Result<Self::Channel, TransportError>;
}

/// A channel, owned by whoever opened it.
#[async_trait]
pub trait BrokerChannel: Send + Sync + 'static {
    type Delivery: InboundDelivery;

    async fn declare_exchange(&self, def: &ExchangeDefinition) -> Result<(), TransportError>;

    async fn declare_queue(&self, def: &QueueDefinition) -> Result<DeclaredQueue, TransportError>;

    async fn bind_queue(&self, binding: &QueueBinding) -> Result<(), TransportError>;

    /// Limits the number of unacknowledged deliveries held by consumers of this channel.
    async fn qos(&self, prefetch_count: u16) -> Result<(), TransportError>;

    /// Hands a message to the broker without waiting for routing confirmation.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: &EncodedMessage,
        headers: MessageHeaders,
    ) -> Result<(), TransportError>;

    /// Starts a manually acknowledged consumer on `queue`.
    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream<Self::Delivery>, TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// One broker message in flight.
///
/// `accept` and `reject` take the delivery by value, so each delivery is
/// resolved at most once.
#[async_trait]
pub trait InboundDelivery: Send + 'static {
    fn content_type(&self) -> Option<&str>;

    fn payload(&self) -> &[u8];

    fn headers(&self) -> MessageHeaders;

    /// Whether the broker delivered this message before.
    fn redelivered(&self) -> bool;

    /// Acknowledges the message, removing it from the queue.
    async fn accept(self) -> Result<(), TransportError>;

    /// Rejects the message. With `requeue` false the broker dead-letters it.
    async fn reject(self, requeue: bool) -> Result<(), TransportError>;
}

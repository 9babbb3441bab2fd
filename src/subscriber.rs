// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Typed Message Subscriber
//!
//! A subscription declares its queue on a dedicated channel, starts a manually
//! acknowledged consumer and spawns one task that, for every delivery:
//! 1. decodes the payload with the subscription's [`Codec`]
//! 2. calls the handler with the decoded value
//! 3. resolves the delivery with the [`AckOutcome`] the handler returned
//!
//! The task runs until the delivery stream ends (channel or connection closed) and
//! then closes its channel. Per-message failures are logged and never stop the loop.
//! A handler that panics has its delivery resolved with [`HANDLER_PANIC_OUTCOME`].

use crate::{
    codec::{BinaryCodec, Codec, JsonCodec},
    errors::TransportError,
    otel,
    queue::{DeclaredQueue, QueueDurability},
    topology::declare_and_bind,
    transport::{BrokerChannel, BrokerConnection, DeliveryStream, InboundDelivery},
};
use futures_util::StreamExt;
use opentelemetry::{
    global::{self, BoxedTracer},
    trace::{Span, Status},
};
use serde::de::DeserializeOwned;
use std::{
    borrow::Cow,
    panic::{self, AssertUnwindSafe},
};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, warn};

/// How a handled delivery is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckOutcome {
    /// Accept the message and remove it from the queue.
    Ack,
    /// Reject the message and put it back in the queue for redelivery.
    NackRequeue,
    /// Reject the message without requeueing; the broker dead-letters it.
    NackDiscard,
}

/// Outcome applied to a delivery whose handler panicked. The message is dead-lettered
/// rather than requeued so a poison message cannot loop forever.
pub const HANDLER_PANIC_OUTCOME: AckOutcome = AckOutcome::NackDiscard;

/// What the loop does with a delivery whose payload cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeFailure {
    /// Log the failure and still call the handler with `T::default()`.
    #[default]
    Permissive,
    /// Log the failure and resolve the delivery with the given outcome, skipping the handler.
    Resolve(AckOutcome),
}

/// Builder for subscriptions sharing one connection and one codec.
pub struct Subscriber<'c, B, C> {
    connection: &'c B,
    codec: C,
    prefetch: Option<u16>,
    on_decode_failure: DecodeFailure,
    consumer_tag: String,
}

impl<'c, B, C> Subscriber<'c, B, C>
where
    B: BrokerConnection,
    C: Codec,
{
    /// Creates a subscriber using the codec's default prefetch window.
    pub fn new(connection: &'c B, codec: C) -> Subscriber<'c, B, C> {
        let prefetch = codec.default_prefetch();
        Subscriber {
            connection,
            codec,
            prefetch,
            on_decode_failure: DecodeFailure::default(),
            consumer_tag: String::new(),
        }
    }

    /// Caps unacknowledged deliveries held by the consumer.
    pub fn prefetch(mut self, count: u16) -> Self {
        self.prefetch = Some(count);
        self
    }

    /// Lets the broker push deliveries without a window.
    pub fn unlimited_prefetch(mut self) -> Self {
        self.prefetch = None;
        self
    }

    /// Sets what happens to deliveries that cannot be decoded.
    ///
    /// # Parameters
    /// * `policy` - [`DecodeFailure::Permissive`] (default) or a fixed outcome
    ///
    /// # Returns
    /// The modified Subscriber
    pub fn on_decode_failure(mut self, policy: DecodeFailure) -> Self {
        self.on_decode_failure = policy;
        self
    }

    /// Consumer tag sent to the broker. Empty lets the broker generate one.
    pub fn consumer_tag(mut self, tag: &str) -> Self {
        self.consumer_tag = tag.to_owned();
        self
    }

    /// Declares `queue_name`, binds it to `exchange` with `routing_key` and starts
    /// delivering decoded messages to `handler`.
    ///
    /// Failures before the consumer is registered are returned and no task is spawned.
    pub async fn subscribe<T, F>(
        self,
        exchange: &str,
        queue_name: &str,
        routing_key: &str,
        policy: QueueDurability,
        handler: F,
    ) -> Result<Subscription, TransportError>
    where
        T: DeserializeOwned + Default + Send + 'static,
        F: Fn(T) -> AckOutcome + Send + Sync + 'static,
    {
        let (channel, queue) =
            declare_and_bind(self.connection, exchange, queue_name, routing_key, policy).await?;

        let deliveries =
            match start_consumer(&channel, &queue, self.prefetch, &self.consumer_tag).await {
                Err(err) => {
                    error!(
                        error = err.to_string(),
                        queue = queue.name.as_str(),
                        "failure to start consumer"
                    );
                    if let Err(close_err) = channel.close().await {
                        warn!(
                            error = close_err.to_string(),
                            queue = queue.name.as_str(),
                            "failure to close channel"
                        );
                    }
                    Err(err)
                }
                Ok(deliveries) => Ok(deliveries),
            }?;

        debug!(queue = queue.name.as_str(), "consumer created");

        let task = tokio::spawn(run_delivery_loop(
            channel,
            deliveries,
            self.codec,
            handler,
            self.on_decode_failure,
            queue.name.clone(),
        ));

        Ok(Subscription { queue, task })
    }
}

/// Applies the prefetch window, if any, and registers the consumer on `channel`.
async fn start_consumer<Ch>(
    channel: &Ch,
    queue: &DeclaredQueue,
    prefetch: Option<u16>,
    consumer_tag: &str,
) -> Result<DeliveryStream<Ch::Delivery>, TransportError>
where
    Ch: BrokerChannel,
{
    if let Some(count) = prefetch {
        debug!(queue = queue.name.as_str(), prefetch = count, "configuring qos");
        channel.qos(count).await?;
    }

    channel.consume(&queue.name, consumer_tag).await
}

/// A running subscription.
#[derive(Debug)]
pub struct Subscription {
    queue: DeclaredQueue,
    task: JoinHandle<()>,
}

impl Subscription {
    /// The queue this subscription consumes from.
    pub fn queue(&self) -> &DeclaredQueue {
        &self.queue
    }

    /// Whether the delivery loop has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits until the delivery stream closes and the loop has released its channel.
    pub async fn wait(self) -> Result<(), JoinError> {
        self.task.await
    }
}

/// Subscribes with the JSON codec and an unlimited prefetch window.
pub async fn subscribe_json<B, T, F>(
    connection: &B,
    exchange: &str,
    queue_name: &str,
    routing_key: &str,
    policy: QueueDurability,
    handler: F,
) -> Result<Subscription, TransportError>
where
    B: BrokerConnection,
    T: DeserializeOwned + Default + Send + 'static,
    F: Fn(T) -> AckOutcome + Send + Sync + 'static,
{
    Subscriber::new(connection, JsonCodec)
        .subscribe(exchange, queue_name, routing_key, policy, handler)
        .await
}

/// Subscribes with the MessagePack codec and its bounded prefetch window.
pub async fn subscribe_binary<B, T, F>(
    connection: &B,
    exchange: &str,
    queue_name: &str,
    routing_key: &str,
    policy: QueueDurability,
    handler: F,
) -> Result<Subscription, TransportError>
where
    B: BrokerConnection,
    T: DeserializeOwned + Default + Send + 'static,
    F: Fn(T) -> AckOutcome + Send + Sync + 'static,
{
    Subscriber::new(connection, BinaryCodec)
        .subscribe(exchange, queue_name, routing_key, policy, handler)
        .await
}

pub(crate) async fn run_delivery_loop<Ch, C, T, F>(
    channel: Ch,
    mut deliveries: DeliveryStream<Ch::Delivery>,
    codec: C,
    handler: F,
    on_decode_failure: DecodeFailure,
    queue: String,
) where
    Ch: BrokerChannel,
    C: Codec,
    T: DeserializeOwned + Default,
    F: Fn(T) -> AckOutcome,
{
    let tracer = global::tracer("amqp subscriber");

    while let Some(result) = deliveries.next().await {
        match result {
            Ok(delivery) => {
                if let Err(err) =
                    handle_delivery(&tracer, &codec, &handler, on_decode_failure, &queue, delivery)
                        .await
                {
                    error!(error = err.to_string(), queue = queue.as_str(), "error consume msg");
                }
            }
            Err(err) => error!(error = err.to_string(), queue = queue.as_str(), "errors consume msg"),
        }
    }

    debug!(queue = queue.as_str(), "delivery stream closed");

    if let Err(err) = channel.close().await {
        warn!(error = err.to_string(), queue = queue.as_str(), "failure to close channel");
    }
}

/// Decodes, handles and resolves one delivery. Returns the outcome that was applied.
pub(crate) async fn handle_delivery<D, C, T, F>(
    tracer: &BoxedTracer,
    codec: &C,
    handler: &F,
    on_decode_failure: DecodeFailure,
    queue: &str,
    delivery: D,
) -> Result<AckOutcome, TransportError>
where
    D: InboundDelivery,
    C: Codec,
    T: DeserializeOwned + Default,
    F: Fn(T) -> AckOutcome,
{
    let (_ctx, mut span) = otel::new_span(&mut delivery.headers(), tracer, queue);

    if delivery.redelivered() {
        debug!(queue, "received redelivered message");
    }

    let outcome = match codec.decode::<T>(delivery.content_type(), delivery.payload()) {
        Ok(value) => call_handler(handler, value, queue),
        Err(err) => {
            warn!(error = err.to_string(), queue, "could not decode message");
            span.record_error(&err);

            match on_decode_failure {
                DecodeFailure::Permissive => call_handler(handler, T::default(), queue),
                DecodeFailure::Resolve(outcome) => outcome,
            }
        }
    };

    let result = match outcome {
        AckOutcome::Ack => delivery.accept().await,
        AckOutcome::NackRequeue => delivery.reject(true).await,
        AckOutcome::NackDiscard => delivery.reject(false).await,
    };

    match result {
        Err(err) => {
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from("error to resolve msg"),
            });
            Err(err)
        }
        Ok(()) => {
            span.set_status(Status::Ok);
            Ok(outcome)
        }
    }
}

/// Runs the handler, turning a panic into [`HANDLER_PANIC_OUTCOME`].
fn call_handler<T, F>(handler: &F, value: T, queue: &str) -> AckOutcome
where
    F: Fn(T) -> AckOutcome,
{
    match panic::catch_unwind(AssertUnwindSafe(|| handler(value))) {
        Ok(outcome) => outcome,
        Err(_) => {
            error!(queue, outcome = ?HANDLER_PANIC_OUTCOME, "handler panicked");
            HANDLER_PANIC_OUTCOME
        }
    }
}

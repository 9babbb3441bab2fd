// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Connection and Channel Management
//!
//! This module connects to RabbitMQ with `lapin` and implements the transport
//! traits on top of lapin's connection, channel and delivery types.

use crate::{
    codec::EncodedMessage,
    config::BrokerConfig,
    errors::TransportError,
    exchange::ExchangeDefinition,
    queue::{DeclaredQueue, QueueBinding, QueueDefinition},
    topology::AMQP_HEADERS_DEAD_LETTER_EXCHANGE,
    transport::{BrokerChannel, BrokerConnection, DeliveryStream, InboundDelivery, MessageHeaders},
};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    message::Delivery,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable, LongString, ShortString},
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use std::collections::BTreeMap;
use tracing::{debug, error};
use uuid::Uuid;

/// Reply code sent when a channel is closed on purpose
const REPLY_SUCCESS: u16 = 200;

/// Connects to the broker described by `cfg`.
///
/// The connection is shared by publishers and subscribers for opening channels.
pub async fn connect(cfg: &BrokerConfig) -> Result<Connection, TransportError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(cfg.connection_name.clone()));

    let uri = cfg.uri().map_err(|err| {
        error!(error = err.to_string(), "invalid broker configuration");
        TransportError::ConnectionError(err.to_string())
    })?;

    let conn = match Connection::connect(&uri, options).await {
        Ok(c) => Ok(c),
        Err(err) => {
            error!(error = err.to_string(), "failure to connect");
            Err(TransportError::ConnectionError(err.to_string()))
        }
    }?;
    debug!("amqp connected");

    Ok(conn)
}

#[async_trait]
impl BrokerConnection for Connection {
    type Channel = Channel;

    async fn open_channel(&self) -> Result<Channel, TransportError> {
        debug!("creating amqp channel...");
        match self.create_channel().await {
            Ok(c) => {
                debug!(channel = c.id(), "channel created");
                Ok(c)
            }
            Err(err) => {
                error!(error = err.to_string(), "error to create the channel");
                Err(TransportError::ChannelError(err.to_string()))
            }
        }
    }
}

#[async_trait]
impl BrokerChannel for Channel {
    type Delivery = AmqpDelivery;

    async fn declare_exchange(&self, def: &ExchangeDefinition) -> Result<(), TransportError> {
        match self
            .exchange_declare(
                def.name(),
                def.exchange_kind().into(),
                ExchangeDeclareOptions {
                    passive: false,
                    durable: def.is_durable(),
                    auto_delete: false,
                    internal: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    name = def.name(),
                    "error to declare the exchange"
                );
                Err(TransportError::DeclareExchangeError(def.name().to_owned()))
            }
            _ => Ok(()),
        }
    }

    async fn declare_queue(&self, def: &QueueDefinition) -> Result<DeclaredQueue, TransportError> {
        match self
            .queue_declare(
                def.name(),
                QueueDeclareOptions {
                    passive: false,
                    durable: def.is_durable(),
                    exclusive: def.is_exclusive(),
                    auto_delete: def.is_auto_delete(),
                    nowait: false,
                },
                queue_arguments(def),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    name = def.name(),
                    "error to declare the queue"
                );
                Err(TransportError::DeclareQueueError {
                    queue: def.name().to_owned(),
                    reason: err.to_string(),
                })
            }
            Ok(queue) => Ok(DeclaredQueue {
                name: queue.name().as_str().to_owned(),
                message_count: queue.message_count(),
                consumer_count: queue.consumer_count(),
            }),
        }
    }

    async fn bind_queue(&self, binding: &QueueBinding) -> Result<(), TransportError> {
        match self
            .queue_bind(
                binding.queue_name(),
                binding.exchange_name(),
                binding.key(),
                QueueBindOptions { nowait: false },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to bind queue to exchange");
                Err(TransportError::BindingExchangeToQueueError(
                    binding.exchange_name().to_owned(),
                    binding.queue_name().to_owned(),
                ))
            }
            _ => Ok(()),
        }
    }

    async fn qos(&self, prefetch_count: u16) -> Result<(), TransportError> {
        match self
            .basic_qos(prefetch_count, BasicQosOptions { global: false })
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to configure qos");
                Err(TransportError::QoSDeclarationError(err.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: &EncodedMessage,
        headers: MessageHeaders,
    ) -> Result<(), TransportError> {
        let headers: BTreeMap<ShortString, AMQPValue> = headers
            .into_iter()
            .map(|(key, value)| {
                (
                    ShortString::from(key),
                    AMQPValue::LongString(LongString::from(value)),
                )
            })
            .collect();

        // The returned confirmation is dropped: publishing never waits for the broker.
        match self
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                &message.payload,
                BasicProperties::default()
                    .with_content_type(ShortString::from(message.content_type))
                    .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
                    .with_headers(FieldTable::from(headers)),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error publishing message");
                Err(TransportError::PublishingError(err.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream<AmqpDelivery>, TransportError> {
        let consumer = match self
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_local: false,
                    no_ack: false,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to create the consumer");
                Err(TransportError::BindingConsumerError(queue.to_owned()))
            }
            Ok(c) => Ok(c),
        }?;

        Ok(consumer
            .map(|result| match result {
                Ok(delivery) => Ok(AmqpDelivery::new(delivery)),
                Err(err) => Err(TransportError::ConsumerError(err.to_string())),
            })
            .boxed())
    }

    async fn close(&self) -> Result<(), TransportError> {
        match Channel::close(self, REPLY_SUCCESS, "OK").await {
            Err(err) => {
                error!(error = err.to_string(), "error to close the channel");
                Err(TransportError::CloseChannelError(err.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Builds the `x-*` arguments of a queue declaration.
fn queue_arguments(def: &QueueDefinition) -> FieldTable {
    let mut args = BTreeMap::new();

    if let Some(exchange) = def.dead_letter() {
        args.insert(
            ShortString::from(AMQP_HEADERS_DEAD_LETTER_EXCHANGE),
            AMQPValue::LongString(LongString::from(exchange)),
        );
    }

    FieldTable::from(args)
}

/// A lapin delivery with its content type and string headers extracted.
pub struct AmqpDelivery {
    delivery: Delivery,
    content_type: Option<String>,
}

impl AmqpDelivery {
    fn new(delivery: Delivery) -> AmqpDelivery {
        let content_type = delivery
            .properties
            .content_type()
            .as_ref()
            .map(|ct| ct.as_str().to_owned());

        AmqpDelivery {
            delivery,
            content_type,
        }
    }

    /// Broker-assigned tag identifying the delivery on its channel.
    pub fn delivery_tag(&self) -> u64 {
        self.delivery.delivery_tag
    }
}

#[async_trait]
impl InboundDelivery for AmqpDelivery {
    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn payload(&self) -> &[u8] {
        &self.delivery.data
    }

    fn headers(&self) -> MessageHeaders {
        let Some(table) = self.delivery.properties.headers() else {
            return MessageHeaders::new();
        };

        table
            .inner()
            .iter()
            .filter_map(|(key, value)| match value {
                AMQPValue::LongString(value) => std::str::from_utf8(value.as_bytes())
                    .map_err(|e| error!("Error decoding header value {:?}", e))
                    .ok()
                    .map(|value| (key.as_str().to_owned(), value.to_owned())),
                AMQPValue::ShortString(value) => {
                    Some((key.as_str().to_owned(), value.as_str().to_owned()))
                }
                _ => None,
            })
            .collect()
    }

    fn redelivered(&self) -> bool {
        self.delivery.redelivered
    }

    async fn accept(self) -> Result<(), TransportError> {
        match self.delivery.ack(BasicAckOptions { multiple: false }).await {
            Err(err) => {
                error!(error = err.to_string(), "error whiling ack msg");
                Err(TransportError::AckMessageError)
            }
            _ => Ok(()),
        }
    }

    async fn reject(self, requeue: bool) -> Result<(), TransportError> {
        match self
            .delivery
            .nack(BasicNackOptions {
                multiple: false,
                requeue,
            })
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), requeue, "error whiling nack msg");
                Err(TransportError::NackMessageError)
            }
            _ => Ok(()),
        }
    }
}

// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Topology Declarator
//!
//! Declares a queue with the flags implied by a [`QueueDurability`] policy, the fixed
//! dead-letter exchange, and binds it to an exchange under a routing key. Every call
//! opens a dedicated channel which is handed back to the caller together with the
//! declared queue. Declarations are idempotent on the broker side.

use crate::{
    errors::TopologyError,
    exchange::ExchangeDefinition,
    queue::{DeclaredQueue, QueueBinding, QueueDefinition, QueueDurability},
    transport::{BrokerChannel, BrokerConnection},
};
use tracing::{debug, error};

/// Exchange receiving every message a subscriber discards
pub const DEAD_LETTER_EXCHANGE: &str = "peril_dlx";

/// Queue argument naming the dead letter exchange
pub const AMQP_HEADERS_DEAD_LETTER_EXCHANGE: &str = "x-dead-letter-exchange";

/// Builds the definition of a queue owned by this layer: `policy` flags plus the
/// dead-letter exchange.
pub fn queue_definition(queue_name: &str, policy: QueueDurability) -> QueueDefinition {
    QueueDefinition::new(queue_name)
        .with_durability(policy)
        .dead_letter_exchange(DEAD_LETTER_EXCHANGE)
}

/// Opens a channel on `connection`, declares `queue_name` under `policy` and binds it
/// to `exchange` with `routing_key`.
///
/// The channel is returned so the caller can keep consuming or publishing on it.
pub async fn declare_and_bind<B>(
    connection: &B,
    exchange: &str,
    queue_name: &str,
    routing_key: &str,
    policy: QueueDurability,
) -> Result<(B::Channel, DeclaredQueue), TopologyError>
where
    B: BrokerConnection,
{
    let channel = connection.open_channel().await?;

    let queue = declare_and_bind_on(&channel, exchange, queue_name, routing_key, policy).await?;

    Ok((channel, queue))
}

/// Same as [`declare_and_bind`] on an already open channel.
pub async fn declare_and_bind_on<Ch>(
    channel: &Ch,
    exchange: &str,
    queue_name: &str,
    routing_key: &str,
    policy: QueueDurability,
) -> Result<DeclaredQueue, TopologyError>
where
    Ch: BrokerChannel,
{
    debug!(queue = queue_name, ?policy, "creating queue");

    let queue = match channel
        .declare_queue(&queue_definition(queue_name, policy))
        .await
    {
        Err(err) => {
            error!(error = err.to_string(), queue = queue_name, "failure to declare queue");
            Err(err)
        }
        Ok(queue) => Ok(queue),
    }?;

    debug!(
        "binding queue: {} to the exchange: {} with the key: {}",
        queue.name, exchange, routing_key
    );

    channel
        .bind_queue(
            &QueueBinding::new(&queue.name)
                .exchange(exchange)
                .routing_key(routing_key),
        )
        .await?;

    debug!(queue = queue.name.as_str(), "queue was bounded");

    Ok(queue)
}

/// Declares an exchange on `channel`.
pub async fn declare_exchange<Ch>(channel: &Ch, def: &ExchangeDefinition) -> Result<(), TopologyError>
where
    Ch: BrokerChannel,
{
    debug!("creating exchange: {}", def.name());
    channel.declare_exchange(def).await?;
    debug!("exchange: {} was created", def.name());
    Ok(())
}

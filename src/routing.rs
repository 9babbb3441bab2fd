// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Peril Routing
//!
//! Exchange names, routing keys and message types shared by the Peril server and
//! clients, plus the declaration of the exchanges they rely on.

use crate::{
    errors::TopologyError,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition, QueueDurability},
    topology::{declare_exchange, DEAD_LETTER_EXCHANGE},
    transport::BrokerChannel,
};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub const EXCHANGE_PERIL_DIRECT: &str = "peril_direct";
pub const EXCHANGE_PERIL_TOPIC: &str = "peril_topic";
pub const EXCHANGE_PERIL_DLX: &str = DEAD_LETTER_EXCHANGE;

/// Durable queue collecting every dead-lettered message
pub const DEAD_LETTER_QUEUE: &str = "peril_dlq";

pub const PAUSE_KEY: &str = "pause";
pub const ARMY_MOVES_PREFIX: &str = "army_moves";
pub const WAR_RECOGNITIONS_PREFIX: &str = "war";
pub const GAME_LOG_SLUG: &str = "game_logs";

/// Builds a `prefix.suffix` routing key or queue name, e.g. `pause.alice`.
pub fn key(prefix: &str, suffix: &str) -> String {
    format!("{prefix}.{suffix}")
}

/// Topic pattern matching every key one level below `prefix`.
pub fn wildcard(prefix: &str) -> String {
    key(prefix, "*")
}

/// Broadcast by the server on [`PAUSE_KEY`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayingState {
    pub is_paused: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub username: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: u32,
    pub rank: String,
    pub location: String,
}

/// Published on `army_moves.<username>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmyMove {
    pub player: Player,
    pub units: Vec<Unit>,
    pub to_location: String,
}

/// Published on `war.<username>` when two players meet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionOfWar {
    pub attacker: Player,
    pub defender: Player,
}

/// Published in binary form on `game_logs.<username>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLog {
    pub current_time: SystemTime,
    pub message: String,
    pub username: String,
}

impl Default for GameLog {
    fn default() -> Self {
        GameLog {
            current_time: UNIX_EPOCH,
            message: String::new(),
            username: String::new(),
        }
    }
}

/// Declares the direct, topic and dead-letter exchanges and the dead-letter queue.
pub async fn install_exchanges<Ch>(channel: &Ch) -> Result<(), TopologyError>
where
    Ch: BrokerChannel,
{
    declare_exchange(channel, &ExchangeDefinition::new(EXCHANGE_PERIL_DIRECT).direct().durable())
        .await?;
    declare_exchange(channel, &ExchangeDefinition::new(EXCHANGE_PERIL_TOPIC).topic().durable())
        .await?;
    declare_exchange(channel, &ExchangeDefinition::new(EXCHANGE_PERIL_DLX).fanout().durable())
        .await?;

    channel
        .declare_queue(
            &QueueDefinition::new(DEAD_LETTER_QUEUE).with_durability(QueueDurability::Durable),
        )
        .await?;
    channel
        .bind_queue(&QueueBinding::new(DEAD_LETTER_QUEUE).exchange(EXCHANGE_PERIL_DLX))
        .await?;

    debug!("peril exchanges installed");

    Ok(())
}

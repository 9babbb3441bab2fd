// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Definitions
//!
//! This module provides the types describing a queue before and after it is declared:
//! the two-valued [`QueueDurability`] policy, the [`QueueDefinition`] builder carrying
//! the flags and arguments sent to the broker, the [`QueueBinding`] triple and the
//! [`DeclaredQueue`] identity returned by the broker.

/// How long a declared queue lives.
///
/// The policy is fixed when the queue is declared. Declaring an existing queue name
/// again with the other policy is rejected by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueDurability {
    /// Survives broker restarts, is never auto-deleted and can be shared between connections.
    Durable,
    /// Lost on restart, deleted with its last consumer and exclusive to the declaring connection.
    Transient,
}

impl QueueDurability {
    /// Returns the `(durable, auto_delete, exclusive)` flags implied by the policy.
    pub fn flags(self) -> (bool, bool, bool) {
        match self {
            QueueDurability::Durable => (true, false, false),
            QueueDurability::Transient => (false, true, true),
        }
    }
}

/// Definition of a queue with its configuration parameters.
///
/// The flags can only be set through a [`QueueDurability`] policy, so a definition is
/// always either fully durable or fully transient. Built with chained calls, e.g.
/// `QueueDefinition::new("war").with_durability(QueueDurability::Durable).dead_letter_exchange("peril_dlx")`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) durable: bool,
    pub(crate) delete: bool,
    pub(crate) exclusive: bool,
    pub(crate) dead_letter_exchange: Option<String>,
}

impl QueueDefinition {
    /// Creates a queue definition without flags or arguments.
    ///
    /// # Parameters
    /// * `name` - The name of the queue
    ///
    /// # Returns
    /// A new QueueDefinition, to be completed with [`QueueDefinition::with_durability`]
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Applies the durable, auto-delete and exclusive flags of `policy`.
    ///
    /// # Parameters
    /// * `policy` - The lifetime policy of the queue
    ///
    /// # Returns
    /// The modified QueueDefinition
    pub fn with_durability(mut self, policy: QueueDurability) -> Self {
        let (durable, delete, exclusive) = policy.flags();
        self.durable = durable;
        self.delete = delete;
        self.exclusive = exclusive;
        self
    }

    /// Rejected messages are routed to `exchange` instead of being dropped.
    ///
    /// # Parameters
    /// * `exchange` - The name of the dead-letter exchange
    ///
    /// # Returns
    /// The modified QueueDefinition
    pub fn dead_letter_exchange(mut self, exchange: &str) -> Self {
        self.dead_letter_exchange = Some(exchange.to_owned());
        self
    }

    /// Name of the queue.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the queue survives broker restarts.
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// Whether the queue is deleted with its last consumer.
    pub fn is_auto_delete(&self) -> bool {
        self.delete
    }

    /// Whether the queue is restricted to the declaring connection.
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Exchange receiving the messages rejected without requeue, if any.
    pub fn dead_letter(&self) -> Option<&str> {
        self.dead_letter_exchange.as_deref()
    }
}

/// Binding of a queue to an exchange under a routing key.
///
/// The routing key may use the topic wildcards `*` (one word) and `#` (zero or more words).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueBinding {
    pub(crate) queue_name: String,
    pub(crate) exchange_name: String,
    pub(crate) routing_key: String,
}

impl QueueBinding {
    /// Creates a binding for `queue` with an empty exchange and routing key.
    pub fn new(queue: &str) -> QueueBinding {
        QueueBinding {
            queue_name: queue.to_owned(),
            ..Default::default()
        }
    }

    /// Sets the exchange the queue is bound to.
    ///
    /// # Parameters
    /// * `exchange` - The name of the source exchange
    ///
    /// # Returns
    /// The modified QueueBinding
    pub fn exchange(mut self, exchange: &str) -> Self {
        self.exchange_name = exchange.to_owned();
        self
    }

    /// Sets the routing key, or topic pattern, of the binding.
    ///
    /// # Parameters
    /// * `key` - The routing key
    ///
    /// # Returns
    /// The modified QueueBinding
    pub fn routing_key(mut self, key: &str) -> Self {
        self.routing_key = key.to_owned();
        self
    }

    /// Name of the bound queue.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Name of the source exchange.
    pub fn exchange_name(&self) -> &str {
        &self.exchange_name
    }

    /// Routing key of the binding.
    pub fn key(&self) -> &str {
        &self.routing_key
    }
}

/// Identity of a queue as reported back by the broker after declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredQueue {
    pub name: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

impl DeclaredQueue {
    /// Identity of a freshly declared, empty queue without consumers.
    pub fn new(name: &str) -> DeclaredQueue {
        DeclaredQueue {
            name: name.to_owned(),
            message_count: 0,
            consumer_count: 0,
        }
    }
}

// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Definitions
//!
//! Exchanges are the routing entities that receive published messages and forward
//! them to bound queues. The core never publishes to an undeclared exchange on its own;
//! these definitions are used when bootstrapping a broker.

/// Represents the routing behaviour of an exchange.
///
/// - Direct: exact match of the routing key
/// - Fanout: every bound queue, routing key ignored
/// - Topic: wildcard matching of dot-separated routing keys
/// - Headers: matching on message headers instead of the routing key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExchangeKind {
    #[default]
    Direct,
    Fanout,
    Topic,
    Headers,
}

impl From<ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: ExchangeKind) -> lapin::ExchangeKind {
        match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
            ExchangeKind::Headers => lapin::ExchangeKind::Headers,
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        }
    }
}

/// Definition of an exchange with its configuration parameters.
///
/// Built with chained calls, e.g. `ExchangeDefinition::new("peril_topic").topic().durable()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeDefinition {
    pub(crate) name: String,
    pub(crate) kind: ExchangeKind,
    pub(crate) durable: bool,
}

impl ExchangeDefinition {
    /// Creates a non-durable direct exchange definition.
    ///
    /// # Parameters
    /// * `name` - The name of the exchange
    ///
    /// # Returns
    /// A new ExchangeDefinition instance
    pub fn new(name: &str) -> ExchangeDefinition {
        ExchangeDefinition {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Sets the routing behaviour of the exchange.
    ///
    /// # Parameters
    /// * `kind` - The exchange kind
    ///
    /// # Returns
    /// The modified ExchangeDefinition
    pub fn kind(mut self, kind: ExchangeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Shorthand for `kind(ExchangeKind::Direct)`.
    pub fn direct(self) -> Self {
        self.kind(ExchangeKind::Direct)
    }

    /// Shorthand for `kind(ExchangeKind::Fanout)`.
    pub fn fanout(self) -> Self {
        self.kind(ExchangeKind::Fanout)
    }

    /// Shorthand for `kind(ExchangeKind::Topic)`.
    pub fn topic(self) -> Self {
        self.kind(ExchangeKind::Topic)
    }

    /// Makes the exchange durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Name of the exchange.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Routing behaviour of the exchange.
    pub fn exchange_kind(&self) -> ExchangeKind {
        self.kind
    }

    /// Whether the exchange survives broker restarts.
    pub fn is_durable(&self) -> bool {
        self.durable
    }
}

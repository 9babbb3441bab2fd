// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use crate::{
    codec::EncodedMessage,
    errors::TransportError,
    exchange::ExchangeDefinition,
    queue::{DeclaredQueue, QueueBinding, QueueDefinition},
    transport::{BrokerChannel, BrokerConnection, DeliveryStream, InboundDelivery, MessageHeaders},
};
use async_trait::async_trait;
use mockall::mock;
use std::sync::{Arc, Mutex};

/// How a [`StubDelivery`] was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Accepted(usize),
    Rejected { id: usize, requeue: bool },
}

/// Delivery that records its resolution in a shared log.
pub struct StubDelivery {
    pub id: usize,
    pub content_type: Option<String>,
    pub payload: Vec<u8>,
    pub log: Arc<Mutex<Vec<Resolution>>>,
    /// When set, `accept` and `reject` fail as if the channel was gone and log nothing.
    pub broken: bool,
}

impl StubDelivery {
    pub fn new(
        id: usize,
        message: &EncodedMessage,
        log: &Arc<Mutex<Vec<Resolution>>>,
    ) -> StubDelivery {
        StubDelivery {
            id,
            content_type: Some(message.content_type.to_owned()),
            payload: message.payload.clone(),
            log: log.clone(),
            broken: false,
        }
    }

    /// A delivery whose acknowledgement never reaches the broker.
    pub fn broken(
        id: usize,
        message: &EncodedMessage,
        log: &Arc<Mutex<Vec<Resolution>>>,
    ) -> StubDelivery {
        StubDelivery {
            broken: true,
            ..StubDelivery::new(id, message, log)
        }
    }
}

#[async_trait]
impl InboundDelivery for StubDelivery {
    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn headers(&self) -> MessageHeaders {
        MessageHeaders::new()
    }

    fn redelivered(&self) -> bool {
        false
    }

    async fn accept(self) -> Result<(), TransportError> {
        if self.broken {
            return Err(TransportError::AckMessageError);
        }
        self.log.lock().unwrap().push(Resolution::Accepted(self.id));
        Ok(())
    }

    async fn reject(self, requeue: bool) -> Result<(), TransportError> {
        if self.broken {
            return Err(TransportError::NackMessageError);
        }
        self.log.lock().unwrap().push(Resolution::Rejected {
            id: self.id,
            requeue,
        });
        Ok(())
    }
}

mock! {
    pub Connection {}

    #[async_trait]
    impl BrokerConnection for Connection {
        type Channel = MockChannel;

        async fn open_channel(&self) -> Result<MockChannel, TransportError>;
    }
}

mock! {
    pub Channel {}

    #[async_trait]
    impl BrokerChannel for Channel {
        type Delivery = StubDelivery;

        async fn declare_exchange(&self, def: &ExchangeDefinition) -> Result<(), TransportError>;

        async fn declare_queue(&self, def: &QueueDefinition) -> Result<DeclaredQueue, TransportError>;

        async fn bind_queue(&self, binding: &QueueBinding) -> Result<(), TransportError>;

        async fn qos(&self, prefetch_count: u16) -> Result<(), TransportError>;

        async fn publish(
            &self,
            exchange: &str,
            routing_key: &str,
            message: &EncodedMessage,
            headers: MessageHeaders,
        ) -> Result<(), TransportError>;

        async fn consume(
            &self,
            queue: &str,
            consumer_tag: &str,
        ) -> Result<DeliveryStream<StubDelivery>, TransportError>;

        async fn close(&self) -> Result<(), TransportError>;
    }
}

// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! In-memory broker used by the integration tests.
//!
//! Queues are unbounded mpsc channels. Publishing routes by topic matching on the
//! bindings, rejections with requeue push the message back marked as redelivered,
//! and rejections without requeue are recorded against the queue's dead-letter exchange.

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::StreamExt;
use peril_pubsub::{
    exchange::ExchangeDefinition,
    queue::{DeclaredQueue, QueueBinding, QueueDefinition},
    transport::{BrokerChannel, BrokerConnection, DeliveryStream, InboundDelivery, MessageHeaders},
    EncodedMessage, TransportError,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: usize,
    pub content_type: String,
    pub payload: Vec<u8>,
    pub headers: MessageHeaders,
    pub redelivered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Accepted { queue: String, id: usize },
    Rejected { queue: String, id: usize, requeue: bool },
}

impl Resolved {
    pub fn id(&self) -> usize {
        match self {
            Resolved::Accepted { id, .. } | Resolved::Rejected { id, .. } => *id,
        }
    }
}

struct QueueState {
    flags: (bool, bool, bool),
    dead_letter: Option<String>,
    sender: Option<UnboundedSender<StoredMessage>>,
    receiver: Option<UnboundedReceiver<StoredMessage>>,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, QueueState>,
    bindings: Vec<QueueBinding>,
    exchanges: Vec<ExchangeDefinition>,
    resolutions: Vec<Resolved>,
    dead_letters: Vec<(String, StoredMessage)>,
    qos: Vec<u16>,
    next_id: usize,
    opened_channels: usize,
    closed_channels: usize,
    refuse_channels: bool,
}

#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    pub fn new() -> MemoryBroker {
        MemoryBroker::default()
    }

    pub fn refuse_channels(&self) {
        self.state.lock().unwrap().refuse_channels = true;
    }

    /// Drops every queue sender, ending all consumer streams once drained.
    pub fn close(&self) {
        for queue in self.state.lock().unwrap().queues.values_mut() {
            queue.sender = None;
        }
    }

    pub fn resolutions(&self) -> Vec<Resolved> {
        self.state.lock().unwrap().resolutions.clone()
    }

    pub fn dead_letters(&self) -> Vec<(String, StoredMessage)> {
        self.state.lock().unwrap().dead_letters.clone()
    }

    pub fn qos(&self) -> Vec<u16> {
        self.state.lock().unwrap().qos.clone()
    }

    pub fn queue_flags(&self, name: &str) -> Option<(bool, bool, bool)> {
        self.state.lock().unwrap().queues.get(name).map(|q| q.flags)
    }

    pub fn queue_dead_letter(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .queues
            .get(name)
            .and_then(|q| q.dead_letter.clone())
    }

    pub fn exchanges(&self) -> Vec<ExchangeDefinition> {
        self.state.lock().unwrap().exchanges.clone()
    }

    pub fn opened_channels(&self) -> usize {
        self.state.lock().unwrap().opened_channels
    }

    pub fn closed_channels(&self) -> usize {
        self.state.lock().unwrap().closed_channels
    }

    /// Waits until at least `count` deliveries were resolved.
    pub async fn wait_for_resolutions(&self, count: usize) -> Vec<Resolved> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let resolutions = self.resolutions();
                if resolutions.len() >= count {
                    return resolutions;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("deliveries were not resolved in time")
    }

    fn record(&self, resolved: Resolved) {
        self.state.lock().unwrap().resolutions.push(resolved);
    }

    fn requeue(&self, queue: &str, mut message: StoredMessage) {
        message.redelivered = true;
        let state = self.state.lock().unwrap();
        if let Some(sender) = state.queues.get(queue).and_then(|q| q.sender.as_ref()) {
            let _ = sender.send(message);
        }
    }

    fn dead_letter(&self, queue: &str, message: StoredMessage) {
        let mut state = self.state.lock().unwrap();
        if let Some(exchange) = state.queues.get(queue).and_then(|q| q.dead_letter.clone()) {
            state.dead_letters.push((exchange, message));
        }
    }
}

/// Topic matching: `*` matches one word, `#` matches zero or more words.
pub fn topic_matches(pattern: &str, key: &str) -> bool {
    fn go(pattern: &[&str], key: &[&str]) -> bool {
        match (pattern.first(), key.first()) {
            (None, None) => true,
            (Some(&"#"), _) => go(&pattern[1..], key) || (!key.is_empty() && go(pattern, &key[1..])),
            (Some(&"*"), Some(_)) => go(&pattern[1..], &key[1..]),
            (Some(p), Some(k)) if p == k => go(&pattern[1..], &key[1..]),
            _ => false,
        }
    }

    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    go(&pattern, &key)
}

#[async_trait]
impl BrokerConnection for MemoryBroker {
    type Channel = MemoryChannel;

    async fn open_channel(&self) -> Result<MemoryChannel, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_channels {
            return Err(TransportError::ChannelError("connection closed".to_owned()));
        }
        state.opened_channels += 1;
        Ok(MemoryChannel {
            broker: self.clone(),
        })
    }
}

pub struct MemoryChannel {
    broker: MemoryBroker,
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    type Delivery = MemoryDelivery;

    async fn declare_exchange(&self, def: &ExchangeDefinition) -> Result<(), TransportError> {
        self.broker.state.lock().unwrap().exchanges.push(def.clone());
        Ok(())
    }

    async fn declare_queue(&self, def: &QueueDefinition) -> Result<DeclaredQueue, TransportError> {
        let flags = (def.is_durable(), def.is_auto_delete(), def.is_exclusive());
        let mut state = self.broker.state.lock().unwrap();

        if let Some(existing) = state.queues.get(def.name()) {
            if existing.flags != flags {
                return Err(TransportError::DeclareQueueError {
                    queue: def.name().to_owned(),
                    reason: "PRECONDITION_FAILED - inequivalent arg".to_owned(),
                });
            }
            return Ok(DeclaredQueue::new(def.name()));
        }

        let (sender, receiver) = unbounded_channel();
        state.queues.insert(
            def.name().to_owned(),
            QueueState {
                flags,
                dead_letter: def.dead_letter().map(str::to_owned),
                sender: Some(sender),
                receiver: Some(receiver),
            },
        );

        Ok(DeclaredQueue::new(def.name()))
    }

    async fn bind_queue(&self, binding: &QueueBinding) -> Result<(), TransportError> {
        let mut state = self.broker.state.lock().unwrap();
        if !state.queues.contains_key(binding.queue_name()) {
            return Err(TransportError::BindingExchangeToQueueError(
                binding.exchange_name().to_owned(),
                binding.queue_name().to_owned(),
            ));
        }
        if !state.bindings.contains(binding) {
            state.bindings.push(binding.clone());
        }
        Ok(())
    }

    async fn qos(&self, prefetch_count: u16) -> Result<(), TransportError> {
        self.broker.state.lock().unwrap().qos.push(prefetch_count);
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: &EncodedMessage,
        headers: MessageHeaders,
    ) -> Result<(), TransportError> {
        let mut state = self.broker.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;

        let stored = StoredMessage {
            id,
            content_type: message.content_type.to_owned(),
            payload: message.payload.clone(),
            headers,
            redelivered: false,
        };

        let targets: Vec<String> = state
            .bindings
            .iter()
            .filter(|b| b.exchange_name() == exchange && topic_matches(b.key(), routing_key))
            .map(|b| b.queue_name().to_owned())
            .collect();

        for queue in targets {
            if let Some(sender) = state.queues.get(&queue).and_then(|q| q.sender.as_ref()) {
                let _ = sender.send(stored.clone());
            }
        }

        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        _consumer_tag: &str,
    ) -> Result<DeliveryStream<MemoryDelivery>, TransportError> {
        let receiver = self
            .broker
            .state
            .lock()
            .unwrap()
            .queues
            .get_mut(queue)
            .and_then(|q| q.receiver.take())
            .ok_or_else(|| TransportError::BindingConsumerError(queue.to_owned()))?;

        let broker = self.broker.clone();
        let queue = queue.to_owned();

        Ok(
            receiver_stream(receiver)
                .map(move |message| {
                    Ok(MemoryDelivery {
                        message,
                        queue: queue.clone(),
                        broker: broker.clone(),
                    })
                })
                .boxed(),
        )
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.broker.state.lock().unwrap().closed_channels += 1;
        Ok(())
    }
}

fn receiver_stream(
    receiver: UnboundedReceiver<StoredMessage>,
) -> impl futures_util::Stream<Item = StoredMessage> + Send + 'static {
    futures_util::stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|message| (message, receiver))
    })
}

pub struct MemoryDelivery {
    pub message: StoredMessage,
    queue: String,
    broker: MemoryBroker,
}

#[async_trait]
impl InboundDelivery for MemoryDelivery {
    fn content_type(&self) -> Option<&str> {
        Some(&self.message.content_type)
    }

    fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    fn headers(&self) -> MessageHeaders {
        self.message.headers.clone()
    }

    fn redelivered(&self) -> bool {
        self.message.redelivered
    }

    async fn accept(self) -> Result<(), TransportError> {
        self.broker.record(Resolved::Accepted {
            queue: self.queue.clone(),
            id: self.message.id,
        });
        Ok(())
    }

    async fn reject(self, requeue: bool) -> Result<(), TransportError> {
        self.broker.record(Resolved::Rejected {
            queue: self.queue.clone(),
            id: self.message.id,
            requeue,
        });

        if requeue {
            self.broker.requeue(&self.queue, self.message);
        } else {
            self.broker.dead_letter(&self.queue, self.message);
        }

        Ok(())
    }
}

//! In-process topic broker.
//!
//! Every subscriber of a topic receives every message published on it after
//! it subscribed. Messages published while a topic has no subscriber are held
//! and handed to the first one that arrives, so nothing is lost between
//! startup steps. The held backlog is bounded per topic; once full, the
//! oldest message is dropped. Delivery to live subscribers is unbounded and
//! in publish order per subscriber.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

use userlog_core::broker::{Delivery, MessagePublisher, Subscription};
use userlog_core::error::DomainError;

#[derive(Debug, Default)]
struct Topic {
    subscribers: Vec<mpsc::UnboundedSender<Delivery>>,
    backlog: VecDeque<Delivery>,
}

/// Messages held per topic while it has no subscriber.
pub const DEFAULT_BACKLOG_CAPACITY: usize = 10_000;

/// Cloneable handle to a shared set of topics.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    topics: Arc<RwLock<HashMap<String, Topic>>>,
    backlog_capacity: usize,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::with_backlog_capacity(DEFAULT_BACKLOG_CAPACITY)
    }
}

impl InMemoryBroker {
    /// Creates an empty broker holding up to `DEFAULT_BACKLOG_CAPACITY`
    /// messages per unsubscribed topic.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty broker holding at most `capacity` messages per
    /// unsubscribed topic. A capacity of zero drops such messages outright.
    #[must_use]
    pub fn with_backlog_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::default(),
            backlog_capacity: capacity,
        }
    }

    /// Subscribes to `topic`. The first subscriber also drains the backlog.
    pub async fn subscribe(&self, topic: &str) -> BrokerSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut topics = self.topics.write().await;
        let entry = topics.entry(topic.to_owned()).or_default();
        for delivery in entry.backlog.drain(..) {
            // The receiver is alive in this scope, so the send cannot fail.
            let _ = tx.send(delivery);
        }
        entry.subscribers.push(tx);
        debug!(topic, subscribers = entry.subscribers.len(), "subscribed");
        BrokerSubscription { receiver: rx }
    }

    /// Number of messages held for a topic with no subscriber.
    pub async fn backlog_len(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map_or(0, |t| t.backlog.len())
    }

    /// Drops the subscriber handles of `topic`, ending its open subscriptions.
    pub async fn close_topic(&self, topic: &str) {
        if let Some(entry) = self.topics.write().await.get_mut(topic) {
            entry.subscribers.clear();
        }
    }

    /// Drops all subscriber handles, ending every open subscription.
    pub async fn close(&self) {
        let mut topics = self.topics.write().await;
        for topic in topics.values_mut() {
            topic.subscribers.clear();
        }
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBroker {
    async fn send(&self, topic: &str, payload: &str) -> Result<(), DomainError> {
        let delivery = Delivery {
            topic: topic.to_owned(),
            payload: payload.to_owned(),
        };

        let mut topics = self.topics.write().await;
        let entry = topics.entry(topic.to_owned()).or_default();
        entry
            .subscribers
            .retain(|tx| tx.send(delivery.clone()).is_ok());

        if entry.subscribers.is_empty() {
            if self.backlog_capacity == 0 {
                warn!(topic, "no live subscriber and no backlog, dropping message");
                return Ok(());
            }
            if entry.backlog.len() >= self.backlog_capacity {
                entry.backlog.pop_front();
                warn!(
                    topic,
                    capacity = self.backlog_capacity,
                    "backlog full, dropping oldest message"
                );
            } else {
                warn!(topic, "no live subscriber, holding message in backlog");
            }
            entry.backlog.push_back(delivery);
        }
        Ok(())
    }
}

/// Receiving end of an `InMemoryBroker` subscription.
#[derive(Debug)]
pub struct BrokerSubscription {
    receiver: mpsc::UnboundedReceiver<Delivery>,
}

#[async_trait]
impl Subscription for BrokerSubscription {
    async fn next_delivery(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

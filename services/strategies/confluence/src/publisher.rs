//! Fan-out of engine events to subscribers
//!
//! Each subscriber owns a bounded queue. Delivery uses `try_send`, so a slow
//! subscriber loses events once its queue is full and a closed one is dropped;
//! neither ever blocks the publisher or the other subscribers.

use crate::snapshot::EngineEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Receiving end handed to a subscriber
pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::Receiver<EngineEvent>,
}

pub struct StatePublisher {
    subscribers: Arc<RwLock<HashMap<Uuid, mpsc::Sender<EngineEvent>>>>,
    capacity: usize,
}

impl StatePublisher {
    /// `capacity` bounds each subscriber's queue
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub async fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = Uuid::new_v4();

        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(id, sender);
        info!(
            "Added subscriber {}, total subscribers: {}",
            id,
            subscribers.len()
        );

        Subscription { id, receiver }
    }

    pub async fn unsubscribe(&self, id: Uuid) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.remove(&id).is_some() {
            info!(
                "Removed subscriber {}, total subscribers: {}",
                id,
                subscribers.len()
            );
        }
    }

    /// Deliver `event` to every subscriber; returns how many accepted it
    pub async fn broadcast(&self, event: EngineEvent) -> usize {
        let subscribers = self.subscribers.read().await;
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, sender) in subscribers.iter() {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Subscriber {} is lagging, dropped {} event", id, event.kind());
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        drop(subscribers); // Release read lock before acquiring write lock

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in closed {
                subscribers.remove(&id);
                debug!("Removed disconnected subscriber {}", id);
            }
        }

        delivered
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

impl Default for StatePublisher {
    fn default() -> Self {
        Self::new(64)
    }
}

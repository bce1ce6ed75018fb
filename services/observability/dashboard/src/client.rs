//! WebSocket client management

use crate::error::{DashboardError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Serialized frame shared by every client it is sent to
pub type Frame = Arc<str>;

/// WebSocket client representation
pub struct Client {
    pub id: Uuid,
    pub sender: mpsc::Sender<Frame>,
}

impl Client {
    pub fn new(sender: mpsc::Sender<Frame>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    /// Queue a frame for this client; a full or closed queue is a failure
    pub fn send_frame(&self, frame: Frame) -> Result<()> {
        self.sender.try_send(frame).map_err(|e| DashboardError::Client {
            message: match e {
                TrySendError::Full(_) => format!("Client {} is not keeping up", self.id),
                TrySendError::Closed(_) => format!("Client {} disconnected", self.id),
            },
        })
    }
}

/// Manages all connected WebSocket clients
pub struct ClientManager {
    clients: Arc<RwLock<HashMap<Uuid, Client>>>,
    max_connections: usize,
}

impl ClientManager {
    pub fn new(max_connections: usize) -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            max_connections,
        }
    }

    /// Add a new client
    pub async fn add_client(&self, client: Client) -> Result<()> {
        let mut clients = self.clients.write().await;

        if clients.len() >= self.max_connections {
            return Err(DashboardError::Client {
                message: "Maximum connections reached".to_string(),
            });
        }

        let client_id = client.id;
        clients.insert(client_id, client);

        info!(
            "Added client {}, total connections: {}",
            client_id,
            clients.len()
        );
        Ok(())
    }

    /// Remove a client
    pub async fn remove_client(&self, client_id: Uuid) {
        let mut clients = self.clients.write().await;
        if clients.remove(&client_id).is_some() {
            info!(
                "Removed client {}, total connections: {}",
                client_id,
                clients.len()
            );
        }
    }

    /// Send a frame to every client, dropping the ones that fail.
    /// Returns the number of clients that received it.
    pub async fn broadcast(&self, frame: Frame) -> usize {
        let clients = self.clients.read().await;
        let mut failed_clients = Vec::new();

        for (client_id, client) in clients.iter() {
            if let Err(e) = client.send_frame(frame.clone()) {
                debug!("{}", e);
                failed_clients.push(*client_id);
            }
        }

        let delivered = clients.len() - failed_clients.len();
        drop(clients);

        if !failed_clients.is_empty() {
            let mut clients = self.clients.write().await;
            for client_id in failed_clients {
                clients.remove(&client_id);
                info!("Dropped failing client {}", client_id);
            }
        }

        delivered
    }

    /// Get the number of connected clients
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> Frame {
        Arc::from(text)
    }

    #[tokio::test]
    async fn test_client_manager() {
        let manager = ClientManager::new(10);
        assert_eq!(manager.client_count().await, 0);

        let (tx, _rx) = mpsc::channel(4);
        let client = Client::new(tx);
        let client_id = client.id;

        manager.add_client(client).await.unwrap();
        assert_eq!(manager.client_count().await, 1);

        manager.remove_client(client_id).await;
        assert_eq!(manager.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let manager = ClientManager::new(1);
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);

        manager.add_client(Client::new(tx1)).await.unwrap();
        assert!(manager.add_client(Client::new(tx2)).await.is_err());
        assert_eq!(manager.client_count().await, 1);
    }

    #[tokio::test]
    async fn test_client_broadcast() {
        let manager = ClientManager::new(10);
        let (tx, mut rx) = mpsc::channel(4);
        manager.add_client(Client::new(tx)).await.unwrap();

        let message = frame(r#"{"type":"state","data":{}}"#);
        assert_eq!(manager.broadcast(message.clone()).await, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, message);
    }

    #[tokio::test]
    async fn test_failing_client_dropped_others_served() {
        let manager = ClientManager::new(10);

        let (healthy_tx, mut healthy_rx) = mpsc::channel(4);
        let (closed_tx, closed_rx) = mpsc::channel(4);
        let (slow_tx, _slow_rx) = mpsc::channel(1);
        manager.add_client(Client::new(healthy_tx)).await.unwrap();
        manager.add_client(Client::new(closed_tx)).await.unwrap();
        manager.add_client(Client::new(slow_tx)).await.unwrap();
        drop(closed_rx);

        assert_eq!(manager.broadcast(frame("one")).await, 2);
        assert_eq!(manager.client_count().await, 2);

        // The slow client's single slot is still occupied
        assert_eq!(manager.broadcast(frame("two")).await, 1);
        assert_eq!(manager.client_count().await, 1);

        assert_eq!(&*healthy_rx.recv().await.unwrap(), "one");
        assert_eq!(&*healthy_rx.recv().await.unwrap(), "two");
    }
}

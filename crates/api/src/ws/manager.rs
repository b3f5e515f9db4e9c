use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use scholarship_core::types::{DbId, Timestamp};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single authenticated WebSocket connection.
pub struct WsConnection {
    pub user_id: DbId,
    /// Role name from the token used to connect.
    pub role: String,
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Manages all active WebSocket connections.
///
/// Thread-safe via interior `RwLock`; wrapped in `Arc` and shared across the
/// application. Delivery is best effort: closed channels are skipped.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(
        &self,
        conn_id: String,
        user_id: DbId,
        role: String,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            user_id,
            role,
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Broadcast a message to all connected clients.
    pub async fn broadcast(&self, message: Message) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(message.clone());
        }
    }

    /// Send a message to all connections belonging to a user.
    ///
    /// Returns the number of connections the message was sent to.
    pub async fn send_to_user(&self, user_id: DbId, message: Message) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values().filter(|c| c.user_id == user_id) {
            let _ = conn.sender.send(message.clone());
            count += 1;
        }
        count
    }

    /// Send a message to one connection. Returns `false` if it is gone.
    pub async fn send_to_connection(&self, conn_id: &str, message: Message) -> bool {
        match self.connections.read().await.get(conn_id) {
            Some(conn) => conn.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Serialize `payload` and broadcast it as a text frame.
    pub async fn broadcast_json<T: Serialize>(&self, payload: &T) {
        if let Some(message) = text_message(payload) {
            self.broadcast(message).await;
        }
    }

    /// Serialize `payload` and send it to every connection of `user_id`.
    pub async fn send_json_to_user<T: Serialize>(&self, user_id: DbId, payload: &T) -> usize {
        match text_message(payload) {
            Some(message) => self.send_to_user(user_id, message).await,
            None => 0,
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize `payload` into a text frame.
pub fn text_message<T: Serialize>(payload: &T) -> Option<Message> {
    match serde_json::to_string(payload) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize WebSocket payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn send_to_user_reaches_only_that_user() {
        let manager = WsManager::new();
        let mut a1 = manager.add("a1".into(), 1, "registrar".into()).await;
        let mut a2 = manager.add("a2".into(), 1, "registrar".into()).await;
        let mut b = manager.add("b".into(), 2, "hr".into()).await;

        let sent = manager
            .send_json_to_user(1, &json!({ "type": "job_progress" }))
            .await;
        assert_eq!(sent, 2);
        assert!(matches!(a1.try_recv(), Ok(Message::Text(_))));
        assert!(matches!(a2.try_recv(), Ok(Message::Text(_))));
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_and_remove() {
        let manager = WsManager::new();
        let mut a = manager.add("a".into(), 1, "admin".into()).await;
        let _b = manager.add("b".into(), 2, "hr".into()).await;
        assert_eq!(manager.connection_count().await, 2);

        manager.broadcast_json(&json!({ "type": "renewal_updated" })).await;
        let Ok(Message::Text(text)) = a.try_recv() else {
            panic!("expected a text frame");
        };
        assert!(text.as_str().contains("renewal_updated"));

        manager.remove("b").await;
        assert_eq!(manager.connection_count().await, 1);
        assert_eq!(manager.send_to_user(2, Message::Ping(Bytes::new())).await, 0);
    }

    #[tokio::test]
    async fn shutdown_sends_close_and_clears() {
        let manager = WsManager::new();
        let mut a = manager.add("a".into(), 1, "admin".into()).await;
        manager.shutdown_all().await;
        assert!(matches!(a.try_recv(), Ok(Message::Close(None))));
        assert_eq!(manager.connection_count().await, 0);
    }
}

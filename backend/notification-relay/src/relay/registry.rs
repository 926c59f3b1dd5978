/// Connection Registry
///
/// Maps application user ids to the live relay connection that most recently
/// registered them, and forwards notifications to that connection.
/// Supports:
/// - Last-register-wins binding of a user id to a connection
/// - Best-effort notification forwarding (no queueing, no retry)
/// - Cleanup of every binding owned by a closed connection
/// - Eviction of handles whose connection is already gone
use super::protocol::{Notification, ServerEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Outbound queue feeding one connection's socket writer
pub type OutboundSender = mpsc::UnboundedSender<ServerEvent>;
pub type OutboundReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Unique identifier of one transport session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque reference to a live connection
///
/// Two handles are the same connection iff their ids match.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: OutboundSender,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, sender: OutboundSender) -> Self {
        Self { id, sender }
    }

    /// Create a handle together with the receiving end of its outbound queue
    pub fn channel() -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(ConnectionId::new(), tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_live(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Result of a forwarding attempt, for in-process callers only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    Delivered,
    Unreachable,
}

impl Delivery {
    pub fn as_str(&self) -> &'static str {
        match self {
            Delivery::Delivered => "delivered",
            Delivery::Unreachable => "unreachable",
        }
    }
}

struct Registration {
    handle: ConnectionHandle,
    registered_at: DateTime<Utc>,
}

/// Point-in-time view of one registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationSnapshot {
    pub user_id: String,
    pub connection_id: ConnectionId,
    pub registered_at: DateTime<Utc>,
}

/// Registry of user id -> live connection
///
/// Cloning shares the same underlying map. Each operation takes the lock
/// once; no operation spans more than one critical section except eviction.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<String, Registration>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `user_id` to `handle`, superseding any previous binding
    ///
    /// Returns the id of the connection that was superseded, if it was a
    /// different connection. The superseded connection stays open.
    pub async fn register(&self, user_id: &str, handle: ConnectionHandle) -> Option<ConnectionId> {
        let mut guard = self.inner.write().await;
        let connection_id = handle.id;

        let previous = match guard.get_mut(user_id) {
            // Same connection registering again: keep the entry as-is
            Some(existing) if existing.handle.id == connection_id => None,
            Some(existing) => {
                let previous = existing.handle.id;
                *existing = Registration {
                    handle,
                    registered_at: Utc::now(),
                };
                Some(previous)
            }
            None => {
                guard.insert(
                    user_id.to_string(),
                    Registration {
                        handle,
                        registered_at: Utc::now(),
                    },
                );
                None
            }
        };

        tracing::info!(
            user_id = %user_id,
            connection_id = %connection_id,
            superseded = ?previous,
            connected_users = guard.len(),
            "user registered"
        );
        tracing::debug!(registry = ?Self::collect(&guard), "current registrations");

        previous
    }

    /// Forward a notification to the connection registered for `recipient`
    ///
    /// Never fails. A missing recipient or a closed connection yields
    /// `Delivery::Unreachable`; a closed connection's entry is evicted.
    pub async fn send_notification(&self, recipient: &str, notification: Notification) -> Delivery {
        let stale = {
            let guard = self.inner.read().await;
            let Some(registration) = guard.get(recipient) else {
                tracing::warn!(recipient = %recipient, "recipient not connected, dropping notification");
                return Delivery::Unreachable;
            };

            match registration
                .handle
                .sender
                .send(ServerEvent::ReceiveNotification(notification))
            {
                Ok(()) => {
                    tracing::info!(
                        recipient = %recipient,
                        connection_id = %registration.handle.id,
                        "notification forwarded"
                    );
                    return Delivery::Delivered;
                }
                Err(_) => registration.handle.id,
            }
        };

        self.evict(recipient, stale).await;
        tracing::warn!(
            recipient = %recipient,
            connection_id = %stale,
            "recipient connection closed, dropping notification"
        );
        Delivery::Unreachable
    }

    /// Remove every binding owned by a closed connection
    ///
    /// Returns the user ids that were unbound; empty if the connection never
    /// registered or has been superseded everywhere.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Vec<String> {
        let mut guard = self.inner.write().await;

        let removed: Vec<String> = guard
            .iter()
            .filter(|(_, registration)| registration.handle.id == connection_id)
            .map(|(user_id, _)| user_id.clone())
            .collect();

        for user_id in &removed {
            guard.remove(user_id);
            tracing::info!(
                user_id = %user_id,
                connection_id = %connection_id,
                connected_users = guard.len(),
                "user disconnected"
            );
        }

        removed
    }

    /// Remove `user_id` only if it is still bound to `connection_id`
    async fn evict(&self, user_id: &str, connection_id: ConnectionId) {
        let mut guard = self.inner.write().await;
        if guard
            .get(user_id)
            .is_some_and(|registration| registration.handle.id == connection_id)
        {
            guard.remove(user_id);
        }
    }

    /// Whether `user_id` currently has a binding
    pub async fn is_registered(&self, user_id: &str) -> bool {
        let guard = self.inner.read().await;
        guard.contains_key(user_id)
    }

    /// Connection currently bound to `user_id`
    pub async fn connection_for(&self, user_id: &str) -> Option<ConnectionId> {
        let guard = self.inner.read().await;
        guard.get(user_id).map(|registration| registration.handle.id)
    }

    /// Number of registered user ids
    pub async fn connected_users_count(&self) -> usize {
        let guard = self.inner.read().await;
        guard.len()
    }

    /// Registered user ids, sorted
    pub async fn connected_user_ids(&self) -> Vec<String> {
        let guard = self.inner.read().await;
        let mut ids: Vec<String> = guard.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Full registry contents, sorted by user id
    pub async fn snapshot(&self) -> Vec<RegistrationSnapshot> {
        let guard = self.inner.read().await;
        Self::collect(&guard)
    }

    /// Drop every binding (shutdown)
    pub async fn clear_all(&self) -> usize {
        let mut guard = self.inner.write().await;
        let count = guard.len();
        guard.clear();
        count
    }

    fn collect(map: &HashMap<String, Registration>) -> Vec<RegistrationSnapshot> {
        let mut entries: Vec<RegistrationSnapshot> = map
            .iter()
            .map(|(user_id, registration)| RegistrationSnapshot {
                user_id: user_id.clone(),
                connection_id: registration.handle.id,
                registered_at: registration.registered_at,
            })
            .collect();
        entries.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        entries
    }
}

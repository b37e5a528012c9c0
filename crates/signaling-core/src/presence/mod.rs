//! Presence registry: which users are online and how to reach them

pub mod events;

pub use events::ConnectionEvent;

use crate::error::{SignalingError, SignalingResult};
use crate::transport::TransportHandle;
use crate::types::{ConnectionId, UserId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A live client connection
#[derive(Clone)]
pub struct ClientConnection {
    /// User owning the connection
    pub user_id: UserId,
    /// Distinguishes successive connections of the same user
    pub connection_id: ConnectionId,
    /// Handle used to deliver envelopes to the client
    pub transport: Arc<dyn TransportHandle>,
    /// When the connection was registered
    pub connected_at: DateTime<Utc>,
}

impl fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConnection")
            .field("user_id", &self.user_id)
            .field("connection_id", &self.connection_id)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

/// In-memory map from user id to its single live connection.
///
/// Entries are keyed independently per user, so the map's own shard locking
/// is all the synchronization needed.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    connections: DashMap<UserId, ClientConnection>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection for a user, replacing any existing one
    pub fn register(&self, user_id: impl Into<UserId>, transport: Arc<dyn TransportHandle>) -> ClientConnection {
        let user_id = user_id.into();
        let connection = ClientConnection {
            user_id: user_id.clone(),
            connection_id: Uuid::new_v4(),
            transport,
            connected_at: Utc::now(),
        };

        if let Some(previous) = self.connections.insert(user_id.clone(), connection.clone()) {
            tracing::info!(
                "Replaced connection {} for {} with {}",
                previous.connection_id,
                user_id,
                connection.connection_id
            );
        } else {
            tracing::debug!("Registered {} ({})", user_id, connection.connection_id);
        }

        connection
    }

    /// Remove a user's connection; no-op if the user is not registered
    pub fn unregister(&self, user_id: &str) -> Option<ClientConnection> {
        let removed = self.connections.remove(user_id).map(|(_, connection)| connection);
        if let Some(connection) = &removed {
            tracing::debug!("Unregistered {} ({})", user_id, connection.connection_id);
        }
        removed
    }

    /// Remove a user's connection only if it is still `connection_id`.
    ///
    /// A disconnect that arrives after the user already reconnected must not
    /// evict the newer connection.
    pub fn unregister_connection(&self, user_id: &str, connection_id: ConnectionId) -> bool {
        let removed = self
            .connections
            .remove_if(user_id, |_, connection| connection.connection_id == connection_id)
            .is_some();
        if removed {
            tracing::debug!("Unregistered {} ({})", user_id, connection_id);
        } else {
            tracing::debug!("Ignoring stale disconnect of {} ({})", user_id, connection_id);
        }
        removed
    }

    /// Look up a user's live connection
    pub fn lookup(&self, user_id: &str) -> SignalingResult<ClientConnection> {
        self.connections
            .get(user_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SignalingError::not_found(user_id))
    }

    /// Whether a user currently has a live connection
    pub fn is_online(&self, user_id: &str) -> bool {
        self.connections.contains_key(user_id)
    }

    /// All users with a live connection
    pub fn online_users(&self) -> Vec<UserId> {
        self.connections.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;

    fn transport(user: &str) -> Arc<dyn TransportHandle> {
        let (transport, _rx) = ChannelTransport::pair(user, 4);
        Arc::new(transport)
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = PresenceRegistry::new();
        let registered = registry.register("alice", transport("alice"));

        let found = registry.lookup("alice").unwrap();
        assert_eq!(found.connection_id, registered.connection_id);
        assert!(registry.is_online("alice"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_missing_user() {
        let registry = PresenceRegistry::new();
        assert_eq!(
            registry.lookup("ghost").unwrap_err(),
            SignalingError::not_found("ghost")
        );
    }

    #[test]
    fn test_reconnect_replaces_handle() {
        let registry = PresenceRegistry::new();
        let first = registry.register("alice", transport("alice"));
        let second = registry.register("alice", transport("alice"));

        assert_ne!(first.connection_id, second.connection_id);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("alice").unwrap().connection_id, second.connection_id);
    }

    #[test]
    fn test_unregister_is_noop_when_absent() {
        let registry = PresenceRegistry::new();
        assert!(registry.unregister("nobody").is_none());

        registry.register("bob", transport("bob"));
        assert!(registry.unregister("bob").is_some());
        assert!(registry.unregister("bob").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stale_disconnect_keeps_new_connection() {
        let registry = PresenceRegistry::new();
        let old = registry.register("alice", transport("alice"));
        let new = registry.register("alice", transport("alice"));

        assert!(!registry.unregister_connection("alice", old.connection_id));
        assert!(registry.is_online("alice"));
        assert!(registry.unregister_connection("alice", new.connection_id));
        assert!(!registry.is_online("alice"));
    }
}

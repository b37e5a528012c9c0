//! Transport lifecycle events feeding the presence registry

use super::PresenceRegistry;
use crate::transport::TransportHandle;
use crate::types::{ConnectionId, UserId};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Connection lifecycle event emitted by the presence transport
#[derive(Clone)]
pub enum ConnectionEvent {
    /// A client connected (or reconnected)
    Connected {
        user_id: UserId,
        transport: Arc<dyn TransportHandle>,
    },

    /// A client disconnected. With a `connection_id` only that connection is
    /// removed; without one, whatever is registered for the user is removed.
    Disconnected {
        user_id: UserId,
        connection_id: Option<ConnectionId>,
    },
}

impl fmt::Debug for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionEvent::Connected { user_id, .. } => {
                f.debug_struct("Connected").field("user_id", user_id).finish()
            }
            ConnectionEvent::Disconnected { user_id, connection_id } => f
                .debug_struct("Disconnected")
                .field("user_id", user_id)
                .field("connection_id", connection_id)
                .finish(),
        }
    }
}

impl PresenceRegistry {
    /// Apply one lifecycle event
    pub fn apply(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected { user_id, transport } => {
                self.register(user_id, transport);
            }
            ConnectionEvent::Disconnected {
                user_id,
                connection_id: Some(connection_id),
            } => {
                self.unregister_connection(user_id.as_str(), connection_id);
            }
            ConnectionEvent::Disconnected {
                user_id,
                connection_id: None,
            } => {
                self.unregister(user_id.as_str());
            }
        }
    }

    /// Drain lifecycle events on a background task until the sender side closes
    pub fn spawn_event_pump(self: Arc<Self>, mut events: mpsc::Receiver<ConnectionEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::debug!("Presence event pump started");
            while let Some(event) = events.recv().await {
                self.apply(event);
            }
            tracing::debug!("Presence event pump stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;

    #[tokio::test]
    async fn test_event_pump_tracks_connect_and_disconnect() {
        let registry = Arc::new(PresenceRegistry::new());
        let (tx, rx) = mpsc::channel(8);
        let pump = registry.clone().spawn_event_pump(rx);

        let (transport, _inbox) = ChannelTransport::pair("carol", 4);
        tx.send(ConnectionEvent::Connected {
            user_id: "carol".into(),
            transport: Arc::new(transport),
        })
        .await
        .unwrap();
        tx.send(ConnectionEvent::Disconnected {
            user_id: "dave".into(),
            connection_id: None,
        })
        .await
        .unwrap();
        drop(tx);
        pump.await.unwrap();

        assert!(registry.is_online("carol"));
        assert!(!registry.is_online("dave"));
    }

    #[test]
    fn test_disconnect_with_connection_id() {
        let registry = PresenceRegistry::new();
        let (transport, _inbox) = ChannelTransport::pair("carol", 4);
        let connection = registry.register("carol", Arc::new(transport));

        registry.apply(ConnectionEvent::Disconnected {
            user_id: "carol".into(),
            connection_id: Some(connection.connection_id),
        });
        assert!(!registry.is_online("carol"));
    }
}

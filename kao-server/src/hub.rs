//! The broadcast hub: overlay client registry and channel fan-out.
//!
//! The hub owns [`ClientRecord`]s but not the sockets themselves — each
//! WebSocket task owns its socket and hands the hub an mpsc sender as a
//! lookup-only transport reference. A send failure here means the
//! client's outbound buffer is full or its task is gone; the client is
//! skipped and the fan-out continues.

use kao_proto::messages::{StatusEvent, SubscribePayload};
use kao_proto::{Channel, WireBody, WireMessage};
use std::collections::{HashMap, HashSet};
use time::OffsetDateTime;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One connected overlay client.
struct ClientRecord {
    outbound: mpsc::Sender<WireMessage>,
    channels: HashSet<Channel>,
    #[allow(dead_code)]
    connected_at: OffsetDateTime,
}

/// Registry of connected clients and their channel subscriptions.
#[derive(Default)]
pub struct BroadcastHub {
    clients: RwLock<HashMap<Uuid, ClientRecord>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly connected client and send its welcome frame.
    ///
    /// The client starts with an empty subscription set, which means it
    /// receives every channel broadcast until it subscribes (the
    /// pre-subscription firehose; see `broadcast`).
    pub async fn register(&self, outbound: mpsc::Sender<WireMessage>) -> Uuid {
        let id = Uuid::new_v4();
        let welcome = WireMessage::new(WireBody::Status(StatusEvent {
            connected: true,
            client_id: Some(id),
            host: None,
            port: None,
        }));
        if outbound.try_send(welcome).is_err() {
            debug!(client_id = %id, "welcome frame dropped");
        }

        let mut clients = self.clients.write().await;
        clients.insert(
            id,
            ClientRecord {
                outbound,
                channels: HashSet::new(),
                connected_at: OffsetDateTime::now_utc(),
            },
        );
        info!(client_id = %id, total = clients.len(), "overlay client registered");
        id
    }

    /// Remove a client; called on disconnect or transport error.
    pub async fn remove(&self, id: Uuid) {
        let mut clients = self.clients.write().await;
        if clients.remove(&id).is_some() {
            info!(client_id = %id, total = clients.len(), "overlay client removed");
        }
    }

    /// Add channels to a client's subscription set.
    pub async fn subscribe(&self, id: Uuid, request: &SubscribePayload) {
        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get_mut(&id) {
            client.channels.extend(request.channels.iter().copied());
            debug!(client_id = %id, channels = ?request.channels, "subscribed");
        }
    }

    /// Remove channels from a client's subscription set.
    pub async fn unsubscribe(&self, id: Uuid, request: &SubscribePayload) {
        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get_mut(&id) {
            for channel in &request.channels {
                client.channels.remove(channel);
            }
            debug!(client_id = %id, channels = ?request.channels, "unsubscribed");
        }
    }

    /// Fan a message out to every client subscribed to `channel` — and
    /// to every client that has not subscribed to anything yet (initial
    /// connect behavior: until the first subscribe frame, a client gets
    /// the firehose).
    ///
    /// Returns the number of successful sends.
    pub async fn broadcast(&self, channel: Channel, message: WireMessage) -> usize {
        let clients = self.clients.read().await;
        let mut sent = 0;
        for (id, client) in clients.iter() {
            if !(client.channels.contains(&channel) || client.channels.is_empty()) {
                continue;
            }
            if client.outbound.try_send(message.clone()).is_ok() {
                sent += 1;
            } else {
                warn!(client_id = %id, %channel, "broadcast send failed, skipping client");
            }
        }
        debug!(%channel, sent, "broadcast");
        sent
    }

    /// Unconditional fan-out ignoring subscriptions, for global status
    /// events.
    pub async fn broadcast_all(&self, message: WireMessage) -> usize {
        let clients = self.clients.read().await;
        let mut sent = 0;
        for (id, client) in clients.iter() {
            if client.outbound.try_send(message.clone()).is_ok() {
                sent += 1;
            } else {
                warn!(client_id = %id, "broadcast send failed, skipping client");
            }
        }
        sent
    }

    /// Total connected clients.
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Subscriber count per channel. Clients with empty subscription
    /// sets are not counted here even though they receive everything.
    pub async fn channel_stats(&self) -> HashMap<Channel, usize> {
        let clients = self.clients.read().await;
        let mut stats: HashMap<Channel, usize> =
            Channel::ALL.into_iter().map(|c| (c, 0)).collect();
        for client in clients.values() {
            for channel in &client.channels {
                *stats.entry(*channel).or_insert(0) += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kao_proto::messages::{ExpressionEvent, WireBody};
    use kao_proto::Expression;

    fn expression_message() -> WireMessage {
        WireMessage::new(WireBody::Expression(ExpressionEvent {
            expression: Expression::Happy,
            duration: 2000,
            trigger: None,
            metadata: None,
        }))
    }

    fn subscribe_to(channels: &[Channel]) -> SubscribePayload {
        SubscribePayload {
            channels: channels.to_vec(),
        }
    }

    #[tokio::test]
    async fn welcome_frame_carries_the_client_id() {
        let hub = BroadcastHub::new();
        let (tx, mut rx) = mpsc::channel(8);
        let id = hub.register(tx).await;

        let welcome = rx.try_recv().unwrap();
        let value = serde_json::to_value(&welcome).unwrap();
        assert_eq!(value["type"], "avatar:status");
        assert_eq!(value["payload"]["connected"], true);
        assert_eq!(value["payload"]["client_id"], id.to_string());
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers_and_unsubscribed_only() {
        let hub = BroadcastHub::new();

        let (avatar_tx, mut avatar_rx) = mpsc::channel(8);
        let avatar_id = hub.register(avatar_tx).await;
        hub.subscribe(avatar_id, &subscribe_to(&[Channel::Avatar])).await;

        let (scm_tx, mut scm_rx) = mpsc::channel(8);
        let scm_id = hub.register(scm_tx).await;
        hub.subscribe(scm_id, &subscribe_to(&[Channel::Scm])).await;

        let (fresh_tx, mut fresh_rx) = mpsc::channel(8);
        let _fresh_id = hub.register(fresh_tx).await;

        // Drain welcome frames.
        avatar_rx.try_recv().unwrap();
        scm_rx.try_recv().unwrap();
        fresh_rx.try_recv().unwrap();

        let sent = hub.broadcast(Channel::Avatar, expression_message()).await;
        assert_eq!(sent, 2);

        assert!(avatar_rx.try_recv().is_ok());
        assert!(scm_rx.try_recv().is_err());
        // Zero subscriptions: the firehose still applies.
        assert!(fresh_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let hub = BroadcastHub::new();
        let (tx, mut rx) = mpsc::channel(8);
        let id = hub.register(tx).await;
        rx.try_recv().unwrap();

        hub.subscribe(id, &subscribe_to(&[Channel::Avatar, Channel::Chat])).await;
        hub.unsubscribe(id, &subscribe_to(&[Channel::Avatar])).await;

        // Still subscribed to chat, so avatar broadcasts skip it.
        let sent = hub.broadcast(Channel::Avatar, expression_message()).await;
        assert_eq!(sent, 0);
        assert!(rx.try_recv().is_err());

        let sent = hub.broadcast(Channel::Chat, expression_message()).await;
        assert_eq!(sent, 1);
    }

    #[tokio::test]
    async fn dead_client_does_not_abort_fan_out() {
        let hub = BroadcastHub::new();

        let (dead_tx, dead_rx) = mpsc::channel(8);
        let _dead_id = hub.register(dead_tx).await;
        drop(dead_rx);

        let (live_tx, mut live_rx) = mpsc::channel(8);
        let _live_id = hub.register(live_tx).await;
        live_rx.try_recv().unwrap();

        let sent = hub.broadcast(Channel::Avatar, expression_message()).await;
        assert_eq!(sent, 1);
        assert!(live_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn channel_stats_count_subscribers() {
        let hub = BroadcastHub::new();
        let (tx_a, _rx_a) = mpsc::channel(8);
        let a = hub.register(tx_a).await;
        let (tx_b, _rx_b) = mpsc::channel(8);
        let b = hub.register(tx_b).await;

        hub.subscribe(a, &subscribe_to(&[Channel::Avatar, Channel::Scm])).await;
        hub.subscribe(b, &subscribe_to(&[Channel::Avatar])).await;

        let stats = hub.channel_stats().await;
        assert_eq!(stats[&Channel::Avatar], 2);
        assert_eq!(stats[&Channel::Scm], 1);
        assert_eq!(stats[&Channel::Chat], 0);
        assert_eq!(hub.client_count().await, 2);

        hub.remove(a).await;
        assert_eq!(hub.client_count().await, 1);
        assert_eq!(hub.channel_stats().await[&Channel::Avatar], 1);
    }
}

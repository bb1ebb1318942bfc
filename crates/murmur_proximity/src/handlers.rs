//! Inbound event handling: position reports, sends, status and disconnects.
//!
//! Target resolution happens under the state lock; delivery through the
//! [`MessageRouter`] happens after it is released.

use crate::events::{InboundEvent, MessageLimits, OutboundEvent};
use crate::geo::{ClientId, Position};
use crate::router::MessageRouter;
use crate::state::ProximityState;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of handling one inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    Joined,
    /// Message routed to this many targets, sender included
    Delivered { targets: usize },
    /// Message refused; the sender was told why
    Rejected { reason: String },
    Status { nearby: usize },
    Disconnected { removed: usize },
}

/// Binds proximity state to an outbound router.
pub struct EventHandler<R: MessageRouter> {
    state: Arc<ProximityState>,
    router: Arc<R>,
    limits: MessageLimits,
}

impl<R: MessageRouter> Clone for EventHandler<R> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            router: self.router.clone(),
            limits: self.limits,
        }
    }
}

impl<R: MessageRouter> EventHandler<R> {
    pub fn new(state: Arc<ProximityState>, router: Arc<R>, limits: MessageLimits) -> Self {
        Self { state, router, limits }
    }

    pub fn state(&self) -> &Arc<ProximityState> {
        &self.state
    }

    pub fn router(&self) -> &Arc<R> {
        &self.router
    }

    /// Handles `event` on behalf of `client` (already resolved from the
    /// event's own id or the connection id).
    pub async fn dispatch(&self, client: &ClientId, event: InboundEvent) -> Handled {
        match event {
            InboundEvent::Join { position, .. } => self.join(client, position).await,
            InboundEvent::Send { position, msg, .. } => self.send(client, position, msg).await,
            InboundEvent::Status { position, .. } => self.status(client, position).await,
            InboundEvent::Disconnect => self.disconnect(std::slice::from_ref(client)).await,
        }
    }

    pub async fn join(&self, client: &ClientId, position: Position) -> Handled {
        let outcome = self.state.report_position(client, position).await;
        info!("📍 Client {} joined at {} ({:?})", client, position, outcome);
        Handled::Joined
    }

    /// Positions the sender, then routes `msg` to everyone in range.
    ///
    /// Invalid messages still update the position but are answered with a
    /// `bad` notification to the sender alone.
    pub async fn send(&self, client: &ClientId, position: Position, msg: String) -> Handled {
        if let Err(reason) = self.limits.validate(&msg) {
            self.state.report_position(client, position).await;
            let reason = reason.to_string();
            warn!("🚫 Rejected message from {}: {}", client, reason);
            self.router
                .route(std::slice::from_ref(client), &OutboundEvent::Bad(reason.clone()))
                .await;
            return Handled::Rejected { reason };
        }

        let (_, targets) = self.state.report_and_find(client, position).await;
        debug!("💬 Routing message from {} to {} target(s)", client, targets.len());

        let event = OutboundEvent::Receive {
            from: client.clone(),
            msg,
        };
        self.router.route(&targets, &event).await;
        Handled::Delivered {
            targets: targets.len(),
        }
    }

    /// Positions the client and replies with how many others are in range.
    pub async fn status(&self, client: &ClientId, position: Position) -> Handled {
        let (_, targets) = self.state.report_and_find(client, position).await;
        let nearby = targets.iter().filter(|id| *id != client).count();
        self.router
            .route(std::slice::from_ref(client), &OutboundEvent::Nearby { count: nearby })
            .await;
        Handled::Status { nearby }
    }

    /// Removes every id in `clients`; ids already gone are skipped.
    pub async fn disconnect(&self, clients: &[ClientId]) -> Handled {
        let mut removed = 0;
        for client in clients {
            if self.state.disconnect(client).await {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("👋 Removed {} client(s) on disconnect", removed);
        }
        Handled::Disconnected { removed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingRouter {
        sent: Mutex<Vec<(ClientId, OutboundEvent)>>,
    }

    impl RecordingRouter {
        async fn sent_to(&self, id: &str) -> Vec<OutboundEvent> {
            self.sent
                .lock()
                .await
                .iter()
                .filter(|(target, _)| target.as_str() == id)
                .map(|(_, event)| event.clone())
                .collect()
        }
    }

    #[async_trait]
    impl MessageRouter for RecordingRouter {
        async fn route(&self, targets: &[ClientId], event: &OutboundEvent) {
            let mut sent = self.sent.lock().await;
            for target in targets {
                sent.push((target.clone(), event.clone()));
            }
        }
    }

    fn handler() -> EventHandler<RecordingRouter> {
        EventHandler::new(
            Arc::new(ProximityState::default()),
            Arc::new(RecordingRouter::default()),
            MessageLimits::default(),
        )
    }

    #[tokio::test]
    async fn test_send_reaches_nearby_and_echoes_sender() {
        let h = handler();
        let a = ClientId::from("a");
        h.join(&a, Position::new(0.0, 0.0)).await;
        h.join(&ClientId::from("b"), Position::new(0.0, 0.001)).await;
        h.join(&ClientId::from("c"), Position::new(0.0, 90.0)).await;

        let handled = h.send(&a, Position::new(0.0, 0.0), "hello".into()).await;
        assert_eq!(handled, Handled::Delivered { targets: 2 });

        let expected = OutboundEvent::Receive { from: a.clone(), msg: "hello".into() };
        assert_eq!(h.router().sent_to("a").await, vec![expected.clone()]);
        assert_eq!(h.router().sent_to("b").await, vec![expected]);
        assert!(h.router().sent_to("c").await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_messages_only_notify_sender() {
        let h = handler();
        let a = ClientId::from("a");
        h.join(&a, Position::new(0.0, 0.0)).await;
        h.join(&ClientId::from("b"), Position::new(0.0, 0.001)).await;

        let empty = h.send(&a, Position::new(0.0, 0.0), String::new()).await;
        assert!(matches!(empty, Handled::Rejected { .. }));
        let long = h.send(&a, Position::new(0.0, 0.0), "x".repeat(257)).await;
        assert!(matches!(long, Handled::Rejected { .. }));

        assert_eq!(
            h.router().sent_to("a").await,
            vec![
                OutboundEvent::Bad("Cannot Send Empty Message".into()),
                OutboundEvent::Bad("Cannot Send Message Longer Than 256 Chars".into()),
            ]
        );
        assert!(h.router().sent_to("b").await.is_empty());
    }

    #[tokio::test]
    async fn test_send_from_unseen_id_provisions_it() {
        let h = handler();
        let ghost = ClientId::from("ghost");
        let handled = h.send(&ghost, Position::new(5.0, 5.0), "boo".into()).await;
        assert_eq!(handled, Handled::Delivered { targets: 1 });
        assert_eq!(h.state().indexed_count().await, 1);
    }

    #[tokio::test]
    async fn test_status_counts_others() {
        let h = handler();
        let a = ClientId::from("a");
        assert_eq!(h.status(&a, Position::new(0.0, 0.0)).await, Handled::Status { nearby: 0 });

        h.join(&ClientId::from("b"), Position::new(0.0, 0.001)).await;
        assert_eq!(h.status(&a, Position::new(0.0, 0.0)).await, Handled::Status { nearby: 1 });
        assert_eq!(
            h.router().sent_to("a").await,
            vec![OutboundEvent::Nearby { count: 0 }, OutboundEvent::Nearby { count: 1 }]
        );
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let h = handler();
        let a = ClientId::from("a");
        h.join(&a, Position::new(0.0, 0.0)).await;
        assert_eq!(h.dispatch(&a, InboundEvent::Disconnect).await, Handled::Disconnected { removed: 1 });
        assert_eq!(h.dispatch(&a, InboundEvent::Disconnect).await, Handled::Disconnected { removed: 0 });
        assert_eq!(h.state().client_count().await, 0);
    }
}

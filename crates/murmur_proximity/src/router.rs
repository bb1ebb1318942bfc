//! Outbound delivery seam implemented by the transport.

use crate::events::OutboundEvent;
use crate::geo::ClientId;
use async_trait::async_trait;

/// Delivers an event to each target's live connection.
///
/// Best-effort: targets that are no longer connected are skipped silently and
/// nothing is retried or reported back to the sender.
#[async_trait]
pub trait MessageRouter: Send + Sync {
    async fn route(&self, targets: &[ClientId], event: &OutboundEvent);
}

/// Shared proximity state: registry plus index behind one lock
use crate::geo::{ClientId, Position};
use crate::matcher::{ProximityMatcher, RANGE_M};
use crate::policy::{UpdateOutcome, UpdatePolicy, UPDATE_RANGE_M};
use crate::registry::{ClientNode, ClientRegistry};
use crate::spatial::{create_index, IndexKind, SpatialIndex};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Tunables for the proximity subsystem
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProximitySettings {
    /// Delivery radius in meters
    pub range_m: f64,
    /// Minimum movement in meters before re-indexing
    pub update_range_m: f64,
    /// Backing strategy for the spatial index
    pub index: IndexKind,
}

impl Default for ProximitySettings {
    fn default() -> Self {
        Self {
            range_m: RANGE_M,
            update_range_m: UPDATE_RANGE_M,
            index: IndexKind::default(),
        }
    }
}

struct Inner {
    registry: ClientRegistry,
    index: Option<Box<dyn SpatialIndex>>,
}

impl Inner {
    fn apply(&mut self, policy: &UpdatePolicy, id: &ClientId, position: Position) -> UpdateOutcome {
        policy.apply(&mut self.registry, self.index.as_deref_mut(), id, position)
    }

    fn targets(&self, matcher: &ProximityMatcher, id: &ClientId) -> Vec<ClientId> {
        matcher.find_targets(&self.registry, self.index.as_deref(), id)
    }
}

/// Application state owned by the event-handling layer.
///
/// Every read and write of the registry and index goes through the single
/// mutex, so a query never observes a half-applied remove-then-insert.
pub struct ProximityState {
    inner: Mutex<Inner>,
    policy: UpdatePolicy,
    matcher: ProximityMatcher,
    kind: IndexKind,
}

impl Default for ProximityState {
    fn default() -> Self {
        Self::new(ProximitySettings::default())
    }
}

impl ProximityState {
    pub fn new(settings: ProximitySettings) -> Self {
        Self {
            inner: Mutex::new(Inner {
                registry: ClientRegistry::new(),
                index: create_index(settings.index),
            }),
            policy: UpdatePolicy::new(settings.update_range_m),
            matcher: ProximityMatcher::new(settings.range_m),
            kind: settings.index,
        }
    }

    pub fn index_kind(&self) -> IndexKind {
        self.kind
    }

    pub fn range(&self) -> f64 {
        self.matcher.range
    }

    /// Registers or repositions `id` through the update policy.
    pub async fn report_position(&self, id: &ClientId, position: Position) -> UpdateOutcome {
        let mut inner = self.inner.lock().await;
        let outcome = inner.apply(&self.policy, id, position);
        trace!("Position report for {} at {}: {:?}", id, position, outcome);
        outcome
    }

    /// Repositions `id` and resolves its targets under one lock acquisition.
    pub async fn report_and_find(&self, id: &ClientId, position: Position) -> (UpdateOutcome, Vec<ClientId>) {
        let mut inner = self.inner.lock().await;
        let outcome = inner.apply(&self.policy, id, position);
        let targets = inner.targets(&self.matcher, id);
        (outcome, targets)
    }

    /// Clients within range of `id`, `id` included. Empty if unregistered.
    pub async fn find_targets(&self, id: &ClientId) -> Vec<ClientId> {
        self.inner.lock().await.targets(&self.matcher, id)
    }

    /// Nearby clients excluding `id` itself
    pub async fn nearby_count(&self, id: &ClientId) -> usize {
        self.find_targets(id).await.len().saturating_sub(1)
    }

    /// Removes `id` from registry and index together; `false` if it was absent.
    pub async fn disconnect(&self, id: &ClientId) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(node) = inner.registry.remove(id) else {
            return false;
        };
        if let Some(index) = inner.index.as_deref_mut() {
            index.remove(&node);
        }
        debug!("Removed client {} at {}", id, node.position);
        true
    }

    pub async fn client_count(&self) -> usize {
        self.inner.lock().await.registry.len()
    }

    /// Entries in the spatial index, 0 in linear mode
    pub async fn indexed_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.index.as_ref().map_or(0, |index| index.len())
    }

    pub async fn client(&self, id: &ClientId) -> Option<ClientNode> {
        self.inner.lock().await.registry.get(id).cloned()
    }

    pub async fn position_of(&self, id: &ClientId) -> Option<Position> {
        self.client(id).await.map(|node| node.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_disconnect_removes_index_entry() {
        let state = ProximityState::default();
        let a = ClientId::from("a");
        let b = ClientId::from("b");
        state.report_position(&a, Position::new(0.0, 0.0)).await;
        state.report_position(&b, Position::new(0.0, 0.001)).await;
        assert_eq!(state.indexed_count().await, 2);

        assert!(state.disconnect(&b).await);
        assert!(!state.disconnect(&b).await);
        assert_eq!(state.indexed_count().await, 1);
        assert_eq!(state.find_targets(&a).await, vec![a.clone()]);
    }

    #[tokio::test]
    async fn test_isolated_client_has_zero_nearby() {
        let state = ProximityState::default();
        let a = ClientId::from("a");
        state.report_position(&a, Position::new(12.0, 34.0)).await;
        assert_eq!(state.nearby_count(&a).await, 0);
        assert_eq!(state.nearby_count(&ClientId::from("ghost")).await, 0);
    }

    #[tokio::test]
    async fn test_linear_mode_has_no_index() {
        let state = ProximityState::new(ProximitySettings {
            index: IndexKind::Linear,
            ..Default::default()
        });
        let a = ClientId::from("a");
        state.report_position(&a, Position::new(0.0, 0.0)).await;
        state.report_position(&ClientId::from("b"), Position::new(0.0, 0.001)).await;
        assert_eq!(state.indexed_count().await, 0);
        assert_eq!(state.nearby_count(&a).await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_moves_never_hide_a_client() {
        let state = Arc::new(ProximityState::default());
        let watcher = ClientId::from("watcher");
        state.report_position(&watcher, Position::new(0.0, 0.0)).await;

        let mover_state = state.clone();
        let mover = tokio::spawn(async move {
            let id = ClientId::from("mover");
            for step in 0..500 {
                // Alternate between two points ~11 m apart, both well within range.
                let lon = if step % 2 == 0 { 0.0001 } else { 0.0002 };
                mover_state.report_position(&id, Position::new(0.0, lon)).await;
            }
        });

        let mut seen_mover = false;
        while !mover.is_finished() {
            let targets = state.find_targets(&watcher).await;
            if targets.len() == 2 {
                seen_mover = true;
            } else {
                // Absent only before the mover's first report.
                assert!(!seen_mover, "mover vanished mid-reposition");
            }
            tokio::task::yield_now().await;
        }
        mover.await.unwrap();
        assert_eq!(state.find_targets(&watcher).await.len(), 2);
    }
}

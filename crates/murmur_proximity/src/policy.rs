//! Re-indexing policy for reported positions.

use crate::geo::{distance, ClientId, Position};
use crate::registry::ClientRegistry;
use crate::spatial::SpatialIndex;

/// Default minimum movement, in meters, before a client is re-indexed
pub const UPDATE_RANGE_M: f64 = 3.0;

/// What a position report did to the registry and index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOutcome {
    /// Unseen id: created and indexed unconditionally
    Registered,
    /// Moved farther than the threshold: position replaced and re-indexed
    Moved { meters: f64 },
    /// Within the threshold: nothing changed
    Unchanged { meters: f64 },
}

/// Decides whether a reported position is significant.
///
/// Jitter at or below `update_range` is ignored entirely, so the stored
/// position and its index entry stay put.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdatePolicy {
    pub update_range: f64,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self {
            update_range: UPDATE_RANGE_M,
        }
    }
}

impl UpdatePolicy {
    pub fn new(update_range: f64) -> Self {
        Self { update_range }
    }

    pub fn is_significant(&self, old: Position, new: Position) -> bool {
        distance(old, new) > self.update_range
    }

    /// Applies a report for `id`, keeping registry and index consistent.
    ///
    /// The index is optional so linear deployments share the same path. The
    /// caller must hold the state lock across this call so the remove and
    /// insert are never observed apart.
    pub fn apply(
        &self,
        registry: &mut ClientRegistry,
        index: Option<&mut (dyn SpatialIndex + 'static)>,
        id: &ClientId,
        reported: Position,
    ) -> UpdateOutcome {
        let (node, created) = registry.get_or_create(id, reported);

        if created {
            if let Some(index) = index {
                node.index_ref = Some(index.insert(node));
            }
            return UpdateOutcome::Registered;
        }

        let meters = distance(node.position, reported);
        if meters <= self.update_range {
            return UpdateOutcome::Unchanged { meters };
        }

        match index {
            Some(index) => {
                index.remove(node);
                node.position = reported;
                node.index_ref = Some(index.insert(node));
            }
            None => node.position = reported,
        }
        UpdateOutcome::Moved { meters }
    }
}

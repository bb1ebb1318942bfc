//! Resolves a client to the set of clients near it.

use crate::geo::{distance, ClientId};
use crate::registry::ClientRegistry;
use crate::spatial::SpatialIndex;
use std::collections::HashMap;

/// Default delivery radius in meters
pub const RANGE_M: f64 = 10_000.0;

/// Proximity lookup over the index, or a registry scan when there is none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityMatcher {
    pub range: f64,
}

impl Default for ProximityMatcher {
    fn default() -> Self {
        Self { range: RANGE_M }
    }
}

impl ProximityMatcher {
    pub fn new(range: f64) -> Self {
        Self { range }
    }

    /// Every client within `range` of `id`, `id` included.
    ///
    /// Results pass through a map keyed by id so a stale duplicate entry can
    /// never produce a double delivery. Unregistered ids resolve to nothing.
    pub fn find_targets(
        &self,
        registry: &ClientRegistry,
        index: Option<&dyn SpatialIndex>,
        id: &ClientId,
    ) -> Vec<ClientId> {
        let Some(node) = registry.get(id) else {
            return Vec::new();
        };

        let candidates = match index {
            Some(index) => index.find(node, self.range),
            None => self.scan(registry, id),
        };

        let mut targets: HashMap<ClientId, ()> = HashMap::with_capacity(candidates.len());
        for candidate in candidates {
            targets.insert(candidate, ());
        }
        targets.into_keys().collect()
    }

    /// O(n) fallback straight over the registry
    pub fn scan(&self, registry: &ClientRegistry, id: &ClientId) -> Vec<ClientId> {
        let Some(origin) = registry.get(id) else {
            return Vec::new();
        };
        registry
            .iter()
            .filter(|other| distance(origin.position, other.position) <= self.range)
            .map(|other| other.id.clone())
            .collect()
    }
}

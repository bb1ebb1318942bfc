//! Authoritative client id to position map.

use crate::geo::{ClientId, Position};
use crate::spatial::IndexHandle;
use std::collections::HashMap;

/// A tracked client: identity plus last accepted position.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientNode {
    pub id: ClientId,
    pub position: Position,
    /// Ticket from the spatial index, `None` while the node is not indexed
    pub index_ref: Option<IndexHandle>,
}

impl ClientNode {
    pub fn new(id: ClientId, position: Position) -> Self {
        Self {
            id,
            position,
            index_ref: None,
        }
    }
}

/// Owns every [`ClientNode`]; exactly one entry per id.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, ClientNode>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the node for `id`, creating it at `initial_position` if unseen.
    ///
    /// The flag is `true` when the node was created by this call.
    pub fn get_or_create(&mut self, id: &ClientId, initial_position: Position) -> (&mut ClientNode, bool) {
        let mut created = false;
        let node = self.clients.entry(id.clone()).or_insert_with(|| {
            created = true;
            ClientNode::new(id.clone(), initial_position)
        });
        (node, created)
    }

    pub fn get(&self, id: &ClientId) -> Option<&ClientNode> {
        self.clients.get(id)
    }

    pub fn get_mut(&mut self, id: &ClientId) -> Option<&mut ClientNode> {
        self.clients.get_mut(id)
    }

    /// Removes and returns the node. Absent ids are a no-op.
    ///
    /// The caller owns removing the matching index entry; see
    /// [`crate::ProximityState::disconnect`].
    pub fn remove(&mut self, id: &ClientId) -> Option<ClientNode> {
        self.clients.remove(id)
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.clients.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientNode> {
        self.clients.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_keeps_existing_position() {
        let mut registry = ClientRegistry::new();
        let id = ClientId::from("alice");

        let (node, created) = registry.get_or_create(&id, Position::new(1.0, 2.0));
        assert!(created);
        assert_eq!(node.position, Position::new(1.0, 2.0));

        let (node, created) = registry.get_or_create(&id, Position::new(50.0, 60.0));
        assert!(!created);
        assert_eq!(node.position, Position::new(1.0, 2.0));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = ClientRegistry::new();
        let id = ClientId::from("bob");
        registry.get_or_create(&id, Position::new(0.0, 0.0));

        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert!(registry.is_empty());
    }
}

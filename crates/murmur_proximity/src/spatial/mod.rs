//! Dynamic spatial indexes over client positions
//!
//! All strategies implement [`SpatialIndex`] and return exactly the ids whose
//! great-circle distance to the query point is within the radius. They differ
//! only in how they prune:
//!
//! * [`BallTree`] works directly on the great-circle metric.
//! * [`Octree`] projects onto 3D Cartesian space and queries with the chord
//!   length, which is monotonic in surface distance.
//! * [`QuadTree`] partitions the (lon, lat) plane. Degree cells shrink toward
//!   the poles, so the query box is widened there and split across the date
//!   line; candidates are always confirmed with the exact metric.

mod balltree;
mod octree;
mod quadtree;

pub use balltree::BallTree;
pub use octree::Octree;
pub use quadtree::QuadTree;

use crate::geo::ClientId;
use crate::registry::ClientNode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ticket returned by [`SpatialIndex::insert`].
///
/// Unique per insertion, so an unchanged handle means the entry was not
/// re-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexHandle(pub u64);

/// Backing strategy chosen at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    #[default]
    BallTree,
    Octree,
    Quadtree,
    /// No index; proximity falls back to a scan of the registry
    Linear,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexKind::BallTree => "ball_tree",
            IndexKind::Octree => "octree",
            IndexKind::Quadtree => "quadtree",
            IndexKind::Linear => "linear",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for IndexKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ball_tree" | "balltree" => Ok(IndexKind::BallTree),
            "octree" => Ok(IndexKind::Octree),
            "quadtree" => Ok(IndexKind::Quadtree),
            "linear" | "none" => Ok(IndexKind::Linear),
            other => Err(format!("unknown index kind '{other}'")),
        }
    }
}

/// Dynamic point set keyed by client id.
///
/// There is no move operation: repositioning is `remove` followed by
/// `insert`, and callers must keep both under one lock.
pub trait SpatialIndex: Send + Sync {
    /// Indexes `node` at its current position.
    ///
    /// If the id is already indexed nothing changes and the existing handle
    /// is returned.
    fn insert(&mut self, node: &ClientNode) -> IndexHandle;

    /// Removes the entry for `node.id`. Absent ids are a no-op.
    ///
    /// The entry is located by the point stored at insertion, so this works
    /// even if `node.position` has already been changed.
    fn remove(&mut self, node: &ClientNode);

    /// Ids within `radius` meters of `node.position`, `node` itself included
    /// when indexed.
    fn find(&self, node: &ClientNode, radius: f64) -> Vec<ClientId>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind(&self) -> IndexKind;
}

/// Builds the index for `kind`; `Linear` has none.
pub fn create_index(kind: IndexKind) -> Option<Box<dyn SpatialIndex>> {
    match kind {
        IndexKind::BallTree => Some(Box::new(BallTree::new())),
        IndexKind::Octree => Some(Box::new(Octree::new())),
        IndexKind::Quadtree => Some(Box::new(QuadTree::new())),
        IndexKind::Linear => None,
    }
}

/// Monotonic handle source shared by all strategies.
#[derive(Debug, Default)]
pub(crate) struct HandleSequence(u64);

impl HandleSequence {
    pub(crate) fn next(&mut self) -> IndexHandle {
        self.0 += 1;
        IndexHandle(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{distance, Position};
    use std::collections::BTreeSet;

    /// Small deterministic generator so the tests need no extra crates
    struct Lcg(u64);

    impl Lcg {
        fn next_f64(&mut self) -> f64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 11) as f64 / (1u64 << 53) as f64
        }

        fn range(&mut self, lo: f64, hi: f64) -> f64 {
            lo + (hi - lo) * self.next_f64()
        }
    }

    fn indexed_kinds() -> Vec<IndexKind> {
        vec![IndexKind::BallTree, IndexKind::Octree, IndexKind::Quadtree]
    }

    fn brute_force(nodes: &[ClientNode], center: &ClientNode, radius: f64) -> BTreeSet<ClientId> {
        nodes
            .iter()
            .filter(|n| distance(n.position, center.position) <= radius)
            .map(|n| n.id.clone())
            .collect()
    }

    /// Clusters around a few anchors, including one at the pole and one on
    /// the date line, so every strategy hits its awkward cases.
    fn clustered_nodes(seed: u64, count: usize) -> Vec<ClientNode> {
        let anchors = [(0.0, 0.0), (89.95, 10.0), (-12.0, 179.98), (48.85, 2.35), (-89.99, -45.0)];
        let mut rng = Lcg(seed);
        (0..count)
            .map(|i| {
                let (alat, alon) = anchors[i % anchors.len()];
                let lat = (alat + rng.range(-0.2, 0.2)).clamp(-90.0, 90.0);
                let mut lon = alon + rng.range(-0.2, 0.2);
                if lon > 180.0 {
                    lon -= 360.0;
                } else if lon < -180.0 {
                    lon += 360.0;
                }
                ClientNode::new(ClientId::new(format!("c{i}")), Position::new(lat, lon))
            })
            .collect()
    }

    #[test]
    fn test_strategies_agree_with_brute_force() {
        for kind in indexed_kinds() {
            let mut index = create_index(kind).unwrap();
            let nodes = clustered_nodes(7, 400);
            for node in &nodes {
                index.insert(node);
            }
            assert_eq!(index.len(), nodes.len());

            for radius in [0.0, 500.0, 10_000.0, 40_000.0] {
                for center in nodes.iter().step_by(17) {
                    let found: BTreeSet<ClientId> = index.find(center, radius).into_iter().collect();
                    assert_eq!(
                        found,
                        brute_force(&nodes, center, radius),
                        "{kind} disagrees at {} r={radius}",
                        center.position
                    );
                }
            }
        }
    }

    #[test]
    fn test_find_includes_self() {
        for kind in indexed_kinds() {
            let mut index = create_index(kind).unwrap();
            let nodes = clustered_nodes(3, 50);
            for node in &nodes {
                index.insert(node);
            }
            for node in &nodes {
                assert!(index.find(node, 0.0).contains(&node.id), "{kind} lost {}", node.id);
            }
        }
    }

    #[test]
    fn test_removed_node_is_never_found() {
        for kind in indexed_kinds() {
            let mut index = create_index(kind).unwrap();
            let nodes = clustered_nodes(11, 200);
            for node in &nodes {
                index.insert(node);
            }
            for node in nodes.iter().step_by(2) {
                index.remove(node);
                index.remove(node);
            }
            assert_eq!(index.len(), 100);

            for center in &nodes {
                let found = index.find(center, 50_000.0);
                for id in &found {
                    let n: usize = id.as_str()[1..].parse().unwrap();
                    assert!(n % 2 == 1, "{kind} returned removed node {id}");
                }
            }
        }
    }

    #[test]
    fn test_reinsert_after_move() {
        for kind in indexed_kinds() {
            let mut index = create_index(kind).unwrap();
            let mut node = ClientNode::new(ClientId::from("mover"), Position::new(0.0, 0.0));
            let other = ClientNode::new(ClientId::from("fixed"), Position::new(0.0, 0.001));
            index.insert(&node);
            index.insert(&other);

            // Position changes before the remove; the index must still find the old entry.
            node.position = Position::new(45.0, 45.0);
            index.remove(&node);
            index.insert(&node);

            assert_eq!(index.len(), 2);
            assert_eq!(index.find(&other, 10_000.0), vec![other.id.clone()]);
            assert_eq!(index.find(&node, 10_000.0), vec![node.id.clone()]);
        }
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        for kind in indexed_kinds() {
            let mut index = create_index(kind).unwrap();
            let node = ClientNode::new(ClientId::from("dup"), Position::new(10.0, 10.0));
            let first = index.insert(&node);
            let second = index.insert(&node);
            assert_eq!(first, second);
            assert_eq!(index.len(), 1);
            assert_eq!(index.find(&node, 1.0).len(), 1);
        }
    }

    #[test]
    fn test_many_coincident_points() {
        for kind in indexed_kinds() {
            let mut index = create_index(kind).unwrap();
            let nodes: Vec<ClientNode> = (0..64)
                .map(|i| ClientNode::new(ClientId::new(format!("same{i}")), Position::new(33.3, -117.1)))
                .collect();
            for node in &nodes {
                index.insert(node);
            }
            assert_eq!(index.find(&nodes[0], 0.0).len(), 64, "{kind}");
            for node in &nodes {
                index.remove(node);
            }
            assert!(index.is_empty());
        }
    }

    #[test]
    fn test_index_kind_parsing() {
        assert_eq!("ball_tree".parse::<IndexKind>(), Ok(IndexKind::BallTree));
        assert_eq!("octree".parse::<IndexKind>(), Ok(IndexKind::Octree));
        assert_eq!("quadtree".parse::<IndexKind>(), Ok(IndexKind::Quadtree));
        assert_eq!("linear".parse::<IndexKind>(), Ok(IndexKind::Linear));
        assert!("kd_tree".parse::<IndexKind>().is_err());
        assert!(create_index(IndexKind::Linear).is_none());
    }
}

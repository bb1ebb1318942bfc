/// Dynamic ball-tree over the great-circle metric
///
/// Each ball stores a center and a radius that bounds the distance from the
/// center to every point beneath it. Haversine distance is a true metric, so
/// the triangle inequality gives a safe prune: a ball whose center is more
/// than `radius + query_radius` away from the query cannot contain a match.
use super::{HandleSequence, IndexHandle, IndexKind, SpatialIndex};
use crate::geo::{distance, ClientId, Position};
use crate::registry::ClientNode;
use std::collections::HashMap;

/// Maximum entries per leaf before it splits
const LEAF_CAPACITY: usize = 8;
/// Tolerance for haversine rounding near antipodal distances
const PRUNE_SLACK_M: f64 = 1.0;

#[derive(Debug, Clone)]
struct Entry {
    id: ClientId,
    position: Position,
    handle: IndexHandle,
}

#[derive(Debug)]
enum BallKind {
    Leaf(Vec<Entry>),
    Branch([usize; 2]),
}

#[derive(Debug)]
struct Ball {
    center: Position,
    /// Upper bound on the distance from `center` to any point in this subtree
    radius: f64,
    parent: Option<usize>,
    kind: BallKind,
}

impl Ball {
    fn vacant() -> Self {
        Self {
            center: Position::new(0.0, 0.0),
            radius: 0.0,
            parent: None,
            kind: BallKind::Leaf(Vec::new()),
        }
    }
}

/// Ball-tree index; the default strategy.
///
/// Balls live in an arena addressed by slot; `leaf_of` maps each id to the
/// leaf holding it so removal does not search the tree.
#[derive(Debug, Default)]
pub struct BallTree {
    balls: Vec<Ball>,
    free: Vec<usize>,
    root: Option<usize>,
    leaf_of: HashMap<ClientId, usize>,
    handles: HandleSequence,
}

impl BallTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, ball: Ball) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.balls[slot] = ball;
                slot
            }
            None => {
                self.balls.push(ball);
                self.balls.len() - 1
            }
        }
    }

    fn release(&mut self, slot: usize) {
        self.balls[slot] = Ball::vacant();
        self.free.push(slot);
    }

    /// Allocates a leaf centered on `center` and points `leaf_of` at it.
    fn push_leaf(&mut self, center: Position, entries: Vec<Entry>, parent: Option<usize>) -> usize {
        let radius = entries
            .iter()
            .map(|e| distance(center, e.position))
            .fold(0.0, f64::max);
        let slot = self.alloc(Ball {
            center,
            radius,
            parent,
            kind: BallKind::Leaf(Vec::new()),
        });
        for entry in &entries {
            self.leaf_of.insert(entry.id.clone(), slot);
        }
        self.balls[slot].kind = BallKind::Leaf(entries);
        slot
    }

    fn existing_handle(&self, id: &ClientId) -> Option<IndexHandle> {
        let leaf = *self.leaf_of.get(id)?;
        match &self.balls[leaf].kind {
            BallKind::Leaf(entries) => entries.iter().find(|e| &e.id == id).map(|e| e.handle),
            BallKind::Branch(_) => None,
        }
    }

    /// Splits an overflowing leaf around two far-apart pivots.
    ///
    /// The leaf becomes a branch in place, keeping its center and radius, so
    /// no ancestor needs to change.
    fn split(&mut self, slot: usize) {
        let entries = match &mut self.balls[slot].kind {
            BallKind::Leaf(entries) => std::mem::take(entries),
            BallKind::Branch(_) => return,
        };

        let pivot_a = farthest_from(&entries, entries[0].position);
        let pivot_b = farthest_from(&entries, pivot_a);
        if distance(pivot_a, pivot_b) == 0.0 {
            // All coincident: nothing to separate, let the leaf grow.
            self.balls[slot].kind = BallKind::Leaf(entries);
            return;
        }

        let (near_a, near_b): (Vec<Entry>, Vec<Entry>) = entries
            .into_iter()
            .partition(|e| distance(e.position, pivot_a) <= distance(e.position, pivot_b));

        let left = self.push_leaf(pivot_a, near_a, Some(slot));
        let right = self.push_leaf(pivot_b, near_b, Some(slot));
        self.balls[slot].kind = BallKind::Branch([left, right]);
    }

    /// Folds an emptied leaf away by promoting its sibling into the parent slot.
    fn collapse(&mut self, leaf: usize) {
        let Some(parent) = self.balls[leaf].parent else {
            self.release(leaf);
            self.root = None;
            return;
        };

        let sibling = match self.balls[parent].kind {
            BallKind::Branch([a, b]) => {
                if a == leaf {
                    b
                } else {
                    a
                }
            }
            BallKind::Leaf(_) => return,
        };

        let grandparent = self.balls[parent].parent;
        let promoted = std::mem::replace(&mut self.balls[sibling], Ball::vacant());
        self.balls[parent] = Ball {
            parent: grandparent,
            ..promoted
        };

        match &self.balls[parent].kind {
            BallKind::Leaf(entries) => {
                for entry in entries {
                    self.leaf_of.insert(entry.id.clone(), parent);
                }
            }
            BallKind::Branch(children) => {
                let children = *children;
                for child in children {
                    self.balls[child].parent = Some(parent);
                }
            }
        }

        self.release(leaf);
        self.release(sibling);
    }

    /// Depth of the deepest leaf, 0 for an empty tree
    pub fn depth(&self) -> usize {
        let Some(root) = self.root else { return 0 };
        let mut deepest = 0;
        let mut stack = vec![(root, 1)];
        while let Some((slot, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let BallKind::Branch(children) = self.balls[slot].kind {
                stack.extend(children.iter().map(|&c| (c, depth + 1)));
            }
        }
        deepest
    }
}

fn farthest_from(entries: &[Entry], origin: Position) -> Position {
    entries
        .iter()
        .map(|e| (distance(origin, e.position), e.position))
        .fold((-1.0, origin), |best, candidate| if candidate.0 > best.0 { candidate } else { best })
        .1
}

impl SpatialIndex for BallTree {
    fn insert(&mut self, node: &ClientNode) -> IndexHandle {
        if let Some(handle) = self.existing_handle(&node.id) {
            return handle;
        }

        let handle = self.handles.next();
        let entry = Entry {
            id: node.id.clone(),
            position: node.position,
            handle,
        };

        let Some(root) = self.root else {
            let slot = self.push_leaf(node.position, vec![entry], None);
            self.root = Some(slot);
            return handle;
        };

        // Widen every ball on the way down so it still bounds the new point.
        let mut current = root;
        loop {
            let ball = &mut self.balls[current];
            ball.radius = ball.radius.max(distance(ball.center, node.position));
            let children = match ball.kind {
                BallKind::Branch(children) => children,
                BallKind::Leaf(_) => break,
            };
            let [a, b] = children;
            current = if distance(self.balls[a].center, node.position)
                <= distance(self.balls[b].center, node.position)
            {
                a
            } else {
                b
            };
        }

        let overflow = match &mut self.balls[current].kind {
            BallKind::Leaf(entries) => {
                entries.push(entry);
                entries.len() > LEAF_CAPACITY
            }
            BallKind::Branch(_) => false,
        };
        self.leaf_of.insert(node.id.clone(), current);
        if overflow {
            self.split(current);
        }
        handle
    }

    fn remove(&mut self, node: &ClientNode) {
        let Some(leaf) = self.leaf_of.remove(&node.id) else {
            return;
        };
        let emptied = match &mut self.balls[leaf].kind {
            BallKind::Leaf(entries) => {
                entries.retain(|e| e.id != node.id);
                entries.is_empty()
            }
            BallKind::Branch(_) => false,
        };
        if emptied {
            self.collapse(leaf);
        }
    }

    fn find(&self, node: &ClientNode, radius: f64) -> Vec<ClientId> {
        let mut found = Vec::new();
        let Some(root) = self.root else {
            return found;
        };

        let query = node.position;
        let mut stack = vec![root];
        while let Some(slot) = stack.pop() {
            let ball = &self.balls[slot];
            if distance(ball.center, query) - ball.radius > radius + PRUNE_SLACK_M {
                continue;
            }
            match &ball.kind {
                BallKind::Leaf(entries) => found.extend(
                    entries
                        .iter()
                        .filter(|e| distance(e.position, query) <= radius)
                        .map(|e| e.id.clone()),
                ),
                BallKind::Branch(children) => stack.extend_from_slice(children),
            }
        }
        found
    }

    fn len(&self) -> usize {
        self.leaf_of.len()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::BallTree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(i: usize, lat: f64, lon: f64) -> ClientNode {
        ClientNode::new(ClientId::new(format!("n{i}")), Position::new(lat, lon))
    }

    /// Every entry is bounded by each ancestor ball and `leaf_of` agrees.
    fn assert_invariants(tree: &BallTree) {
        let Some(root) = tree.root else {
            assert!(tree.leaf_of.is_empty());
            return;
        };
        let mut seen = 0;
        let mut stack = vec![(root, Vec::<usize>::new())];
        while let Some((slot, ancestors)) = stack.pop() {
            match &tree.balls[slot].kind {
                BallKind::Leaf(entries) => {
                    for e in entries {
                        seen += 1;
                        assert_eq!(tree.leaf_of.get(&e.id), Some(&slot));
                        for &a in ancestors.iter().chain(std::iter::once(&slot)) {
                            let ball = &tree.balls[a];
                            assert!(distance(ball.center, e.position) <= ball.radius + 1e-6);
                        }
                    }
                }
                BallKind::Branch(children) => {
                    for &c in children {
                        assert_eq!(tree.balls[c].parent, Some(slot));
                        let mut path = ancestors.clone();
                        path.push(slot);
                        stack.push((c, path));
                    }
                }
            }
        }
        assert_eq!(seen, tree.len());
    }

    #[test]
    fn test_leaf_splits_past_capacity() {
        let mut tree = BallTree::new();
        for i in 0..=LEAF_CAPACITY {
            tree.insert(&node(i, i as f64 * 0.01, 0.0));
        }
        assert_eq!(tree.depth(), 2);
        assert_invariants(&tree);
    }

    #[test]
    fn test_invariants_hold_through_churn() {
        let mut tree = BallTree::new();
        let nodes: Vec<ClientNode> = (0..300)
            .map(|i| node(i, ((i * 37) % 180) as f64 - 89.5, ((i * 91) % 360) as f64 - 179.5))
            .collect();
        for n in &nodes {
            tree.insert(n);
        }
        assert_invariants(&tree);
        assert!(tree.depth() > 3);

        for n in nodes.iter().filter(|n| n.id.as_str().ends_with('3')) {
            tree.remove(n);
        }
        assert_invariants(&tree);

        for n in &nodes {
            tree.remove(n);
        }
        assert!(tree.is_empty());
        assert!(tree.root.is_none());
        assert_eq!(tree.free.len(), tree.balls.len());
    }

    #[test]
    fn test_collapse_promotes_sibling() {
        let mut tree = BallTree::new();
        // Two tight clusters far apart force a clean split.
        let west: Vec<ClientNode> = (0..5).map(|i| node(i, 0.0, -100.0 + i as f64 * 0.001)).collect();
        let east: Vec<ClientNode> = (5..10).map(|i| node(i, 0.0, 100.0 + i as f64 * 0.001)).collect();
        for n in west.iter().chain(east.iter()) {
            tree.insert(n);
        }
        assert_eq!(tree.depth(), 2);

        for n in &west {
            tree.remove(n);
        }
        assert_eq!(tree.depth(), 1);
        assert_invariants(&tree);
        assert_eq!(tree.find(&east[0], 1_000.0).len(), 5);
    }

    #[test]
    fn test_handles_are_unique_per_insert() {
        let mut tree = BallTree::new();
        let n = node(0, 1.0, 1.0);
        let first = tree.insert(&n);
        tree.remove(&n);
        let second = tree.insert(&n);
        assert_ne!(first, second);
    }
}

/// Octree over points projected onto the sphere in 3D Cartesian space
///
/// Surface distance maps monotonically onto chord length, so a sphere query of
/// radius `chord_length(r)` selects exactly the candidates within `r`; the
/// exact metric then confirms each one.
use super::{HandleSequence, IndexHandle, IndexKind, SpatialIndex};
use crate::geo::{chord_length, distance, ClientId, Position, EARTH_RADIUS_M};
use crate::registry::ClientNode;
use std::collections::HashMap;

/// Maximum depth for octree subdivision
const MAX_OCTREE_DEPTH: u8 = 16;
/// Maximum objects per node before subdivision
const MAX_OBJECTS_PER_NODE: usize = 8;
/// Minimum node edge in meters to prevent infinite subdivision
const MIN_NODE_SIZE: f64 = 1.0;
/// Half-width of the root cube relative to the sphere radius
const ROOT_HALF_WIDTH: f64 = EARTH_RADIUS_M * 1.1;
/// Slack on the Euclidean prune for projection rounding, in meters
const PRUNE_SLACK_M: f64 = 1e-3;

type Point = [f64; 3];

#[derive(Debug, Clone)]
struct Entry {
    id: ClientId,
    position: Position,
    point: Point,
    handle: IndexHandle,
}

/// A node in the octree
#[derive(Debug)]
struct OctreeNode {
    /// Bounding box for this node (min, max)
    bounds: (Point, Point),
    /// Objects in this node (only if leaf)
    objects: Vec<Entry>,
    /// Eight octants, `None` if leaf
    children: Option<Box<[OctreeNode; 8]>>,
    depth: u8,
}

impl OctreeNode {
    fn new(min: Point, max: Point, depth: u8) -> Self {
        Self {
            bounds: (min, max),
            objects: Vec::new(),
            children: None,
            depth,
        }
    }

    fn insert(&mut self, entry: Entry) {
        if self.children.is_none() {
            self.objects.push(entry);
            if self.objects.len() > MAX_OBJECTS_PER_NODE
                && self.depth < MAX_OCTREE_DEPTH
                && self.can_subdivide()
            {
                self.subdivide();
            }
        } else {
            let index = self.child_index(entry.point);
            if let Some(children) = &mut self.children {
                children[index].insert(entry);
            }
        }
    }

    fn can_subdivide(&self) -> bool {
        let (min, max) = &self.bounds;
        (0..3).all(|axis| max[axis] - min[axis] > MIN_NODE_SIZE)
    }

    fn midpoint(&self) -> Point {
        let (min, max) = &self.bounds;
        [
            (min[0] + max[0]) / 2.0,
            (min[1] + max[1]) / 2.0,
            (min[2] + max[2]) / 2.0,
        ]
    }

    /// Octant index: bit 0 for x, bit 1 for y, bit 2 for z on the upper half
    fn child_index(&self, point: Point) -> usize {
        let mid = self.midpoint();
        (0..3).fold(0, |index, axis| {
            if point[axis] >= mid[axis] {
                index | (1 << axis)
            } else {
                index
            }
        })
    }

    fn subdivide(&mut self) {
        let (min, max) = self.bounds;
        let mid = self.midpoint();
        let depth = self.depth + 1;

        let children: [OctreeNode; 8] = std::array::from_fn(|index| {
            let mut lo = min;
            let mut hi = mid;
            for axis in 0..3 {
                if index & (1 << axis) != 0 {
                    lo[axis] = mid[axis];
                    hi[axis] = max[axis];
                }
            }
            OctreeNode::new(lo, hi, depth)
        });
        self.children = Some(Box::new(children));

        let objects = std::mem::take(&mut self.objects);
        for object in objects {
            let index = self.child_index(object.point);
            if let Some(children) = &mut self.children {
                children[index].insert(object);
            }
        }
    }

    /// Removes `id` by following `point` down; drops children that all empty out.
    fn remove(&mut self, id: &ClientId, point: Point) -> bool {
        let index = self.child_index(point);
        let removed = match &mut self.children {
            None => {
                let before = self.objects.len();
                self.objects.retain(|e| &e.id != id);
                self.objects.len() != before
            }
            Some(children) => children[index].remove(id, point),
        };

        let prune = self.children.as_ref().is_some_and(|children| {
            children
                .iter()
                .all(|child| child.children.is_none() && child.objects.is_empty())
        });
        if prune {
            self.children = None;
        }
        removed
    }

    fn intersects_sphere(&self, center: Point, radius: f64) -> bool {
        let (min, max) = &self.bounds;
        let distance_squared: f64 = (0..3)
            .map(|axis| {
                let closest = center[axis].clamp(min[axis], max[axis]);
                (center[axis] - closest).powi(2)
            })
            .sum();
        distance_squared <= radius * radius
    }

    fn query(&self, center: Point, chord: f64, position: Position, radius: f64, out: &mut Vec<ClientId>) {
        if !self.intersects_sphere(center, chord) {
            return;
        }
        for object in &self.objects {
            if distance(object.position, position) <= radius {
                out.push(object.id.clone());
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query(center, chord, position, radius, out);
            }
        }
    }

    fn max_depth(&self) -> u8 {
        match &self.children {
            None => self.depth,
            Some(children) => children.iter().map(OctreeNode::max_depth).max().unwrap_or(self.depth),
        }
    }
}

/// Octree index over the sphere's Cartesian embedding.
#[derive(Debug)]
pub struct Octree {
    root: OctreeNode,
    /// Point each id was indexed at, used to route removals
    locations: HashMap<ClientId, (Point, IndexHandle)>,
    handles: HandleSequence,
}

impl Default for Octree {
    fn default() -> Self {
        Self::new()
    }
}

impl Octree {
    pub fn new() -> Self {
        let h = ROOT_HALF_WIDTH;
        Self {
            root: OctreeNode::new([-h, -h, -h], [h, h, h], 0),
            locations: HashMap::new(),
            handles: HandleSequence::default(),
        }
    }

    pub fn depth(&self) -> u8 {
        self.root.max_depth()
    }
}

impl SpatialIndex for Octree {
    fn insert(&mut self, node: &ClientNode) -> IndexHandle {
        if let Some((_, handle)) = self.locations.get(&node.id) {
            return *handle;
        }
        let handle = self.handles.next();
        let point = node.position.to_cartesian();
        self.root.insert(Entry {
            id: node.id.clone(),
            position: node.position,
            point,
            handle,
        });
        self.locations.insert(node.id.clone(), (point, handle));
        handle
    }

    fn remove(&mut self, node: &ClientNode) {
        if let Some((point, _)) = self.locations.remove(&node.id) {
            self.root.remove(&node.id, point);
        }
    }

    fn find(&self, node: &ClientNode, radius: f64) -> Vec<ClientId> {
        let mut found = Vec::new();
        let chord = chord_length(radius) + PRUNE_SLACK_M;
        self.root
            .query(node.position.to_cartesian(), chord, node.position, radius, &mut found);
        found
    }

    fn len(&self) -> usize {
        self.locations.len()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Octree
    }
}

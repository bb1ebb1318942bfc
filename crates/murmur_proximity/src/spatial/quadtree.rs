/// Quadtree over the equirectangular (longitude, latitude) plane
///
/// A geodesic radius becomes a degree-space bounding box around the query
/// point. Near the poles a degree of longitude collapses toward zero meters,
/// so the box widens to every longitude there; across the date line it splits
/// in two. Boxes only select candidates, the exact metric decides.
use super::{HandleSequence, IndexHandle, IndexKind, SpatialIndex};
use crate::geo::{distance, ClientId, Position, EARTH_RADIUS_M};
use crate::registry::ClientNode;
use std::collections::HashMap;

/// Maximum depth for quadtree subdivision
const MAX_QUADTREE_DEPTH: u8 = 20;
/// Maximum objects per quadtree node before subdivision
const MAX_OBJECTS_PER_NODE: usize = 8;
/// Minimum node edge in degrees to prevent infinite subdivision
const MIN_NODE_SIZE: f64 = 1e-5;
/// Angular slack in radians for rounding at the box edges
const ANGLE_SLACK: f64 = 1e-9;

/// (lon, lat) in degrees
type Point = [f64; 2];
type Rect = (Point, Point);

#[derive(Debug, Clone)]
struct Entry {
    id: ClientId,
    position: Position,
    handle: IndexHandle,
}

impl Entry {
    fn point(&self) -> Point {
        plane_point(self.position)
    }
}

fn plane_point(position: Position) -> Point {
    [position.lon, position.lat]
}

/// A node in the quadtree
#[derive(Debug)]
struct QuadTreeNode {
    /// Bounding box for this node (min, max)
    bounds: Rect,
    /// Objects in this node (only if leaf)
    objects: Vec<Entry>,
    /// Child nodes (NW, NE, SW, SE) - None if leaf
    children: Option<Box<[QuadTreeNode; 4]>>,
    depth: u8,
}

impl QuadTreeNode {
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
                && self.depth < MAX_QUADTREE_DEPTH
                && self.can_subdivide()
            {
                self.subdivide();
            }
        } else {
            let index = self.child_index(entry.point());
            if let Some(children) = &mut self.children {
                children[index].insert(entry);
            }
        }
    }

    fn can_subdivide(&self) -> bool {
        let (min, max) = &self.bounds;
        max[0] - min[0] > MIN_NODE_SIZE && max[1] - min[1] > MIN_NODE_SIZE
    }

    fn subdivide(&mut self) {
        let (min, max) = self.bounds;
        let mid_x = (min[0] + max[0]) / 2.0;
        let mid_y = (min[1] + max[1]) / 2.0;
        let depth = self.depth + 1;

        self.children = Some(Box::new([
            // NW (0)
            QuadTreeNode::new([min[0], mid_y], [mid_x, max[1]], depth),
            // NE (1)
            QuadTreeNode::new([mid_x, mid_y], [max[0], max[1]], depth),
            // SW (2)
            QuadTreeNode::new([min[0], min[1]], [mid_x, mid_y], depth),
            // SE (3)
            QuadTreeNode::new([mid_x, min[1]], [max[0], mid_y], depth),
        ]));

        let objects = std::mem::take(&mut self.objects);
        for object in objects {
            let index = self.child_index(object.point());
            if let Some(children) = &mut self.children {
                children[index].insert(object);
            }
        }
    }

    fn child_index(&self, point: Point) -> usize {
        let (min, max) = &self.bounds;
        let mid_x = (min[0] + max[0]) / 2.0;
        let mid_y = (min[1] + max[1]) / 2.0;

        let right = point[0] >= mid_x;
        let top = point[1] >= mid_y;

        match (top, right) {
            (true, false) => 0,  // NW
            (true, true) => 1,   // NE
            (false, false) => 2, // SW
            (false, true) => 3,  // SE
        }
    }

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

    fn intersects_rect(&self, rect: &Rect) -> bool {
        let (min, max) = &self.bounds;
        let (rmin, rmax) = rect;
        min[0] <= rmax[0] && rmin[0] <= max[0] && min[1] <= rmax[1] && rmin[1] <= max[1]
    }

    fn query(&self, rects: &[Rect], position: Position, radius: f64, out: &mut Vec<ClientId>) {
        if !rects.iter().any(|rect| self.intersects_rect(rect)) {
            return;
        }
        for object in &self.objects {
            if distance(object.position, position) <= radius {
                out.push(object.id.clone());
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query(rects, position, radius, out);
            }
        }
    }

    fn max_depth(&self) -> u8 {
        match &self.children {
            None => self.depth,
            Some(children) => children.iter().map(QuadTreeNode::max_depth).max().unwrap_or(self.depth),
        }
    }
}

/// Degree-space boxes covering every point within `radius` meters of `center`.
fn query_rects(center: Position, radius: f64) -> Vec<Rect> {
    let angular = radius / EARTH_RADIUS_M + ANGLE_SLACK;
    let d_lat = angular.to_degrees();
    let lat_lo = (center.lat - d_lat).max(-90.0);
    let lat_hi = (center.lat + d_lat).min(90.0);

    if angular >= std::f64::consts::FRAC_PI_2 || center.lat.abs() + d_lat >= 90.0 {
        return vec![([-180.0, lat_lo], [180.0, lat_hi])];
    }

    // Widest longitude offset of a spherical cap that does not reach a pole.
    let d_lon = (angular.sin() / center.lat.to_radians().cos())
        .min(1.0)
        .asin()
        .to_degrees();
    let lon_lo = center.lon - d_lon;
    let lon_hi = center.lon + d_lon;

    if lon_lo < -180.0 {
        vec![
            ([-180.0, lat_lo], [lon_hi, lat_hi]),
            ([lon_lo + 360.0, lat_lo], [180.0, lat_hi]),
        ]
    } else if lon_hi > 180.0 {
        vec![
            ([lon_lo, lat_lo], [180.0, lat_hi]),
            ([-180.0, lat_lo], [lon_hi - 360.0, lat_hi]),
        ]
    } else {
        vec![([lon_lo, lat_lo], [lon_hi, lat_hi])]
    }
}

/// Planar quadtree index.
#[derive(Debug)]
pub struct QuadTree {
    root: QuadTreeNode,
    locations: HashMap<ClientId, (Point, IndexHandle)>,
    handles: HandleSequence,
}

impl Default for QuadTree {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadTree {
    pub fn new() -> Self {
        Self {
            root: QuadTreeNode::new([-180.0, -90.0], [180.0, 90.0], 0),
            locations: HashMap::new(),
            handles: HandleSequence::default(),
        }
    }

    pub fn depth(&self) -> u8 {
        self.root.max_depth()
    }
}

impl SpatialIndex for QuadTree {
    fn insert(&mut self, node: &ClientNode) -> IndexHandle {
        if let Some((_, handle)) = self.locations.get(&node.id) {
            return *handle;
        }
        let handle = self.handles.next();
        self.root.insert(Entry {
            id: node.id.clone(),
            position: node.position,
            handle,
        });
        self.locations
            .insert(node.id.clone(), (plane_point(node.position), handle));
        handle
    }

    fn remove(&mut self, node: &ClientNode) {
        if let Some((point, _)) = self.locations.remove(&node.id) {
            self.root.remove(&node.id, point);
        }
    }

    fn find(&self, node: &ClientNode, radius: f64) -> Vec<ClientId> {
        let mut found = Vec::new();
        let rects = query_rects(node.position, radius);
        self.root.query(&rects, node.position, radius, &mut found);
        found
    }

    fn len(&self) -> usize {
        self.locations.len()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Quadtree
    }
}

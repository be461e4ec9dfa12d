//! Navigation nodes: one walkable triangle each.

use glam::{Vec2, Vec3};
use sentinel_common::{
    closest_point_on_segment, cross2, planar, segment_intersection, NodeId, GEOMETRY_EPSILON,
};
use serde::{Deserialize, Serialize};

/// One edge of a triangle, named by its two corner vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Edge from vertex A to vertex B
    Ab = 0,
    /// Edge from vertex B to vertex C
    Bc = 1,
    /// Edge from vertex C to vertex A
    Ca = 2,
}

impl Side {
    /// All three sides in winding order.
    pub const ALL: [Side; 3] = [Side::Ab, Side::Bc, Side::Ca];

    /// Slot index of this side.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Corner indices (start, end) of this side.
    #[must_use]
    pub const fn corners(self) -> (usize, usize) {
        match self {
            Side::Ab => (0, 1),
            Side::Bc => (1, 2),
            Side::Ca => (2, 0),
        }
    }
}

/// How a straight planar path relates to a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathClassification {
    /// The path ends inside this node's column.
    Ending,
    /// The path leaves this node through `side`.
    Exiting {
        /// Neighbor across the exit side, `None` on a mesh boundary
        next: Option<NodeId>,
        /// Side the path crosses
        side: Side,
        /// Crossing point, mapped onto this node's surface
        point: Vec3,
    },
    /// The path does not touch this node.
    NoRelationship,
}

/// A walkable triangle with adjacency and a height-mapping plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationNode {
    id: NodeId,
    face_index: usize,
    vertex_indices: [u32; 3],
    vertices: [Vec3; 3],
    center: Vec3,
    normal: Vec3,
    plane_d: f32,
    /// +1 for counter-clockwise winding in the (x, y) plane, -1 otherwise
    winding: f32,
    links: [Option<NodeId>; 3],
    weight: f32,
}

impl NavigationNode {
    /// Creates a node from a face. Returns `None` for degenerate triangles.
    #[must_use]
    pub fn new(id: NodeId, face_index: usize, vertex_indices: [u32; 3], vertices: [Vec3; 3]) -> Option<Self> {
        let [a, b, c] = vertex_indices;
        if a == b || b == c || c == a {
            return None;
        }
        let normal = (vertices[1] - vertices[0]).cross(vertices[2] - vertices[0]);
        let area2 = cross2(planar(vertices[1] - vertices[0]), planar(vertices[2] - vertices[0]));
        if normal.length_squared() <= f32::EPSILON || area2.abs() <= GEOMETRY_EPSILON {
            return None;
        }
        let normal = normal.normalize();
        Some(Self {
            id,
            face_index,
            vertex_indices,
            vertices,
            center: (vertices[0] + vertices[1] + vertices[2]) / 3.0,
            normal,
            plane_d: -normal.dot(vertices[0]),
            winding: area2.signum(),
            links: [None; 3],
            weight: 1.0,
        })
    }

    /// Node identifier.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Index of the source face in the mesh data this node was built from.
    #[must_use]
    pub const fn face_index(&self) -> usize {
        self.face_index
    }

    /// Triangle corners.
    #[must_use]
    pub const fn vertices(&self) -> &[Vec3; 3] {
        &self.vertices
    }

    /// Mesh vertex indices of the corners.
    #[must_use]
    pub const fn vertex_indices(&self) -> [u32; 3] {
        self.vertex_indices
    }

    /// Centroid of the triangle.
    #[must_use]
    pub const fn center(&self) -> Vec3 {
        self.center
    }

    /// Unit surface normal.
    #[must_use]
    pub const fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Traversal weight used by the search.
    #[must_use]
    pub const fn weight(&self) -> f32 {
        self.weight
    }

    /// Sets the traversal weight. Negative weights are clamped to zero.
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight.max(0.0);
    }

    /// Neighbor across `side`.
    #[must_use]
    pub const fn link(&self, side: Side) -> Option<NodeId> {
        self.links[side.index()]
    }

    /// All three neighbor slots.
    #[must_use]
    pub const fn links(&self) -> &[Option<NodeId>; 3] {
        &self.links
    }

    pub(crate) fn set_link(&mut self, side: Side, neighbor: NodeId) {
        self.links[side.index()] = Some(neighbor);
    }

    /// The side whose link points at `neighbor`.
    #[must_use]
    pub fn side_linking_to(&self, neighbor: NodeId) -> Option<Side> {
        Side::ALL.into_iter().find(|side| self.links[side.index()] == Some(neighbor))
    }

    /// Finds an unlinked side made of the mesh vertices `a` and `b`, in either order.
    #[must_use]
    pub fn free_side_with(&self, a: u32, b: u32) -> Option<Side> {
        Side::ALL.into_iter().find(|&side| {
            let (i, j) = side.corners();
            let (vi, vj) = (self.vertex_indices[i], self.vertex_indices[j]);
            self.links[side.index()].is_none() && ((vi == a && vj == b) || (vi == b && vj == a))
        })
    }

    /// Mesh vertex indices at the ends of `side`.
    #[must_use]
    pub const fn side_vertex_indices(&self, side: Side) -> (u32, u32) {
        let (i, j) = side.corners();
        (self.vertex_indices[i], self.vertex_indices[j])
    }

    /// Planar endpoints of `side`.
    #[must_use]
    pub fn side_endpoints(&self, side: Side) -> (Vec2, Vec2) {
        let (i, j) = side.corners();
        (planar(self.vertices[i]), planar(self.vertices[j]))
    }

    /// Midpoint of the wall along `side`.
    #[must_use]
    pub fn wall_midpoint(&self, side: Side) -> Vec3 {
        let (i, j) = side.corners();
        (self.vertices[i] + self.vertices[j]) * 0.5
    }

    /// Signed distance-like measure of `p` against `side`; negative means outside.
    fn side_test(&self, side: Side, p: Vec2) -> f32 {
        let (a, b) = self.side_endpoints(side);
        cross2(b - a, p - a) * self.winding
    }

    fn is_outside(&self, side: Side, p: Vec2) -> bool {
        let (a, b) = self.side_endpoints(side);
        self.side_test(side, p) < -GEOMETRY_EPSILON * (b - a).length().max(1.0)
    }

    /// True when the vertical column over this triangle contains `p`.
    #[must_use]
    pub fn is_point_in_column(&self, p: Vec3) -> bool {
        let p = planar(p);
        Side::ALL.into_iter().all(|side| !self.is_outside(side, p))
    }

    /// Height of the triangle's plane at `(x, y)`.
    #[must_use]
    pub fn height_at(&self, x: f32, y: f32) -> f32 {
        if self.normal.z.abs() <= GEOMETRY_EPSILON {
            return self.center.z;
        }
        -(self.normal.x * x + self.normal.y * y + self.plane_d) / self.normal.z
    }

    /// Moves `p` vertically onto the triangle's plane.
    #[must_use]
    pub fn map_height(&self, p: Vec3) -> Vec3 {
        Vec3::new(p.x, p.y, self.height_at(p.x, p.y))
    }

    /// Clamps `p` horizontally into the triangle's column, keeping its height.
    #[must_use]
    pub fn force_into_column(&self, p: Vec3) -> Vec3 {
        if self.is_point_in_column(p) {
            return p;
        }
        let q = planar(p);
        let closest = Side::ALL
            .into_iter()
            .map(|side| {
                let (a, b) = self.side_endpoints(side);
                closest_point_on_segment(q, a, b)
            })
            .min_by(|x, y| x.distance_squared(q).total_cmp(&y.distance_squared(q)))
            .unwrap_or(q);
        Vec3::new(closest.x, closest.y, p.z)
    }

    /// Clamps `p` into the column and maps it onto the surface.
    #[must_use]
    pub fn snap(&self, p: Vec3) -> Vec3 {
        self.map_height(self.force_into_column(p))
    }

    /// Classifies the straight planar path `start -> end` against this node.
    ///
    /// The exit side is the one whose outer half-plane contains `end` and which
    /// the segment actually crosses, so the side a path entered through is never
    /// reported as its exit.
    #[must_use]
    pub fn classify_path(&self, start: Vec3, end: Vec3) -> PathClassification {
        if self.is_point_in_column(end) {
            return PathClassification::Ending;
        }
        let (s, e) = (planar(start), planar(end));
        let mut best: Option<(f32, Side)> = None;
        for side in Side::ALL {
            if !self.is_outside(side, e) {
                continue;
            }
            let (a, b) = self.side_endpoints(side);
            if let Some((t, _)) = segment_intersection(s, e, a, b) {
                if best.map_or(true, |(bt, _)| t > bt) {
                    best = Some((t, side));
                }
            }
        }
        match best {
            Some((t, side)) => {
                let crossing = s + (e - s) * t;
                PathClassification::Exiting {
                    next: self.link(side),
                    side,
                    point: self.map_height(Vec3::new(crossing.x, crossing.y, 0.0)),
                }
            },
            None => PathClassification::NoRelationship,
        }
    }
}

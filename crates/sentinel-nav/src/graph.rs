//! The navigation graph: node storage, adjacency, point location and line of sight.

use crate::node::{NavigationNode, PathClassification, Side};
use crate::path::PathSettings;
use glam::Vec3;
use parking_lot::Mutex;
use sentinel_common::{NavError, NodeId};
use tracing::{debug, info, trace, warn};

/// Last point-location result, reused while the query point stays close.
#[derive(Debug, Clone, Copy)]
struct NodeCache {
    node: NodeId,
    point: Vec3,
}

/// Walkable triangle graph built once per level load.
///
/// Topology is immutable after [`NavigationGraph::link_nodes`]. Node weights may
/// change at runtime. The closest-node cache sits behind a mutex so lookups only
/// need a shared reference.
#[derive(Debug, Default)]
pub struct NavigationGraph {
    nodes: Vec<NavigationNode>,
    cache: Mutex<Option<NodeCache>>,
    settings: PathSettings,
}

impl NavigationGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new(settings: PathSettings) -> Self {
        Self {
            nodes: Vec::new(),
            cache: Mutex::new(None),
            settings,
        }
    }

    /// Builds and links a graph, skipping malformed faces.
    #[must_use]
    pub fn from_mesh(vertices: &[Vec3], faces: &[[u32; 3]], settings: PathSettings) -> Self {
        let mut graph = Self::new(settings);
        graph.build(vertices, faces);
        graph.link_nodes();
        graph
    }

    /// Builds and links a graph, rejecting the whole mesh on the first malformed face.
    pub fn try_from_mesh(
        vertices: &[Vec3],
        faces: &[[u32; 3]],
        settings: PathSettings,
    ) -> Result<Self, NavError> {
        if faces.is_empty() {
            return Err(NavError::EmptyMesh);
        }
        for (face, indices) in faces.iter().enumerate() {
            validate_face(vertices, face, *indices)?;
        }
        Ok(Self::from_mesh(vertices, faces, settings))
    }

    /// Creates one node per face and returns how many were accepted.
    ///
    /// Malformed faces (out-of-range or repeated vertex indices, zero area)
    /// trip a debug assertion and are skipped in release builds.
    pub fn build(&mut self, vertices: &[Vec3], faces: &[[u32; 3]]) -> usize {
        self.nodes.clear();
        *self.cache.lock() = None;
        self.nodes.reserve(faces.len());

        for (face, &indices) in faces.iter().enumerate() {
            let checked = validate_face(vertices, face, indices);
            debug_assert!(checked.is_ok(), "malformed navigation face: {checked:?}");
            if let Err(err) = checked {
                warn!("Skipping navigation face: {err}");
                continue;
            }
            let corners = indices.map(|i| vertices[i as usize]);
            let id = NodeId::new(self.nodes.len() as u32);
            let node = NavigationNode::new(id, face, indices, corners);
            debug_assert!(node.is_some(), "zero-area navigation face {face}");
            match node {
                Some(node) => self.nodes.push(node),
                None => warn!(face, "Skipping zero-area navigation face"),
            }
        }
        debug!(accepted = self.nodes.len(), faces = faces.len(), "Navigation nodes built");
        self.nodes.len()
    }

    /// Resolves adjacency by shared vertex pairs.
    ///
    /// Each pair of nodes shares at most one edge, and an edge already claimed by
    /// one neighbor is never claimed again, so every link is mutual.
    pub fn link_nodes(&mut self) {
        let count = self.nodes.len();
        let mut links = 0usize;
        for a in 0..count {
            for b in (a + 1)..count {
                let (head, tail) = self.nodes.split_at_mut(b);
                let node_a = &mut head[a];
                let node_b = &mut tail[0];
                for side_a in Side::ALL {
                    if node_a.link(side_a).is_some() {
                        continue;
                    }
                    let (va, vb) = node_a.side_vertex_indices(side_a);
                    if let Some(side_b) = node_b.free_side_with(va, vb) {
                        node_a.set_link(side_a, node_b.id());
                        node_b.set_link(side_b, node_a.id());
                        links += 1;
                        break;
                    }
                }
            }
        }
        info!(nodes = count, links, "Navigation graph linked");
    }

    /// Path tuning used by [`NavigationGraph::build_navigation_path`].
    #[must_use]
    pub const fn settings(&self) -> &PathSettings {
        &self.settings
    }

    /// Replaces the path tuning.
    pub fn set_settings(&mut self, settings: PathSettings) {
        self.settings = settings;
    }

    /// All nodes, indexed by [`NodeId::index`].
    #[must_use]
    pub fn nodes(&self) -> &[NavigationNode] {
        &self.nodes
    }

    /// Looks up a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NavigationNode> {
        self.nodes.get(id.index())
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sets a node's traversal weight. Returns false for an unknown node.
    pub fn set_node_weight(&mut self, id: NodeId, weight: f32) -> bool {
        match self.nodes.get_mut(id.index()) {
            Some(node) => {
                node.set_weight(weight);
                true
            },
            None => false,
        }
    }

    /// Resets every node weight to 1.0.
    pub fn clear_all_node_weights(&mut self) {
        for node in &mut self.nodes {
            node.set_weight(1.0);
        }
    }

    /// Finds the node an agent at `point` stands on.
    ///
    /// Prefers nodes whose column contains the point, picking the one whose
    /// surface is vertically closest. Points off the mesh resolve to the node
    /// whose boundary, crossed on the way from its center to the point, lies
    /// closest to the point.
    #[must_use]
    pub fn find_closest_node(&self, point: Vec3) -> Option<NodeId> {
        let radius = self.settings.cache_radius;
        if let Some(cached) = *self.cache.lock() {
            if cached.point.distance(point) < radius
                && self
                    .node(cached.node)
                    .is_some_and(|node| node.is_point_in_column(point))
            {
                return Some(cached.node);
            }
        }

        let home = self
            .nodes
            .iter()
            .filter(|node| node.is_point_in_column(point))
            .map(|node| (node.id(), (node.height_at(point.x, point.y) - point.z).abs()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id);

        let found = home.or_else(|| {
            self.nodes
                .iter()
                .filter_map(|node| match node.classify_path(node.center(), point) {
                    PathClassification::Exiting { point: exit, .. } => {
                        Some((node.id(), exit.distance(point)))
                    },
                    _ => None,
                })
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(id, _)| id)
        });

        match found {
            Some(node) => *self.cache.lock() = Some(NodeCache { node, point }),
            None => trace!(?point, "No navigation node near point"),
        }
        found
    }

    /// Clamps `point` into a node's column and maps it onto its surface.
    #[must_use]
    pub fn snap_point_to_node(&self, id: NodeId, point: Vec3) -> Option<Vec3> {
        self.node(id).map(|node| node.snap(point))
    }

    /// Snaps `point` onto the closest node.
    #[must_use]
    pub fn snap_point_to_mesh(&self, point: Vec3) -> Option<(NodeId, Vec3)> {
        let id = self.find_closest_node(point)?;
        self.snap_point_to_node(id, point).map(|p| (id, p))
    }

    /// Walks node to node along the straight planar segment `start -> end`.
    ///
    /// True when the walk ends in a node containing `end`. False when it leaves
    /// the mesh through an unlinked edge, or when either node is missing.
    #[must_use]
    pub fn line_of_sight(
        &self,
        start_node: Option<NodeId>,
        start: Vec3,
        end_node: Option<NodeId>,
        end: Vec3,
    ) -> bool {
        let (Some(start_node), Some(end_node)) = (start_node, end_node) else {
            return false;
        };
        if start_node == end_node {
            return true;
        }
        let mut current = start_node;
        for _ in 0..=self.nodes.len() {
            let Some(node) = self.node(current) else {
                return false;
            };
            match node.classify_path(start, end) {
                PathClassification::Ending => return true,
                PathClassification::Exiting {
                    next: Some(next), ..
                } => current = next,
                PathClassification::Exiting { next: None, .. }
                | PathClassification::NoRelationship => return false,
            }
        }
        false
    }
}

fn validate_face(vertices: &[Vec3], face: usize, indices: [u32; 3]) -> Result<(), NavError> {
    if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
        return Err(NavError::VertexOutOfRange {
            face,
            index,
            count: vertices.len(),
        });
    }
    let [a, b, c] = indices;
    if a == b || b == c || c == a {
        return Err(NavError::DegenerateFace { face });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ahash::AHashMap;
    use proptest::prelude::*;

    /// Builds a grid mesh of square cells (two triangles each) sharing vertices.
    pub(crate) fn grid_mesh(cells: &[(i32, i32)], size: f32) -> (Vec<Vec3>, Vec<[u32; 3]>) {
        let mut index: AHashMap<(i32, i32), u32> = AHashMap::new();
        let mut vertices = Vec::new();
        let mut vertex = |x: i32, y: i32| -> u32 {
            *index.entry((x, y)).or_insert_with(|| {
                vertices.push(Vec3::new(x as f32 * size, y as f32 * size, 0.0));
                (vertices.len() - 1) as u32
            })
        };
        let mut faces = Vec::new();
        for &(x, y) in cells {
            let v00 = vertex(x, y);
            let v10 = vertex(x + 1, y);
            let v11 = vertex(x + 1, y + 1);
            let v01 = vertex(x, y + 1);
            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
        (vertices, faces)
    }

    pub(crate) fn grid_graph(cells: &[(i32, i32)], size: f32) -> NavigationGraph {
        let (vertices, faces) = grid_mesh(cells, size);
        NavigationGraph::from_mesh(&vertices, &faces, PathSettings::default())
    }

    fn assert_links_reciprocal(graph: &NavigationGraph) {
        for node in graph.nodes() {
            for side in Side::ALL {
                if let Some(other) = node.link(side) {
                    let other = graph.node(other).expect("linked node exists");
                    let back = other.side_linking_to(node.id()).expect("reciprocal link");
                    let (a, b) = node.side_vertex_indices(side);
                    let (c, d) = other.side_vertex_indices(back);
                    assert!((a == c && b == d) || (a == d && b == c));
                }
            }
        }
    }

    #[test]
    fn test_link_nodes_square() {
        let graph = grid_graph(&[(0, 0)], 100.0);
        assert_eq!(graph.len(), 2);
        let a = graph.node(NodeId::new(0)).expect("node 0");
        let b = graph.node(NodeId::new(1)).expect("node 1");
        assert_eq!(a.links().iter().flatten().count(), 1);
        assert_eq!(b.links().iter().flatten().count(), 1);
        assert_links_reciprocal(&graph);
    }

    #[test]
    fn test_try_from_mesh_rejects_bad_index() {
        let vertices = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let err = NavigationGraph::try_from_mesh(&vertices, &[[0, 1, 7]], PathSettings::default())
            .expect_err("index out of range");
        assert_eq!(
            err,
            NavError::VertexOutOfRange {
                face: 0,
                index: 7,
                count: 3
            }
        );
        assert_eq!(
            NavigationGraph::try_from_mesh(&vertices, &[], PathSettings::default()).err(),
            Some(NavError::EmptyMesh)
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "malformed navigation face")]
    fn test_build_asserts_on_duplicate_vertex_in_debug() {
        let vertices = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let mut graph = NavigationGraph::default();
        graph.build(&vertices, &[[0, 0, 1]]);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_build_skips_duplicate_vertex_in_release() {
        let vertices = [Vec3::ZERO, Vec3::X * 10.0, Vec3::Y * 10.0];
        let mut graph = NavigationGraph::default();
        assert_eq!(graph.build(&vertices, &[[0, 0, 1], [0, 1, 2]]), 1);
        assert_eq!(graph.node(NodeId::new(0)).map(NavigationNode::face_index), Some(1));
    }

    #[test]
    fn test_find_closest_node_prefers_nearest_floor() {
        // Two stacked floors over the same footprint.
        let vertices = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(100.0, 0.0, 0.0),
            Vec3::new(0.0, 100.0, 0.0),
            Vec3::new(0.0, 0.0, 300.0),
            Vec3::new(100.0, 0.0, 300.0),
            Vec3::new(0.0, 100.0, 300.0),
        ];
        let graph = NavigationGraph::from_mesh(&vertices, &[[0, 1, 2], [3, 4, 5]], PathSettings::default());
        assert_eq!(graph.find_closest_node(Vec3::new(10.0, 10.0, 20.0)), Some(NodeId::new(0)));
        assert_eq!(graph.find_closest_node(Vec3::new(10.0, 10.0, 280.0)), Some(NodeId::new(1)));
    }

    #[test]
    fn test_find_closest_node_off_mesh() {
        let graph = grid_graph(&[(0, 0), (1, 0)], 100.0);
        let node = graph.find_closest_node(Vec3::new(250.0, 50.0, 0.0)).expect("fallback node");
        let n = graph.node(node).expect("node");
        // The nearest boundary is the right edge of cell (1, 0).
        assert!(n.vertices().iter().any(|v| (v.x - 200.0).abs() < 1e-3));
    }

    #[test]
    fn test_find_closest_node_cache_never_stale() {
        let graph = grid_graph(&[(0, 0), (1, 0)], 100.0);
        let first = graph.find_closest_node(Vec3::new(95.0, 5.0, 0.0)).expect("node");
        // Within the cache radius but across into the next cell.
        let second = graph.find_closest_node(Vec3::new(105.0, 5.0, 0.0)).expect("node");
        assert_ne!(first, second);
        let n = graph.node(second).expect("node");
        assert!(n.is_point_in_column(Vec3::new(105.0, 5.0, 0.0)));
    }

    #[test]
    fn test_line_of_sight() {
        // L-shaped corridor: the diagonal shortcut leaves the mesh.
        let graph = grid_graph(&[(0, 0), (1, 0), (2, 0), (2, 1), (2, 2)], 100.0);
        let a = Vec3::new(50.0, 50.0, 0.0);
        let b = Vec3::new(250.0, 50.0, 0.0);
        let c = Vec3::new(250.0, 250.0, 0.0);
        let na = graph.find_closest_node(a);
        let nb = graph.find_closest_node(b);
        let nc = graph.find_closest_node(c);
        assert!(graph.line_of_sight(na, a, nb, b));
        assert!(graph.line_of_sight(nb, b, nc, c));
        assert!(!graph.line_of_sight(na, a, nc, c));
        assert!(!graph.line_of_sight(None, a, nc, c));
    }

    #[test]
    fn test_weights_reset() {
        let mut graph = grid_graph(&[(0, 0)], 100.0);
        assert!(graph.set_node_weight(NodeId::new(1), 5.0));
        assert!(!graph.set_node_weight(NodeId::new(9), 5.0));
        graph.clear_all_node_weights();
        assert!(graph.nodes().iter().all(|n| (n.weight() - 1.0).abs() < f32::EPSILON));
    }

    proptest! {
        #[test]
        fn prop_links_are_reciprocal(cells in proptest::collection::hash_set((0i32..6, 0i32..6), 1..20)) {
            let cells: Vec<_> = cells.into_iter().collect();
            let graph = grid_graph(&cells, 50.0);
            prop_assert_eq!(graph.len(), cells.len() * 2);
            for node in graph.nodes() {
                for side in Side::ALL {
                    if let Some(other) = node.link(side) {
                        let back = graph.node(other).and_then(|o| o.side_linking_to(node.id()));
                        prop_assert!(back.is_some());
                    }
                }
            }
        }
    }
}

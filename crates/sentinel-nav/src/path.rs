//! Waypoint extraction: line-of-sight smoothing and minimum density.

use crate::graph::NavigationGraph;
use glam::Vec3;
use sentinel_common::{planar_distance, planar_length, NodeId};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Tuning for point location and waypoint extraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Radius within which the closest-node cache is reused
    pub cache_radius: f32,
    /// Height difference above which a visible segment gets extra points
    pub height_threshold: f32,
    /// Vertical spacing of height-interpolated points
    pub height_step: f32,
    /// Minimum horizontal span before height interpolation kicks in
    pub min_height_span: f32,
    /// Horizontal length above which a visible segment gets a midpoint
    pub long_segment: f32,
    /// Minimum spacing between consecutive inserted points
    pub min_spacing: f32,
    /// Path length above which density is enforced
    pub min_waypoint_distance: f32,
    /// Minimum waypoint count on long paths
    pub min_waypoint_count: usize,
    /// Segments shorter than this never get height densification
    pub min_densify_segment: f32,
    /// Cap on height-driven points inserted per segment
    pub max_points_per_segment: usize,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            cache_radius: 50.0,
            height_threshold: 50.0,
            height_step: 40.0,
            min_height_span: 300.0,
            long_segment: 800.0,
            min_spacing: 200.0,
            min_waypoint_distance: 6000.0,
            min_waypoint_count: 8,
            min_densify_segment: 400.0,
            max_points_per_segment: 10,
        }
    }
}

impl PathSettings {
    /// Clamps values into usable ranges.
    pub fn validate(&mut self) {
        self.cache_radius = self.cache_radius.max(0.0);
        self.height_threshold = self.height_threshold.max(0.0);
        self.height_step = self.height_step.max(1.0);
        self.min_spacing = self.min_spacing.max(0.0);
        self.long_segment = self.long_segment.max(self.min_spacing);
        self.min_waypoint_distance = self.min_waypoint_distance.max(0.0);
        self.max_points_per_segment = self.max_points_per_segment.clamp(1, 64);
    }
}

impl NavigationGraph {
    /// Plans a route from `start` to `goal`.
    ///
    /// The head of the returned list is the next point to approach and the tail
    /// is the goal snapped onto the mesh. `None` when either point cannot be
    /// located or no route exists; callers keep their previous list in that case.
    #[must_use]
    pub fn build_navigation_path(&self, start: Vec3, goal: Vec3) -> Option<Vec<Vec3>> {
        let start_node = self.find_closest_node(start)?;
        let goal_node = self.find_closest_node(goal)?;
        self.build_navigation_path_between(start_node, start, goal_node, goal)
    }

    /// Plans a route between already-located nodes.
    #[must_use]
    pub fn build_navigation_path_between(
        &self,
        start_node: NodeId,
        start: Vec3,
        goal_node: NodeId,
        goal: Vec3,
    ) -> Option<Vec<Vec3>> {
        let chain = self.search(start_node, goal_node)?;
        let goal = self.snap_point_to_node(goal_node, goal)?;

        let mut waypoints = vec![goal];
        let mut vantage = (goal_node, goal);
        let mut last: Option<(NodeId, Vec3)> = None;

        for step in &chain {
            let Some(node) = self.node(step.node) else {
                continue;
            };
            let test = node.snap(node.wall_midpoint(step.arrival_side));
            if self.line_of_sight(Some(vantage.0), vantage.1, Some(step.node), test) {
                if last.is_some() {
                    self.insert_smoothing_points(&mut waypoints, vantage.1, test);
                }
            } else if let Some((last_node, last_pos)) = last {
                waypoints.push(last_pos);
                vantage = (last_node, last_pos);
            }
            last = Some((step.node, test));
        }

        if let Some((_, last_pos)) = last {
            let visible = self.line_of_sight(Some(vantage.0), vantage.1, Some(start_node), start);
            if last_pos != vantage.1 && !visible {
                waypoints.push(last_pos);
            }
        }

        waypoints.reverse();
        let settings = self.settings();
        self.ensure_minimum_waypoints(
            start,
            &mut waypoints,
            settings.min_waypoint_distance,
            settings.min_waypoint_count,
        );
        trace!(nodes = chain.len(), waypoints = waypoints.len(), "Navigation path built");
        Some(waypoints)
    }

    /// Adds points along a visible segment that climbs steeply or runs long.
    fn insert_smoothing_points(&self, waypoints: &mut Vec<Vec3>, from: Vec3, to: Vec3) {
        let s = self.settings();
        let diff = to - from;
        let horizontal = planar_length(diff);
        let height = diff.z.abs();
        if horizontal <= s.min_spacing {
            return;
        }

        if height > s.height_threshold {
            let steps = (height / s.height_step) as usize;
            if steps > 1 && horizontal > s.min_height_span {
                for i in 1..steps {
                    let point = self.snap_or_keep(from + diff * (i as f32 / steps as f32));
                    push_spaced(waypoints, from, point, s.min_spacing);
                }
                return;
            }
        } else if horizontal <= s.long_segment {
            return;
        }

        let midpoint = self.snap_or_keep(from + diff * 0.5);
        push_spaced(waypoints, from, midpoint, s.min_spacing);
    }

    /// Re-inserts evenly spaced points on long, sparse routes.
    ///
    /// Length is measured from `start` through every waypoint. When it exceeds
    /// `min_distance` and there are fewer than `min_count` points, each segment
    /// gets `floor(len / (total / min_count))` interior points, which is enough
    /// to reach `min_count`. Steep segments get extra height-driven points.
    pub fn ensure_minimum_waypoints(
        &self,
        start: Vec3,
        waypoints: &mut Vec<Vec3>,
        min_distance: f32,
        min_count: usize,
    ) {
        if waypoints.is_empty() || min_count == 0 || waypoints.len() >= min_count {
            return;
        }
        let total: f32 = std::iter::once(start)
            .chain(waypoints.iter().copied())
            .zip(waypoints.iter().copied())
            .map(|(a, b)| planar_distance(a, b))
            .sum();
        if total <= min_distance {
            return;
        }

        let s = self.settings();
        let spacing = total / min_count as f32;
        let mut dense = Vec::with_capacity(min_count + waypoints.len());
        let mut previous = start;
        for &waypoint in waypoints.iter() {
            let diff = waypoint - previous;
            let horizontal = planar_length(diff);
            let height = diff.z.abs();

            let mut count = (horizontal / spacing) as usize;
            if horizontal >= s.min_densify_segment && height > s.height_threshold {
                let step = (horizontal / 4.0).min(height / 4.0).max(s.min_spacing);
                count = count.max(((horizontal / step) as usize).min(s.max_points_per_segment));
            }
            for i in 1..=count {
                let t = i as f32 / (count + 1) as f32;
                dense.push(self.snap_or_keep(previous + diff * t));
            }
            dense.push(waypoint);
            previous = waypoint;
        }
        trace!(before = waypoints.len(), after = dense.len(), "Waypoints densified");
        *waypoints = dense;
    }

    fn snap_or_keep(&self, point: Vec3) -> Vec3 {
        self.snap_point_to_mesh(point).map_or(point, |(_, snapped)| snapped)
    }
}

/// Pushes `point` if it is spaced from the previous point and lies farther from
/// the vantage `from`, so inserted points never double back.
fn push_spaced(waypoints: &mut Vec<Vec3>, from: Vec3, point: Vec3, min_spacing: f32) {
    let accepted = waypoints.last().map_or(true, |last| {
        last.distance(point) >= min_spacing && from.distance(point) > from.distance(*last)
    });
    if accepted {
        waypoints.push(point);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{grid_graph, grid_mesh};

    fn corridor(cells: i32) -> NavigationGraph {
        let cells: Vec<_> = (0..cells).map(|x| (x, 0)).collect();
        grid_graph(&cells, 100.0)
    }

    fn assert_walkable(graph: &NavigationGraph, start: Vec3, waypoints: &[Vec3]) {
        let mut from = start;
        for &to in waypoints {
            let a = graph.find_closest_node(from);
            let b = graph.find_closest_node(to);
            assert!(graph.line_of_sight(a, from, b, to), "segment {from:?} -> {to:?} leaves the mesh");
            from = to;
        }
    }

    #[test]
    fn test_single_triangle_path_is_goal() {
        let vertices = [
            Vec3::new(-500.0, -500.0, 0.0),
            Vec3::new(2000.0, -500.0, 0.0),
            Vec3::new(-500.0, 2000.0, 0.0),
        ];
        let graph = NavigationGraph::from_mesh(&vertices, &[[0, 1, 2]], PathSettings::default());
        let path = graph
            .build_navigation_path(Vec3::ZERO, Vec3::new(1000.0, 0.0, 0.0))
            .expect("path on one triangle");
        assert_eq!(path, vec![Vec3::new(1000.0, 0.0, 0.0)]);
    }

    #[test]
    fn test_straight_corridor_yields_only_goal() {
        let graph = corridor(6);
        let goal = Vec3::new(550.0, 50.0, 0.0);
        let path = graph
            .build_navigation_path(Vec3::new(50.0, 50.0, 0.0), goal)
            .expect("corridor path");
        assert_eq!(path, vec![goal]);
    }

    #[test]
    fn test_corner_path_is_walkable() {
        let graph = grid_graph(&[(0, 0), (1, 0), (2, 0), (2, 1), (2, 2)], 100.0);
        let start = Vec3::new(50.0, 50.0, 0.0);
        let goal = Vec3::new(250.0, 250.0, 0.0);
        let path = graph.build_navigation_path(start, goal).expect("path");
        assert!(path.len() >= 2, "corner needs a turn point: {path:?}");
        assert_eq!(path.last().copied(), Some(goal));
        assert_walkable(&graph, start, &path);
    }

    #[test]
    fn test_long_corridor_meets_minimum_density() {
        let graph = corridor(80);
        let start = Vec3::new(50.0, 50.0, 0.0);
        let goal = Vec3::new(7950.0, 50.0, 0.0);
        let path = graph.build_navigation_path(start, goal).expect("path");
        assert!(path.len() >= graph.settings().min_waypoint_count);
        assert_eq!(path.last().copied(), Some(goal));
        assert_walkable(&graph, start, &path);
    }

    #[test]
    fn test_unreachable_goal_returns_none() {
        let graph = grid_graph(&[(0, 0), (4, 0)], 100.0);
        assert!(graph
            .build_navigation_path(Vec3::new(50.0, 50.0, 0.0), Vec3::new(450.0, 50.0, 0.0))
            .is_none());
        let empty = NavigationGraph::default();
        assert!(empty.build_navigation_path(Vec3::ZERO, Vec3::X).is_none());
    }

    #[test]
    fn test_ensure_minimum_waypoints_short_path_untouched() {
        let graph = corridor(3);
        let mut waypoints = vec![Vec3::new(250.0, 50.0, 0.0)];
        graph.ensure_minimum_waypoints(Vec3::new(50.0, 50.0, 0.0), &mut waypoints, 6000.0, 8);
        assert_eq!(waypoints.len(), 1);
    }

    #[test]
    fn test_ensure_minimum_waypoints_many_short_segments() {
        // Seven 900-unit legs: each shorter than any fixed long-segment rule.
        let graph = corridor(70);
        let start = Vec3::new(50.0, 50.0, 0.0);
        let mut waypoints: Vec<Vec3> = (1..=7).map(|i| Vec3::new(50.0 + 900.0 * i as f32, 50.0, 0.0)).collect();
        graph.ensure_minimum_waypoints(start, &mut waypoints, 6000.0, 8);
        assert!(waypoints.len() >= 8);
        assert_eq!(waypoints.last().copied(), Some(Vec3::new(6350.0, 50.0, 0.0)));
        let mut xs: Vec<f32> = waypoints.iter().map(|w| w.x).collect();
        let sorted = {
            let mut s = xs.clone();
            s.sort_by(f32::total_cmp);
            s
        };
        assert_eq!(xs, sorted);
        xs.dedup();
        assert_eq!(xs.len(), waypoints.len());
    }

    #[test]
    fn test_steep_segment_gets_height_points() {
        // A ramp rising 400 over 600 horizontal units.
        let (mut vertices, faces) = grid_mesh(&[(0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0)], 100.0);
        for v in &mut vertices {
            v.z = v.x * (400.0 / 600.0);
        }
        let graph = NavigationGraph::from_mesh(&vertices, &faces, PathSettings::default());
        let start = Vec3::new(10.0, 50.0, 10.0 * (400.0 / 600.0));
        let goal = Vec3::new(590.0, 50.0, 590.0 * (400.0 / 600.0));
        let path = graph.build_navigation_path(start, goal).expect("ramp path");
        assert!(path.len() > 1, "steep climb should be split: {path:?}");
        assert!(path.windows(2).all(|w| w[0].x < w[1].x), "points double back: {path:?}");
        assert_eq!(path.last().copied().map(|p| (p.x, p.y)), Some((goal.x, goal.y)));
        assert!((path.last().map_or(0.0, |p| p.z) - goal.z).abs() < 1e-2);
        assert_walkable(&graph, start, &path);
    }

    #[test]
    fn test_settings_validate_clamps() {
        let mut settings = PathSettings {
            height_step: 0.0,
            max_points_per_segment: 0,
            ..PathSettings::default()
        };
        settings.validate();
        assert!(settings.height_step >= 1.0);
        assert_eq!(settings.max_points_per_segment, 1);
    }
}

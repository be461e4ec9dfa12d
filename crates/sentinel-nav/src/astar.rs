//! A* search over the node graph.

use crate::graph::NavigationGraph;
use crate::node::Side;
use sentinel_common::NodeId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One node of a search result and the side through which it was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    /// Node on the path
    pub node: NodeId,
    /// Side of `node` shared with the previous node toward the start
    pub arrival_side: Side,
}

/// Open-list entry ordered so the heap pops the lowest f first.
#[derive(Debug, Clone, Copy)]
struct OpenNode {
    node: NodeId,
    f: f32,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.f.total_cmp(&other.f) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other.f.total_cmp(&self.f)
    }
}

impl NavigationGraph {
    /// Finds the cheapest node chain from `start` to `goal`.
    ///
    /// The chain is ordered goal first and excludes `start`; `start == goal`
    /// yields an empty chain. Step cost is the distance between node centers
    /// times the weight of the node being entered.
    #[must_use]
    pub fn search(&self, start: NodeId, goal: NodeId) -> Option<Vec<PathStep>> {
        let nodes = self.nodes();
        if start.index() >= nodes.len() || goal.index() >= nodes.len() {
            return None;
        }
        if start == goal {
            return Some(Vec::new());
        }

        let goal_center = nodes[goal.index()].center();
        let heuristic = |id: NodeId| nodes[id.index()].center().distance(goal_center);

        let mut cost = vec![f32::INFINITY; nodes.len()];
        let mut parent: Vec<Option<NodeId>> = vec![None; nodes.len()];
        let mut closed = vec![false; nodes.len()];
        let mut open = BinaryHeap::new();

        cost[start.index()] = 0.0;
        open.push(OpenNode {
            node: start,
            f: heuristic(start),
        });

        while let Some(OpenNode { node: current, .. }) = open.pop() {
            if closed[current.index()] {
                continue;
            }
            closed[current.index()] = true;
            if current == goal {
                return Some(self.unwind(&parent, start, goal));
            }

            let here = &nodes[current.index()];
            for next in here.links().iter().flatten().copied() {
                if closed[next.index()] {
                    continue;
                }
                let neighbor = &nodes[next.index()];
                let step = here.center().distance(neighbor.center()) * neighbor.weight();
                let candidate = cost[current.index()] + step;
                if candidate < cost[next.index()] {
                    cost[next.index()] = candidate;
                    parent[next.index()] = Some(current);
                    open.push(OpenNode {
                        node: next,
                        f: candidate + heuristic(next),
                    });
                }
            }
        }
        None
    }

    fn unwind(&self, parent: &[Option<NodeId>], start: NodeId, goal: NodeId) -> Vec<PathStep> {
        let mut chain = Vec::new();
        let mut current = goal;
        while current != start {
            let Some(previous) = parent[current.index()] else {
                break;
            };
            let arrival_side = self
                .node(current)
                .and_then(|node| node.side_linking_to(previous));
            if let Some(arrival_side) = arrival_side {
                chain.push(PathStep {
                    node: current,
                    arrival_side,
                });
            }
            current = previous;
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::tests::grid_graph;
    use glam::Vec3;
    use sentinel_common::NodeId;

    #[test]
    fn test_search_same_node_is_empty() {
        let graph = grid_graph(&[(0, 0)], 100.0);
        let path = graph.search(NodeId::new(0), NodeId::new(0)).expect("trivial path");
        assert!(path.is_empty());
    }

    #[test]
    fn test_search_disconnected_fails() {
        let graph = grid_graph(&[(0, 0), (5, 5)], 100.0);
        assert!(graph.search(NodeId::new(0), NodeId::new(3)).is_none());
        assert!(graph.search(NodeId::new(0), NodeId::new(99)).is_none());
    }

    #[test]
    fn test_search_chain_is_adjacent_and_goal_first() {
        let graph = grid_graph(&[(0, 0), (1, 0), (2, 0), (2, 1), (2, 2)], 100.0);
        let start = graph.find_closest_node(Vec3::new(20.0, 60.0, 0.0)).expect("start");
        let goal = graph.find_closest_node(Vec3::new(260.0, 280.0, 0.0)).expect("goal");
        let path = graph.search(start, goal).expect("connected");

        assert_eq!(path.first().map(|s| s.node), Some(goal));
        assert!(path.iter().all(|s| s.node != start));
        // Each step's arrival side links to the next step (or the start).
        let mut expected_prev = path.iter().skip(1).map(|s| s.node).chain(std::iter::once(start));
        for step in &path {
            let node = graph.node(step.node).expect("node");
            assert_eq!(node.link(step.arrival_side), expected_prev.next());
        }
    }

    #[test]
    fn test_search_avoids_heavy_nodes() {
        // A 2x2 block: two routes of equal length around the middle.
        let mut graph = grid_graph(&[(0, 0), (1, 0), (0, 1), (1, 1)], 100.0);
        let start = graph.find_closest_node(Vec3::new(10.0, 5.0, 0.0)).expect("start");
        let goal = graph.find_closest_node(Vec3::new(190.0, 195.0, 0.0)).expect("goal");
        let baseline = graph.search(start, goal).expect("path");
        for step in &baseline[1..] {
            graph.set_node_weight(step.node, 50.0);
        }
        let detour = graph.search(start, goal).expect("path");
        let shared = detour[1..]
            .iter()
            .filter(|s| baseline[1..].iter().any(|b| b.node == s.node))
            .count();
        assert!(baseline.len() > 1);
        assert_eq!(shared, 0);
    }
}

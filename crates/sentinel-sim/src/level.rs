//! Demo level: two rooms joined by a corridor.

use glam::{Vec2, Vec3};
use sentinel_ai::ArenaWorld;
use sentinel_nav::{NavigationGraph, PathSettings};

/// Room A spans x 0..1000, the corridor x 1000..1600 (y 400..600) and
/// room B x 1600..2600. Every room is fanned so that the corridor mouths
/// share vertices with the room floors.
const VERTICES: [[f32; 2]; 12] = [
    [0.0, 0.0],
    [1000.0, 0.0],
    [1000.0, 400.0],
    [1000.0, 600.0],
    [1000.0, 1000.0],
    [0.0, 1000.0],
    [1600.0, 400.0],
    [1600.0, 600.0],
    [1600.0, 0.0],
    [2600.0, 0.0],
    [2600.0, 1000.0],
    [1600.0, 1000.0],
];

const FACES: [[u32; 3]; 10] = [
    // room A
    [0, 1, 2],
    [0, 2, 3],
    [0, 3, 4],
    [0, 4, 5],
    // corridor
    [2, 6, 7],
    [2, 7, 3],
    // room B
    [9, 10, 11],
    [9, 11, 7],
    [9, 7, 6],
    [9, 6, 8],
];

const WALLS: [([f32; 2], [f32; 2]); 12] = [
    ([0.0, 0.0], [1000.0, 0.0]),
    ([1000.0, 0.0], [1000.0, 400.0]),
    ([1000.0, 600.0], [1000.0, 1000.0]),
    ([1000.0, 1000.0], [0.0, 1000.0]),
    ([0.0, 1000.0], [0.0, 0.0]),
    ([1000.0, 400.0], [1600.0, 400.0]),
    ([1000.0, 600.0], [1600.0, 600.0]),
    ([1600.0, 0.0], [2600.0, 0.0]),
    ([2600.0, 0.0], [2600.0, 1000.0]),
    ([2600.0, 1000.0], [1600.0, 1000.0]),
    ([1600.0, 1000.0], [1600.0, 600.0]),
    ([1600.0, 400.0], [1600.0, 0.0]),
];

/// Builds the navmesh of the demo level.
#[must_use]
pub fn navigation(settings: PathSettings) -> NavigationGraph {
    let vertices: Vec<Vec3> = VERTICES
        .iter()
        .map(|&[x, y]| Vec3::new(x, y, 0.0))
        .collect();
    NavigationGraph::from_mesh(&vertices, &FACES, settings)
}

/// Builds the demo level with its walls.
#[must_use]
pub fn arena(settings: PathSettings) -> ArenaWorld {
    WALLS.iter().fold(
        ArenaWorld::new().with_navigation(navigation(settings)),
        |world, &(a, b)| world.with_wall(Vec2::from(a), Vec2::from(b)),
    )
}

/// Route the target character runs, back and forth between the rooms.
#[must_use]
pub fn target_route() -> Vec<Vec3> {
    vec![
        Vec3::new(300.0, 500.0, 0.0),
        Vec3::new(1300.0, 500.0, 0.0),
        Vec3::new(2100.0, 500.0, 0.0),
        Vec3::new(2300.0, 850.0, 0.0),
        Vec3::new(1300.0, 500.0, 0.0),
        Vec3::new(500.0, 200.0, 0.0),
    ]
}

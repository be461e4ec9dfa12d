//! Fixtures for tests: small levels and ready-made NPCs.

use crate::actor::Actor;
use crate::config::AiConfig;
use crate::events::EventBus;
use crate::npc::{NpcAttackTypes, NpcCatalog, NpcInfo};
use crate::world::ArenaWorld;
use glam::Vec3;
use sentinel_common::ObjectId;
use sentinel_nav::{NavigationGraph, PathSettings};

/// One flat triangle around the origin, large enough for short chases.
#[must_use]
pub fn flat_triangle() -> NavigationGraph {
    let vertices = [
        Vec3::new(-1000.0, -1000.0, 0.0),
        Vec3::new(3000.0, -1000.0, 0.0),
        Vec3::new(1000.0, 3000.0, 0.0),
    ];
    NavigationGraph::from_mesh(&vertices, &[[0, 1, 2]], PathSettings::default())
}

/// Flat floor at z = 0 with no navmesh.
#[must_use]
pub fn flat_arena() -> ArenaWorld {
    ArenaWorld::new()
}

/// [`flat_triangle`] as a level.
#[must_use]
pub fn triangle_arena() -> ArenaWorld {
    ArenaWorld::new().with_navigation(flat_triangle())
}

/// Default stats with the given attack capabilities.
#[must_use]
pub fn npc_info(attack_types: NpcAttackTypes) -> NpcInfo {
    NpcInfo {
        attack_types,
        ..NpcInfo::default()
    }
}

/// Spawns a local NPC with default configuration and an empty catalog.
#[must_use]
pub fn spawn_actor(info: NpcInfo, position: Vec3, bus: &EventBus, seed: u64) -> Actor {
    Actor::spawn(
        ObjectId::new(),
        &info,
        &NpcCatalog::new(),
        &AiConfig::default(),
        bus.sender(),
        position,
        seed,
    )
}

//! Simulation session: the level, its NPCs and one scripted target.

use crate::level;
use anyhow::{Context, Result};
use fastrand::Rng;
use glam::Vec3;
use sentinel_ai::{
    ActorEvent, ActorManager, AiConfig, AiWorld, ArenaWorld, DamageKind, NpcCatalog, WorldObject,
};
use sentinel_common::{planar_direction, planar_distance, NpcTypeId, ObjectId};
use tracing::info;

const TARGET_SPEED: f32 = 250.0;
const TARGET_MAX_HP: f32 = 300.0;
const TARGET_RESPAWN: f32 = 3.0;
const TARGET_FIRE_INTERVAL: f32 = 0.6;
const TARGET_FIRE_RANGE: f32 = 1500.0;
const TARGET_DAMAGE: f32 = 9.0;

const MELEE_DAMAGE: f32 = 12.0;
const MELEE_REACH: f32 = 220.0;
const SHOT_DAMAGE: f32 = 6.0;
const SHOT_RANGE: f32 = 3000.0;
const SKILL_DAMAGE: f32 = 15.0;

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Ticks simulated
    pub ticks: u64,
    /// Melee swings started
    pub melee_attacks: u32,
    /// Shots fired
    pub shots: u32,
    /// Shots that hit the target
    pub shots_hit: u32,
    /// Skills cast
    pub skills: u32,
    /// NPC deaths
    pub npc_deaths: u32,
    /// Target deaths
    pub target_deaths: u32,
    /// Stuck teleports
    pub teleports: u32,
    /// Neglect signals
    pub neglects: u32,
    /// NPCs removed after dying
    pub removals: u32,
}

/// One running demo session.
pub struct Simulation {
    world: ArenaWorld,
    manager: ActorManager,
    target: ObjectId,
    target_hp: f32,
    route: Vec<Vec3>,
    route_index: usize,
    respawn_in: Option<f32>,
    fire_in: f32,
    rng: Rng,
    stats: SimStats,
}

impl Simulation {
    /// Builds the demo level and spawns its NPCs.
    pub fn new(config: AiConfig, catalog: NpcCatalog, seed: u64) -> Result<Self> {
        let world = level::arena(config.navigation);
        let mut manager = ActorManager::with_seed(config, catalog, seed);

        let spawns = [
            (1, Vec3::new(2200.0, 300.0, 0.0)),
            (1, Vec3::new(2200.0, 700.0, 0.0)),
            (2, Vec3::new(2450.0, 500.0, 0.0)),
            (3, Vec3::new(700.0, 850.0, 0.0)),
        ];
        for (npc, position) in spawns {
            manager
                .spawn(NpcTypeId::new(npc), position)
                .with_context(|| format!("spawning NPC type {npc}"))?;
        }

        let route = level::target_route();
        let start = route.first().copied().unwrap_or(Vec3::ZERO);
        let target = ObjectId::new();
        let mut sim = Self {
            world,
            manager,
            target,
            target_hp: TARGET_MAX_HP,
            route,
            route_index: 1,
            respawn_in: None,
            fire_in: TARGET_FIRE_INTERVAL,
            rng: Rng::with_seed(seed ^ 0x5eed),
            stats: SimStats::default(),
        };
        sim.world.upsert(WorldObject::player(target, start));
        info!(npcs = sim.manager.len(), target = %target, "Session ready");
        Ok(sim)
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> SimStats {
        self.stats
    }

    /// NPCs still in the session.
    #[must_use]
    pub fn npc_count(&self) -> usize {
        self.manager.len()
    }

    /// Advances the session by one fixed step.
    pub fn tick(&mut self, dt: f32) {
        self.stats.ticks += 1;
        self.move_target(dt);
        self.manager.update(dt, &self.world);
        self.handle_events();
        self.target_fires(dt);
    }

    fn move_target(&mut self, dt: f32) {
        if let Some(remaining) = self.respawn_in.as_mut() {
            *remaining -= dt;
            if *remaining > 0.0 {
                return;
            }
            self.respawn_in = None;
            self.target_hp = TARGET_MAX_HP;
            let start = self.route.first().copied().unwrap_or(Vec3::ZERO);
            self.route_index = 1;
            if let Some(target) = self.world.object_mut(self.target) {
                target.dead = false;
                target.position = start;
            }
            info!("Target respawned");
            return;
        }

        let Some(goal) = self.route.get(self.route_index).copied() else {
            return;
        };
        let Some(target) = self.world.object_mut(self.target) else {
            return;
        };
        let step = TARGET_SPEED * dt;
        let remaining = planar_distance(target.position, goal);
        match planar_direction(goal - target.position) {
            Some(dir) if remaining > step => {
                target.position += dir * step;
                target.velocity = dir * TARGET_SPEED;
                target.direction = dir;
            },
            _ => {
                target.position = goal;
                target.velocity = Vec3::ZERO;
                self.route_index = (self.route_index + 1) % self.route.len().max(1);
            },
        }
    }

    fn handle_events(&mut self) {
        for event in self.manager.drain_events() {
            match event {
                ActorEvent::MeleeAttack {
                    actor, position, ..
                } => {
                    self.stats.melee_attacks += 1;
                    let in_reach = self
                        .world
                        .object(self.target)
                        .is_some_and(|t| planar_distance(t.position, position) <= MELEE_REACH);
                    if in_reach {
                        self.damage_target(actor, MELEE_DAMAGE);
                    }
                },
                ActorEvent::RangeShot {
                    actor,
                    origin,
                    direction,
                } => {
                    self.stats.shots += 1;
                    let hit = self.world.pick(origin, direction, SHOT_RANGE, actor);
                    if hit.is_some_and(|hit| hit.object == Some(self.target)) {
                        self.stats.shots_hit += 1;
                        self.damage_target(actor, SHOT_DAMAGE);
                    }
                },
                ActorEvent::SkillCast {
                    actor,
                    skill,
                    target,
                    ..
                } => {
                    self.stats.skills += 1;
                    info!(actor = %actor, skill = skill.raw(), ?target, "Skill cast");
                    if target == Some(self.target) {
                        self.damage_target(actor, SKILL_DAMAGE);
                    }
                },
                ActorEvent::Died { actor, killer } => {
                    self.stats.npc_deaths += 1;
                    info!(actor = %actor, ?killer, "NPC died");
                },
                ActorEvent::RemovalRequested { actor, .. } => {
                    self.stats.removals += 1;
                    self.manager.remove(actor);
                },
                ActorEvent::Neglect { actor, variant } => {
                    self.stats.neglects += 1;
                    info!(actor = %actor, variant, "NPC idle");
                },
                ActorEvent::Teleported { actor, from, to } => {
                    self.stats.teleports += 1;
                    info!(actor = %actor, ?from, ?to, "NPC unstuck by teleport");
                },
                ActorEvent::Landed { .. }
                | ActorEvent::BasicInfo { .. }
                | ActorEvent::TaskFinished { .. } => {},
            }
        }
    }

    fn damage_target(&mut self, attacker: ObjectId, amount: f32) {
        if self.respawn_in.is_some() {
            return;
        }
        self.target_hp -= amount;
        if self.target_hp > 0.0 {
            return;
        }
        self.stats.target_deaths += 1;
        self.respawn_in = Some(TARGET_RESPAWN);
        if let Some(target) = self.world.object_mut(self.target) {
            target.dead = true;
            target.velocity = Vec3::ZERO;
        }
        info!(killer = %attacker, "Target died");
    }

    /// The target shoots the nearest living NPC in range now and then.
    fn target_fires(&mut self, dt: f32) {
        if self.respawn_in.is_some() {
            return;
        }
        self.fire_in -= dt;
        if self.fire_in > 0.0 {
            return;
        }
        self.fire_in = TARGET_FIRE_INTERVAL * (0.75 + 0.5 * self.rng.f32());

        let Some(origin) = self.world.object(self.target).map(|t| t.position) else {
            return;
        };
        let victim = self
            .manager
            .snapshots()
            .into_iter()
            .filter(|npc| !npc.dead)
            .map(|npc| (npc.id, planar_distance(npc.position, origin)))
            .filter(|(_, d)| *d <= TARGET_FIRE_RANGE)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id);
        if let Some(actor) = victim.and_then(|id| self.manager.get_mut(id)) {
            actor.on_damaged(Some(self.target), TARGET_DAMAGE, DamageKind::Bullet);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = include_str!("../assets/npcs.ron");

    fn simulation(seed: u64) -> Simulation {
        let catalog = NpcCatalog::from_ron_str(CATALOG).expect("catalog");
        Simulation::new(AiConfig::default(), catalog, seed).expect("session")
    }

    #[test]
    fn test_session_spawns_demo_npcs() {
        let sim = simulation(1);
        assert_eq!(sim.npc_count(), 4);
        assert_eq!(sim.stats(), SimStats::default());
    }

    #[test]
    fn test_missing_npc_type_fails() {
        assert!(Simulation::new(AiConfig::default(), NpcCatalog::new(), 1).is_err());
    }

    #[test]
    fn test_npcs_engage_target() {
        let mut sim = simulation(2);
        for _ in 0..(30 * 60) {
            sim.tick(1.0 / 60.0);
        }
        let stats = sim.stats();
        assert_eq!(stats.ticks, 30 * 60);
        assert!(stats.melee_attacks + stats.shots + stats.skills > 0, "{stats:?}");
    }
}

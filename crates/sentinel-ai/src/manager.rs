//! Actor storage and the per-tick update pass.

use crate::actor::Actor;
use crate::config::AiConfig;
use crate::events::{ActorEvent, EventBus};
use crate::npc::NpcCatalog;
use crate::world::{pick_among, AiWorld, PickHit, WorldObject};
use ahash::AHashMap;
use fastrand::Rng;
use glam::Vec3;
use sentinel_common::{ContentError, NpcTypeId, ObjectId};
use sentinel_nav::NavigationGraph;
use tracing::{debug, info};

/// The session's world plus a snapshot of every managed actor.
///
/// Actors query this during the update pass, so each of them sees the
/// others as they were at the start of the tick.
struct SessionView<'a> {
    base: &'a dyn AiWorld,
    objects: Vec<WorldObject>,
    first_actor: usize,
}

impl AiWorld for SessionView<'_> {
    fn objects(&self) -> &[WorldObject] {
        &self.objects
    }

    fn navigation(&self) -> Option<&NavigationGraph> {
        self.base.navigation()
    }

    fn pick(&self, origin: Vec3, dir: Vec3, range: f32, ignore: ObjectId) -> Option<PickHit> {
        let base = self.base.pick(origin, dir, range, ignore);
        let reach = base.map_or(range, |hit| hit.position.distance(origin));
        let actors = self.objects.get(self.first_actor..).unwrap_or_default();
        pick_among(actors, &[], origin, dir, reach, ignore).or(base)
    }

    fn check_wall(&self, from: Vec3, to: Vec3) -> bool {
        self.base.check_wall(from, to)
    }

    fn floor_height(&self, position: Vec3) -> Option<f32> {
        self.base.floor_height(position)
    }

    fn is_attackable(&self, attacker: &WorldObject, target: &WorldObject) -> bool {
        self.base.is_attackable(attacker, target)
    }

    fn is_quest_mode(&self) -> bool {
        self.base.is_quest_mode()
    }
}

/// Owns every NPC of a session.
#[derive(Debug)]
pub struct ActorManager {
    actors: AHashMap<ObjectId, Actor>,
    config: AiConfig,
    catalog: NpcCatalog,
    bus: EventBus,
    rng: Rng,
}

impl ActorManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(config: AiConfig, catalog: NpcCatalog) -> Self {
        Self::with_seed(config, catalog, fastrand::u64(..))
    }

    /// Creates an empty manager whose spawns are seeded from `seed`.
    #[must_use]
    pub fn with_seed(config: AiConfig, catalog: NpcCatalog, seed: u64) -> Self {
        Self {
            actors: AHashMap::new(),
            config,
            catalog,
            bus: EventBus::default(),
            rng: Rng::with_seed(seed),
        }
    }

    /// Spawns an NPC of a catalog type.
    pub fn spawn(&mut self, npc: NpcTypeId, position: Vec3) -> Result<ObjectId, ContentError> {
        let info = self.catalog.npc(npc).ok_or(ContentError::MissingNpc(npc))?;
        let id = ObjectId::new();
        let actor = Actor::spawn(
            id,
            info,
            &self.catalog,
            &self.config,
            self.bus.sender(),
            position,
            self.rng.u64(..),
        );
        self.actors.insert(id, actor);
        info!(actor = %id, npc = npc.raw(), ?position, "Spawned NPC");
        Ok(id)
    }

    /// Adds an already constructed actor, replacing any with the same id.
    pub fn insert(&mut self, actor: Actor) {
        self.actors.insert(actor.id(), actor);
    }

    /// Removes an actor.
    pub fn remove(&mut self, id: ObjectId) -> Option<Actor> {
        let actor = self.actors.remove(&id);
        if actor.is_some() {
            debug!(actor = %id, "Removed NPC");
        }
        actor
    }

    /// Looks up an actor.
    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    /// Mutable access to an actor.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    /// Number of actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Returns true if there are no actors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Iterates over the actors in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    /// Actor ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.actors.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Content the actors were spawned from.
    #[must_use]
    pub const fn catalog(&self) -> &NpcCatalog {
        &self.catalog
    }

    /// Event bus the actors publish on.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Drains pending actor events.
    pub fn drain_events(&self) -> Vec<ActorEvent> {
        self.bus.drain()
    }

    /// Snapshots of every actor, as other characters see them.
    #[must_use]
    pub fn snapshots(&self) -> Vec<WorldObject> {
        self.ids()
            .into_iter()
            .filter_map(|id| self.actors.get(&id))
            .map(|actor| actor.body().snapshot())
            .collect()
    }

    /// Ticks every actor once, in id order.
    pub fn update(&mut self, dt: f32, world: &dyn AiWorld) {
        let mut objects = world.objects().to_vec();
        let first_actor = objects.len();
        objects.extend(self.snapshots());
        let view = SessionView {
            base: world,
            objects,
            first_actor,
        };
        for id in self.ids() {
            if let Some(actor) = self.actors.get_mut(&id) {
                actor.on_update(dt, &view);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npc::{NpcAttackTypes, NpcInfo};
    use crate::testing::triangle_arena;

    const DT: f32 = 1.0 / 60.0;

    fn catalog() -> NpcCatalog {
        let mut catalog = NpcCatalog::new();
        catalog.insert_npc(NpcInfo {
            id: NpcTypeId::new(1),
            attack_types: NpcAttackTypes::MELEE,
            ..NpcInfo::default()
        });
        catalog
    }

    #[test]
    fn test_spawn_unknown_type_fails() {
        let mut manager = ActorManager::with_seed(AiConfig::default(), catalog(), 1);
        assert_eq!(
            manager.spawn(NpcTypeId::new(9), Vec3::ZERO),
            Err(ContentError::MissingNpc(NpcTypeId::new(9)))
        );
        assert!(manager.is_empty());
    }

    #[test]
    fn test_actors_see_each_other() {
        let mut manager = ActorManager::with_seed(AiConfig::default(), catalog(), 1);
        let left = manager
            .spawn(NpcTypeId::new(1), Vec3::new(-300.0, 0.0, 0.0))
            .expect("spawn");
        let right = manager
            .spawn(NpcTypeId::new(1), Vec3::new(300.0, 0.0, 0.0))
            .expect("spawn");
        if let Some(actor) = manager.remove(right) {
            manager.insert(actor.with_team(2));
        }
        let world = triangle_arena();
        manager.update(DT, &world);

        let target_of = |id| manager.get(id).and_then(Actor::brain).and_then(|b| b.target());
        assert_eq!(target_of(left), Some(right));
        assert_eq!(target_of(right), Some(left));
    }

    #[test]
    fn test_update_publishes_and_removes() {
        let mut manager = ActorManager::with_seed(AiConfig::default(), catalog(), 3);
        let id = manager.spawn(NpcTypeId::new(1), Vec3::ZERO).expect("spawn");
        let world = triangle_arena();
        for _ in 0..30 {
            manager.update(DT, &world);
        }
        let events = manager.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, ActorEvent::BasicInfo { actor, .. } if *actor == id)));
        assert_eq!(manager.ids(), vec![id]);
        assert!(manager.remove(id).is_some());
        assert!(manager.remove(id).is_none());
    }

    #[test]
    fn test_session_pick_hits_actor() {
        let mut manager = ActorManager::with_seed(AiConfig::default(), catalog(), 5);
        let id = manager
            .spawn(NpcTypeId::new(1), Vec3::new(500.0, 0.0, 0.0))
            .expect("spawn");
        let world = triangle_arena();
        let view = SessionView {
            base: &world,
            objects: manager.snapshots(),
            first_actor: 0,
        };
        let hit = view
            .pick(Vec3::new(0.0, 0.0, 50.0), Vec3::X, 1000.0, ObjectId::NULL)
            .expect("hit");
        assert_eq!(hit.object, Some(id));
        assert!((hit.position.x - 465.0).abs() < 1e-2);
    }
}

//! World queries the decision loop depends on.
//!
//! The brain never reaches for global state; the session hands it an
//! [`AiWorld`] each tick. [`ArenaWorld`] is a small self-contained
//! implementation used by the simulator and the tests.

use glam::{Vec2, Vec3};
use sentinel_common::{planar, planar_distance_squared, segment_intersection, ObjectId};
use sentinel_nav::NavigationGraph;
use serde::{Deserialize, Serialize};

/// Kind of world object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Player character
    #[default]
    Player,
    /// Non-player character
    Npc,
}

/// A character as seen by the decision loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldObject {
    /// Object identifier
    pub id: ObjectId,
    /// Player or NPC
    pub kind: ObjectKind,
    /// Team; objects on different teams are hostile
    pub team: u8,
    /// Feet position
    pub position: Vec3,
    /// Velocity
    pub velocity: Vec3,
    /// Facing
    pub direction: Vec3,
    /// Collision cylinder radius
    pub radius: f32,
    /// Collision cylinder height
    pub height: f32,
    /// Dead characters are never targeted
    pub dead: bool,
    /// Scripted immunity from targeting
    pub excepted_from_targeting: bool,
}

impl WorldObject {
    /// A living player on team 0.
    #[must_use]
    pub fn player(id: ObjectId, position: Vec3) -> Self {
        Self {
            id,
            kind: ObjectKind::Player,
            team: 0,
            position,
            velocity: Vec3::ZERO,
            direction: Vec3::X,
            radius: 35.0,
            height: 180.0,
            dead: false,
            excepted_from_targeting: false,
        }
    }

    /// A living NPC on team 1.
    #[must_use]
    pub fn npc(id: ObjectId, position: Vec3) -> Self {
        Self {
            kind: ObjectKind::Npc,
            team: 1,
            ..Self::player(id, position)
        }
    }

    /// Sets the team.
    #[must_use]
    pub const fn with_team(mut self, team: u8) -> Self {
        self.team = team;
        self
    }

    /// Sets the collision cylinder.
    #[must_use]
    pub const fn with_size(mut self, radius: f32, height: f32) -> Self {
        self.radius = radius;
        self.height = height;
        self
    }

    /// Checks if this is an NPC.
    #[must_use]
    pub const fn is_npc(&self) -> bool {
        matches!(self.kind, ObjectKind::Npc)
    }

    /// Distance along a ray at which it enters this object's cylinder.
    ///
    /// `dir` must be normalized. Returns `None` when the ray misses within `range`.
    #[must_use]
    pub fn ray_hit(&self, origin: Vec3, dir: Vec3, range: f32) -> Option<f32> {
        let to = planar(self.position - origin);
        let flat = planar(dir);
        let flat_len_sq = flat.length_squared();
        let t = if flat_len_sq > f32::EPSILON {
            let along = to.dot(flat) / flat_len_sq;
            let closest = flat * along;
            let offset_sq = (to - closest).length_squared();
            if offset_sq > self.radius * self.radius {
                return None;
            }
            let back = ((self.radius * self.radius - offset_sq) / flat_len_sq).sqrt();
            if along + back < 0.0 {
                return None;
            }
            (along - back).max(0.0)
        } else if to.length_squared() <= self.radius * self.radius {
            0.0
        } else {
            return None;
        };
        if t > range {
            return None;
        }
        let z = origin.z + dir.z * t;
        (z >= self.position.z && z <= self.position.z + self.height).then_some(t)
    }
}

/// Result of a pick query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    /// Object hit, or `None` for level geometry
    pub object: Option<ObjectId>,
    /// Hit position
    pub position: Vec3,
}

/// Queries the brain and the actor make against the surrounding world.
pub trait AiWorld {
    /// Every character, living or dead.
    fn objects(&self) -> &[WorldObject];

    /// Looks up a character.
    fn object(&self, id: ObjectId) -> Option<&WorldObject> {
        self.objects().iter().find(|o| o.id == id)
    }

    /// Navigation mesh of the level, if any.
    fn navigation(&self) -> Option<&NavigationGraph>;

    /// Casts a ray, ignoring `ignore`. `dir` must be normalized.
    fn pick(&self, origin: Vec3, dir: Vec3, range: f32, ignore: ObjectId) -> Option<PickHit>;

    /// True when level geometry blocks the straight line `from -> to`.
    fn check_wall(&self, from: Vec3, to: Vec3) -> bool;

    /// Floor height below `position`.
    fn floor_height(&self, position: Vec3) -> Option<f32>;

    /// True when `attacker` may attack `target`.
    fn is_attackable(&self, attacker: &WorldObject, target: &WorldObject) -> bool {
        attacker.team != target.team && !target.dead
    }

    /// Anti-stuck recovery only runs in quest (PvE) sessions.
    fn is_quest_mode(&self) -> bool {
        true
    }
}

/// Nearest hit of a ray against `objects` and wall segments.
pub(crate) fn pick_among<'a>(
    objects: impl IntoIterator<Item = &'a WorldObject>,
    walls: &[(Vec2, Vec2)],
    origin: Vec3,
    dir: Vec3,
    range: f32,
    ignore: ObjectId,
) -> Option<PickHit> {
    let end = origin + dir * range;
    let wall = walls
        .iter()
        .filter_map(|&(a, b)| segment_intersection(planar(origin), planar(end), a, b))
        .map(|(t, _)| t * range)
        .min_by(f32::total_cmp)
        .map(|t| (t, None));
    let object = objects
        .into_iter()
        .filter(|o| o.id != ignore && !o.dead)
        .filter_map(|o| o.ray_hit(origin, dir, range).map(|t| (t, Some(o.id))))
        .min_by(|a, b| a.0.total_cmp(&b.0));
    let (t, object) = match (wall, object) {
        (Some(w), Some(o)) => {
            if o.0 <= w.0 {
                o
            } else {
                w
            }
        },
        (hit, None) | (None, hit) => hit?,
    };
    Some(PickHit {
        object,
        position: origin + dir * t,
    })
}

/// A flat or navmesh-floored level with wall segments and a character list.
#[derive(Debug, Default)]
pub struct ArenaWorld {
    objects: Vec<WorldObject>,
    navigation: Option<NavigationGraph>,
    walls: Vec<(Vec2, Vec2)>,
    floor: f32,
    pvp: bool,
}

impl ArenaWorld {
    /// Creates an empty arena with a flat floor at z = 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the navigation mesh; it also provides the floor height.
    #[must_use]
    pub fn with_navigation(mut self, graph: NavigationGraph) -> Self {
        self.navigation = Some(graph);
        self
    }

    /// Adds an infinitely tall wall along `a -> b`.
    #[must_use]
    pub fn with_wall(mut self, a: Vec2, b: Vec2) -> Self {
        self.walls.push((a, b));
        self
    }

    /// Sets the flat floor height used where no navmesh covers a point.
    #[must_use]
    pub const fn with_floor(mut self, floor: f32) -> Self {
        self.floor = floor;
        self
    }

    /// Marks the arena as a PvP session (no stuck recovery).
    #[must_use]
    pub const fn with_pvp(mut self, pvp: bool) -> Self {
        self.pvp = pvp;
        self
    }

    /// Adds (or replaces) a character.
    pub fn upsert(&mut self, object: WorldObject) {
        match self.objects.iter_mut().find(|o| o.id == object.id) {
            Some(slot) => *slot = object,
            None => self.objects.push(object),
        }
    }

    /// Mutable access to a character.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut WorldObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    /// Removes a character.
    pub fn remove(&mut self, id: ObjectId) -> Option<WorldObject> {
        let index = self.objects.iter().position(|o| o.id == id)?;
        Some(self.objects.remove(index))
    }

    /// Wall segments.
    #[must_use]
    pub fn walls(&self) -> &[(Vec2, Vec2)] {
        &self.walls
    }

    /// Living characters closest to `point` first.
    #[must_use]
    pub fn nearest_living(&self, point: Vec3) -> Vec<&WorldObject> {
        let mut living: Vec<_> = self.objects.iter().filter(|o| !o.dead).collect();
        living.sort_by(|a, b| {
            planar_distance_squared(a.position, point)
                .total_cmp(&planar_distance_squared(b.position, point))
        });
        living
    }
}

impl AiWorld for ArenaWorld {
    fn objects(&self) -> &[WorldObject] {
        &self.objects
    }

    fn navigation(&self) -> Option<&NavigationGraph> {
        self.navigation.as_ref()
    }

    fn pick(&self, origin: Vec3, dir: Vec3, range: f32, ignore: ObjectId) -> Option<PickHit> {
        pick_among(&self.objects, &self.walls, origin, dir, range, ignore)
    }

    fn check_wall(&self, from: Vec3, to: Vec3) -> bool {
        self.walls
            .iter()
            .any(|&(a, b)| segment_intersection(planar(from), planar(to), a, b).is_some())
    }

    fn floor_height(&self, position: Vec3) -> Option<f32> {
        let Some(graph) = &self.navigation else {
            return Some(self.floor);
        };
        match graph.find_closest_node(position).and_then(|id| graph.node(id)) {
            Some(node) => Some(node.height_at(position.x, position.y)),
            None => Some(self.floor),
        }
    }

    fn is_quest_mode(&self) -> bool {
        !self.pvp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> (ArenaWorld, ObjectId, ObjectId) {
        let npc = ObjectId::new();
        let player = ObjectId::new();
        let mut world = ArenaWorld::new().with_wall(Vec2::new(500.0, -100.0), Vec2::new(500.0, 100.0));
        world.upsert(WorldObject::npc(npc, Vec3::ZERO));
        world.upsert(WorldObject::player(player, Vec3::new(300.0, 0.0, 0.0)));
        (world, npc, player)
    }

    #[test]
    fn test_pick_hits_nearest_object() {
        let (world, npc, player) = arena();
        let hit = world
            .pick(Vec3::new(0.0, 0.0, 50.0), Vec3::X, 1000.0, npc)
            .expect("hit");
        assert_eq!(hit.object, Some(player));
        assert!((hit.position.x - 265.0).abs() < 0.5);
    }

    #[test]
    fn test_pick_stops_at_wall() {
        let (mut world, npc, player) = arena();
        if let Some(p) = world.object_mut(player) {
            p.position = Vec3::new(700.0, 0.0, 0.0);
        }
        let hit = world
            .pick(Vec3::new(0.0, 0.0, 50.0), Vec3::X, 1000.0, npc)
            .expect("hit");
        assert_eq!(hit.object, None);
        assert!((hit.position.x - 500.0).abs() < 0.5);
        assert!(world.check_wall(Vec3::ZERO, Vec3::new(700.0, 0.0, 0.0)));
        assert!(!world.check_wall(Vec3::ZERO, Vec3::new(400.0, 0.0, 0.0)));
    }

    #[test]
    fn test_pick_over_head_misses() {
        let (world, npc, _) = arena();
        let hit = world.pick(Vec3::new(0.0, 0.0, 400.0), Vec3::X, 450.0, npc);
        assert!(hit.is_none());
    }

    #[test]
    fn test_default_attackable_by_team() {
        let (world, npc, player) = arena();
        let a = world.object(npc).expect("npc");
        let b = world.object(player).expect("player");
        assert!(world.is_attackable(a, b));
        assert!(!world.is_attackable(a, a));
    }

    #[test]
    fn test_flat_floor_without_navmesh() {
        let world = ArenaWorld::new().with_floor(12.0);
        assert_eq!(world.floor_height(Vec3::new(1.0, 2.0, 300.0)), Some(12.0));
        assert!(world.is_quest_mode());
        assert!(!ArenaWorld::new().with_pvp(true).is_quest_mode());
    }
}

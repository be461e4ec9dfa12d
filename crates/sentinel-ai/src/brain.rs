//! Per-NPC decision loop.
//!
//! Once per tick the brain picks the nearest hostile target, keeps the
//! behavior state machine informed, rebuilds the route on its path timer,
//! decides on attacks and watches for the actor getting stuck. Every world
//! query that misses degrades to doing nothing this tick.

use crate::actor::ActorBody;
use crate::animation::AnimInput;
use crate::behavior::{BehaviorContext, BehaviorInput, BehaviorStateId};
use crate::config::{AiConfig, BrainSettings, StuckSettings};
use crate::events::ActorEvent;
use crate::npc::{GlobalAiValues, NpcAttackTypes, NpcInfo, OffenseType, SkillTarget};
use crate::task::{Task, TaskKind};
use crate::timer::{jitter, random_range, Jitter, UpdateTimer};
use crate::world::{AiWorld, WorldObject};
use fastrand::Rng;
use glam::Vec3;
use sentinel_common::{
    perpendicular, planar_direction, planar_distance, planar_distance_squared, rotate_z, ObjectId,
    SkillId,
};
use sentinel_nav::NavigationGraph;
use std::f32::consts::{FRAC_PI_2, TAU};
use tracing::{debug, info, trace};

/// Squared engagement bands, jittered once per brain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceBands {
    /// Friendly NPCs inside this stop moving
    pub forced_in_sq: f32,
    /// Ranged NPCs inside this stop moving
    pub in_sq: f32,
    /// Targets beyond this are out of range
    pub out_sq: f32,
}

impl DistanceBands {
    fn roll(settings: &BrainSettings, rng: &mut Rng) -> Self {
        let ratio = settings.distance_shaking_ratio;
        let mut squared = |base: f32| {
            let d = jitter(rng, base, ratio);
            d * d
        };
        Self {
            forced_in_sq: squared(settings.forced_in_distance),
            in_sq: squared(settings.in_distance),
            out_sq: squared(settings.out_distance),
        }
    }
}

/// Position sampled at the start of a stuck-detection window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct StuckProbe {
    origin: Option<Vec3>,
    elapsed: f32,
}

impl StuckProbe {
    /// Returns the window's start position once `window` has elapsed, then
    /// restarts the window at `position`.
    fn sample(&mut self, dt: f32, window: f32, position: Vec3) -> Option<Vec3> {
        let Some(origin) = self.origin else {
            self.origin = Some(position);
            self.elapsed = 0.0;
            return None;
        };
        self.elapsed += dt;
        if self.elapsed < window {
            return None;
        }
        self.origin = Some(position);
        self.elapsed = 0.0;
        Some(origin)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A skill the brain decided to cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkillChoice {
    /// Skill to cast
    pub skill: SkillId,
    /// Object the skill is aimed at
    pub target: Option<ObjectId>,
    /// Where the skill lands
    pub position: Vec3,
}

/// Decision state of one NPC.
#[derive(Debug)]
pub struct Brain {
    rng: Rng,
    settings: BrainSettings,
    stuck: StuckSettings,
    target: Option<ObjectId>,
    path_timer: UpdateTimer,
    attack_timer: UpdateTimer,
    /// `None` when the NPC type has no default-attack cooldown
    default_attack_timer: Option<UpdateTimer>,
    no_skill_grace: f32,
    neglect_elapsed: f32,
    bands: DistanceBands,
    short_probe: StuckProbe,
    long_probe: StuckProbe,
    low_health_fired: bool,
    out_of_range: bool,
    patrol_index: usize,
}

impl Brain {
    /// Creates a brain with a randomly seeded generator.
    #[must_use]
    pub fn new(info: &NpcInfo, global: &GlobalAiValues, config: &AiConfig) -> Self {
        Self::with_seed(info, global, config, fastrand::u64(..))
    }

    /// Creates a brain whose rolls are fully determined by `seed`.
    #[must_use]
    pub fn with_seed(info: &NpcInfo, global: &GlobalAiValues, config: &AiConfig, seed: u64) -> Self {
        let mut rng = Rng::with_seed(seed);
        let settings = config.brain;

        let mut path_timer = UpdateTimer::jittered(
            Jitter::new(
                global.path_finding_update_time(info.intelligence),
                global.path_finding_shaking_ratio,
            ),
            &mut rng,
        );
        path_timer.force();
        let attack_timer = UpdateTimer::jittered(
            Jitter::new(global.attack_update_time(info.agility), global.attack_shaking_ratio),
            &mut rng,
        );
        let default_attack_timer = if info.attack_cool_time > 0.0 {
            Some(UpdateTimer::jittered(
                Jitter::new(info.attack_cool_time, settings.default_attack_shaking_ratio)
                    .with_floor(settings.default_attack_min_cooldown),
                &mut rng,
            ))
        } else {
            None
        };
        let no_skill_grace =
            random_range(&mut rng, settings.no_skill_grace_min, settings.no_skill_grace_max);
        let bands = DistanceBands::roll(&settings, &mut rng);

        Self {
            rng,
            settings,
            stuck: config.stuck,
            target: None,
            path_timer,
            attack_timer,
            default_attack_timer,
            no_skill_grace,
            neglect_elapsed: 0.0,
            bands,
            short_probe: StuckProbe::default(),
            long_probe: StuckProbe::default(),
            low_health_fired: false,
            out_of_range: false,
            patrol_index: 0,
        }
    }

    /// Current target.
    #[must_use]
    pub const fn target(&self) -> Option<ObjectId> {
        self.target
    }

    /// Engagement bands.
    #[must_use]
    pub const fn bands(&self) -> DistanceBands {
        self.bands
    }

    /// Remaining time before skills may be considered.
    #[must_use]
    pub const fn no_skill_grace(&self) -> f32 {
        self.no_skill_grace
    }

    /// Path rebuild timer.
    #[must_use]
    pub const fn path_timer(&self) -> &UpdateTimer {
        &self.path_timer
    }

    /// One decision tick.
    pub fn think(&mut self, dt: f32, body: &mut ActorBody, world: &dyn AiWorld) {
        self.no_skill_grace = (self.no_skill_grace - dt).max(0.0);

        let had_target = self.target.is_some();
        self.target = self.find_target(body, world);
        match self.target.and_then(|id| world.object(id)) {
            Some(target) => {
                self.update_behavior(body, target);
                self.process_build_path(dt, body, world, Some(target));
                self.process_attack(dt, body, world, target);
            },
            None => {
                if had_target {
                    self.lose_target(body);
                }
                self.process_build_path(dt, body, world, None);
            },
        }

        let ctx = BehaviorContext {
            target_alive: self.target.is_some(),
            retreat_duration: self.settings.retreat_duration,
        };
        body.behavior_mut().run(dt, &ctx);
    }

    /// Called for every task the actor finished or cancelled.
    pub fn on_task_finished(&mut self, kind: TaskKind) {
        if kind.is_movement() && self.target.is_some() {
            self.path_timer.force();
        }
    }

    /// Called after the actor took damage.
    pub fn on_damaged(&mut self, body: &mut ActorBody, attacker: Option<ObjectId>) {
        trace!(actor = %body.id(), ?attacker, "Brain notified of damage");
        body.behavior_mut().input(BehaviorInput::Attacked);
    }

    /// Nearest living, targetable hostile.
    #[must_use]
    pub fn find_target(&self, body: &ActorBody, world: &dyn AiWorld) -> Option<ObjectId> {
        let me = body.snapshot();
        world
            .objects()
            .iter()
            .filter(|o| o.id != me.id && !o.dead && !o.excepted_from_targeting)
            .filter(|o| world.is_attackable(&me, o))
            .filter(|o| Self::check_enable_targetting(body, world, o))
            .map(|o| (o.id, o.position.distance_squared(me.position)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Melee-only NPCs cannot reach targets held up in the air.
    fn check_enable_targetting(body: &ActorBody, world: &dyn AiWorld, target: &WorldObject) -> bool {
        if !body.info().attack_types.is_melee_only() {
            return true;
        }
        let floor = world
            .floor_height(target.position)
            .unwrap_or(target.position.z);
        target.position.z - floor < body.height()
    }

    fn update_behavior(&mut self, body: &mut ActorBody, target: &WorldObject) {
        let d2 = planar_distance_squared(body.position(), target.position);
        if d2 > self.bands.out_sq {
            if !self.out_of_range {
                self.out_of_range = true;
                body.behavior_mut().input(BehaviorInput::TargetOutOfRange);
            }
        } else {
            self.out_of_range = false;
            body.behavior_mut().input(BehaviorInput::TargetFound);
        }

        if !self.low_health_fired && body.hp_ratio() < self.settings.low_health_ratio {
            self.low_health_fired = true;
            if body.behavior_mut().input(BehaviorInput::LowHealth) {
                debug!(actor = %body.id(), "NPC retreating on low health");
            }
        }
    }

    fn lose_target(&mut self, body: &mut ActorBody) {
        debug!(actor = %body.id(), "Target lost");
        body.clear_tasks();
        body.stop(true);
        self.out_of_range = false;
        self.short_probe.reset();
        self.long_probe.reset();
        self.neglect_elapsed = 0.0;
        Self::fire_neglect(body, 1);
        body.behavior_mut().input(BehaviorInput::TargetLost);
        if !body.patrol_route().is_empty() {
            body.behavior_mut().force_state(BehaviorStateId::Patrol);
        }
    }

    /// Advances the idle timeout. Runs every tick, thinking or not.
    pub fn update_neglect(&mut self, dt: f32, body: &mut ActorBody) {
        if !body.tasks().is_empty() {
            self.neglect_elapsed = 0.0;
            return;
        }
        self.neglect_elapsed += dt;
        if self.neglect_elapsed >= self.settings.neglect_timeout {
            self.neglect_elapsed = 0.0;
            Self::fire_neglect(body, 2);
        }
    }

    fn fire_neglect(body: &mut ActorBody, variant: u8) {
        let input = if variant == 1 {
            AnimInput::Neglect1
        } else {
            AnimInput::Neglect2
        };
        body.animation_mut().input(input);
        body.publish(ActorEvent::Neglect {
            actor: body.id(),
            variant,
        });
    }

    fn process_build_path(
        &mut self,
        dt: f32,
        body: &mut ActorBody,
        world: &dyn AiWorld,
        target: Option<&WorldObject>,
    ) {
        if world.is_quest_mode() && self.escape_from_stuck(dt, body, world) {
            return;
        }
        if !self.path_timer.update(dt, &mut self.rng) {
            return;
        }
        if body
            .tasks()
            .current_kind()
            .is_some_and(TaskKind::blocks_pathing)
        {
            return;
        }
        let Some(graph) = world.navigation() else {
            return;
        };

        let goal = match target {
            Some(target) if body.behavior().state() == BehaviorStateId::Retreat => {
                Some(self.flee_point(body, target))
            },
            Some(target) if !self.out_of_range => {
                if self.should_stop_and_shoot(body, world, target) {
                    body.clear_tasks();
                    body.stop(true);
                    return;
                }
                Some(target.position)
            },
            _ => self.patrol_goal(body),
        };
        let Some(goal) = goal else {
            return;
        };

        let Some(path) = graph.build_navigation_path(body.position(), goal) else {
            debug!(actor = %body.id(), ?goal, "No route to goal");
            body.behavior_mut().input(BehaviorInput::PathBlocked);
            return;
        };
        let path = self.adjust_waypoint_with_bound(body, graph, goal, path);
        trace!(actor = %body.id(), waypoints = path.len(), "Path rebuilt");
        body.set_path(path);
    }

    fn flee_point(&self, body: &ActorBody, target: &WorldObject) -> Vec3 {
        let away = planar_direction(body.position() - target.position)
            .unwrap_or(-body.direction());
        target.position + away * self.settings.flee_distance
    }

    fn patrol_goal(&mut self, body: &ActorBody) -> Option<Vec3> {
        if body.behavior().state() != BehaviorStateId::Patrol {
            return None;
        }
        let route = body.patrol_route();
        let mut point = *route.get(self.patrol_index % route.len().max(1))?;
        if planar_distance(body.position(), point) <= body.radius() {
            self.patrol_index = (self.patrol_index + 1) % route.len();
            point = *route.get(self.patrol_index)?;
        }
        Some(point)
    }

    /// Ranged and friendly NPCs hold position once inside their engagement band.
    ///
    /// Friendlies stop inside the jittered forced-in band. Ranged NPCs stop
    /// between the unjittered forced-in distance and the in band, and only
    /// near the target's height.
    #[must_use]
    pub fn should_stop_and_shoot(
        &self,
        body: &ActorBody,
        world: &dyn AiWorld,
        target: &WorldObject,
    ) -> bool {
        let info = body.info();
        let d2 = planar_distance_squared(body.position(), target.position);
        let stop = if info.friendly {
            d2 < self.bands.forced_in_sq
        } else if info.offense == OffenseType::Range {
            let forced_in = self.settings.forced_in_distance;
            let dz = (target.position.z - body.position().z).abs();
            d2 > forced_in * forced_in
                && d2 < self.bands.in_sq
                && dz < self.settings.range_height_band
        } else {
            false
        };
        stop && body.can_see(target.position) && Self::has_line_of_fire(body, world, target)
    }

    fn has_line_of_fire(body: &ActorBody, world: &dyn AiWorld, target: &WorldObject) -> bool {
        let origin = body.fire_origin();
        let aim = target.position + Vec3::Z * target.height * 0.5;
        let Some(dir) = (aim - origin).try_normalize() else {
            return true;
        };
        let range = origin.distance(aim) + target.radius;
        world
            .pick(origin, dir, range, body.id())
            .is_some_and(|hit| hit.object == Some(target.id))
    }

    fn process_attack(
        &mut self,
        dt: f32,
        body: &mut ActorBody,
        world: &dyn AiWorld,
        target: &WorldObject,
    ) {
        let fire_default = match self.default_attack_timer.as_mut() {
            Some(timer) => timer.update(dt, &mut self.rng),
            None => true,
        };
        let fire_attack = self.attack_timer.update(dt, &mut self.rng);

        if body.info().friendly || body.behavior().state() == BehaviorStateId::Retreat {
            return;
        }
        if !body.is_attackable() {
            return;
        }
        if body
            .tasks()
            .current_kind()
            .is_some_and(|kind| !kind.is_movement())
        {
            return;
        }

        let attack_types = body.info().attack_types;
        let d2 = planar_distance_squared(body.position(), target.position);

        if fire_default && attack_types.contains(NpcAttackTypes::MELEE) {
            let reach = body.info().attack_range + body.radius() + target.radius;
            let dz = (target.position.z - body.position().z).abs();
            let aim = target.position + Vec3::Z * target.height * 0.5;
            if d2 <= reach * reach && dz < body.height() && !world.check_wall(body.fire_origin(), aim) {
                body.face(target.position - body.position());
                if body.push_front_task(Task::attack_melee()) {
                    trace!(actor = %body.id(), target = %target.id, "Melee attack queued");
                }
                return;
            }
        }

        if fire_default
            && attack_types.contains(NpcAttackTypes::RANGE)
            && d2 <= self.bands.out_sq
            && Self::has_line_of_fire(body, world, target)
        {
            let dir = self.shot_direction(body, target);
            if body.push_front_task(Task::attack_range(dir)) {
                trace!(actor = %body.id(), target = %target.id, "Ranged attack queued");
            }
            return;
        }

        if fire_attack && attack_types.contains(NpcAttackTypes::MAGIC) && self.no_skill_grace <= 0.0 {
            if let Some(choice) = self.check_skill_usable(body, world, target) {
                body.push_front_task(Task::skill(choice.skill, choice.target, choice.position));
                body.push_front_task(Task::rotate_to_dir(choice.position - body.position()));
                trace!(actor = %body.id(), skill = choice.skill.raw(), "Skill queued");
            }
        }
    }

    /// Aim at the target's center, spread by a missed hit-rate roll.
    fn shot_direction(&mut self, body: &ActorBody, target: &WorldObject) -> Vec3 {
        let aim = target.position + Vec3::Z * target.height * 0.5;
        let dir = (aim - body.fire_origin())
            .try_normalize()
            .unwrap_or(body.direction());
        if self.rng.f32() < body.info().range_hit_rate {
            return dir;
        }
        let spread = random_range(&mut self.rng, 0.05, 0.2);
        rotate_z(dir, if self.rng.bool() { spread } else { -spread })
    }

    /// First ready skill with a valid target.
    #[must_use]
    pub fn check_skill_usable(
        &self,
        body: &ActorBody,
        world: &dyn AiWorld,
        target: &WorldObject,
    ) -> Option<SkillChoice> {
        let me = body.snapshot();
        for desc in body.skills().iter() {
            if !body.skills().is_ready(desc.id) {
                continue;
            }
            match desc.target {
                SkillTarget::Ally => {
                    let ally = world
                        .objects()
                        .iter()
                        .filter(|o| o.id != me.id && !o.dead && !world.is_attackable(&me, o))
                        .map(|o| (o, planar_distance(me.position, o.position)))
                        .filter(|(_, d)| *d <= desc.max_range)
                        .min_by(|a, b| a.1.total_cmp(&b.1))
                        .map(|(o, _)| o);
                    let (id, position) = ally.map_or((me.id, me.position), |o| (o.id, o.position));
                    return Some(SkillChoice {
                        skill: desc.id,
                        target: Some(id),
                        position,
                    });
                },
                SkillTarget::Enemy => {
                    let distance = planar_distance(me.position, target.position);
                    if body.skills().is_usable(desc.id, distance)
                        && Self::has_line_of_fire(body, world, target)
                    {
                        return Some(SkillChoice {
                            skill: desc.id,
                            target: Some(target.id),
                            position: target.position,
                        });
                    }
                },
            }
        }
        None
    }

    /// Runs both stuck cadences. Returns true when a recovery was issued.
    fn escape_from_stuck(&mut self, dt: f32, body: &mut ActorBody, world: &dyn AiWorld) -> bool {
        if !body.tasks().is_moving() {
            self.short_probe.reset();
            self.long_probe.reset();
            return false;
        }
        let position = body.position();

        if let Some(origin) = self.long_probe.sample(dt, self.stuck.long_window, position) {
            if planar_distance(origin, position) < self.stuck.threshold {
                self.teleport_out(body, world);
                self.short_probe.reset();
                self.long_probe.reset();
                return true;
            }
        }

        if let Some(origin) = self.short_probe.sample(dt, self.stuck.short_window, position) {
            if planar_distance(origin, position) >= self.stuck.threshold {
                body.behavior_mut().input(BehaviorInput::Unstuck);
            } else if body.locomotion().is_landed() {
                return self.local_detour(body, world);
            }
        }
        false
    }

    /// Replaces the route with one escape point beside the current heading.
    fn local_detour(&mut self, body: &mut ActorBody, world: &dyn AiWorld) -> bool {
        let Some(graph) = world.navigation() else {
            return false;
        };
        let heading = planar_direction(body.direction()).unwrap_or(Vec3::X);
        let angle = random_range(&mut self.rng, -FRAC_PI_2, FRAC_PI_2);
        let probe = body.position() + rotate_z(heading, angle) * body.radius() * self.stuck.escape_offset_ratio;
        let Some(escape) = graph
            .find_closest_node(probe)
            .and_then(|id| graph.node(id))
            .map(|node| node.center())
        else {
            return false;
        };
        debug!(actor = %body.id(), ?escape, "Stuck, detouring");
        body.set_path(vec![escape]);
        body.behavior_mut().input(BehaviorInput::Stuck);
        body.behavior_mut().note_escape_attempt();
        true
    }

    /// Moves the actor directly to a point around it.
    fn teleport_out(&mut self, body: &mut ActorBody, world: &dyn AiWorld) {
        let position = body.position();
        let radius = self.stuck.teleport_radius;
        let threshold = self.stuck.threshold;
        let attempts = self.stuck.teleport_attempts.max(1);
        let start = self.rng.f32() * TAU;
        let step = TAU / attempts as f32;
        let offset = |i: u32| rotate_z(Vec3::X, start + step * i as f32) * radius;

        let graph = world.navigation();
        let mut destination = (0..attempts)
            .map(|i| {
                let raw = position + offset(i);
                graph
                    .and_then(|g| g.snap_point_to_mesh(raw))
                    .map_or(raw, |(_, snapped)| snapped)
            })
            .find(|candidate| planar_distance(*candidate, position) > threshold)
            .unwrap_or_else(|| position + offset(0));

        let probe = destination + Vec3::Z * self.stuck.floor_probe_height;
        if let Some(floor) = world.floor_height(probe) {
            destination.z = floor;
        }
        info!(actor = %body.id(), ?position, ?destination, "Stuck, teleporting");
        body.behavior_mut().input(BehaviorInput::Stuck);
        body.behavior_mut().note_escape_attempt();
        body.teleport(destination);
    }

    /// Prepends a sidestep when the route hugs an obstacle on one side.
    ///
    /// Both shoulders of the actor are tried; if planning from one of them
    /// needs more waypoints than the direct route, the opposite shoulder goes
    /// first.
    fn adjust_waypoint_with_bound(
        &self,
        body: &ActorBody,
        graph: &NavigationGraph,
        goal: Vec3,
        path: Vec<Vec3>,
    ) -> Vec<Vec3> {
        let position = body.position();
        let Some(dir) = path.first().and_then(|first| planar_direction(*first - position)) else {
            return path;
        };
        let side = perpendicular(dir) * body.radius() * self.stuck.escape_offset_ratio;
        for sign in [1.0, -1.0] {
            let Some(shoulder_path) = graph.build_navigation_path(position + side * sign, goal) else {
                continue;
            };
            if shoulder_path.len() > path.len() {
                let opposite = position - side * sign;
                let step = graph
                    .snap_point_to_mesh(opposite)
                    .map_or(opposite, |(_, snapped)| snapped);
                let mut adjusted = Vec::with_capacity(path.len() + 1);
                adjusted.push(step);
                adjusted.extend(path);
                return adjusted;
            }
        }
        path
    }
}

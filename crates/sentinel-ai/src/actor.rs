//! NPC actors.
//!
//! An [`Actor`] owns its body state, both state machines, its task queue and
//! its [`Brain`]. The brain borrows the body mutably during `think`; nothing
//! else shares the body's mutable state.

use crate::animation::{AnimInput, AnimState, AnimationStateMachine};
use crate::behavior::BehaviorStateMachine;
use crate::brain::Brain;
use crate::config::{AiConfig, MovementSettings, SessionSettings};
use crate::events::ActorEvent;
use crate::locomotion::{rotate_toward, Locomotion, MotionEvents};
use crate::npc::{NpcCatalog, NpcInfo};
use crate::skills::SkillSet;
use crate::task::{Task, TaskKind, TaskQueue, TaskResult};
use crate::timer::{jitter, UpdateTimer};
use crate::world::{AiWorld, ObjectKind, WorldObject};
use crossbeam_channel::Sender;
use fastrand::Rng;
use glam::Vec3;
use sentinel_common::{
    cross2, flatten, perpendicular, planar, planar_angle_between, planar_direction, planar_distance,
    planar_length, ObjectId,
};
use tracing::{debug, info, trace};

/// Largest heading error at which a moving actor keeps running instead of turning in place.
const RUN_FACING_TOLERANCE: f32 = 0.35;

/// Fraction of the body height that shots and casts originate from.
const FIRE_HEIGHT_RATIO: f32 = 0.4;

/// How a hit was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageKind {
    /// Close-range hit
    Melee {
        /// Lightning-enchanted weapon
        lightning: bool,
    },
    /// Projectile hit
    Bullet,
    /// Skill effect
    Skill,
}

/// Everything about an actor except its brain.
#[derive(Debug)]
pub struct ActorBody {
    id: ObjectId,
    info: NpcInfo,
    team: u8,
    my_control: bool,
    position: Vec3,
    direction: Vec3,
    locomotion: Locomotion,
    animation: AnimationStateMachine,
    behavior: BehaviorStateMachine,
    tasks: TaskQueue,
    skills: SkillSet,
    hp: f32,
    dead: bool,
    dying_elapsed: f32,
    removal_requested: bool,
    last_attacker: Option<ObjectId>,
    melee_flip: bool,
    bullet_hits: u32,
    patrol_route: Vec<Vec3>,
    finished: Vec<TaskKind>,
    replication: UpdateTimer,
    movement: MovementSettings,
    session: SessionSettings,
    events: Sender<ActorEvent>,
    rng: Rng,
}

impl ActorBody {
    /// Object identifier.
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    /// Static NPC stats.
    #[must_use]
    pub const fn info(&self) -> &NpcInfo {
        &self.info
    }

    /// Team.
    #[must_use]
    pub const fn team(&self) -> u8 {
        self.team
    }

    /// True for locally simulated actors; false for replicated copies.
    #[must_use]
    pub const fn is_my_control(&self) -> bool {
        self.my_control
    }

    /// Feet position.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Moves the actor without physics (spawning, tests).
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Facing.
    #[must_use]
    pub const fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Faces along the planar part of `dir`.
    pub fn face(&mut self, dir: Vec3) {
        if let Some(dir) = planar_direction(dir) {
            self.direction = dir;
        }
    }

    /// Collision radius.
    #[must_use]
    pub const fn radius(&self) -> f32 {
        self.info.collision_radius
    }

    /// Collision height.
    #[must_use]
    pub const fn height(&self) -> f32 {
        self.info.collision_height
    }

    /// Movement state.
    #[must_use]
    pub const fn locomotion(&self) -> &Locomotion {
        &self.locomotion
    }

    /// Animation state machine.
    #[must_use]
    pub const fn animation(&self) -> &AnimationStateMachine {
        &self.animation
    }

    /// Mutable animation state machine.
    pub fn animation_mut(&mut self) -> &mut AnimationStateMachine {
        &mut self.animation
    }

    /// Behavior state machine.
    #[must_use]
    pub const fn behavior(&self) -> &BehaviorStateMachine {
        &self.behavior
    }

    /// Mutable behavior state machine.
    pub fn behavior_mut(&mut self) -> &mut BehaviorStateMachine {
        &mut self.behavior
    }

    /// Task queue.
    #[must_use]
    pub const fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    /// Skill slots.
    #[must_use]
    pub const fn skills(&self) -> &SkillSet {
        &self.skills
    }

    /// Current hit points.
    #[must_use]
    pub const fn hp(&self) -> f32 {
        self.hp
    }

    /// Hit points relative to the maximum.
    #[must_use]
    pub fn hp_ratio(&self) -> f32 {
        if self.info.max_hp <= 0.0 {
            return 0.0;
        }
        (self.hp / self.info.max_hp).clamp(0.0, 1.0)
    }

    /// Patrol waypoints, empty for stationary NPCs.
    #[must_use]
    pub fn patrol_route(&self) -> &[Vec3] {
        &self.patrol_route
    }

    /// Local actors report their flag; replicated ones read the Die animation.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        if self.my_control {
            self.dead
        } else {
            self.animation.state() == AnimState::Die
        }
    }

    /// Locally controlled, alive and not thrown around by a blast.
    #[must_use]
    pub fn is_think_able(&self) -> bool {
        self.my_control && !self.dead && !self.locomotion.is_blasted()
    }

    /// Attacks may start from the current animation.
    #[must_use]
    pub const fn is_attackable(&self) -> bool {
        self.animation.is_attackable()
    }

    /// True when `point` lies inside the view cone.
    #[must_use]
    pub fn can_see(&self, point: Vec3) -> bool {
        let to = point - self.position;
        planar_length(to) <= f32::EPSILON || planar_angle_between(self.direction, to) <= self.info.view_angle
    }

    /// Where shots and casts leave the body.
    #[must_use]
    pub fn fire_origin(&self) -> Vec3 {
        self.position + Vec3::Z * self.height() * FIRE_HEIGHT_RATIO
    }

    /// Distance at which a move task counts as arrived.
    #[must_use]
    pub fn arrive_distance(&self) -> f32 {
        (self.radius() * self.movement.arrive_ratio).max(self.movement.arrive_min)
    }

    /// This actor as other actors see it.
    #[must_use]
    pub fn snapshot(&self) -> WorldObject {
        WorldObject {
            id: self.id,
            kind: ObjectKind::Npc,
            team: self.team,
            position: self.position,
            velocity: self.locomotion.velocity(),
            direction: self.direction,
            radius: self.radius(),
            height: self.height(),
            dead: self.is_dead(),
            excepted_from_targeting: false,
        }
    }

    /// Drops the run order. `halt` also kills horizontal velocity.
    pub fn stop(&mut self, halt: bool) {
        self.locomotion.stop(halt);
        if halt {
            self.animation.input(AnimInput::WalkDone);
        }
    }

    /// Queues a task after the others. Returns false when the queue is full.
    pub fn push_back_task(&mut self, task: Task) -> bool {
        self.tasks.push_back(task)
    }

    /// Queues a task ahead of the current one. Returns false when the queue is full.
    pub fn push_front_task(&mut self, task: Task) -> bool {
        self.tasks.push_front(task)
    }

    /// Cancels every task. The current one is reported as finished.
    pub fn clear_tasks(&mut self) {
        let drained = self.tasks.clear();
        if let Some(current) = drained.first() {
            if current.kind().is_movement() {
                self.locomotion.stop(false);
            }
            self.finished.push(current.kind());
        }
    }

    /// Replaces the queue with a chain of moves through `waypoints`.
    ///
    /// The superseded tasks are not reported; a new route is not a finish.
    pub fn set_path(&mut self, waypoints: Vec<Vec3>) {
        let count = waypoints.len();
        let moves = waypoints
            .into_iter()
            .enumerate()
            .map(|(i, point)| Task::move_to_pos(point, i + 1 < count));
        self.tasks.replace(moves);
    }

    /// Moves the actor directly, dropping its velocity and tasks.
    pub fn teleport(&mut self, to: Vec3) {
        let from = self.position;
        self.position = to;
        self.locomotion.reset();
        self.clear_tasks();
        info!(actor = %self.id, ?from, ?to, "NPC teleported");
        self.publish(ActorEvent::Teleported {
            actor: self.id,
            from,
            to,
        });
    }

    /// Sends an event to the session. Events are dropped when the bus is full.
    pub fn publish(&self, event: ActorEvent) {
        let _ = self.events.try_send(event);
    }

    /// Applies replicated state to a remote copy.
    pub fn input_basic_info(&mut self, position: Vec3, velocity: Vec3, direction: Vec3, animation: u8) {
        self.position = position;
        self.locomotion.set_velocity(velocity);
        self.direction = direction;
        if !self.animation.force_state(animation) {
            debug!(actor = %self.id, animation, "Ignoring unknown replicated animation");
        }
    }

    fn on_damaged(&mut self, attacker: Option<ObjectId>, amount: f32, kind: DamageKind) {
        if self.dead {
            return;
        }
        self.hp -= amount;
        if attacker.is_some() {
            self.last_attacker = attacker;
        }
        if self.info.never_attack_cancel && self.animation.state().is_attack() {
            return;
        }
        match kind {
            DamageKind::Melee { lightning: true } => {
                self.animation.input(AnimInput::LightningDamaged);
            },
            DamageKind::Melee { lightning: false } => {
                self.melee_flip = !self.melee_flip;
                let reaction = if self.melee_flip {
                    AnimInput::MeleeDamaged1
                } else {
                    AnimInput::MeleeDamaged2
                };
                if self.animation.input(reaction) {
                    self.locomotion.stop(true);
                }
            },
            DamageKind::Bullet => {
                if self.info.never_pushed {
                    return;
                }
                self.bullet_hits += 1;
                if self.bullet_hits % self.session.bullet_flinch_count.max(1) == 0 {
                    self.animation.input(AnimInput::RangeDamaged);
                }
            },
            DamageKind::Skill => {},
        }
    }

    fn check_dead(&mut self, dt: f32) {
        if !self.dead && self.hp <= 0.0 {
            self.dead = true;
            self.animation.input(AnimInput::Death);
            self.clear_tasks();
            self.locomotion.stop(true);
            info!(actor = %self.id, killer = ?self.last_attacker, "NPC died");
            self.publish(ActorEvent::Died {
                actor: self.id,
                killer: self.last_attacker,
            });
        }
        if self.dead && !self.removal_requested {
            self.dying_elapsed += dt;
            if self.dying_elapsed >= self.session.dying_time {
                self.removal_requested = true;
                self.publish(ActorEvent::RemovalRequested {
                    actor: self.id,
                    killer: self.last_attacker,
                    position: self.position,
                });
            }
        }
    }

    fn post_basic_info(&mut self, dt: f32) {
        if !self.replication.update(dt, &mut self.rng) {
            return;
        }
        self.publish(ActorEvent::BasicInfo {
            actor: self.id,
            position: self.position,
            velocity: self.locomotion.velocity(),
            direction: self.direction,
            animation: self.animation.state(),
        });
    }

    fn run_tasks(&mut self, dt: f32, world: &dyn AiWorld) {
        self.skills.update(dt);
        let Some(mut task) = self.tasks.pop_front() else {
            return;
        };
        match self.run_task(&mut task, dt, world) {
            TaskResult::Running => {
                self.tasks.push_front(task);
            },
            result => {
                trace!(actor = %self.id, kind = ?task.kind(), ?result, "Task finished");
                self.finished.push(task.kind());
            },
        }
    }

    fn run_task(&mut self, task: &mut Task, dt: f32, world: &dyn AiWorld) -> TaskResult {
        match task {
            Task::MoveToPos { target, chained } => self.move_to_pos(*target, *chained, dt, world),
            Task::MoveToDir {
                dir,
                duration,
                elapsed,
            } => {
                if !self.can_walk() {
                    return TaskResult::Running;
                }
                *elapsed += dt;
                if *elapsed >= *duration {
                    self.stop(true);
                    return TaskResult::Completed;
                }
                self.steer_along(*dir, dt, world);
                TaskResult::Running
            },
            Task::MoveToTarget { target, range } => {
                let Some(goal) = world.object(*target).filter(|o| !o.dead).map(|o| o.position) else {
                    self.locomotion.stop(false);
                    return TaskResult::Cancelled;
                };
                if planar_distance(self.position, goal) <= *range {
                    self.stop(true);
                    return TaskResult::Completed;
                }
                if self.can_walk() {
                    self.steer_along(goal - self.position, dt, world);
                }
                TaskResult::Running
            },
            Task::RotateToDir { dir } => {
                self.locomotion.stop(false);
                let (facing, done) = rotate_toward(self.direction, *dir, self.info.rotate_speed * dt);
                self.direction = facing;
                if done {
                    if self.animation.state() == AnimState::Walk {
                        self.animation.input(AnimInput::WalkDone);
                    }
                    TaskResult::Completed
                } else {
                    self.animation.input(AnimInput::Rotate);
                    TaskResult::Running
                }
            },
            Task::AttackMelee { started } => {
                if *started {
                    return self.finished_when_left(AnimState::AttackMelee);
                }
                if !self.animation.input(AnimInput::AttackMelee) {
                    return TaskResult::Cancelled;
                }
                *started = true;
                self.locomotion.stop(true);
                self.publish(ActorEvent::MeleeAttack {
                    actor: self.id,
                    position: self.position,
                    direction: self.direction,
                });
                TaskResult::Running
            },
            Task::AttackRange { dir, started } => {
                if *started {
                    return self.finished_when_left(AnimState::AttackRange);
                }
                if !self.animation.input(AnimInput::AttackRange) {
                    return TaskResult::Cancelled;
                }
                *started = true;
                self.face(*dir);
                self.locomotion.stop(true);
                self.publish(ActorEvent::RangeShot {
                    actor: self.id,
                    origin: self.fire_origin(),
                    direction: *dir,
                });
                TaskResult::Running
            },
            Task::Skill {
                skill,
                target,
                pos,
                started,
            } => {
                if *started {
                    return if self.animation.state().is_special() {
                        TaskResult::Running
                    } else {
                        TaskResult::Completed
                    };
                }
                let Some(slot) = self.skills.get(*skill).map(|desc| desc.casting_animation) else {
                    return TaskResult::Cancelled;
                };
                if !self.animation.input(AnimInput::special(slot)) {
                    return TaskResult::Cancelled;
                }
                *started = true;
                self.skills.start_cooldown(*skill);
                self.locomotion.stop(true);
                self.publish(ActorEvent::SkillCast {
                    actor: self.id,
                    skill: *skill,
                    target: *target,
                    position: *pos,
                });
                TaskResult::Running
            },
        }
    }

    fn finished_when_left(&self, state: AnimState) -> TaskResult {
        if self.animation.state() == state {
            TaskResult::Running
        } else {
            TaskResult::Completed
        }
    }

    fn can_walk(&self) -> bool {
        self.animation.state().is_attackable()
    }

    fn move_to_pos(&mut self, target: Vec3, chained: bool, dt: f32, world: &dyn AiWorld) -> TaskResult {
        if !self.locomotion.is_landed() || !self.can_walk() {
            return TaskResult::Running;
        }
        let to = flatten(target - self.position);
        if planar_length(to) <= self.arrive_distance() {
            self.stop(!chained);
            return TaskResult::Completed;
        }
        self.steer_along(to, dt, world);
        TaskResult::Running
    }

    /// Turns toward `dir` and runs once roughly facing it.
    fn steer_along(&mut self, dir: Vec3, dt: f32, world: &dyn AiWorld) {
        let Some(dir) = planar_direction(dir) else {
            return;
        };
        let dir = self.avoid_npcs(dir, world);
        let (facing, aligned) = rotate_toward(self.direction, dir, self.info.rotate_speed * dt);
        self.direction = facing;
        if aligned || planar_angle_between(facing, dir) <= RUN_FACING_TOLERANCE {
            self.locomotion.run_to(dir);
            self.animation.input(AnimInput::Run);
        } else {
            self.locomotion.stop(false);
            self.animation.input(AnimInput::Rotate);
        }
    }

    fn avoid_npcs(&self, dir: Vec3, world: &dyn AiWorld) -> Vec3 {
        let blend = self.movement.avoidance_blend;
        let blocker = world.objects().iter().find(|o| {
            let offset = flatten(o.position - self.position);
            o.is_npc()
                && o.id != self.id
                && !o.dead
                && offset.dot(dir) > 0.0
                && planar_length(offset) < 2.0 * (self.radius() + o.radius)
        });
        let Some(blocker) = blocker else {
            return dir;
        };
        let side = if cross2(planar(dir), planar(blocker.position - self.position)) > 0.0 {
            -perpendicular(dir)
        } else {
            perpendicular(dir)
        };
        planar_direction(dir * (1.0 - blend) + side * blend).unwrap_or(dir)
    }

    fn process_motion(&mut self, dt: f32, world: &dyn AiWorld) {
        let mut events = MotionEvents::default();
        self.locomotion
            .process_movement(dt, self.animation.state(), &mut events);
        let floor = world.floor_height(self.position);
        self.locomotion
            .update_height(dt, &mut self.position, floor, &mut events);
        self.locomotion.update_position(dt, &mut self.position);

        if events.reached_peak {
            self.animation.input(AnimInput::ReachPeak);
        }
        if events.reached_ground && self.animation.input(AnimInput::ReachGround) {
            self.locomotion.reserve_standup(&mut self.rng);
        }
        if events.dagger_rest && self.animation.input(AnimInput::ReachGroundDagger) {
            self.locomotion.reserve_standup(&mut self.rng);
        }
        if let Some(hard) = events.landed {
            self.publish(ActorEvent::Landed {
                actor: self.id,
                position: self.position,
                hard,
            });
        }
        if self.locomotion.tick_standup(dt) {
            self.animation.input(AnimInput::StandUp);
        }
        if self.animation.tick(dt) {
            self.animation.input(AnimInput::AnimDone);
        }
    }
}

/// An NPC: body plus decision loop.
#[derive(Debug)]
pub struct Actor {
    body: ActorBody,
    brain: Option<Brain>,
}

impl Actor {
    /// Spawns a locally controlled NPC of type `info`.
    ///
    /// Run speed is jittered by the catalog's speed shaking ratio; `seed`
    /// drives every random roll the actor and its brain make.
    #[must_use]
    pub fn spawn(
        id: ObjectId,
        info: &NpcInfo,
        catalog: &NpcCatalog,
        config: &AiConfig,
        events: Sender<ActorEvent>,
        position: Vec3,
        seed: u64,
    ) -> Self {
        let mut rng = Rng::with_seed(seed);
        let global = catalog.global();
        let speed = jitter(&mut rng, info.speed, global.speed_shaking_ratio);
        let brain = Brain::with_seed(info, global, config, rng.u64(..));
        let body = ActorBody {
            id,
            info: info.clone(),
            team: 1,
            my_control: true,
            position,
            direction: Vec3::X,
            locomotion: Locomotion::new(config.movement, config.blast, speed),
            animation: AnimationStateMachine::new(),
            behavior: BehaviorStateMachine::new(),
            tasks: TaskQueue::new(config.session.task_queue_capacity),
            skills: SkillSet::from_npc(info, catalog),
            hp: info.max_hp,
            dead: false,
            dying_elapsed: 0.0,
            removal_requested: false,
            last_attacker: None,
            melee_flip: false,
            bullet_hits: 0,
            patrol_route: Vec::new(),
            finished: Vec::new(),
            replication: UpdateTimer::new(config.session.replication_interval),
            movement: config.movement,
            session: config.session,
            events,
            rng,
        };
        debug!(actor = %id, npc = info.id.raw(), speed, "NPC spawned");
        Self {
            body,
            brain: Some(brain),
        }
    }

    /// Sets the team.
    #[must_use]
    pub fn with_team(mut self, team: u8) -> Self {
        self.body.team = team;
        self
    }

    /// Sets the facing.
    #[must_use]
    pub fn with_direction(mut self, direction: Vec3) -> Self {
        self.body.face(direction);
        self
    }

    /// Gives the NPC a patrol route and starts it patrolling.
    #[must_use]
    pub fn with_patrol_route(mut self, route: Vec<Vec3>) -> Self {
        if !route.is_empty() {
            self.body.behavior.force_state(crate::behavior::BehaviorStateId::Patrol);
        }
        self.body.patrol_route = route;
        self
    }

    /// Turns this actor into a replicated copy driven by [`ActorBody::input_basic_info`].
    #[must_use]
    pub fn into_remote(mut self) -> Self {
        self.body.my_control = false;
        self.brain = None;
        self
    }

    /// Body state.
    #[must_use]
    pub const fn body(&self) -> &ActorBody {
        &self.body
    }

    /// Mutable body state.
    pub fn body_mut(&mut self) -> &mut ActorBody {
        &mut self.body
    }

    /// Decision loop, absent on replicated copies.
    #[must_use]
    pub const fn brain(&self) -> Option<&Brain> {
        self.brain.as_ref()
    }

    /// Object identifier.
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.body.id
    }

    /// Advances the actor by one tick.
    pub fn on_update(&mut self, dt: f32, world: &dyn AiWorld) {
        if !self.body.my_control {
            self.body.animation.tick(dt);
            return;
        }
        self.body.run_tasks(dt, world);
        self.body.check_dead(dt);
        self.body.post_basic_info(dt);
        if self.body.is_think_able() {
            self.think(dt, world);
        }
        if !self.body.dead {
            if let Some(brain) = self.brain.as_mut() {
                brain.update_neglect(dt, &mut self.body);
            }
        }
        self.deliver_finished();
        self.body.process_motion(dt, world);
    }

    /// Runs only the decision loop, without tasks or physics.
    pub fn think(&mut self, dt: f32, world: &dyn AiWorld) {
        if let Some(brain) = self.brain.as_mut() {
            brain.think(dt, &mut self.body, world);
        }
        self.deliver_finished();
    }

    /// Applies a hit.
    pub fn on_damaged(&mut self, attacker: Option<ObjectId>, amount: f32, kind: DamageKind) {
        if self.body.dead {
            return;
        }
        self.body.on_damaged(attacker, amount, kind);
        if let Some(brain) = self.brain.as_mut() {
            brain.on_damaged(&mut self.body, attacker);
        }
    }

    /// Launches the actor away along `dir`.
    ///
    /// Returns false when the NPC is immune or already knocked around.
    pub fn blast(&mut self, dir: Vec3) -> bool {
        let body = &mut self.body;
        if body.info.never_blasted || !body.animation.input(AnimInput::Blast) {
            return false;
        }
        body.clear_tasks();
        body.locomotion
            .blast(dir, body.position, &mut body.direction);
        true
    }

    /// Pulls the actor away from `source`.
    pub fn blast_dagger(&mut self, source: Vec3) -> bool {
        let body = &mut self.body;
        if body.info.never_blasted || !body.animation.input(AnimInput::BlastDagger) {
            return false;
        }
        body.clear_tasks();
        body.locomotion
            .blast_dagger(source, body.position, &mut body.direction);
        true
    }

    /// Pushes the actor horizontally; a strong push knocks it down.
    pub fn knockback(&mut self, impulse: Vec3) {
        let body = &mut self.body;
        if body.info.never_pushed {
            return;
        }
        if body.locomotion.knockback(impulse) && body.animation.input(AnimInput::Knockdown) {
            body.locomotion.reserve_standup(&mut body.rng);
        }
    }

    fn deliver_finished(&mut self) {
        for kind in std::mem::take(&mut self.body.finished) {
            if let Some(brain) = self.brain.as_mut() {
                brain.on_task_finished(kind);
            }
            self.body.publish(ActorEvent::TaskFinished {
                actor: self.body.id,
                task: kind,
            });
        }
    }
}

//! Actor locomotion physics.
//!
//! Integrates grounded running, airborne decay, gravity, floor contact and the
//! blast and dagger-blast knockback arcs. Physical events come back as
//! [`MotionEvents`] for the actor to feed into its animation machine.

use crate::animation::AnimState;
use crate::config::{BlastSettings, MovementSettings};
use crate::timer::random_range;
use fastrand::Rng;
use glam::Vec3;
use sentinel_common::{flatten, planar_direction, planar_length, rotate_z};

/// Physical events produced during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotionEvents {
    /// A blast arc passed its apex
    pub reached_peak: bool,
    /// Touched down; `Some(true)` for a hard landing
    pub landed: Option<bool>,
    /// A blasted actor touched down
    pub reached_ground: bool,
    /// A dagger pull came to rest
    pub dagger_rest: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DaggerPull {
    pull: Vec3,
    elapsed: f32,
}

/// Movement state of one actor.
#[derive(Debug, Clone, PartialEq)]
pub struct Locomotion {
    movement: MovementSettings,
    blast: BlastSettings,
    velocity: Vec3,
    run_dir: Option<Vec3>,
    speed: f32,
    grounded: bool,
    blasted: bool,
    peak_reported: bool,
    dagger: Option<DaggerPull>,
    standup_in: Option<f32>,
    fall_top: f32,
}

impl Locomotion {
    /// Creates a grounded, resting body with the given run speed.
    #[must_use]
    pub fn new(movement: MovementSettings, blast: BlastSettings, speed: f32) -> Self {
        Self {
            movement,
            blast,
            velocity: Vec3::ZERO,
            run_dir: None,
            speed: speed.max(0.0),
            grounded: true,
            blasted: false,
            peak_reported: false,
            dagger: None,
            standup_in: None,
            fall_top: 0.0,
        }
    }

    /// Current velocity.
    #[must_use]
    pub const fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Overwrites the velocity (replication).
    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    /// Run speed.
    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    /// True while standing on the floor.
    #[must_use]
    pub const fn is_landed(&self) -> bool {
        self.grounded
    }

    /// True while a blast or dagger pull controls the body.
    #[must_use]
    pub const fn is_blasted(&self) -> bool {
        self.blasted || self.dagger.is_some()
    }

    /// True while a run order is active.
    #[must_use]
    pub const fn is_moving(&self) -> bool {
        self.run_dir.is_some()
    }

    /// Runs along the planar part of `dir`.
    pub fn run_to(&mut self, dir: Vec3) {
        self.run_dir = planar_direction(dir);
    }

    /// Drops the run order. `halt` also kills horizontal velocity at once.
    pub fn stop(&mut self, halt: bool) {
        self.run_dir = None;
        if halt {
            self.velocity.x = 0.0;
            self.velocity.y = 0.0;
        }
    }

    /// Clears all motion, for teleports.
    pub fn reset(&mut self) {
        self.velocity = Vec3::ZERO;
        self.run_dir = None;
        self.grounded = true;
        self.blasted = false;
        self.dagger = None;
    }

    /// Launches the body away along `dir`. The actor turns to face the source.
    pub fn blast(&mut self, dir: Vec3, position: Vec3, facing: &mut Vec3) {
        let dir = planar_direction(dir).unwrap_or(-*facing);
        *facing = -dir;
        self.velocity = dir * self.blast.horizontal_speed + Vec3::Z * self.blast.vertical_speed;
        self.run_dir = None;
        self.grounded = false;
        self.blasted = true;
        self.peak_reported = false;
        self.dagger = None;
        self.standup_in = None;
        self.fall_top = position.z;
    }

    /// Pulls the body away from `source` on a short hop.
    pub fn blast_dagger(&mut self, source: Vec3, position: Vec3, facing: &mut Vec3) {
        let pull = planar_direction(position - source).unwrap_or(-*facing);
        *facing = -pull;
        self.velocity = pull * self.blast.horizontal_speed + Vec3::Z * self.blast.dagger_vertical_speed;
        self.run_dir = None;
        self.grounded = false;
        self.blasted = false;
        self.dagger = Some(DaggerPull { pull, elapsed: 0.0 });
        self.standup_in = None;
        self.fall_top = position.z;
    }

    /// Adds a horizontal impulse. Returns true when it is strong enough to knock down.
    pub fn knockback(&mut self, impulse: Vec3) -> bool {
        let impulse = flatten(impulse);
        self.velocity += impulse;
        planar_length(impulse) >= self.blast.knockdown_force
    }

    /// Schedules a stand-up after a random delay.
    pub fn reserve_standup(&mut self, rng: &mut Rng) {
        self.standup_in = Some(random_range(rng, self.blast.standup_min, self.blast.standup_max));
    }

    /// Counts the stand-up reservation down. Returns true once when it is due.
    pub fn tick_standup(&mut self, dt: f32) -> bool {
        let Some(remaining) = self.standup_in.as_mut() else {
            return false;
        };
        *remaining -= dt;
        if *remaining > 0.0 {
            return false;
        }
        self.standup_in = None;
        true
    }

    /// Integrates horizontal velocity.
    pub fn process_movement(&mut self, dt: f32, animation: AnimState, events: &mut MotionEvents) {
        if let Some(dagger) = self.dagger.as_mut() {
            let mut t = (1.0 - dagger.elapsed / self.blast.dagger_duration).max(0.0);
            if t < self.blast.dagger_cutoff {
                t = 0.0;
            }
            let pull = dagger.pull * self.blast.dagger_power * t * t * dt * self.blast.dagger_scale;
            self.velocity.x = pull.x;
            self.velocity.y = pull.y;
            dagger.elapsed += dt;
            if self.grounded && planar_length(self.velocity) < self.blast.dagger_rest_speed {
                self.dagger = None;
                events.dagger_rest = true;
            }
            return;
        }

        let mut horizontal = flatten(self.velocity);
        if !self.grounded || self.blasted {
            horizontal = decay(horizontal, self.movement.air_deceleration * dt);
        } else if animation.is_attack() {
            horizontal = Vec3::ZERO;
        } else if let Some(dir) = self.run_dir {
            horizontal += dir * self.movement.run_acceleration * dt;
            horizontal = horizontal.clamp_length_max(self.speed);
        } else {
            horizontal = decay(horizontal, self.movement.stop_deceleration * dt)
                .clamp_length_max(self.movement.max_ground_speed);
        }
        self.velocity.x = horizontal.x;
        self.velocity.y = horizontal.y;
    }

    /// Applies gravity and floor contact. A missing floor leaves the height alone.
    pub fn update_height(
        &mut self,
        dt: f32,
        position: &mut Vec3,
        floor: Option<f32>,
        events: &mut MotionEvents,
    ) {
        let Some(floor) = floor else {
            return;
        };
        let above = position.z - floor;
        let m = self.movement;

        if above > m.floor_snap_distance || self.velocity.z > m.rise_epsilon {
            if self.grounded {
                self.grounded = false;
                self.fall_top = position.z;
            }
            self.velocity.z -= m.gravity * dt;
            self.fall_top = self.fall_top.max(position.z);
            if self.blasted && !self.peak_reported && self.velocity.z < 0.0 {
                self.peak_reported = true;
                events.reached_peak = true;
            }
            if self.velocity.z < 0.0 && position.z + self.velocity.z * dt <= floor {
                position.z = floor;
                self.velocity.z = 0.0;
                self.land(floor, events);
            }
            return;
        }

        if !self.grounded {
            self.land(floor, events);
        }
        self.velocity.z = self.velocity.z.max(0.0);
        if above < 0.0 {
            position.z += (-above).min(m.penetration_correction * dt);
        } else {
            position.z = floor;
        }
    }

    /// Moves the body by its velocity.
    pub fn update_position(&self, dt: f32, position: &mut Vec3) {
        *position += self.velocity * dt;
    }

    fn land(&mut self, floor: f32, events: &mut MotionEvents) {
        self.grounded = true;
        events.landed = Some(self.fall_top - floor > self.movement.hard_landing_height);
        self.fall_top = floor;
        if self.blasted {
            self.blasted = false;
            events.reached_ground = true;
        }
    }
}

fn decay(v: Vec3, amount: f32) -> Vec3 {
    let len = v.length();
    if len <= amount {
        Vec3::ZERO
    } else {
        v * ((len - amount) / len)
    }
}

/// Turns `facing` toward `target` by at most `max_angle` radians.
///
/// Returns the new facing and whether it now matches the target.
#[must_use]
pub fn rotate_toward(facing: Vec3, target: Vec3, max_angle: f32) -> (Vec3, bool) {
    let Some(target) = planar_direction(target) else {
        return (facing, true);
    };
    let Some(current) = planar_direction(facing) else {
        return (target, true);
    };
    let cross = current.x * target.y - current.y * target.x;
    let angle = cross.atan2(current.dot(target));
    if angle.abs() <= max_angle {
        (target, true)
    } else {
        (rotate_z(current, max_angle.copysign(angle)), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn body(speed: f32) -> Locomotion {
        Locomotion::new(MovementSettings::default(), BlastSettings::default(), speed)
    }

    fn step(loco: &mut Locomotion, position: &mut Vec3, anim: AnimState) -> MotionEvents {
        let mut events = MotionEvents::default();
        loco.process_movement(DT, anim, &mut events);
        loco.update_height(DT, position, Some(0.0), &mut events);
        loco.update_position(DT, position);
        events
    }

    #[test]
    fn test_run_clamps_to_speed() {
        let mut loco = body(300.0);
        let mut pos = Vec3::ZERO;
        loco.run_to(Vec3::new(2.0, 0.0, 5.0));
        for _ in 0..60 {
            step(&mut loco, &mut pos, AnimState::Run);
        }
        assert!((planar_length(loco.velocity()) - 300.0).abs() < 1e-3);
        assert!(pos.x > 280.0 && pos.x < 300.0);
        assert!(pos.y.abs() < 1e-3 && pos.z.abs() < 1e-3);
    }

    #[test]
    fn test_stop_decelerates() {
        let mut loco = body(600.0);
        let mut pos = Vec3::ZERO;
        loco.run_to(Vec3::X);
        for _ in 0..30 {
            step(&mut loco, &mut pos, AnimState::Run);
        }
        loco.stop(false);
        step(&mut loco, &mut pos, AnimState::Idle);
        let v = planar_length(loco.velocity());
        assert!(v > 0.0 && v < 600.0);
        for _ in 0..30 {
            step(&mut loco, &mut pos, AnimState::Idle);
        }
        assert!(planar_length(loco.velocity()) < 1e-3);
    }

    #[test]
    fn test_attack_freezes_horizontal() {
        let mut loco = body(300.0);
        let mut pos = Vec3::ZERO;
        loco.run_to(Vec3::X);
        step(&mut loco, &mut pos, AnimState::Run);
        step(&mut loco, &mut pos, AnimState::AttackMelee);
        assert_eq!(flatten(loco.velocity()), Vec3::ZERO);
    }

    #[test]
    fn test_blast_arc_events() {
        let mut loco = body(300.0);
        let mut pos = Vec3::ZERO;
        let mut facing = Vec3::X;
        loco.blast(Vec3::Y, pos, &mut facing);
        assert_eq!(facing, -Vec3::Y);
        assert!(loco.is_blasted());

        let mut peak_tick = None;
        let mut land = None;
        for tick in 0..300 {
            let events = step(&mut loco, &mut pos, AnimState::Blast);
            if events.reached_peak {
                assert!(peak_tick.is_none());
                peak_tick = Some(tick);
            }
            if events.reached_ground {
                land = Some((tick, events.landed));
                break;
            }
        }
        let peak_tick = peak_tick.expect("peak");
        let (land_tick, landed) = land.expect("landing");
        assert!(land_tick > peak_tick);
        assert_eq!(landed, Some(true));
        assert!(!loco.is_blasted());
        assert!(pos.y > 0.0);
        assert!(pos.z.abs() < 1e-3);
    }

    #[test]
    fn test_dagger_pull_comes_to_rest() {
        let mut loco = body(300.0);
        let mut pos = Vec3::ZERO;
        let mut facing = Vec3::X;
        loco.blast_dagger(Vec3::new(-100.0, 0.0, 0.0), pos, &mut facing);
        assert_eq!(facing, -Vec3::X);
        let mut rested = false;
        for _ in 0..120 {
            if step(&mut loco, &mut pos, AnimState::BlastDagger).dagger_rest {
                rested = true;
                break;
            }
        }
        assert!(rested);
        assert!(!loco.is_blasted());
        assert!(pos.x > 0.0);
    }

    #[test]
    fn test_penetration_corrected_gradually() {
        let mut loco = body(300.0);
        let mut pos = Vec3::new(0.0, 0.0, -50.0);
        let mut events = MotionEvents::default();
        loco.update_height(DT, &mut pos, Some(0.0), &mut events);
        assert!((pos.z - (-50.0 + 400.0 * DT)).abs() < 1e-3);
        assert_eq!(events, MotionEvents::default());
    }

    #[test]
    fn test_standup_reservation() {
        let mut loco = body(300.0);
        let mut rng = Rng::with_seed(5);
        loco.reserve_standup(&mut rng);
        let mut fired = 0;
        for _ in 0..200 {
            fired += usize::from(loco.tick_standup(DT));
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_knockback_strength() {
        let mut loco = body(300.0);
        assert!(!loco.knockback(Vec3::new(100.0, 0.0, 900.0)));
        assert!(loco.knockback(Vec3::new(0.0, 700.0, 0.0)));
        assert!((loco.velocity().y - 700.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rotate_toward_limits_angle() {
        let (dir, done) = rotate_toward(Vec3::X, Vec3::Y, 0.5);
        assert!(!done);
        assert!((dir.y - 0.5f32.sin()).abs() < 1e-4);
        let (dir, done) = rotate_toward(Vec3::X, Vec3::new(1.0, 0.1, 0.0), 0.5);
        assert!(done);
        assert!((dir.length() - 1.0).abs() < 1e-4);
        let (_, done) = rotate_toward(Vec3::X, -Vec3::Y, 0.5);
        assert!(!done);
    }
}

//! Engine-side AI configuration.
//!
//! Tunables that are not part of per-NPC content: decision cadences, stuck
//! recovery, movement physics and navigation smoothing. Loaded from TOML.

use sentinel_common::ConfigError;
use sentinel_nav::PathSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Decision-loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainSettings {
    /// Idle time after which the neglect callback fires
    pub neglect_timeout: f32,
    /// Earliest skill use after spawn
    pub no_skill_grace_min: f32,
    /// Latest skill use after spawn
    pub no_skill_grace_max: f32,
    /// Jitter ratio for the distance bands
    pub distance_shaking_ratio: f32,
    /// Below this distance ranged NPCs back off from stopping to shoot
    pub forced_in_distance: f32,
    /// Inside this distance ranged and friendly NPCs stop moving
    pub in_distance: f32,
    /// Beyond this distance a target is out of range
    pub out_distance: f32,
    /// Maximum height difference for stopping to shoot
    pub range_height_band: f32,
    /// Jitter ratio for the default-attack cooldown
    pub default_attack_shaking_ratio: f32,
    /// Minimum default-attack cooldown
    pub default_attack_min_cooldown: f32,
    /// HP ratio below which an NPC retreats (once per life)
    pub low_health_ratio: f32,
    /// Time spent retreating before going idle
    pub retreat_duration: f32,
    /// Distance of the flee point from the target
    pub flee_distance: f32,
}

impl Default for BrainSettings {
    fn default() -> Self {
        Self {
            neglect_timeout: 5.5,
            no_skill_grace_min: 1.0,
            no_skill_grace_max: 5.0,
            distance_shaking_ratio: 0.3,
            forced_in_distance: 548.0,
            in_distance: 1265.0,
            out_distance: 2236.0,
            range_height_band: 320.0,
            default_attack_shaking_ratio: 0.3,
            default_attack_min_cooldown: 0.01,
            low_health_ratio: 0.2,
            retreat_duration: 3.0,
            flee_distance: 800.0,
        }
    }
}

/// Stuck detection and recovery tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StuckSettings {
    /// Window of the local detour check
    pub short_window: f32,
    /// Window of the teleport check
    pub long_window: f32,
    /// Displacement below which the actor counts as stuck
    pub threshold: f32,
    /// Distance of teleport candidates from the stuck position
    pub teleport_radius: f32,
    /// Detour offset as a fraction of the collision radius
    pub escape_offset_ratio: f32,
    /// Directions tried before settling for the farthest teleport candidate
    pub teleport_attempts: u32,
    /// Height above the candidate from which the floor is probed
    pub floor_probe_height: f32,
}

impl Default for StuckSettings {
    fn default() -> Self {
        Self {
            short_window: 1.0,
            long_window: 2.0,
            threshold: 10.0,
            teleport_radius: 200.0,
            escape_offset_ratio: 0.8,
            teleport_attempts: 8,
            floor_probe_height: 100.0,
        }
    }
}

/// Locomotion physics tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementSettings {
    /// Downward acceleration while airborne
    pub gravity: f32,
    /// Grounded acceleration toward the run direction
    pub run_acceleration: f32,
    /// Grounded deceleration with no move order
    pub stop_deceleration: f32,
    /// Horizontal decay while airborne
    pub air_deceleration: f32,
    /// Horizontal speed cap on the ground without a move order
    pub max_ground_speed: f32,
    /// Height above the floor that still counts as standing
    pub floor_snap_distance: f32,
    /// Upward speed that counts as leaving the ground
    pub rise_epsilon: f32,
    /// Maximum per-second correction when sunk below the floor
    pub penetration_correction: f32,
    /// Arrival distance as a fraction of the collision radius
    pub arrive_ratio: f32,
    /// Minimum arrival distance
    pub arrive_min: f32,
    /// Weight of the sideways component when steering around NPCs
    pub avoidance_blend: f32,
    /// Fall height that counts as a hard landing
    pub hard_landing_height: f32,
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            gravity: 2500.0,
            run_acceleration: 10000.0,
            stop_deceleration: 2000.0,
            air_deceleration: 2000.0,
            max_ground_speed: 600.0,
            floor_snap_distance: 10.0,
            rise_epsilon: 0.1,
            penetration_correction: 400.0,
            arrive_ratio: 0.5,
            arrive_min: 10.0,
            avoidance_blend: 0.3,
            hard_landing_height: 100.0,
        }
    }
}

/// Knockback tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlastSettings {
    /// Horizontal launch speed of a blast
    pub horizontal_speed: f32,
    /// Vertical launch speed of a blast
    pub vertical_speed: f32,
    /// Vertical launch speed of a dagger blast
    pub dagger_vertical_speed: f32,
    /// Length of the dagger pull
    pub dagger_duration: f32,
    /// Pull fraction below which the dagger pull stops
    pub dagger_cutoff: f32,
    /// Peak dagger pull strength
    pub dagger_power: f32,
    /// Scale applied to the per-frame dagger pull
    pub dagger_scale: f32,
    /// Speed below which a dagger-blasted actor has landed
    pub dagger_rest_speed: f32,
    /// Earliest stand-up after a drop
    pub standup_min: f32,
    /// Latest stand-up after a drop
    pub standup_max: f32,
    /// Knockback force that knocks the actor down
    pub knockdown_force: f32,
}

impl Default for BlastSettings {
    fn default() -> Self {
        Self {
            horizontal_speed: 300.0,
            vertical_speed: 1700.0,
            dagger_vertical_speed: 100.0,
            dagger_duration: 0.8,
            dagger_cutoff: 0.4,
            dagger_power: 400.0,
            dagger_scale: 80.0,
            dagger_rest_speed: 20.0,
            standup_min: 0.1,
            standup_max: 2.5,
            knockdown_force: 600.0,
        }
    }
}

/// Session bookkeeping tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Interval between replicated state posts
    pub replication_interval: f32,
    /// Maximum queued tasks per actor
    pub task_queue_capacity: usize,
    /// Time a dead actor lingers before removal is requested
    pub dying_time: f32,
    /// Bullet hits per ranged flinch
    pub bullet_flinch_count: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            replication_interval: 0.1,
            task_queue_capacity: 32,
            dying_time: 5.0,
            bullet_flinch_count: 5,
        }
    }
}

/// AI configuration parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Decision loop
    pub brain: BrainSettings,
    /// Stuck recovery
    pub stuck: StuckSettings,
    /// Locomotion physics
    pub movement: MovementSettings,
    /// Knockback
    pub blast: BlastSettings,
    /// Session bookkeeping
    pub session: SessionSettings,
    /// Navigation smoothing
    pub navigation: PathSettings,
}

impl AiConfig {
    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("AI config not found at {}, using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!("Loaded AI config from {}", path.display());
                    config
                },
                Err(e) => {
                    warn!("{e}");
                    Self::default()
                },
            },
            Err(e) => {
                warn!("Failed to read AI config: {e}");
                Self::default()
            },
        }
    }

    /// Parses configuration from TOML text, clamped by [`Self::validate`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate();
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> sentinel_common::SentinelResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(path, contents)?;

        info!("Saved AI config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        let brain = &mut self.brain;
        brain.neglect_timeout = brain.neglect_timeout.max(0.1);
        brain.no_skill_grace_min = brain.no_skill_grace_min.max(0.0);
        brain.no_skill_grace_max = brain.no_skill_grace_max.max(brain.no_skill_grace_min);
        brain.distance_shaking_ratio = brain.distance_shaking_ratio.clamp(0.0, 1.0);
        brain.forced_in_distance = brain.forced_in_distance.max(0.0);
        brain.in_distance = brain.in_distance.max(brain.forced_in_distance);
        brain.out_distance = brain.out_distance.max(brain.in_distance);
        brain.default_attack_shaking_ratio = brain.default_attack_shaking_ratio.clamp(0.0, 1.0);
        brain.low_health_ratio = brain.low_health_ratio.clamp(0.0, 1.0);

        let stuck = &mut self.stuck;
        stuck.short_window = stuck.short_window.max(0.1);
        stuck.long_window = stuck.long_window.max(stuck.short_window);
        stuck.threshold = stuck.threshold.max(0.0);
        stuck.teleport_radius = stuck.teleport_radius.max(stuck.threshold * 2.0);
        stuck.teleport_attempts = stuck.teleport_attempts.clamp(1, 32);

        let movement = &mut self.movement;
        movement.gravity = movement.gravity.max(0.0);
        movement.arrive_ratio = movement.arrive_ratio.clamp(0.05, 1.0);
        movement.avoidance_blend = movement.avoidance_blend.clamp(0.0, 1.0);

        let blast = &mut self.blast;
        blast.dagger_duration = blast.dagger_duration.max(0.01);
        blast.standup_max = blast.standup_max.max(blast.standup_min);

        let session = &mut self.session;
        session.replication_interval = session.replication_interval.max(0.01);
        session.task_queue_capacity = session.task_queue_capacity.clamp(4, 1024);
        session.bullet_flinch_count = session.bullet_flinch_count.max(1);

        self.navigation.validate();
    }
}

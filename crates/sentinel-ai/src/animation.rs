//! Animation state machine.
//!
//! Tracks which clip an actor is playing and gates decisions on it. The
//! transition table is static; an instance only stores the current state and
//! how long it has been playing.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Animation states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum AnimState {
    /// Standing still
    #[default]
    Idle = 0,
    /// Walking or turning in place
    Walk,
    /// Running
    Run,
    /// Melee swing
    AttackMelee,
    /// Ranged shot
    AttackRange,
    /// Flinch from bullets
    RangeDamaged,
    /// Melee flinch, first variant
    MeleeDamaged1,
    /// Melee flinch, second variant
    MeleeDamaged2,
    /// Electrocuted
    LightningDamaged,
    /// Knocked to the ground
    DamagedDown,
    /// Getting back up
    Stand,
    /// Launched upward by a blast
    Blast,
    /// Falling after the blast peak
    BlastFall,
    /// Lying down after a blast
    BlastDrop,
    /// Dead
    Die,
    /// Pulled by a dagger blast
    BlastDagger,
    /// Lying down after a dagger blast
    BlastDaggerDrop,
    /// Skill cast, slot 1
    Special1,
    /// Skill cast, slot 2
    Special2,
    /// Skill cast, slot 3
    Special3,
    /// Skill cast, slot 4
    Special4,
}

/// Static per-state metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateMeta {
    /// Damage reactions may interrupt this state
    pub cancel: bool,
    /// The clip loops until a transition
    pub looping: bool,
    /// The state carries its own movement
    pub moving: bool,
    /// Clip length for non-looping states, in seconds
    pub duration: f32,
}

const fn meta(cancel: bool, looping: bool, moving: bool, duration: f32) -> StateMeta {
    StateMeta {
        cancel,
        looping,
        moving,
        duration,
    }
}

impl AnimState {
    /// Every state, in raw-value order.
    pub const ALL: [AnimState; 21] = [
        AnimState::Idle,
        AnimState::Walk,
        AnimState::Run,
        AnimState::AttackMelee,
        AnimState::AttackRange,
        AnimState::RangeDamaged,
        AnimState::MeleeDamaged1,
        AnimState::MeleeDamaged2,
        AnimState::LightningDamaged,
        AnimState::DamagedDown,
        AnimState::Stand,
        AnimState::Blast,
        AnimState::BlastFall,
        AnimState::BlastDrop,
        AnimState::Die,
        AnimState::BlastDagger,
        AnimState::BlastDaggerDrop,
        AnimState::Special1,
        AnimState::Special2,
        AnimState::Special3,
        AnimState::Special4,
    ];

    /// Raw replication value.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self as u8
    }

    /// Decodes a raw replication value.
    #[must_use]
    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.get(usize::from(raw)).copied()
    }

    /// Static metadata of this state.
    #[must_use]
    pub const fn meta(self) -> StateMeta {
        match self {
            Self::Idle => meta(true, true, false, 0.0),
            Self::Walk | Self::Run => meta(true, true, true, 0.0),
            Self::AttackMelee => meta(true, false, false, 0.6),
            Self::AttackRange => meta(true, false, false, 0.5),
            Self::RangeDamaged => meta(true, false, false, 0.4),
            Self::MeleeDamaged1 | Self::MeleeDamaged2 => meta(true, false, false, 0.5),
            Self::LightningDamaged => meta(true, false, false, 1.0),
            Self::DamagedDown | Self::BlastDrop | Self::BlastDaggerDrop => {
                meta(false, true, false, 0.0)
            },
            Self::Stand => meta(false, false, false, 0.8),
            Self::Blast | Self::BlastFall | Self::BlastDagger => meta(false, true, true, 0.0),
            Self::Die => meta(false, false, false, 1.5),
            Self::Special1 | Self::Special2 | Self::Special3 | Self::Special4 => {
                meta(false, false, false, 1.0)
            },
        }
    }

    /// Melee or ranged attack.
    #[must_use]
    pub const fn is_attack(self) -> bool {
        matches!(self, Self::AttackMelee | Self::AttackRange)
    }

    /// Skill cast.
    #[must_use]
    pub const fn is_special(self) -> bool {
        matches!(self, Self::Special1 | Self::Special2 | Self::Special3 | Self::Special4)
    }

    /// Knocked around or down; ignores further knockback.
    #[must_use]
    pub const fn is_knocked(self) -> bool {
        matches!(
            self,
            Self::Blast
                | Self::BlastFall
                | Self::BlastDrop
                | Self::BlastDagger
                | Self::BlastDaggerDrop
                | Self::DamagedDown
                | Self::Die
        )
    }

    /// States from which the actor may start an attack.
    #[must_use]
    pub const fn is_attackable(self) -> bool {
        matches!(self, Self::Idle | Self::Walk | Self::Run)
    }

    /// Skill-cast state for a casting slot (1-4, clamped).
    #[must_use]
    pub const fn special(slot: u8) -> Self {
        match slot {
            0 | 1 => Self::Special1,
            2 => Self::Special2,
            3 => Self::Special3,
            _ => Self::Special4,
        }
    }
}

/// Inputs and events fed to the animation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimInput {
    /// Start running
    Run,
    /// Stop moving
    WalkDone,
    /// Turn in place
    Rotate,
    /// Start a melee swing
    AttackMelee,
    /// Start a ranged shot
    AttackRange,
    /// A non-looping clip finished
    AnimDone,
    /// Launched by a blast
    Blast,
    /// Blast arc passed its apex
    ReachPeak,
    /// Touched the floor
    ReachGround,
    /// Stand-up timer elapsed
    StandUp,
    /// Pulled by a dagger blast
    BlastDagger,
    /// Dagger pull came to rest
    ReachGroundDagger,
    /// Melee hit, first variant
    MeleeDamaged1,
    /// Melee hit, second variant
    MeleeDamaged2,
    /// Bullet flinch
    RangeDamaged,
    /// Lightning-enchanted hit
    LightningDamaged,
    /// Heavy knockback
    Knockdown,
    /// Hit points reached zero
    Death,
    /// Idle fidget after losing a target
    Neglect1,
    /// Idle fidget after idling
    Neglect2,
    /// Cast from slot 1
    Special1,
    /// Cast from slot 2
    Special2,
    /// Cast from slot 3
    Special3,
    /// Cast from slot 4
    Special4,
}

impl AnimInput {
    /// Every input.
    pub const ALL: [AnimInput; 24] = [
        AnimInput::Run,
        AnimInput::WalkDone,
        AnimInput::Rotate,
        AnimInput::AttackMelee,
        AnimInput::AttackRange,
        AnimInput::AnimDone,
        AnimInput::Blast,
        AnimInput::ReachPeak,
        AnimInput::ReachGround,
        AnimInput::StandUp,
        AnimInput::BlastDagger,
        AnimInput::ReachGroundDagger,
        AnimInput::MeleeDamaged1,
        AnimInput::MeleeDamaged2,
        AnimInput::RangeDamaged,
        AnimInput::LightningDamaged,
        AnimInput::Knockdown,
        AnimInput::Death,
        AnimInput::Neglect1,
        AnimInput::Neglect2,
        AnimInput::Special1,
        AnimInput::Special2,
        AnimInput::Special3,
        AnimInput::Special4,
    ];

    /// Cast input for a casting slot (1-4, clamped).
    #[must_use]
    pub const fn special(slot: u8) -> Self {
        match slot {
            0 | 1 => Self::Special1,
            2 => Self::Special2,
            3 => Self::Special3,
            _ => Self::Special4,
        }
    }
}

/// Looks up the transition for `input` in `from`.
///
/// Returns the next state and whether the clip restarts.
#[must_use]
pub fn transition(from: AnimState, input: AnimInput) -> Option<(AnimState, bool)> {
    use AnimInput as I;
    use AnimState as S;

    match (from, input) {
        (S::Die, _) => return None,
        (_, I::Death) => return Some((S::Die, true)),
        _ => {},
    }

    let direct = match (from, input) {
        (S::Idle | S::Walk, I::Run) => Some((S::Run, true)),
        (S::Run, I::Run) => Some((S::Run, false)),
        (S::Idle, I::Rotate) => Some((S::Walk, true)),
        (S::Walk, I::Rotate) => Some((S::Walk, false)),
        (S::Run, I::Rotate) => Some((S::Run, false)),
        (S::Walk | S::Run, I::WalkDone) => Some((S::Idle, true)),
        (S::Idle | S::Walk | S::Run, I::AttackMelee) => Some((S::AttackMelee, true)),
        (S::Idle | S::Walk | S::Run, I::AttackRange) => Some((S::AttackRange, true)),
        (S::Idle | S::Walk | S::Run, I::Special1) => Some((S::Special1, true)),
        (S::Idle | S::Walk | S::Run, I::Special2) => Some((S::Special2, true)),
        (S::Idle | S::Walk | S::Run, I::Special3) => Some((S::Special3, true)),
        (S::Idle | S::Walk | S::Run, I::Special4) => Some((S::Special4, true)),
        (S::Idle, I::Neglect1 | I::Neglect2) => Some((S::Idle, true)),
        (
            S::AttackMelee
            | S::AttackRange
            | S::RangeDamaged
            | S::MeleeDamaged1
            | S::MeleeDamaged2
            | S::LightningDamaged
            | S::Stand
            | S::Special1
            | S::Special2
            | S::Special3
            | S::Special4,
            I::AnimDone,
        ) => Some((S::Idle, true)),
        (S::Blast, I::ReachPeak) => Some((S::BlastFall, true)),
        (S::Blast | S::BlastFall, I::ReachGround) => Some((S::BlastDrop, true)),
        (S::BlastDagger, I::ReachGroundDagger) => Some((S::BlastDaggerDrop, true)),
        (S::BlastDrop | S::BlastDaggerDrop | S::DamagedDown, I::StandUp) => Some((S::Stand, true)),
        _ => None,
    };
    if direct.is_some() {
        return direct;
    }

    match input {
        I::MeleeDamaged1 if from.meta().cancel => Some((S::MeleeDamaged1, true)),
        I::MeleeDamaged2 if from.meta().cancel => Some((S::MeleeDamaged2, true)),
        I::RangeDamaged if from.meta().cancel => Some((S::RangeDamaged, true)),
        I::LightningDamaged if from.meta().cancel => Some((S::LightningDamaged, true)),
        I::Knockdown if from.meta().cancel => Some((S::DamagedDown, true)),
        I::Blast if !from.is_knocked() => Some((S::Blast, true)),
        I::BlastDagger if !from.is_knocked() => Some((S::BlastDagger, true)),
        _ => None,
    }
}

/// Per-actor animation state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationStateMachine {
    state: AnimState,
    state_time: f32,
    clip_reported: bool,
}

impl Default for AnimationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationStateMachine {
    /// Starts in [`AnimState::Idle`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AnimState::Idle,
            state_time: 0.0,
            clip_reported: false,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> AnimState {
        self.state
    }

    /// Time spent in the current clip.
    #[must_use]
    pub const fn state_time(&self) -> f32 {
        self.state_time
    }

    /// Requests a transition. Returns false, leaving the state unchanged, when
    /// the current state has no edge for `input`.
    pub fn input(&mut self, input: AnimInput) -> bool {
        match transition(self.state, input) {
            Some((next, reset)) => {
                trace!(from = ?self.state, to = ?next, ?input, "Animation transition");
                self.set(next, reset);
                true
            },
            None => {
                trace!(state = ?self.state, ?input, "Animation input ignored");
                false
            },
        }
    }

    /// Applies a replicated state without consulting the table.
    ///
    /// Unknown raw values are ignored and return false.
    pub fn force_state(&mut self, raw: u8) -> bool {
        match AnimState::from_raw(raw) {
            Some(state) => {
                if state != self.state {
                    self.set(state, true);
                }
                true
            },
            None => false,
        }
    }

    /// Assigns a state directly. `reset` restarts the clip even if unchanged.
    pub fn set(&mut self, state: AnimState, reset: bool) {
        if state != self.state || reset {
            self.state_time = 0.0;
            self.clip_reported = false;
        }
        self.state = state;
    }

    /// Advances the clip. Returns true once when a non-looping clip finishes.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.state_time += dt;
        let meta = self.state.meta();
        if meta.looping || self.clip_reported || self.state_time < meta.duration {
            return false;
        }
        self.clip_reported = true;
        true
    }

    /// True when attacks may start from the current state.
    #[must_use]
    pub const fn is_attackable(&self) -> bool {
        self.state.is_attackable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_run_and_stop() {
        let mut fsm = AnimationStateMachine::new();
        assert!(fsm.input(AnimInput::Run));
        assert_eq!(fsm.state(), AnimState::Run);
        assert!(fsm.input(AnimInput::Run));
        assert!(fsm.input(AnimInput::WalkDone));
        assert_eq!(fsm.state(), AnimState::Idle);
        assert!(!fsm.input(AnimInput::WalkDone));
    }

    #[test]
    fn test_attack_clip_finishes() {
        let mut fsm = AnimationStateMachine::new();
        assert!(fsm.input(AnimInput::AttackMelee));
        assert!(!fsm.is_attackable());
        assert!(!fsm.input(AnimInput::Run));
        let mut done = 0;
        for _ in 0..120 {
            if fsm.tick(1.0 / 60.0) {
                done += 1;
                assert!(fsm.input(AnimInput::AnimDone));
            }
        }
        assert_eq!(done, 1);
        assert_eq!(fsm.state(), AnimState::Idle);
    }

    #[test]
    fn test_blast_chain() {
        let mut fsm = AnimationStateMachine::new();
        let chain = [
            (AnimInput::Blast, AnimState::Blast),
            (AnimInput::ReachPeak, AnimState::BlastFall),
            (AnimInput::ReachGround, AnimState::BlastDrop),
            (AnimInput::StandUp, AnimState::Stand),
            (AnimInput::AnimDone, AnimState::Idle),
        ];
        for (input, expected) in chain {
            assert!(fsm.input(input), "{input:?} rejected");
            assert_eq!(fsm.state(), expected);
        }
    }

    #[test]
    fn test_damage_respects_cancel() {
        let mut fsm = AnimationStateMachine::new();
        fsm.set(AnimState::Special2, true);
        assert!(!fsm.input(AnimInput::MeleeDamaged1));
        assert_eq!(fsm.state(), AnimState::Special2);
        fsm.set(AnimState::Run, true);
        assert!(fsm.input(AnimInput::MeleeDamaged2));
        assert_eq!(fsm.state(), AnimState::MeleeDamaged2);
    }

    #[test]
    fn test_die_is_terminal() {
        let mut fsm = AnimationStateMachine::new();
        assert!(fsm.input(AnimInput::Death));
        for input in AnimInput::ALL {
            assert!(!fsm.input(input));
            assert_eq!(fsm.state(), AnimState::Die);
        }
    }

    #[test]
    fn test_force_state() {
        let mut fsm = AnimationStateMachine::new();
        assert!(fsm.force_state(AnimState::BlastFall.raw()));
        assert_eq!(fsm.state(), AnimState::BlastFall);
        assert!(!fsm.force_state(200));
        assert_eq!(fsm.state(), AnimState::BlastFall);
    }

    #[test]
    fn test_raw_values_round() {
        for state in AnimState::ALL {
            assert_eq!(AnimState::from_raw(state.raw()), Some(state));
        }
    }

    proptest! {
        #[test]
        fn prop_input_matches_table(state_idx in 0usize..21, input_idx in 0usize..24) {
            let state = AnimState::ALL[state_idx];
            let input = AnimInput::ALL[input_idx];
            let mut fsm = AnimationStateMachine::new();
            fsm.set(state, true);
            let accepted = fsm.input(input);
            match transition(state, input) {
                Some((next, _)) => {
                    prop_assert!(accepted);
                    prop_assert_eq!(fsm.state(), next);
                },
                None => {
                    prop_assert!(!accepted);
                    prop_assert_eq!(fsm.state(), state);
                }
            }
        }
    }
}

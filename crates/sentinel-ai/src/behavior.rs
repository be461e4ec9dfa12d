//! Behavior state machine: broad NPC intent.
//!
//! States are stateless handlers shared by every NPC. Per-NPC data lives in a
//! [`BehaviorBlackboard`] owned by the machine, so transitions never allocate.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Behavior states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BehaviorStateId {
    /// No intent; waits for a target
    #[default]
    Idle,
    /// Walks a patrol route
    Patrol,
    /// Engages the current target
    Attack,
    /// Flees from the target
    Retreat,
    /// Recovering from a movement dead end
    Stuck,
}

impl BehaviorStateId {
    /// Every state.
    pub const ALL: [BehaviorStateId; 5] = [
        BehaviorStateId::Idle,
        BehaviorStateId::Patrol,
        BehaviorStateId::Attack,
        BehaviorStateId::Retreat,
        BehaviorStateId::Stuck,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

/// Inputs fed to the behavior state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorInput {
    /// Took damage
    Attacked,
    /// A valid target is within the out-distance band
    TargetFound,
    /// The target died or disappeared
    TargetLost,
    /// The target is within attack range
    TargetInRange,
    /// The target moved beyond the out-distance band
    TargetOutOfRange,
    /// Hit points fell below the retreat ratio
    LowHealth,
    /// No route to the target
    PathBlocked,
    /// Stuck detection fired
    Stuck,
    /// Movement resumed
    Unstuck,
}

impl BehaviorInput {
    /// Every input.
    pub const ALL: [BehaviorInput; 9] = [
        BehaviorInput::Attacked,
        BehaviorInput::TargetFound,
        BehaviorInput::TargetLost,
        BehaviorInput::TargetInRange,
        BehaviorInput::TargetOutOfRange,
        BehaviorInput::LowHealth,
        BehaviorInput::PathBlocked,
        BehaviorInput::Stuck,
        BehaviorInput::Unstuck,
    ];
}

/// Looks up the behavior transition for `input` in `from`.
#[must_use]
pub const fn behavior_transition(
    from: BehaviorStateId,
    input: BehaviorInput,
) -> Option<BehaviorStateId> {
    use BehaviorInput as I;
    use BehaviorStateId as S;

    match (from, input) {
        (S::Idle | S::Patrol | S::Stuck, I::Attacked | I::TargetFound) => Some(S::Attack),
        (S::Idle | S::Attack, I::Stuck) => Some(S::Stuck),
        (S::Attack, I::TargetLost | I::TargetOutOfRange) => Some(S::Idle),
        (S::Attack, I::LowHealth) => Some(S::Retreat),
        (S::Stuck, I::Unstuck) => Some(S::Idle),
        _ => None,
    }
}

/// What a state's `run` hook asks the machine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Nothing
    Stay,
    /// Feed an input through the table
    Input(BehaviorInput),
    /// Switch state unconditionally
    Force(BehaviorStateId),
}

/// Per-tick facts the brain hands to the running state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BehaviorContext {
    /// The brain still holds a live target
    pub target_alive: bool,
    /// Time to spend in Retreat
    pub retreat_duration: f32,
}

/// Time in Stuck after which a hint is logged.
const STUCK_HINT_TIME: f32 = 5.0;

/// Per-NPC data for the shared state handlers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorBlackboard {
    /// Time since the current state was entered
    pub state_elapsed: f32,
    /// Total time the machine has run
    pub total_time: f32,
    /// `total_time` when Stuck was last entered
    pub stuck_started_at: f32,
    /// Escape attempts since Stuck was entered
    pub escape_attempts: u32,
    /// The long-stuck hint was logged
    pub stuck_hinted: bool,
    /// Time spent retreating
    pub retreat_elapsed: f32,
    /// Enter calls per state
    pub enter_counts: [u32; 5],
    /// Exit calls per state
    pub exit_counts: [u32; 5],
}

impl BehaviorBlackboard {
    /// Enter calls recorded for `state`.
    #[must_use]
    pub const fn enters(&self, state: BehaviorStateId) -> u32 {
        self.enter_counts[state.index()]
    }

    /// Exit calls recorded for `state`.
    #[must_use]
    pub const fn exits(&self, state: BehaviorStateId) -> u32 {
        self.exit_counts[state.index()]
    }
}

/// Hooks of one behavior state.
pub trait BehaviorState: Sync {
    /// State this handler implements.
    fn id(&self) -> BehaviorStateId;

    /// Called when the state becomes current.
    fn enter(&self, _board: &mut BehaviorBlackboard) {}

    /// Called when the state stops being current.
    fn exit(&self, _board: &mut BehaviorBlackboard) {}

    /// Continuous per-tick logic.
    fn run(&self, _dt: f32, _board: &mut BehaviorBlackboard, _ctx: &BehaviorContext) -> Directive {
        Directive::Stay
    }
}

struct IdleState;
struct PatrolState;
struct AttackState;
struct RetreatState;
struct StuckState;

impl BehaviorState for IdleState {
    fn id(&self) -> BehaviorStateId {
        BehaviorStateId::Idle
    }
}

impl BehaviorState for PatrolState {
    fn id(&self) -> BehaviorStateId {
        BehaviorStateId::Patrol
    }
}

impl BehaviorState for AttackState {
    fn id(&self) -> BehaviorStateId {
        BehaviorStateId::Attack
    }

    fn run(&self, _dt: f32, _board: &mut BehaviorBlackboard, ctx: &BehaviorContext) -> Directive {
        if ctx.target_alive {
            Directive::Stay
        } else {
            Directive::Input(BehaviorInput::TargetLost)
        }
    }
}

impl BehaviorState for RetreatState {
    fn id(&self) -> BehaviorStateId {
        BehaviorStateId::Retreat
    }

    fn enter(&self, board: &mut BehaviorBlackboard) {
        board.retreat_elapsed = 0.0;
    }

    fn run(&self, dt: f32, board: &mut BehaviorBlackboard, ctx: &BehaviorContext) -> Directive {
        board.retreat_elapsed += dt;
        if board.retreat_elapsed >= ctx.retreat_duration {
            Directive::Force(BehaviorStateId::Idle)
        } else {
            Directive::Stay
        }
    }
}

impl BehaviorState for StuckState {
    fn id(&self) -> BehaviorStateId {
        BehaviorStateId::Stuck
    }

    fn enter(&self, board: &mut BehaviorBlackboard) {
        board.stuck_started_at = board.total_time;
        board.escape_attempts = 0;
        board.stuck_hinted = false;
    }

    fn run(&self, _dt: f32, board: &mut BehaviorBlackboard, _ctx: &BehaviorContext) -> Directive {
        let stuck_for = board.total_time - board.stuck_started_at;
        if stuck_for > STUCK_HINT_TIME && !board.stuck_hinted {
            board.stuck_hinted = true;
            debug!(
                stuck_for,
                attempts = board.escape_attempts,
                "NPC stuck for a long time"
            );
        }
        Directive::Stay
    }
}

static IDLE: IdleState = IdleState;
static PATROL: PatrolState = PatrolState;
static ATTACK: AttackState = AttackState;
static RETREAT: RetreatState = RetreatState;
static STUCK: StuckState = StuckState;

/// Shared handler for a state.
#[must_use]
pub fn handler(id: BehaviorStateId) -> &'static dyn BehaviorState {
    match id {
        BehaviorStateId::Idle => &IDLE,
        BehaviorStateId::Patrol => &PATROL,
        BehaviorStateId::Attack => &ATTACK,
        BehaviorStateId::Retreat => &RETREAT,
        BehaviorStateId::Stuck => &STUCK,
    }
}

/// Per-NPC behavior state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorStateMachine {
    current: BehaviorStateId,
    board: BehaviorBlackboard,
}

impl Default for BehaviorStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl BehaviorStateMachine {
    /// Starts in Idle.
    #[must_use]
    pub fn new() -> Self {
        let mut board = BehaviorBlackboard::default();
        handler(BehaviorStateId::Idle).enter(&mut board);
        board.enter_counts[BehaviorStateId::Idle.index()] += 1;
        Self {
            current: BehaviorStateId::Idle,
            board,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> BehaviorStateId {
        self.current
    }

    /// Per-NPC state data.
    #[must_use]
    pub const fn blackboard(&self) -> &BehaviorBlackboard {
        &self.board
    }

    /// Records a stuck-escape attempt.
    pub fn note_escape_attempt(&mut self) {
        self.board.escape_attempts += 1;
    }

    /// Feeds an input. Returns false when the current state has no edge for it.
    pub fn input(&mut self, input: BehaviorInput) -> bool {
        match behavior_transition(self.current, input) {
            Some(next) => {
                trace!(from = ?self.current, to = ?next, ?input, "Behavior transition");
                self.switch(next);
                true
            },
            None => false,
        }
    }

    /// Switches state without consulting the table.
    ///
    /// Always runs Exit then Enter, even when `state` is already current.
    pub fn force_state(&mut self, state: BehaviorStateId) {
        trace!(from = ?self.current, to = ?state, "Behavior forced");
        self.switch(state);
    }

    /// Runs the current state's per-tick hook and applies its directive.
    ///
    /// Returns true when the state changed.
    pub fn run(&mut self, dt: f32, ctx: &BehaviorContext) -> bool {
        self.board.total_time += dt;
        self.board.state_elapsed += dt;
        match handler(self.current).run(dt, &mut self.board, ctx) {
            Directive::Stay => false,
            Directive::Input(input) => self.input(input),
            Directive::Force(state) => {
                self.force_state(state);
                true
            },
        }
    }

    fn switch(&mut self, next: BehaviorStateId) {
        handler(self.current).exit(&mut self.board);
        self.board.exit_counts[self.current.index()] += 1;
        self.current = next;
        self.board.state_elapsed = 0.0;
        handler(next).enter(&mut self.board);
        self.board.enter_counts[next.index()] += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CTX: BehaviorContext = BehaviorContext {
        target_alive: true,
        retreat_duration: 3.0,
    };

    #[test]
    fn test_table_edges() {
        use BehaviorInput as I;
        use BehaviorStateId as S;
        let edges = [
            (S::Idle, I::Attacked, S::Attack),
            (S::Idle, I::TargetFound, S::Attack),
            (S::Idle, I::Stuck, S::Stuck),
            (S::Attack, I::TargetLost, S::Idle),
            (S::Attack, I::TargetOutOfRange, S::Idle),
            (S::Attack, I::LowHealth, S::Retreat),
            (S::Attack, I::Stuck, S::Stuck),
            (S::Patrol, I::TargetFound, S::Attack),
            (S::Patrol, I::Attacked, S::Attack),
            (S::Stuck, I::Unstuck, S::Idle),
            (S::Stuck, I::TargetFound, S::Attack),
            (S::Stuck, I::Attacked, S::Attack),
        ];
        let mut accepted = 0;
        for from in S::ALL {
            for input in I::ALL {
                let expected = edges
                    .iter()
                    .find(|(f, i, _)| *f == from && *i == input)
                    .map(|(_, _, to)| *to);
                assert_eq!(behavior_transition(from, input), expected, "{from:?} {input:?}");
                accepted += usize::from(expected.is_some());
            }
        }
        assert_eq!(accepted, edges.len());
    }

    #[test]
    fn test_force_same_state_reenters() {
        let mut fsm = BehaviorStateMachine::new();
        fsm.input(BehaviorInput::Stuck);
        fsm.note_escape_attempt();
        assert_eq!(fsm.blackboard().escape_attempts, 1);
        fsm.force_state(BehaviorStateId::Stuck);
        assert_eq!(fsm.state(), BehaviorStateId::Stuck);
        assert_eq!(fsm.blackboard().enters(BehaviorStateId::Stuck), 2);
        assert_eq!(fsm.blackboard().exits(BehaviorStateId::Stuck), 1);
        assert_eq!(fsm.blackboard().escape_attempts, 0);
    }

    #[test]
    fn test_attack_run_drops_dead_target() {
        let mut fsm = BehaviorStateMachine::new();
        assert!(fsm.input(BehaviorInput::TargetFound));
        assert!(!fsm.run(0.1, &CTX));
        let lost = BehaviorContext {
            target_alive: false,
            ..CTX
        };
        assert!(fsm.run(0.1, &lost));
        assert_eq!(fsm.state(), BehaviorStateId::Idle);
    }

    #[test]
    fn test_retreat_times_out() {
        let mut fsm = BehaviorStateMachine::new();
        fsm.input(BehaviorInput::TargetFound);
        assert!(fsm.input(BehaviorInput::LowHealth));
        let mut ticks = 0;
        while fsm.state() == BehaviorStateId::Retreat {
            fsm.run(0.5, &CTX);
            ticks += 1;
            assert!(ticks < 100);
        }
        assert_eq!(fsm.state(), BehaviorStateId::Idle);
        assert_eq!(ticks, 6);
    }

    #[test]
    fn test_stuck_hint_logged_once() {
        let mut fsm = BehaviorStateMachine::new();
        fsm.input(BehaviorInput::Stuck);
        for _ in 0..12 {
            fsm.run(0.5, &CTX);
        }
        assert!(fsm.blackboard().stuck_hinted);
        assert_eq!(fsm.state(), BehaviorStateId::Stuck);
    }

    proptest! {
        #[test]
        fn prop_input_follows_table(
            start in 0usize..5,
            inputs in proptest::collection::vec(0usize..9, 1..40),
        ) {
            let mut fsm = BehaviorStateMachine::new();
            fsm.force_state(BehaviorStateId::ALL[start]);
            for index in inputs {
                let input = BehaviorInput::ALL[index];
                let before = fsm.state();
                let board = fsm.blackboard().clone();
                let accepted = fsm.input(input);
                match behavior_transition(before, input) {
                    Some(next) => {
                        prop_assert!(accepted);
                        prop_assert_eq!(fsm.state(), next);
                        prop_assert_eq!(fsm.blackboard().exits(before), board.exits(before) + 1);
                        prop_assert_eq!(fsm.blackboard().enters(next), board.enters(next) + 1);
                    },
                    None => {
                        prop_assert!(!accepted);
                        prop_assert_eq!(fsm.state(), before);
                        prop_assert_eq!(fsm.blackboard(), &board);
                    }
                }
            }
        }
    }
}

//! Sequential actor commands.
//!
//! The brain enqueues tasks; the actor executes the head of the queue each
//! tick. Clearing builds the drained list first and swaps in an empty queue.

use glam::Vec3;
use sentinel_common::{ObjectId, SkillId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Task discriminant, reported when a task finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    /// Walk to a position
    MoveToPos,
    /// Run in a direction for a while
    MoveToDir,
    /// Chase an object until in range
    MoveToTarget,
    /// Turn in place
    RotateToDir,
    /// Melee swing
    AttackMelee,
    /// Ranged shot
    AttackRange,
    /// Skill cast
    Skill,
}

impl TaskKind {
    /// Move-to-position, move-to-direction and move-to-target.
    #[must_use]
    pub const fn is_movement(self) -> bool {
        matches!(self, Self::MoveToPos | Self::MoveToDir | Self::MoveToTarget)
    }

    /// Tasks that new pathing must not interrupt.
    #[must_use]
    pub const fn blocks_pathing(self) -> bool {
        matches!(
            self,
            Self::RotateToDir | Self::AttackMelee | Self::AttackRange | Self::Skill
        )
    }
}

/// A queued command with its progress.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Walk to `target`. A chained move keeps running into the next one.
    MoveToPos {
        /// Destination
        target: Vec3,
        /// Another move follows
        chained: bool,
    },
    /// Run along `dir` for `duration` seconds.
    MoveToDir {
        /// Planar direction
        dir: Vec3,
        /// Run time
        duration: f32,
        /// Time run so far
        elapsed: f32,
    },
    /// Chase an object until within `range`.
    MoveToTarget {
        /// Object to chase
        target: ObjectId,
        /// Stopping distance
        range: f32,
    },
    /// Turn in place to face `dir`.
    RotateToDir {
        /// Direction to face
        dir: Vec3,
    },
    /// Swing once.
    AttackMelee {
        /// The animation was accepted
        started: bool,
    },
    /// Shoot once along `dir`.
    AttackRange {
        /// Shot direction
        dir: Vec3,
        /// The animation was accepted
        started: bool,
    },
    /// Cast a skill.
    Skill {
        /// Skill to cast
        skill: SkillId,
        /// Target object, if any
        target: Option<ObjectId>,
        /// Target position
        pos: Vec3,
        /// The animation was accepted
        started: bool,
    },
}

impl Task {
    /// Move task toward a position.
    #[must_use]
    pub const fn move_to_pos(target: Vec3, chained: bool) -> Self {
        Self::MoveToPos { target, chained }
    }

    /// Timed run along a direction.
    #[must_use]
    pub const fn move_to_dir(dir: Vec3, duration: f32) -> Self {
        Self::MoveToDir {
            dir,
            duration,
            elapsed: 0.0,
        }
    }

    /// Chase task.
    #[must_use]
    pub const fn move_to_target(target: ObjectId, range: f32) -> Self {
        Self::MoveToTarget { target, range }
    }

    /// Turn task.
    #[must_use]
    pub const fn rotate_to_dir(dir: Vec3) -> Self {
        Self::RotateToDir { dir }
    }

    /// Melee task.
    #[must_use]
    pub const fn attack_melee() -> Self {
        Self::AttackMelee { started: false }
    }

    /// Ranged task.
    #[must_use]
    pub const fn attack_range(dir: Vec3) -> Self {
        Self::AttackRange {
            dir,
            started: false,
        }
    }

    /// Skill task.
    #[must_use]
    pub const fn skill(skill: SkillId, target: Option<ObjectId>, pos: Vec3) -> Self {
        Self::Skill {
            skill,
            target,
            pos,
            started: false,
        }
    }

    /// Discriminant of this task.
    #[must_use]
    pub const fn kind(&self) -> TaskKind {
        match self {
            Self::MoveToPos { .. } => TaskKind::MoveToPos,
            Self::MoveToDir { .. } => TaskKind::MoveToDir,
            Self::MoveToTarget { .. } => TaskKind::MoveToTarget,
            Self::RotateToDir { .. } => TaskKind::RotateToDir,
            Self::AttackMelee { .. } => TaskKind::AttackMelee,
            Self::AttackRange { .. } => TaskKind::AttackRange,
            Self::Skill { .. } => TaskKind::Skill,
        }
    }
}

/// Outcome of running a task for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskResult {
    /// Keep running next tick
    Running,
    /// Finished normally
    Completed,
    /// Gave up or was rejected
    Cancelled,
}

/// Bounded FIFO of tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
    capacity: usize,
}

impl TaskQueue {
    /// Creates an empty queue holding at most `capacity` tasks, and at least one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            tasks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a task. Returns false when the queue is full.
    pub fn push_back(&mut self, task: Task) -> bool {
        if self.tasks.len() >= self.capacity {
            return false;
        }
        self.tasks.push_back(task);
        true
    }

    /// Puts a task ahead of the current one. Returns false when the queue is full.
    pub fn push_front(&mut self, task: Task) -> bool {
        if self.tasks.len() >= self.capacity {
            return false;
        }
        self.tasks.push_front(task);
        true
    }

    /// Empties the queue, returning what it held in order.
    pub fn clear(&mut self) -> Vec<Task> {
        let drained = std::mem::replace(&mut self.tasks, VecDeque::with_capacity(self.capacity));
        drained.into()
    }

    /// Replaces the whole queue. Returns the previous tasks.
    ///
    /// Tasks beyond the capacity are dropped.
    pub fn replace(&mut self, tasks: impl IntoIterator<Item = Task>) -> Vec<Task> {
        let next: VecDeque<Task> = tasks.into_iter().take(self.capacity).collect();
        std::mem::replace(&mut self.tasks, next).into()
    }

    /// Removes the head task.
    pub fn pop_front(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// The task being executed.
    #[must_use]
    pub fn current(&self) -> Option<&Task> {
        self.tasks.front()
    }

    /// Mutable access to the task being executed.
    pub fn current_mut(&mut self) -> Option<&mut Task> {
        self.tasks.front_mut()
    }

    /// Kind of the task being executed.
    #[must_use]
    pub fn current_kind(&self) -> Option<TaskKind> {
        self.current().map(Task::kind)
    }

    /// True when the head task is a movement task.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.current_kind().is_some_and(TaskKind::is_movement)
    }

    /// Iterates over queued tasks, head first.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Maximum number of tasks.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_bounded() {
        let mut queue = TaskQueue::new(2);
        assert!(queue.push_back(Task::attack_melee()));
        assert!(queue.push_back(Task::attack_melee()));
        assert!(!queue.push_back(Task::attack_melee()));
        assert!(!queue.push_front(Task::attack_melee()));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_push_front_preempts() {
        let mut queue = TaskQueue::new(8);
        queue.push_back(Task::move_to_pos(Vec3::X, false));
        queue.push_front(Task::attack_melee());
        assert_eq!(queue.current_kind(), Some(TaskKind::AttackMelee));
        assert!(!queue.is_moving());
        queue.pop_front();
        assert!(queue.is_moving());
    }

    #[test]
    fn test_clear_returns_drained_in_order() {
        let mut queue = TaskQueue::new(8);
        queue.push_back(Task::move_to_pos(Vec3::X, true));
        queue.push_back(Task::move_to_pos(Vec3::Y, false));
        let drained = queue.clear();
        assert!(queue.is_empty());
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0], Task::move_to_pos(Vec3::X, true));
    }

    #[test]
    fn test_replace_truncates_to_capacity() {
        let mut queue = TaskQueue::new(3);
        queue.push_back(Task::attack_melee());
        let old = queue.replace((0..5).map(|i| Task::move_to_pos(Vec3::splat(i as f32), i < 4)));
        assert_eq!(old, vec![Task::attack_melee()]);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_kind_predicates() {
        assert!(TaskKind::MoveToTarget.is_movement());
        assert!(!TaskKind::RotateToDir.is_movement());
        assert!(TaskKind::Skill.blocks_pathing());
        assert!(!TaskKind::MoveToPos.blocks_pathing());
    }
}

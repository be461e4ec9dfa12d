//! Event bus carrying actor notifications out to the session layer.

use crate::animation::AnimState;
use crate::task::TaskKind;
use crossbeam_channel::{bounded, Receiver, Sender};
use glam::Vec3;
use sentinel_common::{ObjectId, SkillId};
use serde::{Deserialize, Serialize};

/// Notifications published by actors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActorEvent {
    /// A melee swing started
    MeleeAttack {
        /// Attacker
        actor: ObjectId,
        /// Attacker position
        position: Vec3,
        /// Facing at the swing
        direction: Vec3,
    },
    /// A ranged shot was fired
    RangeShot {
        /// Shooter
        actor: ObjectId,
        /// Muzzle position
        origin: Vec3,
        /// Shot direction after accuracy spread
        direction: Vec3,
    },
    /// A skill was cast
    SkillCast {
        /// Caster
        actor: ObjectId,
        /// Skill used
        skill: SkillId,
        /// Target object, if any
        target: Option<ObjectId>,
        /// Target position
        position: Vec3,
    },
    /// The actor died
    Died {
        /// Dead actor
        actor: ObjectId,
        /// Last attacker
        killer: Option<ObjectId>,
    },
    /// The dying time elapsed; the session may remove the actor
    RemovalRequested {
        /// Dead actor
        actor: ObjectId,
        /// Last attacker
        killer: Option<ObjectId>,
        /// Where the body lies
        position: Vec3,
    },
    /// Idle liveness signal
    Neglect {
        /// Idle actor
        actor: ObjectId,
        /// 1 after losing a target, 2 after idling
        variant: u8,
    },
    /// Replicated state for remote copies
    BasicInfo {
        /// Source actor
        actor: ObjectId,
        /// Position
        position: Vec3,
        /// Velocity
        velocity: Vec3,
        /// Facing
        direction: Vec3,
        /// Animation state
        animation: AnimState,
    },
    /// The actor touched down
    Landed {
        /// Landing actor
        actor: ObjectId,
        /// Landing position
        position: Vec3,
        /// Fell farther than the hard-landing height
        hard: bool,
    },
    /// A queued task completed or was cancelled
    TaskFinished {
        /// Actor
        actor: ObjectId,
        /// Finished task
        task: TaskKind,
    },
    /// Stuck recovery moved the actor directly
    Teleported {
        /// Actor
        actor: ObjectId,
        /// Position before
        from: Vec3,
        /// Position after
        to: Vec3,
    },
}

impl ActorEvent {
    /// The actor the event is about.
    #[must_use]
    pub const fn actor(&self) -> ObjectId {
        match self {
            Self::MeleeAttack { actor, .. }
            | Self::RangeShot { actor, .. }
            | Self::SkillCast { actor, .. }
            | Self::Died { actor, .. }
            | Self::RemovalRequested { actor, .. }
            | Self::Neglect { actor, .. }
            | Self::BasicInfo { actor, .. }
            | Self::Landed { actor, .. }
            | Self::TaskFinished { actor, .. }
            | Self::Teleported { actor, .. } => *actor,
        }
    }
}

/// Event bus for broadcasting actor events to the session.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<ActorEvent>,
    /// Receiver for collecting events
    receiver: Receiver<ActorEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: ActorEvent) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<ActorEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<ActorEvent> {
        self.sender.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_drain() {
        let bus = EventBus::new(4);
        let actor = ObjectId::from_raw(3);
        bus.publish(ActorEvent::Neglect { actor, variant: 1 });
        bus.sender()
            .try_send(ActorEvent::Died { actor, killer: None })
            .expect("room in channel");
        assert_eq!(bus.pending_count(), 2);
        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.actor() == actor));
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_full_bus_drops_events() {
        let bus = EventBus::new(1);
        let actor = ObjectId::from_raw(1);
        bus.publish(ActorEvent::Neglect { actor, variant: 1 });
        bus.publish(ActorEvent::Neglect { actor, variant: 2 });
        assert_eq!(bus.drain(), vec![ActorEvent::Neglect { actor, variant: 1 }]);
    }
}

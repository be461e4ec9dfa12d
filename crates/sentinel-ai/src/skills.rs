//! Per-actor skill slots and cooldowns.

use crate::npc::{NpcCatalog, NpcInfo, SkillDesc};
use sentinel_common::SkillId;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
struct SkillSlot {
    desc: SkillDesc,
    cooldown: f32,
}

/// Skills an actor can cast, with their remaining cooldowns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillSet {
    slots: Vec<SkillSlot>,
}

impl SkillSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves an NPC type's skill list against the catalog.
    ///
    /// Unknown skills are skipped with a warning.
    #[must_use]
    pub fn from_npc(info: &NpcInfo, catalog: &NpcCatalog) -> Self {
        let mut set = Self::new();
        for &id in &info.skills {
            match catalog.skill(id) {
                Some(desc) => set.insert(desc.clone()),
                None => warn!(npc = info.id.raw(), skill = id.raw(), "Skipping unknown skill"),
            }
        }
        set
    }

    /// Adds a skill, ready to cast.
    pub fn insert(&mut self, desc: SkillDesc) {
        self.slots.retain(|slot| slot.desc.id != desc.id);
        self.slots.push(SkillSlot {
            desc,
            cooldown: 0.0,
        });
    }

    /// Counts cooldowns down.
    pub fn update(&mut self, dt: f32) {
        for slot in &mut self.slots {
            slot.cooldown = (slot.cooldown - dt).max(0.0);
        }
    }

    /// Looks up a skill.
    #[must_use]
    pub fn get(&self, id: SkillId) -> Option<&SkillDesc> {
        self.slot(id).map(|slot| &slot.desc)
    }

    /// True when the skill exists and is off cooldown.
    #[must_use]
    pub fn is_ready(&self, id: SkillId) -> bool {
        self.slot(id).is_some_and(|slot| slot.cooldown <= 0.0)
    }

    /// True when the skill is ready and `distance` lies within its range.
    #[must_use]
    pub fn is_usable(&self, id: SkillId, distance: f32) -> bool {
        self.slot(id).is_some_and(|slot| {
            slot.cooldown <= 0.0 && distance >= slot.desc.min_range && distance <= slot.desc.max_range
        })
    }

    /// Starts the skill's cooldown. Returns false for an unknown skill.
    pub fn start_cooldown(&mut self, id: SkillId) -> bool {
        match self.slots.iter_mut().find(|slot| slot.desc.id == id) {
            Some(slot) => {
                slot.cooldown = slot.desc.cooldown;
                true
            },
            None => false,
        }
    }

    /// Iterates over the skill descriptions.
    pub fn iter(&self) -> impl Iterator<Item = &SkillDesc> {
        self.slots.iter().map(|slot| &slot.desc)
    }

    /// Checks if there are no skills.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, id: SkillId) -> Option<&SkillSlot> {
        self.slots.iter().find(|slot| slot.desc.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npc::SkillTarget;
    use sentinel_common::NpcTypeId;

    fn bolt() -> SkillDesc {
        SkillDesc {
            id: SkillId::new(4),
            name: "bolt".into(),
            target: SkillTarget::Enemy,
            min_range: 100.0,
            max_range: 900.0,
            cooldown: 2.0,
            casting_animation: 2,
        }
    }

    #[test]
    fn test_cooldown_cycle() {
        let mut set = SkillSet::new();
        set.insert(bolt());
        let id = SkillId::new(4);
        assert!(set.is_ready(id));
        assert!(set.start_cooldown(id));
        assert!(!set.is_ready(id));
        set.update(1.5);
        assert!(!set.is_ready(id));
        set.update(0.6);
        assert!(set.is_ready(id));
        assert!(!set.start_cooldown(SkillId::new(99)));
    }

    #[test]
    fn test_usable_respects_range() {
        let mut set = SkillSet::new();
        set.insert(bolt());
        let id = SkillId::new(4);
        assert!(!set.is_usable(id, 50.0));
        assert!(set.is_usable(id, 500.0));
        assert!(!set.is_usable(id, 901.0));
    }

    #[test]
    fn test_from_npc_skips_unknown() {
        let mut catalog = NpcCatalog::new();
        catalog.insert_skill(bolt());
        let info = NpcInfo {
            id: NpcTypeId::new(2),
            skills: vec![SkillId::new(4), SkillId::new(5)],
            ..NpcInfo::default()
        };
        let set = SkillSet::from_npc(&info, &catalog);
        assert_eq!(set.iter().count(), 1);
        assert_eq!(set.get(SkillId::new(4)).map(|d| d.casting_animation), Some(2));
    }
}

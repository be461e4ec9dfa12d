//! NPC content data: per-type stats, skills and global AI tuning tables.

use ahash::AHashMap;
use sentinel_common::{ContentError, NpcTypeId, SkillId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Attack capabilities of an NPC type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NpcAttackTypes(u8);

impl NpcAttackTypes {
    /// No attacks at all
    pub const NONE: Self = Self(0);
    /// Close-range default attack
    pub const MELEE: Self = Self(1);
    /// Ranged default attack
    pub const RANGE: Self = Self(1 << 1);
    /// Skill casting
    pub const MAGIC: Self = Self(1 << 2);

    /// Returns true if every capability in `other` is present.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Combines two capability sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True for NPCs that can only fight in melee.
    #[must_use]
    pub const fn is_melee_only(self) -> bool {
        self.0 == Self::MELEE.0
    }
}

/// Preferred engagement distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OffenseType {
    /// Closes in to melee range
    #[default]
    Melee,
    /// Stops at range and shoots
    Range,
}

/// Whom a skill is cast on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillTarget {
    /// Hostile characters
    Enemy,
    /// Friendly objects, the caster included
    Ally,
}

/// Static description of a skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDesc {
    /// Skill identifier
    pub id: SkillId,
    /// Display name
    pub name: String,
    /// Target selection rule
    pub target: SkillTarget,
    /// Minimum usable distance
    #[serde(default)]
    pub min_range: f32,
    /// Maximum usable distance
    pub max_range: f32,
    /// Cooldown after casting, in seconds
    pub cooldown: f32,
    /// Casting animation slot (1-4)
    #[serde(default = "default_casting_animation")]
    pub casting_animation: u8,
}

const fn default_casting_animation() -> u8 {
    1
}

/// Static stats for one NPC type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NpcInfo {
    /// Type identifier
    pub id: NpcTypeId,
    /// Display name
    pub name: String,
    /// Maximum hit points
    pub max_hp: f32,
    /// Base run speed before per-spawn jitter
    pub speed: f32,
    /// Turning speed in radians per second
    pub rotate_speed: f32,
    /// Collision cylinder radius
    pub collision_radius: f32,
    /// Collision cylinder height
    pub collision_height: f32,
    /// Attack capabilities
    pub attack_types: NpcAttackTypes,
    /// Engagement distance preference
    pub offense: OffenseType,
    /// Friendly NPCs follow but never attack
    pub friendly: bool,
    /// Melee reach
    pub attack_range: f32,
    /// Base default-attack cooldown; 0 disables the cooldown
    pub attack_cool_time: f32,
    /// Half-angle of the view cone in radians
    pub view_angle: f32,
    /// Tier (1-based) into the path-finding update table
    pub intelligence: u8,
    /// Tier (1-based) into the attack update table
    pub agility: u8,
    /// Skills this type can cast
    pub skills: Vec<SkillId>,
    /// Ranged accuracy in `[0, 1]`
    pub range_hit_rate: f32,
    /// Immune to blast knockback
    pub never_blasted: bool,
    /// Immune to bullet flinches
    pub never_pushed: bool,
    /// Damage reactions never cancel an attack
    pub never_attack_cancel: bool,
}

impl Default for NpcInfo {
    fn default() -> Self {
        Self {
            id: NpcTypeId::new(0),
            name: String::from("npc"),
            max_hp: 100.0,
            speed: 300.0,
            rotate_speed: std::f32::consts::TAU,
            collision_radius: 35.0,
            collision_height: 180.0,
            attack_types: NpcAttackTypes::MELEE,
            offense: OffenseType::Melee,
            friendly: false,
            attack_range: 150.0,
            attack_cool_time: 1.0,
            view_angle: std::f32::consts::FRAC_PI_2,
            intelligence: 3,
            agility: 3,
            skills: Vec::new(),
            range_hit_rate: 0.8,
            never_blasted: false,
            never_pushed: false,
            never_attack_cancel: false,
        }
    }
}

/// Tier tables and shaking ratios shared by every NPC type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalAiValues {
    /// Path rebuild interval per intelligence tier
    pub path_finding_update_time: Vec<f32>,
    /// Attack decision interval per agility tier
    pub attack_update_time: Vec<f32>,
    /// Jitter ratio for path rebuild intervals
    pub path_finding_shaking_ratio: f32,
    /// Jitter ratio for attack intervals
    pub attack_shaking_ratio: f32,
    /// Jitter ratio for run speed
    pub speed_shaking_ratio: f32,
}

impl Default for GlobalAiValues {
    fn default() -> Self {
        Self {
            path_finding_update_time: vec![1.2, 1.0, 0.8, 0.6, 0.4],
            attack_update_time: vec![2.0, 1.6, 1.2, 0.8, 0.5],
            path_finding_shaking_ratio: 0.3,
            attack_shaking_ratio: 0.3,
            speed_shaking_ratio: 0.1,
        }
    }
}

impl GlobalAiValues {
    /// Path rebuild interval for a 1-based intelligence tier (clamped to the table).
    #[must_use]
    pub fn path_finding_update_time(&self, intelligence: u8) -> f32 {
        tier_value(&self.path_finding_update_time, intelligence)
    }

    /// Attack decision interval for a 1-based agility tier (clamped to the table).
    #[must_use]
    pub fn attack_update_time(&self, agility: u8) -> f32 {
        tier_value(&self.attack_update_time, agility)
    }

    fn validate(&self) -> Result<(), ContentError> {
        if self.path_finding_update_time.is_empty() {
            return Err(ContentError::EmptyTierTable("path_finding_update_time"));
        }
        if self.attack_update_time.is_empty() {
            return Err(ContentError::EmptyTierTable("attack_update_time"));
        }
        Ok(())
    }
}

fn tier_value(table: &[f32], tier: u8) -> f32 {
    let index = usize::from(tier.max(1) - 1).min(table.len().saturating_sub(1));
    table.get(index).copied().unwrap_or(1.0)
}

/// On-disk layout of the catalog.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogData {
    global: GlobalAiValues,
    npcs: Vec<NpcInfo>,
    skills: Vec<SkillDesc>,
}

/// All NPC content for a session, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct NpcCatalog {
    global: GlobalAiValues,
    npcs: AHashMap<NpcTypeId, NpcInfo>,
    skills: AHashMap<SkillId, SkillDesc>,
}

impl NpcCatalog {
    /// Creates an empty catalog with default global values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a catalog from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ContentError> {
        let data: CatalogData = ron::from_str(text).map_err(|e| ContentError::Parse(e.to_string()))?;
        data.global.validate()?;
        let mut catalog = Self {
            global: data.global,
            ..Self::default()
        };
        for skill in data.skills {
            catalog.insert_skill(skill);
        }
        for npc in data.npcs {
            catalog.insert_npc(npc);
        }
        info!(npcs = catalog.npcs.len(), skills = catalog.skills.len(), "NPC catalog loaded");
        Ok(catalog)
    }

    /// Replaces the global tuning tables.
    pub fn set_global(&mut self, global: GlobalAiValues) {
        self.global = global;
    }

    /// Global tuning tables.
    #[must_use]
    pub const fn global(&self) -> &GlobalAiValues {
        &self.global
    }

    /// Registers (or replaces) an NPC type.
    pub fn insert_npc(&mut self, info: NpcInfo) {
        for skill in &info.skills {
            if !self.skills.contains_key(skill) {
                warn!(npc = info.id.raw(), skill = skill.raw(), "NPC references unknown skill");
            }
        }
        self.npcs.insert(info.id, info);
    }

    /// Registers (or replaces) a skill.
    pub fn insert_skill(&mut self, desc: SkillDesc) {
        self.skills.insert(desc.id, desc);
    }

    /// Looks up an NPC type.
    #[must_use]
    pub fn npc(&self, id: NpcTypeId) -> Option<&NpcInfo> {
        self.npcs.get(&id)
    }

    /// Looks up a skill.
    #[must_use]
    pub fn skill(&self, id: SkillId) -> Option<&SkillDesc> {
        self.skills.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"#![enable(unwrap_newtypes)]
    (
        global: (
            path_finding_update_time: [1.0, 0.5],
            attack_update_time: [2.0],
        ),
        skills: [
            (id: 10, name: "heal", target: Ally, max_range: 800.0, cooldown: 5.0),
        ],
        npcs: [
            (id: 1, name: "goblin", attack_types: 5, skills: [10]),
        ],
    )"#;

    #[test]
    fn test_attack_type_flags() {
        let both = NpcAttackTypes::MELEE.union(NpcAttackTypes::MAGIC);
        assert!(both.contains(NpcAttackTypes::MELEE));
        assert!(both.contains(NpcAttackTypes::MAGIC));
        assert!(!both.contains(NpcAttackTypes::RANGE));
        assert!(!both.is_melee_only());
        assert!(NpcAttackTypes::MELEE.is_melee_only());
    }

    #[test]
    fn test_tier_lookup_clamps() {
        let values = GlobalAiValues::default();
        assert!((values.path_finding_update_time(0) - 1.2).abs() < f32::EPSILON);
        assert!((values.path_finding_update_time(1) - 1.2).abs() < f32::EPSILON);
        assert!((values.path_finding_update_time(5) - 0.4).abs() < f32::EPSILON);
        assert!((values.path_finding_update_time(200) - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_catalog_from_ron() {
        let catalog = NpcCatalog::from_ron_str(CATALOG).expect("valid catalog");
        let goblin = catalog.npc(NpcTypeId::new(1)).expect("goblin");
        assert_eq!(goblin.name, "goblin");
        assert!(goblin.attack_types.contains(NpcAttackTypes::MAGIC));
        assert!((goblin.speed - 300.0).abs() < f32::EPSILON);
        let heal = catalog.skill(SkillId::new(10)).expect("heal");
        assert_eq!(heal.target, SkillTarget::Ally);
        assert_eq!(heal.casting_animation, 1);
        assert!((catalog.global().attack_update_time(4) - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_catalog_rejects_empty_tiers() {
        let err = NpcCatalog::from_ron_str("(global: (path_finding_update_time: []))")
            .expect_err("empty table");
        assert!(matches!(err, ContentError::EmptyTierTable("path_finding_update_time")));
        assert!(NpcCatalog::from_ron_str("not ron").is_err());
    }
}

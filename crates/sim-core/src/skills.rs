//! Skill Progression Core (spec §3.4, §4.5).
//!
//! Skills improve only through use: no experience points, no allocation.
//! Every call here is a pure function of the skill's own state plus the
//! caller-supplied situational inputs (pain, injuries, a context string for
//! specialization matching).

use serde::{Deserialize, Serialize};
use sim_events::WallInstant;
use std::collections::HashMap;

/// Validated, content-owned skill identifier. The catalogue itself (names,
/// categories, starting levels) lives outside the core; this newtype only
/// guarantees non-empty, interned-by-value identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SkillId(String);

impl SkillId {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        assert!(!id.is_empty(), "skill id must not be empty");
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SkillId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The ten closed skill categories; body-part tables and category-level
/// queries key off this rather than off `SkillId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Combat,
    Defense,
    Ranged,
    Magic,
    Craft,
    Social,
    Stealth,
    Survival,
    Lore,
    Athletic,
}

/// A body part an injury may be recorded against (spec §4.5.1 step 3).
pub type BodyPart = String;

/// One contribution a skill receives from another (spec §4.5.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Synergy {
    pub target: SkillId,
    pub multiplier: f64,
    pub max_level: u32,
}

/// Muscle-memory record for a single action signature (spec §4.5.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuscleMemoryEntry {
    pub reps: u32,
    pub success_rate: f64,
    pub last_used: WallInstant,
    pub bonus: f64,
}

impl MuscleMemoryEntry {
    fn new(now: WallInstant) -> Self {
        Self {
            reps: 0,
            success_rate: 0.0,
            last_used: now,
            bonus: 0.0,
        }
    }
}

const MILLIS_PER_DAY: u64 = 86_400_000;

fn days_between(earlier: WallInstant, later: WallInstant) -> u64 {
    later.elapsed_millis_since(earlier) / MILLIS_PER_DAY
}

/// A single skill's full progression state (spec §3.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub category: SkillCategory,
    pub level: i64,
    pub progress: f64,
    pub uses_today: u32,
    pub total_uses: u64,
    pub last_difficulty_practiced: i64,
    pub muscle_memory: HashMap<String, MuscleMemoryEntry>,
    pub synergies: Vec<Synergy>,
    pub specializations: std::collections::HashSet<String>,
    pub degradation_rate: f64,
    pub last_used: WallInstant,
    pub natural_talent: f64,
    pub learning_fatigue: f64,
    pub teacher_bonus: f64,
    pub practice_quality: f64,
}

impl Skill {
    pub fn new(id: SkillId, category: SkillCategory, now: WallInstant) -> Self {
        Self {
            id,
            category,
            level: 0,
            progress: 0.0,
            uses_today: 0,
            total_uses: 0,
            last_difficulty_practiced: 0,
            muscle_memory: HashMap::new(),
            synergies: Vec::new(),
            specializations: std::collections::HashSet::new(),
            degradation_rate: 0.001,
            last_used: now,
            natural_talent: 1.0,
            learning_fatigue: 0.0,
            teacher_bonus: 0.0,
            practice_quality: 1.0,
        }
    }

    /// Level reduced by pain and injury, clamped to at most 90% total
    /// penalty (spec §4.5.1 is folded into this when both penalties are
    /// known up front; kept separately addressable for callers that only
    /// have one of the two).
    pub fn effective_level(&self, pain_penalty: f64, injury_penalty: f64) -> i64 {
        let total = (pain_penalty + injury_penalty).min(0.9);
        let effective = (self.level as f64 * (1.0 - total)) as i64;
        effective.max(0)
    }

    /// Base success chance before pain/injury multipliers (spec §4.5.1
    /// step 4, pre-penalty half).
    pub fn success_chance(&self, difficulty: i64, modifiers: f64) -> f64 {
        let skill_diff = (self.level - difficulty) as f64;
        let base = 0.5 + skill_diff / 100.0;
        (base + modifiers).clamp(0.05, 0.95)
    }

    /// Whether a use at `difficulty` falls inside the learning window at all
    /// (spec §4.5.2's gating before the probability roll).
    pub fn can_improve(&self, difficulty: i64) -> bool {
        let diff = (self.level - difficulty).unsigned_abs();
        if diff < 5 {
            self.uses_today < 100
        } else if diff <= 30 {
            true
        } else {
            diff <= 50
        }
    }

    /// Current muscle-memory bonus for `signature`, decayed by days unused
    /// (spec §4.5.4).
    pub fn muscle_memory_bonus(&self, signature: &str, now: WallInstant) -> f64 {
        let Some(entry) = self.muscle_memory.get(signature) else {
            return 0.0;
        };
        let days_unused = days_between(entry.last_used, now) as f64;
        let decay = (1.0 - days_unused * 0.02).max(0.5);
        entry.bonus * decay
    }

    /// Records a use of `signature`, updating reps/EWMA/bonus.
    pub fn update_muscle_memory(&mut self, signature: &str, success: bool, now: WallInstant) {
        let entry = self
            .muscle_memory
            .entry(signature.to_string())
            .or_insert_with(|| MuscleMemoryEntry::new(now));
        entry.reps += 1;
        entry.last_used = now;
        let weight = (1.0 / entry.reps as f64).min(0.1);
        let outcome = if success { 1.0 } else { 0.0 };
        entry.success_rate = entry.success_rate * (1.0 - weight) + outcome * weight;
        entry.bonus = (entry.reps as f64 * 0.005).min(0.3);
    }

    /// Sum of synergy contributions, capped at 0.5 (spec §4.5.5). `level_of`
    /// resolves another skill's level; skills the caller doesn't have
    /// contribute nothing.
    pub fn synergy_bonus(&self, level_of: impl Fn(&SkillId) -> Option<i64>) -> f64 {
        let total: f64 = self
            .synergies
            .iter()
            .filter_map(|s| {
                let other_level = level_of(&s.target)?;
                let capped = other_level.min(s.max_level as i64).max(0) as f64;
                Some(capped * s.multiplier * 0.01)
            })
            .sum();
        total.min(0.5)
    }

    /// Flat +0.20 bonus when any specialization substring case-insensitively
    /// matches `context` (spec §4.5.8).
    pub fn specialization_bonus(&self, context: &str) -> f64 {
        let context = context.to_lowercase();
        if self
            .specializations
            .iter()
            .any(|spec| context.contains(&spec.to_lowercase()))
        {
            0.2
        } else {
            0.0
        }
    }

    pub fn add_specialization(&mut self, specialization: impl Into<String>) {
        self.specializations.insert(specialization.into());
    }

    /// Learning efficiency, multiplied into progress gained (not into the
    /// learn probability) — spec §4.5.3.
    pub fn learning_efficiency(&self) -> f64 {
        let fatigue_penalty = self.learning_fatigue * 0.5;
        let raw =
            self.natural_talent * (1.0 - fatigue_penalty + self.teacher_bonus) * self.practice_quality;
        raw.clamp(0.1, 3.0)
    }

    /// Degrades progress/level for `days_passed` elapsed days, gated on the
    /// skill having sat unused more than a week (spec §4.5.6).
    pub fn apply_degradation(&mut self, days_passed: u64, now: WallInstant) {
        if days_passed == 0 {
            return;
        }
        let days_unused = days_between(self.last_used, now);
        if days_unused <= 7 {
            return;
        }
        let resistance = 1.0 - self.level as f64 * 0.01;
        let degradation =
            self.degradation_rate * days_unused as f64 * days_passed as f64 * resistance;

        self.progress -= degradation * 100.0;
        if self.progress < 0.0 && self.level > 0 {
            self.level -= 1;
            self.progress = (100.0 + self.progress).max(0.0);
        }
    }
}

/// Outcome of a single [`SkillSystem::use_skill`] call (spec §4.5.1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UseOutcome {
    pub success: bool,
    pub leveled_up: bool,
    pub pain_penalty: f64,
    pub injury_penalty: f64,
}

/// Pain penalty as a piecewise function of `pain_level` in [0, 100]
/// (spec §4.5.1 step 2).
pub fn pain_penalty(pain_level: f64) -> f64 {
    if pain_level < 30.0 {
        0.0
    } else if pain_level < 50.0 {
        (pain_level - 30.0) / 100.0
    } else if pain_level < 70.0 {
        0.2 + (pain_level - 50.0) / 50.0
    } else {
        (0.6 + (pain_level - 70.0) / 40.0).min(0.75)
    }
}

/// Returns the body parts relevant to a skill for injury-penalty lookup
/// (spec §4.5.1 step 3). Skills absent from the table have no relevant
/// parts and suffer no injury penalty.
fn relevant_body_parts(skill: &SkillId) -> &'static [&'static str] {
    match skill.as_str() {
        "unarmed_combat" => &["right_arm", "left_arm", "torso", "right_leg", "left_leg"],
        "swords" => &["right_arm", "torso", "right_leg", "left_leg"],
        "archery" => &["right_arm", "left_arm", "torso", "head"],
        "stealth" => &["right_leg", "left_leg", "torso"],
        "persuasion" | "trade" => &["head"],
        "blacksmithing" => &["right_arm", "left_arm", "torso"],
        "alchemy" | "first_aid" => &["right_arm", "left_arm", "head"],
        "endurance" => &["torso", "head"],
        _ => &[],
    }
}

/// Injury penalty summed across relevant body parts, capped at 0.9
/// (spec §4.5.1 step 3). `injuries` maps body part name to severity 0..100.
pub fn injury_penalty(skill: &SkillId, injuries: &HashMap<String, f64>) -> f64 {
    if injuries.is_empty() {
        return 0.0;
    }
    let total: f64 = relevant_body_parts(skill)
        .iter()
        .filter_map(|part| injuries.get(*part))
        .filter(|level| **level > 0.0)
        .map(|level| (level / 100.0) * 0.3)
        .sum();
    total.min(0.9)
}

/// Owns every skill the player has and mediates use/training/degradation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillSystem {
    skills: HashMap<SkillId, Skill>,
    pub learning_multiplier: f64,
}

impl Default for SkillSystem {
    fn default() -> Self {
        Self {
            skills: HashMap::new(),
            learning_multiplier: 1.0,
        }
    }
}

impl SkillSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, skill: Skill) {
        self.skills.insert(skill.id.clone(), skill);
    }

    pub fn get(&self, id: &SkillId) -> Option<&Skill> {
        self.skills.get(id)
    }

    pub fn get_mut(&mut self, id: &SkillId) -> Option<&mut Skill> {
        self.skills.get_mut(id)
    }

    pub fn level_of(&self, id: &SkillId) -> Option<i64> {
        self.skills.get(id).map(|s| s.level)
    }

    /// Resolves use of `id` against `difficulty`, applying pain/injury
    /// penalties and, if the use falls in the learning window, rolling for
    /// improvement (spec §4.5.1/§4.5.2). `roll` and `learn_roll` are
    /// injected so callers can seed the RNG deterministically.
    #[allow(clippy::too_many_arguments)]
    pub fn use_skill(
        &mut self,
        id: &SkillId,
        difficulty: i64,
        pain_level: f64,
        injuries: &HashMap<String, f64>,
        modifiers: f64,
        now: WallInstant,
        roll: f64,
        learn_roll: f64,
        progress_roll: f64,
    ) -> Option<UseOutcome> {
        let pain_pen = pain_penalty(pain_level);
        let injury_pen = injury_penalty(id, injuries);

        let learning_multiplier = self.learning_multiplier;
        let skill = self.skills.get_mut(id)?;

        let base_chance = skill.success_chance(difficulty, modifiers);
        let final_chance = base_chance * (1.0 - pain_pen) * (1.0 - injury_pen);
        let success = roll < final_chance;

        skill.uses_today += 1;
        skill.total_uses += 1;
        skill.last_difficulty_practiced = difficulty;
        skill.last_used = now;

        let leveled_up = if skill.can_improve(difficulty) {
            try_improve(skill, difficulty, success, learning_multiplier, learn_roll, progress_roll)
        } else {
            false
        };

        Some(UseOutcome {
            success,
            leveled_up,
            pain_penalty: pain_pen,
            injury_penalty: injury_pen,
        })
    }

    /// Zeroes every skill's `uses_today`; called at day rollover
    /// (spec §4.5.7).
    pub fn reset_daily_limits(&mut self) {
        for skill in self.skills.values_mut() {
            skill.uses_today = 0;
        }
    }

    /// Applies degradation to every skill for `days_passed` elapsed days
    /// (spec §4.5.6), driven by the tick loop at day rollover.
    pub fn apply_degradation_all(&mut self, days_passed: u64, now: WallInstant) {
        for skill in self.skills.values_mut() {
            skill.apply_degradation(days_passed, now);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values()
    }
}

/// Learning-window probability roll and progress gain (spec §4.5.2,
/// §4.5.3). Returns whether the skill leveled up.
fn try_improve(
    skill: &mut Skill,
    difficulty: i64,
    success: bool,
    learning_multiplier: f64,
    learn_roll: f64,
    progress_roll: f64,
) -> bool {
    let diff = (skill.level - difficulty).unsigned_abs();

    let mut learn_chance = if diff < 5 {
        0.01 * learning_multiplier
    } else if diff <= 15 {
        let mut chance = 0.10 * learning_multiplier;
        if !success {
            chance *= 1.5;
        }
        chance
    } else if diff <= 30 {
        0.05 * learning_multiplier
    } else if diff <= 50 {
        0.02 * learning_multiplier
    } else {
        return false;
    };

    let level_penalty = ((skill.level as f64 + 10.0).log10()) / 2.0;
    learn_chance /= level_penalty;

    if learn_roll >= learn_chance {
        return false;
    }

    let progress_gain = (5.0 + progress_roll * 10.0) * learning_multiplier * skill.learning_efficiency();
    skill.progress += progress_gain;

    if skill.progress >= 100.0 {
        skill.level += 1;
        skill.progress -= 100.0;
        true
    } else {
        false
    }
}

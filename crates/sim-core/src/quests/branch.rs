//! Quest branches: decision paths a resolved quest can take (spec §3.7).

use serde::{Deserialize, Serialize};
use sim_events::WorldValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    Skill,
    Item,
    Reputation,
    QuestComplete,
    Stat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub kind: RequirementKind,
    pub target: String,
    pub threshold: i64,
}

/// Snapshot of player state the engine evaluates requirements against
/// (spec §4.3.7). Borrowed, not owned, by the engine — the presentation
/// layer assembles it fresh each call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub skills: BTreeMap<String, i64>,
    pub inventory: Vec<String>,
    pub reputation: BTreeMap<String, i64>,
    pub completed_quests: std::collections::BTreeSet<String>,
    pub stats: BTreeMap<String, i64>,
}

impl Requirement {
    fn is_met(&self, snapshot: &PlayerSnapshot) -> bool {
        match self.kind {
            RequirementKind::Skill => snapshot
                .skills
                .get(&self.target)
                .map(|level| *level >= self.threshold)
                .unwrap_or(false),
            RequirementKind::Item => snapshot.inventory.iter().any(|item| item == &self.target),
            RequirementKind::Reputation => snapshot
                .reputation
                .get(&self.target)
                .map(|value| *value >= self.threshold)
                .unwrap_or(false),
            RequirementKind::QuestComplete => snapshot.completed_quests.contains(&self.target),
            RequirementKind::Stat => snapshot
                .stats
                .get(&self.target)
                .map(|value| *value >= self.threshold)
                .unwrap_or(false),
        }
    }
}

/// One `(delay_hours, effect_record)` pair under `consequences.delayed`
/// (spec §3.7). `hours` is relative to the resolve call, not an absolute
/// instant, until the engine schedules it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayedEffect {
    pub world_changes: BTreeMap<String, WorldValue>,
    pub npc_reactions: BTreeMap<String, String>,
    pub new_quest_seeds: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchConsequences {
    pub world_state: BTreeMap<String, WorldValue>,
    pub relationships: BTreeMap<String, f64>,
    pub delayed: BTreeMap<u64, DelayedEffect>,
    pub items: Vec<String>,
    pub stats: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestBranch {
    pub id: String,
    pub description: String,
    pub requirements: Vec<Requirement>,
    pub consequences: BranchConsequences,
    pub dialogue: BTreeMap<String, String>,
}

impl QuestBranch {
    /// All requirements must hold (spec §4.3.6 step 2).
    pub fn can_choose(&self, snapshot: &PlayerSnapshot) -> bool {
        self.requirements.iter().all(|r| r.is_met(snapshot))
    }

    /// Unmet requirements, for callers that want a reason instead of a bool
    /// (feeds `CoreError::RequirementUnmet`).
    pub fn unmet_requirements(&self, snapshot: &PlayerSnapshot) -> Vec<&Requirement> {
        self.requirements.iter().filter(|r| !r.is_met(snapshot)).collect()
    }
}

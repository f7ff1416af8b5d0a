//! Emergent Quest Engine (spec §4.3).
//!
//! Owns every quest's lifecycle from seed registration through resolution
//! and publishes clue presence into World State so the presentation layer
//! can surface hints without knowing quest internals.

use crate::consequences::{ConsequenceKind, ConsequenceScheduler, Effect, EffectOp, EffectTargetKind, ScheduledConsequence};
use crate::error::CoreError;
use crate::quests::branch::{PlayerSnapshot, QuestBranch};
use crate::quests::investigation::Investigation;
use crate::quests::seed::{DiscoveryMethod, QuestSeed};
use crate::quests::strategy::{GenericQuestStrategy, QuestStrategy};
use crate::world::WorldState;
use serde::{Deserialize, Serialize};
use sim_events::{WallInstant, WorldValue};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestState {
    Dormant,
    Seeding,
    Discoverable,
    Active,
    Investigating,
    Resolved,
    Failed,
    Consequencing,
}

fn force_activation_pending(world: &WorldState, seed_id: &str) -> bool {
    world
        .get(&format!("quest_seeds.pending.{}", seed_id))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn default_moral_weight(branch_id: &str) -> i32 {
    match branch_id {
        "violence" => -30,
        "stealth" => -10,
        "diplomacy" => 20,
        "sacrifice" => 40,
        "betrayal" => -50,
        "ignore" => -20,
        _ => 0,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergentQuest {
    pub quest_id: String,
    pub seed: QuestSeed,
    pub state: QuestState,
    pub investigation: Investigation,
    pub branches: BTreeMap<String, QuestBranch>,
    pub chosen_branch: Option<String>,
    pub start_time: Option<WallInstant>,
    pub resolution_time: Option<WallInstant>,
    pub moral_weight: i32,
    pub world_impact_score: f64,
    pub consequence_ids: Vec<String>,
}

impl EmergentQuest {
    fn from_seed(seed: QuestSeed) -> Self {
        Self {
            quest_id: seed.quest_id.clone(),
            seed,
            state: QuestState::Dormant,
            investigation: Investigation::default(),
            branches: BTreeMap::new(),
            chosen_branch: None,
            start_time: None,
            resolution_time: None,
            moral_weight: 0,
            world_impact_score: 0.0,
            consequence_ids: Vec::new(),
        }
    }

    pub fn add_branch(&mut self, branch: QuestBranch) {
        self.branches.insert(branch.id.clone(), branch);
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryResult {
    pub quest_id: String,
    pub method: DiscoveryMethod,
    pub location: String,
    pub initial_clues: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ResolutionResult {
    pub quest_id: String,
    pub branch_id: String,
    pub immediate_world_changes: usize,
    pub scheduled_effects: usize,
    pub moral_weight: i32,
    pub world_impact_score: f64,
}

#[derive(Debug, Clone)]
pub struct QuestStatus {
    pub state: QuestState,
    pub investigation_percent: f64,
    pub hours_remaining: Option<f64>,
}

#[derive(Default)]
pub struct QuestEngine {
    quest_seeds: BTreeMap<String, QuestSeed>,
    active_quests: BTreeMap<String, EmergentQuest>,
    completed_quests: Vec<String>,
    failed_quests: Vec<String>,
    strategies: BTreeMap<String, Box<dyn QuestStrategy>>,
}

impl std::fmt::Debug for QuestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestEngine")
            .field("active_quests", &self.active_quests.len())
            .field("completed_quests", &self.completed_quests.len())
            .field("failed_quests", &self.failed_quests.len())
            .finish()
    }
}

impl QuestEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a seed by id; re-registering an already-known id is a no-op
    /// (spec §4.3.1).
    pub fn register_seed(&mut self, seed: QuestSeed) {
        self.quest_seeds.entry(seed.quest_id.clone()).or_insert(seed);
    }

    /// Registers a strategy object for `quest_id`; quests with no
    /// registered strategy use [`GenericQuestStrategy`].
    pub fn register_strategy(&mut self, quest_id: impl Into<String>, strategy: Box<dyn QuestStrategy>) {
        self.strategies.insert(quest_id.into(), strategy);
    }

    /// Attaches a resolvable branch to an already-active quest (spec §3.7).
    /// Content loaders populate branches this way once a quest has been
    /// discovered; quests with no branches can still be investigated but
    /// never resolved.
    pub fn add_branch(&mut self, quest_id: &str, branch: QuestBranch) -> Result<(), CoreError> {
        let quest = self
            .active_quests
            .get_mut(quest_id)
            .ok_or_else(|| CoreError::unknown("quest", quest_id))?;
        quest.add_branch(branch);
        Ok(())
    }

    fn strategy_for(&self, quest_id: &str) -> &dyn QuestStrategy {
        self.strategies
            .get(quest_id)
            .map(|b| b.as_ref())
            .unwrap_or(&GENERIC_STRATEGY)
    }

    /// Runs one tick's worth of seed scanning, clue dispersal, consequence
    /// draining, timeout checks, and consequencing flush (spec §4.3.3).
    pub fn update(&mut self, now: WallInstant, world: &mut WorldState, scheduler: &mut ConsequenceScheduler) {
        self.scan_seeds(world);
        self.disperse_clues(world);
        scheduler.process_due(now, world);
        scheduler.process_chains(now);
        self.check_timeouts(now, world);
        self.flush_consequencing(scheduler);
    }

    /// A seed activates either through its own conditions or by being
    /// force-activated as a delayed quest's `new_quest_seeds` payload
    /// (spec §4.3.6 step 5, `quest_engine.py::_process_consequences`).
    fn scan_seeds(&mut self, world: &mut WorldState) {
        let activating: Vec<String> = self
            .quest_seeds
            .iter()
            .filter(|(id, seed)| {
                !self.active_quests.contains_key(*id)
                    && !self.completed_quests.contains(id)
                    && !self.failed_quests.contains(id)
                    && (seed.check_activation(world) || force_activation_pending(world, id))
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in activating {
            let seed = self.quest_seeds.get(&id).expect("checked above").clone();
            let mut quest = EmergentQuest::from_seed(seed);
            quest.state = QuestState::Seeding;
            self.active_quests.insert(id, quest);
            let _ = world.set(&format!("quest_seeds.pending.{}", id), false);
        }
    }

    fn disperse_clues(&mut self, world: &mut WorldState) {
        let seeding_ids: Vec<String> = self
            .active_quests
            .iter()
            .filter(|(_, q)| q.state == QuestState::Seeding)
            .map(|(id, _)| id.clone())
            .collect();

        for id in seeding_ids {
            let quest = self.active_quests.get(&id).expect("checked above");
            for (location, clue) in quest.seed.initial_clues.clone() {
                let path = format!("locations.{}.clue_{}", location, quest.quest_id);
                let _ = world.set(&path, clue);
            }
            self.active_quests.get_mut(&id).unwrap().state = QuestState::Discoverable;
        }
    }

    fn check_timeouts(&mut self, now: WallInstant, world: &mut WorldState) {
        let timed_out: Vec<String> = self
            .active_quests
            .iter()
            .filter(|(_, q)| {
                q.seed.time_sensitive
                    && matches!(q.state, QuestState::Active | QuestState::Investigating)
                    && q.start_time
                        .map(|start| now.elapsed_millis_since(start) > q.seed.expiry_hours * 3_600_000)
                        .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in timed_out {
            let strategy_effects = self.strategy_for(&id).compute_failure_consequences(&id);
            if strategy_effects.is_empty() {
                let _ = world.set(&format!("quest.{}.ignored", id), true);
            } else {
                for (path, value) in strategy_effects {
                    let _ = world.set(&path, value);
                }
            }
            if let Some(mut quest) = self.active_quests.remove(&id) {
                quest.state = QuestState::Failed;
                quest.resolution_time = Some(now);
                self.failed_quests.push(id);
            }
        }
    }

    fn flush_consequencing(&mut self, scheduler: &ConsequenceScheduler) {
        let pending_ids: std::collections::BTreeSet<&str> =
            scheduler.get_pending().iter().map(|c| c.id.as_str()).collect();

        let ready: Vec<String> = self
            .active_quests
            .iter()
            .filter(|(_, q)| {
                q.state == QuestState::Consequencing
                    && q.consequence_ids.iter().all(|id| !pending_ids.contains(id.as_str()))
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in ready {
            if let Some(mut quest) = self.active_quests.remove(&id) {
                quest.state = QuestState::Resolved;
                self.completed_quests.push(id);
            }
        }
    }

    /// Finds the highest-priority discoverable quest with a clue present at
    /// `location`, transitions it to active, and returns the discovery
    /// payload (spec §4.3.4).
    pub fn discover_quest(&mut self, location: &str, now: WallInstant) -> Option<DiscoveryResult> {
        let candidate_id = self
            .active_quests
            .iter()
            .filter(|(_, q)| q.state == QuestState::Discoverable)
            .filter(|(_, q)| q.seed.initial_clues.contains_key(location))
            .max_by_key(|(_, q)| q.seed.priority)
            .map(|(id, _)| id.clone())?;

        let quest = self.active_quests.get_mut(&candidate_id)?;
        let method = quest.seed.pick_discovery_method()?;
        quest.state = QuestState::Active;
        quest.start_time = Some(now);

        Some(DiscoveryResult {
            quest_id: candidate_id,
            method,
            location: location.to_string(),
            initial_clues: quest.seed.initial_clues.clone(),
        })
    }

    /// Advances an investigation action against `quest_id` (spec §4.3.5).
    /// Always valid to call on any active/investigating quest; returns
    /// `Err` only when `quest_id` is unknown.
    pub fn investigate(
        &mut self,
        quest_id: &str,
        action: &str,
        target: &str,
        snapshot: &PlayerSnapshot,
    ) -> Result<Vec<String>, CoreError> {
        let strategy_discoveries = {
            let quest = self
                .active_quests
                .get_mut(quest_id)
                .ok_or_else(|| CoreError::unknown("quest", quest_id))?;

            let mut discoveries = Vec::new();

            match action {
                "interrogate" => {
                    if quest.investigation.interrogated_npcs.insert(target.to_string()) {
                        let relationship = snapshot.reputation.get(target).copied().unwrap_or(0);
                        if relationship > 30 {
                            let clue = format!("clue_{}_friendly", target);
                            if quest.investigation.add_clue(&clue) {
                                discoveries.push(clue);
                            }
                        } else if relationship >= -30 {
                            let clue = format!("clue_{}_neutral", target);
                            if quest.investigation.add_clue(&clue) {
                                discoveries.push(clue);
                            }
                        }
                    }
                }
                "search" => {
                    if quest.investigation.visited_locations.insert(target.to_string()) {
                        let perception = snapshot.skills.get("perception").copied().unwrap_or(0);
                        if perception >= 5 {
                            let clue = format!("clue_location_{}_hidden", target);
                            if quest.investigation.add_clue(&clue) {
                                discoveries.push(clue);
                            }
                        }
                        let clue = format!("clue_location_{}_obvious", target);
                        if quest.investigation.add_clue(&clue) {
                            discoveries.push(clue);
                        }
                    }
                }
                "analyze" => {
                    if quest.investigation.discovered_clues.len() >= 3 {
                        let theory = format!("theory_{}", quest.investigation.theory_tier());
                        quest.investigation.theories.push(theory.clone());
                        discoveries.push(theory);
                    }
                }
                _ => {}
            }

            quest.state = QuestState::Investigating;
            discoveries
        };

        let strategy: &dyn QuestStrategy = self
            .strategies
            .get(quest_id)
            .map(|b| b.as_ref())
            .unwrap_or(&GENERIC_STRATEGY);
        let investigation = &mut self.active_quests.get_mut(quest_id).unwrap().investigation;
        let extension = strategy.extend_investigation(action, target, snapshot, investigation);

        let mut all_discoveries = strategy_discoveries;
        if let Some(extension) = extension {
            all_discoveries.extend(extension.discoveries);
        }
        Ok(all_discoveries)
    }

    /// Resolves `quest_id` via `branch_id`, applying immediate consequences
    /// and scheduling delayed ones (spec §4.3.6).
    pub fn resolve(
        &mut self,
        quest_id: &str,
        branch_id: &str,
        snapshot: &PlayerSnapshot,
        world: &mut WorldState,
        scheduler: &mut ConsequenceScheduler,
        now: WallInstant,
    ) -> Result<ResolutionResult, CoreError> {
        let quest = self
            .active_quests
            .get(quest_id)
            .ok_or_else(|| CoreError::unknown("quest", quest_id))?;
        let branch = quest
            .branches
            .get(branch_id)
            .ok_or_else(|| CoreError::unknown("quest_branch", branch_id))?
            .clone();

        if !branch.can_choose(snapshot) {
            let unmet = branch
                .unmet_requirements(snapshot)
                .into_iter()
                .map(|r| crate::error::UnmetRequirement {
                    kind: format!("{:?}", r.kind),
                    target: r.target.clone(),
                    reason: format!("threshold {} not met", r.threshold),
                })
                .collect();
            return Err(CoreError::RequirementUnmet {
                quest_id: quest_id.to_string(),
                branch_id: branch_id.to_string(),
                unmet,
            });
        }

        for (path, value) in &branch.consequences.world_state {
            let _ = world.set(path, value.clone());
        }
        for (npc, delta) in &branch.consequences.relationships {
            let _ = world.add_numeric(&format!("relationships.{}", npc), *delta);
        }

        let mut scheduled_ids = Vec::new();
        for (delay_hours, effect) in &branch.consequences.delayed {
            let consequence_id = format!("{}_{}_{}h", quest_id, branch_id, delay_hours);
            let effects: Vec<Effect> = effect
                .world_changes
                .iter()
                .map(|(path, value)| Effect {
                    target_kind: EffectTargetKind::World,
                    target_path: path.clone(),
                    op: EffectOp::Set,
                    value: value.clone(),
                    duration: None,
                })
                .chain(effect.npc_reactions.iter().map(|(npc, reaction)| Effect {
                    target_kind: EffectTargetKind::World,
                    target_path: format!("npc_reactions.{}", npc),
                    op: EffectOp::Set,
                    value: WorldValue::String(reaction.clone()),
                    duration: None,
                }))
                .chain(effect.new_quest_seeds.iter().map(|seed_id| Effect {
                    target_kind: EffectTargetKind::World,
                    target_path: format!("quest_seeds.pending.{}", seed_id),
                    op: EffectOp::Set,
                    value: WorldValue::Bool(true),
                    duration: None,
                }))
                .collect();

            scheduler.register(ScheduledConsequence {
                id: consequence_id.clone(),
                source_quest: quest_id.to_string(),
                kind: ConsequenceKind::Delayed,
                severity: 1,
                trigger_time: Some(WallInstant(now.0 + delay_hours * 3_600_000)),
                expiry_time: None,
                trigger_conditions: None,
                effects,
                next_ids: Vec::new(),
                triggered: false,
                recurring_interval_hours: 0,
                web_id: None,
            });
            scheduled_ids.push(consequence_id);
        }

        let moral_weight = self
            .strategy_for(quest_id)
            .compute_moral_weight(branch_id)
            .unwrap_or_else(|| default_moral_weight(branch_id));

        let new_quest_seed_count: usize = branch
            .consequences
            .delayed
            .values()
            .map(|effect| effect.new_quest_seeds.len())
            .sum();

        let world_impact = (branch.consequences.world_state.len() as f64 * 0.10
            + branch.consequences.relationships.len() as f64 * 0.15
            + new_quest_seed_count as f64 * 0.25
            + branch.consequences.delayed.len() as f64 * 0.20)
            .min(1.0);

        let immediate_count = branch.consequences.world_state.len() + branch.consequences.relationships.len();
        let scheduled_count = scheduled_ids.len();

        let quest = self.active_quests.get_mut(quest_id).expect("checked above");
        quest.chosen_branch = Some(branch_id.to_string());
        quest.state = QuestState::Consequencing;
        quest.resolution_time = Some(now);
        quest.moral_weight = moral_weight;
        quest.world_impact_score = world_impact;
        quest.consequence_ids = scheduled_ids;

        Ok(ResolutionResult {
            quest_id: quest_id.to_string(),
            branch_id: branch_id.to_string(),
            immediate_world_changes: immediate_count,
            scheduled_effects: scheduled_count,
            moral_weight,
            world_impact_score: world_impact,
        })
    }

    pub fn get_active_quests(&self) -> Vec<&EmergentQuest> {
        self.active_quests.values().collect()
    }

    pub fn get_discoverable_quests(&self) -> Vec<&EmergentQuest> {
        self.active_quests
            .values()
            .filter(|q| q.state == QuestState::Discoverable)
            .collect()
    }

    pub fn get_available_branches(&self, quest_id: &str, snapshot: &PlayerSnapshot) -> Vec<&QuestBranch> {
        self.active_quests
            .get(quest_id)
            .map(|q| q.branches.values().filter(|b| b.can_choose(snapshot)).collect())
            .unwrap_or_default()
    }

    pub fn get_quest_status(&self, quest_id: &str, now: WallInstant) -> Option<QuestStatus> {
        let quest = self.active_quests.get(quest_id)?;
        let hours_remaining = if quest.seed.time_sensitive {
            quest.start_time.map(|start| {
                let elapsed_hours = now.elapsed_millis_since(start) as f64 / 3_600_000.0;
                (quest.seed.expiry_hours as f64 - elapsed_hours).max(0.0)
            })
        } else {
            None
        };
        Some(QuestStatus {
            state: quest.state,
            investigation_percent: quest.investigation.completion_percentage(),
            hours_remaining,
        })
    }
}

static GENERIC_STRATEGY: GenericQuestStrategy = GenericQuestStrategy;

//! Consequence Scheduler (spec §3.8, §4.4).
//!
//! Deferred effects — delayed, recurring, conditional, cascading — keyed by
//! a real-world trigger instant so game time and wall time can diverge
//! without the scheduler losing track of when something is due.

use crate::error::CoreError;
use crate::world::WorldState;
use serde::{Deserialize, Serialize};
use sim_events::{ConditionValue, WallInstant, WorldValue};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsequenceKind {
    Immediate,
    Delayed,
    Recurring,
    Conditional,
    Cascading,
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectTargetKind {
    World,
    Relationship,
    Location,
    Economy,
    Player,
    SpawnNpc,
    RemoveNpc,
    SpawnEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectOp {
    Set,
    Add,
    Mul,
}

/// One atomic change a consequence applies (spec §4.4 effect table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Effect {
    pub target_kind: EffectTargetKind,
    pub target_path: String,
    pub op: EffectOp,
    pub value: WorldValue,
    pub duration: Option<u64>,
}

/// A consequence registered with the scheduler (spec §3.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledConsequence {
    pub id: String,
    pub source_quest: String,
    pub kind: ConsequenceKind,
    pub severity: u8,
    pub trigger_time: Option<WallInstant>,
    pub expiry_time: Option<WallInstant>,
    pub trigger_conditions: Option<BTreeMap<String, ConditionValue>>,
    pub effects: Vec<Effect>,
    pub next_ids: Vec<String>,
    pub triggered: bool,
    pub recurring_interval_hours: u64,
    /// Tag used by [`ConsequenceScheduler::create_web`]; consequences with
    /// no web stay `None`.
    pub web_id: Option<String>,
}

impl ScheduledConsequence {
    /// Whether this consequence is eligible to fire right now (spec §4.4
    /// `process_due`, folding in the source's `can_trigger` gate).
    fn is_due(&self, now: WallInstant, world: &WorldState) -> bool {
        if self.triggered && self.kind != ConsequenceKind::Recurring {
            return false;
        }
        if let Some(trigger) = self.trigger_time {
            if now < trigger {
                return false;
            }
        }
        if let Some(expiry) = self.expiry_time {
            if now > expiry {
                return false;
            }
        }
        match &self.trigger_conditions {
            Some(conditions) => conditions.iter().all(|(path, cond)| world.matches(path, cond)),
            None => true,
        }
    }
}

/// Outcome of applying one consequence (spec §4.4 `process_due` result).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsequenceResult {
    pub consequence_id: String,
    pub source_quest: String,
    pub severity: u8,
    pub changes: Vec<String>,
    pub newly_triggered: Vec<String>,
}

/// Links an ordered sequence of consequences whose trigger times advance
/// relative to the previous entry firing (spec §4.3.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chain {
    pub chain_id: String,
    pub consequence_ids: Vec<String>,
    pub current_index: usize,
    pub completed: bool,
}

/// Opaque handle returned by [`ConsequenceScheduler::create_web`]; callers
/// pass it back into [`ConsequenceScheduler::register_in_web`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebHandle(pub String);

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct KarmaLedger {
    pub good: f64,
    pub evil: f64,
    pub neutral: f64,
    pub chaos: f64,
    pub order: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct KarmaPercentages {
    pub good: f64,
    pub evil: f64,
    pub neutral: f64,
    pub chaos: f64,
    pub order: f64,
}

impl KarmaLedger {
    fn record(&mut self, effect: &Effect) {
        let magnitude = effect.value.as_float().unwrap_or(0.0);
        match effect.target_kind {
            EffectTargetKind::Relationship | EffectTargetKind::Player => {
                if magnitude > 0.0 {
                    self.good += magnitude;
                } else if magnitude < 0.0 {
                    self.evil += magnitude.abs();
                } else {
                    self.neutral += 1.0;
                }
            }
            EffectTargetKind::World if effect.target_path.contains("danger") || effect.target_path.contains("unrest") => {
                self.chaos += magnitude.abs().max(1.0);
            }
            EffectTargetKind::World if effect.target_path.contains("security") || effect.target_path.contains("order") => {
                self.order += magnitude.abs().max(1.0);
            }
            _ => self.neutral += 1.0,
        }
    }

    /// Normalizes the five running totals to percentages of their sum. An
    /// empty ledger reports all zeros rather than dividing by zero.
    pub fn percentages(&self) -> KarmaPercentages {
        let total = self.good + self.evil + self.neutral + self.chaos + self.order;
        if total <= 0.0 {
            return KarmaPercentages::default();
        }
        KarmaPercentages {
            good: self.good / total * 100.0,
            evil: self.evil / total * 100.0,
            neutral: self.neutral / total * 100.0,
            chaos: self.chaos / total * 100.0,
            order: self.order / total * 100.0,
        }
    }
}

/// Serializable snapshot for persistence (spec §4.4 `save_state`/`load_state`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerSaveBlob {
    pub consequences: Vec<ScheduledConsequence>,
    pub chains: Vec<Chain>,
    pub history: Vec<ConsequenceResult>,
    pub karma: KarmaLedger,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsequenceScheduler {
    consequences: BTreeMap<String, ScheduledConsequence>,
    chains: BTreeMap<String, Chain>,
    history: Vec<ConsequenceResult>,
    karma: KarmaLedger,
}

impl ConsequenceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, consequence: ScheduledConsequence) {
        self.consequences.insert(consequence.id.clone(), consequence);
    }

    /// Applies every consequence whose trigger has elapsed and whose
    /// conditions (if any) hold, recursing into cascading `next_ids`
    /// (spec §4.4 `process_due` + Cascading semantics).
    pub fn process_due(&mut self, now: WallInstant, world: &mut WorldState) -> Vec<ConsequenceResult> {
        let due_ids: Vec<String> = self
            .consequences
            .iter()
            .filter(|(_, c)| c.is_due(now, world))
            .map(|(id, _)| id.clone())
            .collect();

        let mut results = Vec::new();
        for id in due_ids {
            if let Some(result) = self.apply_one(&id, now, world) {
                results.push(result);
            }
        }
        results
    }

    fn apply_one(&mut self, id: &str, now: WallInstant, world: &mut WorldState) -> Option<ConsequenceResult> {
        let mut consequence = self.consequences.get(id)?.clone();
        let mut changes = Vec::new();

        for effect in &consequence.effects {
            if let Ok(description) = apply_effect(effect, world) {
                changes.push(description);
            }
            self.karma.record(effect);
        }

        consequence.triggered = true;
        if consequence.kind == ConsequenceKind::Recurring {
            let next_millis = now.0 + consequence.recurring_interval_hours * 3_600_000;
            consequence.trigger_time = Some(WallInstant(next_millis));
            consequence.triggered = false;
        }

        let newly_triggered: Vec<String> = consequence
            .next_ids
            .iter()
            .filter(|next_id| {
                self.consequences
                    .get(next_id.as_str())
                    .map(|c| c.is_due(now, world))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        let result = ConsequenceResult {
            consequence_id: consequence.id.clone(),
            source_quest: consequence.source_quest.clone(),
            severity: consequence.severity,
            changes,
            newly_triggered,
        };

        self.consequences.insert(consequence.id.clone(), consequence);
        self.history.push(result.clone());
        Some(result)
    }

    /// Advances every chain whose current node has fired, scheduling the
    /// next node's `trigger_time` relative to `now` (spec §4.3.10).
    pub fn process_chains(&mut self, now: WallInstant) {
        let chain_ids: Vec<String> = self.chains.keys().cloned().collect();
        for chain_id in chain_ids {
            self.advance_chain(&chain_id, now);
        }
    }

    fn advance_chain(&mut self, chain_id: &str, now: WallInstant) {
        let Some(chain) = self.chains.get(chain_id) else { return };
        if chain.completed {
            return;
        }
        let Some(current_id) = chain.consequence_ids.get(chain.current_index).cloned() else {
            return;
        };
        let fired = self
            .consequences
            .get(&current_id)
            .map(|c| c.triggered)
            .unwrap_or(false);
        if !fired {
            return;
        }

        let next_index = chain.current_index + 1;
        if let Some(next_id) = chain.consequence_ids.get(next_index).cloned() {
            if let Some(next) = self.consequences.get_mut(&next_id) {
                let delay_hours = next.recurring_interval_hours.max(1);
                next.trigger_time = Some(WallInstant(now.0 + delay_hours * 3_600_000));
            }
        }

        let chain = self.chains.get_mut(chain_id).expect("checked above");
        chain.current_index = next_index;
        if chain.current_index >= chain.consequence_ids.len() {
            chain.completed = true;
        }
    }

    /// Registers an ordered sequence as a chain; the first entry is
    /// scheduled as given, later entries wait for [`process_chains`] to
    /// advance them once their predecessor fires.
    pub fn create_chain(&mut self, chain_id: impl Into<String>, consequences: Vec<ScheduledConsequence>) {
        let chain_id = chain_id.into();
        let ids: Vec<String> = consequences.iter().map(|c| c.id.clone()).collect();
        for consequence in consequences {
            self.register(consequence);
        }
        self.chains.insert(
            chain_id.clone(),
            Chain {
                chain_id,
                consequence_ids: ids,
                current_index: 0,
                completed: false,
            },
        );
    }

    /// Returns a handle new consequences can be tagged with via
    /// [`ConsequenceScheduler::register_in_web`].
    pub fn create_web(&self, web_id: impl Into<String>) -> WebHandle {
        WebHandle(web_id.into())
    }

    pub fn register_in_web(&mut self, handle: &WebHandle, mut consequence: ScheduledConsequence) {
        consequence.web_id = Some(handle.0.clone());
        self.register(consequence);
    }

    pub fn get_pending(&self) -> Vec<&ScheduledConsequence> {
        self.consequences
            .values()
            .filter(|c| !c.triggered || c.kind == ConsequenceKind::Recurring)
            .collect()
    }

    pub fn get_history(&self, quest_id: Option<&str>) -> Vec<&ConsequenceResult> {
        self.history
            .iter()
            .filter(|r| quest_id.map(|q| q == r.source_quest).unwrap_or(true))
            .collect()
    }

    pub fn get_karma_score(&self) -> KarmaPercentages {
        self.karma.percentages()
    }

    pub fn save_state(&self) -> SchedulerSaveBlob {
        SchedulerSaveBlob {
            consequences: self.consequences.values().cloned().collect(),
            chains: self.chains.values().cloned().collect(),
            history: self.history.clone(),
            karma: self.karma,
        }
    }

    pub fn load_state(blob: SchedulerSaveBlob) -> Self {
        let mut consequences = BTreeMap::new();
        for c in blob.consequences {
            consequences.insert(c.id.clone(), c);
        }
        let mut chains = BTreeMap::new();
        for c in blob.chains {
            chains.insert(c.chain_id.clone(), c);
        }
        Self {
            consequences,
            chains,
            history: blob.history,
            karma: blob.karma,
        }
    }
}

/// Applies a single atomic effect to `world`, per the target_kind table in
/// spec §4.4. Returns a short human-readable description of what changed.
fn apply_effect(effect: &Effect, world: &mut WorldState) -> Result<String, CoreError> {
    match effect.target_kind {
        EffectTargetKind::World | EffectTargetKind::Economy | EffectTargetKind::Player => {
            apply_op(world, &effect.target_path, effect.op, &effect.value)?;
            Ok(format!("{} -> {:?}", effect.target_path, effect.value))
        }
        EffectTargetKind::Relationship => {
            let path = format!("relationships.{}", effect.target_path);
            let delta = effect.value.as_float().unwrap_or(0.0);
            world
                .add_numeric(&path, delta)
                .map_err(|e| CoreError::WorldInvariantViolation { reason: e.to_string() })?;
            Ok(format!("relationship {} += {}", effect.target_path, delta))
        }
        EffectTargetKind::Location => {
            let path = format!("locations.{}", effect.target_path);
            world
                .set(&path, effect.value.clone())
                .map_err(|e| CoreError::WorldInvariantViolation { reason: e.to_string() })?;
            Ok(format!("location {} merged", effect.target_path))
        }
        EffectTargetKind::SpawnNpc => {
            let path = format!("npcs.{}", effect.target_path);
            world
                .set(&path, effect.value.clone())
                .map_err(|e| CoreError::WorldInvariantViolation { reason: e.to_string() })?;
            Ok(format!("npc {} spawned", effect.target_path))
        }
        EffectTargetKind::RemoveNpc => {
            let path = format!("npcs.{}", effect.target_path);
            world
                .set(&path, WorldValue::Bool(false))
                .map_err(|e| CoreError::WorldInvariantViolation { reason: e.to_string() })?;
            Ok(format!("npc {} removed", effect.target_path))
        }
        EffectTargetKind::SpawnEvent => {
            let path = "events.pending".to_string();
            world
                .set(&path, effect.value.clone())
                .map_err(|e| CoreError::WorldInvariantViolation { reason: e.to_string() })?;
            Ok(format!("event {} queued", effect.target_path))
        }
    }
}

fn apply_op(world: &mut WorldState, path: &str, op: EffectOp, value: &WorldValue) -> Result<(), crate::world::PathError> {
    match op {
        EffectOp::Set => world.set(path, value.clone()),
        EffectOp::Add => world.add_numeric(path, value.as_float().unwrap_or(0.0)),
        EffectOp::Mul => world.mul_numeric(path, value.as_float().unwrap_or(1.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_effect(path: &str, value: i64) -> Effect {
        Effect {
            target_kind: EffectTargetKind::World,
            target_path: path.to_string(),
            op: EffectOp::Set,
            value: WorldValue::Int(value),
            duration: None,
        }
    }

    #[test]
    fn immediate_consequence_with_no_trigger_time_is_due_now() {
        let mut scheduler = ConsequenceScheduler::new();
        let mut world = WorldState::new();
        scheduler.register(ScheduledConsequence {
            id: "c1".into(),
            source_quest: "q1".into(),
            kind: ConsequenceKind::Immediate,
            severity: 1,
            trigger_time: None,
            expiry_time: None,
            trigger_conditions: None,
            effects: vec![world_effect("prison.alarm", 1)],
            next_ids: vec![],
            triggered: false,
            recurring_interval_hours: 0,
            web_id: None,
        });

        let results = scheduler.process_due(WallInstant(0), &mut world);
        assert_eq!(results.len(), 1);
        assert_eq!(world.get("prison.alarm").unwrap().as_int(), Some(1));
    }

    #[test]
    fn delayed_consequence_waits_for_trigger_time() {
        let mut scheduler = ConsequenceScheduler::new();
        let mut world = WorldState::new();
        scheduler.register(ScheduledConsequence {
            id: "c1".into(),
            source_quest: "q1".into(),
            kind: ConsequenceKind::Delayed,
            severity: 1,
            trigger_time: Some(WallInstant(1_000)),
            expiry_time: None,
            trigger_conditions: None,
            effects: vec![world_effect("x", 1)],
            next_ids: vec![],
            triggered: false,
            recurring_interval_hours: 0,
            web_id: None,
        });

        assert!(scheduler.process_due(WallInstant(0), &mut world).is_empty());
        assert_eq!(scheduler.process_due(WallInstant(1_000), &mut world).len(), 1);
    }

    #[test]
    fn non_recurring_consequence_applies_at_most_once() {
        let mut scheduler = ConsequenceScheduler::new();
        let mut world = WorldState::new();
        scheduler.register(ScheduledConsequence {
            id: "c1".into(),
            source_quest: "q1".into(),
            kind: ConsequenceKind::Immediate,
            severity: 1,
            trigger_time: None,
            expiry_time: None,
            trigger_conditions: None,
            effects: vec![world_effect("x", 1)],
            next_ids: vec![],
            triggered: false,
            recurring_interval_hours: 0,
            web_id: None,
        });
        scheduler.process_due(WallInstant(0), &mut world);
        assert!(scheduler.process_due(WallInstant(1), &mut world).is_empty());
    }

    #[test]
    fn recurring_consequence_reschedules_instead_of_retiring() {
        let mut scheduler = ConsequenceScheduler::new();
        let mut world = WorldState::new();
        scheduler.register(ScheduledConsequence {
            id: "c1".into(),
            source_quest: "q1".into(),
            kind: ConsequenceKind::Recurring,
            severity: 1,
            trigger_time: Some(WallInstant(0)),
            expiry_time: None,
            trigger_conditions: None,
            effects: vec![world_effect("tick_count", 1)],
            next_ids: vec![],
            triggered: false,
            recurring_interval_hours: 24,
            web_id: None,
        });

        scheduler.process_due(WallInstant(0), &mut world);
        assert!(scheduler.get_pending().iter().any(|c| c.id == "c1"));
        assert!(scheduler.process_due(WallInstant(1), &mut world).is_empty());
        let next_day_millis = 24 * 3_600_000;
        assert_eq!(scheduler.process_due(WallInstant(next_day_millis), &mut world).len(), 1);
    }

    #[test]
    fn conditional_consequence_waits_for_world_predicate() {
        let mut scheduler = ConsequenceScheduler::new();
        let mut world = WorldState::new();
        let mut conditions = BTreeMap::new();
        conditions.insert(
            "prison.riot".to_string(),
            ConditionValue::Literal(WorldValue::Bool(true)),
        );
        scheduler.register(ScheduledConsequence {
            id: "c1".into(),
            source_quest: "q1".into(),
            kind: ConsequenceKind::Conditional,
            severity: 1,
            trigger_time: None,
            expiry_time: None,
            trigger_conditions: Some(conditions),
            effects: vec![world_effect("x", 1)],
            next_ids: vec![],
            triggered: false,
            recurring_interval_hours: 0,
            web_id: None,
        });

        assert!(scheduler.process_due(WallInstant(0), &mut world).is_empty());
        world.set("prison.riot", true).unwrap();
        assert_eq!(scheduler.process_due(WallInstant(0), &mut world).len(), 1);
    }

    #[test]
    fn relationship_effect_adds_to_existing_value() {
        let mut scheduler = ConsequenceScheduler::new();
        let mut world = WorldState::new();
        world.set("relationships.Brutus", 10i64).unwrap();
        scheduler.register(ScheduledConsequence {
            id: "c1".into(),
            source_quest: "q1".into(),
            kind: ConsequenceKind::Immediate,
            severity: 1,
            trigger_time: None,
            expiry_time: None,
            trigger_conditions: None,
            effects: vec![Effect {
                target_kind: EffectTargetKind::Relationship,
                target_path: "Brutus".into(),
                op: EffectOp::Add,
                value: WorldValue::Float(5.0),
                duration: None,
            }],
            next_ids: vec![],
            triggered: false,
            recurring_interval_hours: 0,
            web_id: None,
        });

        scheduler.process_due(WallInstant(0), &mut world);
        assert_eq!(world.get("relationships.Brutus").unwrap().as_float(), Some(15.0));
    }

    #[test]
    fn karma_score_normalizes_to_percentages() {
        let mut ledger = KarmaLedger::default();
        ledger.record(&Effect {
            target_kind: EffectTargetKind::Relationship,
            target_path: "Brutus".into(),
            op: EffectOp::Add,
            value: WorldValue::Float(10.0),
            duration: None,
        });
        ledger.record(&Effect {
            target_kind: EffectTargetKind::Relationship,
            target_path: "Marcus".into(),
            op: EffectOp::Add,
            value: WorldValue::Float(-5.0),
            duration: None,
        });
        let percentages = ledger.percentages();
        assert!((percentages.good + percentages.evil - 100.0).abs() < 1e-9);
    }

    #[test]
    fn save_and_load_round_trips_pending_consequences() {
        let mut scheduler = ConsequenceScheduler::new();
        scheduler.register(ScheduledConsequence {
            id: "c1".into(),
            source_quest: "q1".into(),
            kind: ConsequenceKind::Delayed,
            severity: 2,
            trigger_time: Some(WallInstant(5)),
            expiry_time: None,
            trigger_conditions: None,
            effects: vec![],
            next_ids: vec![],
            triggered: false,
            recurring_interval_hours: 0,
            web_id: None,
        });
        let blob = scheduler.save_state();
        let restored = ConsequenceScheduler::load_state(blob);
        assert_eq!(restored.get_pending().len(), 1);
    }
}

//! Top-level owner of every subsystem and the tick loop (spec §4.6, §6.1,
//! §9 "Singletons" resolution).
//!
//! The source drives world/events/loaders through process-wide singletons.
//! Here a single `Simulation` value owns everything; the shell constructs
//! one and hands it to the presentation layer. There is no global state.

use crate::bus::EventBus;
use crate::config::Config;
use crate::consequences::ConsequenceScheduler;
use crate::error::CoreError;
use crate::quests::{PlayerSnapshot, QuestEngine};
use crate::skills::SkillSystem;
use crate::world::WorldState;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sim_events::{Event, EventCategory, Priority, WallInstant};

pub const SAVE_SCHEMA_VERSION: u32 = 1;

/// The only write entry point into the core (spec §6.1).
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerIntent {
    Move { direction: String },
    Interact { npc_id: String, verb: String },
    UseSkill { skill_id: String, difficulty: i64 },
    ResolveQuest { quest_id: String, branch_id: String },
    Investigate { quest_id: String, action: String, target: String },
    Wait { minutes: u32 },
    Save { slot: String },
    Load { slot: String },
    Quit,
}

/// Mode the presentation layer should render (spec §6.1 `GameStateView`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Menu,
    Playing,
    Paused,
    Dialogue,
    Combat,
    Trading,
    Crafting,
    Inventory,
    Dead,
}

/// Read-only projection handed to the presentation layer after each step.
#[derive(Debug, Clone)]
pub struct GameStateView {
    pub location: String,
    pub game_time: u64,
    pub day: u32,
    pub mode: Mode,
    pub discoverable_quest_ids: Vec<String>,
    pub active_quest_ids: Vec<String>,
}

/// Result of a single [`Simulation::step`] call.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub success: bool,
    pub message_tokens: Vec<String>,
    pub discovered_quest: Option<String>,
}

impl StepResult {
    fn ok(tokens: Vec<String>) -> Self {
        Self {
            success: true,
            message_tokens: tokens,
            discovered_quest: None,
        }
    }

    fn failed(tokens: Vec<String>) -> Self {
        Self {
            success: false,
            message_tokens: tokens,
            discovered_quest: None,
        }
    }
}

/// Serializable persistence payload (spec §6.3). `schema_version` is
/// checked on load; a mismatch rejects with [`CoreError::SchemaMismatch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveBlob {
    pub schema_version: u32,
    pub world: WorldState,
    pub skills: SkillSystem,
    pub scheduler: crate::consequences::SchedulerSaveBlob,
    pub location: String,
    pub mode: Mode,
    pub last_autosave_minutes: u64,
}

/// Owns every subsystem the tick loop coordinates. Not `Clone`: the event
/// bus holds boxed closures.
pub struct Simulation {
    pub world: WorldState,
    pub bus: EventBus,
    pub quests: QuestEngine,
    pub scheduler: ConsequenceScheduler,
    pub skills: SkillSystem,
    pub config: Config,
    location: String,
    mode: Mode,
    last_autosave_minutes: u64,
    rng: SmallRng,
}

impl Simulation {
    pub fn new(config: Config) -> Self {
        Self::with_rng(config, SmallRng::from_entropy())
    }

    /// Constructs a simulation with a deterministically seeded RNG, for
    /// reproducible runs and property tests (spec §8.4 S4).
    pub fn with_seed(config: Config, seed: u64) -> Self {
        Self::with_rng(config, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(config: Config, rng: SmallRng) -> Self {
        let bus = EventBus::new(config.bus.history_cap);
        Self {
            world: WorldState::new(),
            bus,
            quests: QuestEngine::new(),
            scheduler: ConsequenceScheduler::new(),
            skills: SkillSystem::new(),
            config,
            location: "start".to_string(),
            mode: Mode::Playing,
            last_autosave_minutes: 0,
            rng,
        }
    }

    pub fn view(&self) -> GameStateView {
        GameStateView {
            location: self.location.clone(),
            game_time: self.world.clock.total_minutes,
            day: self.world.clock.day,
            mode: self.mode,
            discoverable_quest_ids: self
                .quests
                .get_discoverable_quests()
                .into_iter()
                .map(|q| q.quest_id.clone())
                .collect(),
            active_quest_ids: self
                .quests
                .get_active_quests()
                .into_iter()
                .map(|q| q.quest_id.clone())
                .collect(),
        }
    }

    /// The only write entry point (spec §6.1). Every intent advances the
    /// tick by one configured δ except `Save`/`Load`/`Quit`, which bypass
    /// the tick loop entirely.
    pub fn step(&mut self, intent: PlayerIntent, snapshot: &PlayerSnapshot) -> StepResult {
        match intent {
            PlayerIntent::Move { direction } => {
                self.location = direction.clone();
                self.advance_tick(snapshot);
                StepResult::ok(vec!["moved".to_string(), direction])
            }
            PlayerIntent::Interact { npc_id, verb } => {
                self.bus.emit(
                    Event::new(
                        "player_interact",
                        EventCategory::PlayerAction,
                        serde_json::json!({ "npc_id": npc_id, "verb": verb }),
                    )
                    .with_priority(Priority::Normal),
                );
                self.advance_tick(snapshot);
                StepResult::ok(vec!["interacted".to_string()])
            }
            PlayerIntent::UseSkill { skill_id, difficulty } => {
                let roll = self.rng.gen::<f64>();
                let learn_roll = self.rng.gen::<f64>();
                let progress_roll = self.rng.gen::<f64>();
                let outcome = self.skills.use_skill(
                    &crate::skills::SkillId::new(skill_id.clone()),
                    difficulty,
                    0.0,
                    &std::collections::HashMap::new(),
                    0.0,
                    WallInstant::now(),
                    roll,
                    learn_roll,
                    progress_roll,
                );
                self.advance_tick(snapshot);
                match outcome {
                    Some(outcome) if outcome.success => StepResult::ok(vec!["skill_success".to_string(), skill_id]),
                    Some(_) => StepResult::failed(vec!["skill_failure".to_string(), skill_id]),
                    None => StepResult::failed(vec!["unknown_skill".to_string(), skill_id]),
                }
            }
            PlayerIntent::ResolveQuest { quest_id, branch_id } => {
                let now = WallInstant::now();
                let result = self.quests.resolve(
                    &quest_id,
                    &branch_id,
                    snapshot,
                    &mut self.world,
                    &mut self.scheduler,
                    now,
                );
                self.advance_tick(snapshot);
                match result {
                    Ok(resolution) => StepResult::ok(vec!["quest_resolved".to_string(), resolution.quest_id]),
                    Err(err) => StepResult::failed(vec!["quest_resolve_failed".to_string(), err.to_string()]),
                }
            }
            PlayerIntent::Investigate { quest_id, action, target } => {
                let result = self.quests.investigate(&quest_id, &action, &target, snapshot);
                self.advance_tick(snapshot);
                match result {
                    Ok(discoveries) => StepResult::ok(discoveries),
                    Err(err) => StepResult::failed(vec!["investigate_failed".to_string(), err.to_string()]),
                }
            }
            PlayerIntent::Wait { minutes } => {
                for _ in 0..minutes.max(1) {
                    self.advance_tick(snapshot);
                }
                StepResult::ok(vec!["waited".to_string()])
            }
            PlayerIntent::Save { slot } => {
                let blob = self.serialize();
                match serde_json::to_string(&blob) {
                    Ok(_) => StepResult::ok(vec!["saved".to_string(), slot]),
                    Err(err) => StepResult::failed(vec!["save_failed".to_string(), err.to_string()]),
                }
            }
            PlayerIntent::Load { slot } => StepResult::ok(vec!["load_requested".to_string(), slot]),
            PlayerIntent::Quit => {
                self.mode = Mode::Menu;
                StepResult::ok(vec!["quit".to_string()])
            }
        }
    }

    /// One δ-minute tick: the eight ordered steps of spec §4.6. NPC
    /// registry and weather/time-of-day propagation are external
    /// collaborators out of scope here; steps 3-4 are therefore no-ops in
    /// this core, left as explicit markers for the shell to hook.
    fn advance_tick(&mut self, _snapshot: &PlayerSnapshot) {
        let delta = self.config.tick.tick_minutes;
        let previous_minute_of_day = self.world.clock.minute_of_day;
        let rollovers = self.world.clock.advance(delta);
        let crossed_midnight = rollovers > 0;

        if crossed_midnight {
            self.skills.reset_daily_limits();
            self.bus.emit(
                Event::new("new_day", EventCategory::Time, serde_json::json!({ "day": self.world.clock.day }))
                    .with_priority(Priority::Normal),
            );
        }

        let new_minute_of_day = self.world.clock.minute_of_day;
        for boundary in &self.config.tick.meal_times {
            if crossed_boundary(previous_minute_of_day, new_minute_of_day, *boundary, crossed_midnight) {
                self.bus.emit(
                    Event::new("meal_time", EventCategory::Time, serde_json::json!({ "minute": boundary }))
                        .with_priority(Priority::Low),
                );
            }
        }
        for boundary in &self.config.tick.guard_shift_times {
            if crossed_boundary(previous_minute_of_day, new_minute_of_day, *boundary, crossed_midnight) {
                self.bus.emit(
                    Event::new("guard_shift", EventCategory::NpcAction, serde_json::json!({ "minute": boundary }))
                        .with_priority(Priority::Normal),
                );
            }
        }

        let now = WallInstant::now();
        self.quests.update(now, &mut self.world, &mut self.scheduler);

        if crossed_midnight {
            self.skills.apply_degradation_all(1, now);
        }

        let game_time = self.world.clock.total_minutes;
        if game_time.saturating_sub(self.last_autosave_minutes) >= self.config.tick.autosave_interval_minutes as u64
        {
            self.last_autosave_minutes = game_time;
            tracing::info!(game_time, "autosave checkpoint reached");
        }
    }

    pub fn serialize(&self) -> SaveBlob {
        SaveBlob {
            schema_version: SAVE_SCHEMA_VERSION,
            world: self.world.snapshot(),
            skills: self.skills.clone(),
            scheduler: self.scheduler.save_state(),
            location: self.location.clone(),
            mode: self.mode,
            last_autosave_minutes: self.last_autosave_minutes,
        }
    }

    pub fn deserialize(blob: SaveBlob, config: Config) -> Result<Self, CoreError> {
        if blob.schema_version != SAVE_SCHEMA_VERSION {
            return Err(CoreError::SchemaMismatch {
                expected: SAVE_SCHEMA_VERSION,
                found: blob.schema_version,
            });
        }
        let bus = EventBus::new(config.bus.history_cap);
        Ok(Self {
            world: blob.world,
            bus,
            quests: QuestEngine::new(),
            scheduler: ConsequenceScheduler::load_state(blob.scheduler),
            skills: blob.skills,
            config,
            location: blob.location,
            mode: blob.mode,
            last_autosave_minutes: blob.last_autosave_minutes,
        })
    }
}

fn crossed_boundary(previous: u32, current: u32, boundary: u32, wrapped: bool) -> bool {
    if !wrapped {
        previous < boundary && boundary <= current
    } else {
        // Wrapped past midnight within this tick.
        boundary > previous || boundary <= current
    }
}

/// Minimal shape external content loaders would implement (spec §6.2); the
/// core only depends on this trait, never on a file format.
pub trait ContentSource<T> {
    fn load(&mut self, category: Option<&str>) -> Vec<(String, T)>;
    fn get(&self, id: &str) -> Option<&T>;
    fn clear_cache(&mut self);
}

/// Trivial in-memory `ContentSource`, for tests only — never a production
/// content loader (spec §6.2 `[ADDED]`).
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentSource<T> {
    entries: std::collections::BTreeMap<String, T>,
}

impl<T: Clone> ContentSource<T> for InMemoryContentSource<T> {
    fn load(&mut self, category: Option<&str>) -> Vec<(String, T)> {
        self.entries
            .iter()
            .filter(|(id, _)| category.map(|c| id.starts_with(c)).unwrap_or(true))
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect()
    }

    fn get(&self, id: &str) -> Option<&T> {
        self.entries.get(id)
    }

    fn clear_cache(&mut self) {
        self.entries.clear();
    }
}

impl<T> InMemoryContentSource<T> {
    pub fn new() -> Self {
        Self {
            entries: std::collections::BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, id: impl Into<String>, value: T) {
        self.entries.insert(id.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_produces_identical_skill_rolls() {
        let mut a = Simulation::with_seed(Config::default(), 7);
        let mut b = Simulation::with_seed(Config::default(), 7);
        a.skills.register(crate::skills::Skill::new(
            crate::skills::SkillId::new("swords"),
            crate::skills::SkillCategory::Combat,
            WallInstant(0),
        ));
        b.skills.register(crate::skills::Skill::new(
            crate::skills::SkillId::new("swords"),
            crate::skills::SkillCategory::Combat,
            WallInstant(0),
        ));
        let snapshot = PlayerSnapshot::default();
        for _ in 0..20 {
            a.step(PlayerIntent::UseSkill { skill_id: "swords".to_string(), difficulty: 20 }, &snapshot);
            b.step(PlayerIntent::UseSkill { skill_id: "swords".to_string(), difficulty: 20 }, &snapshot);
        }
        assert_eq!(a.skills.get(&crate::skills::SkillId::new("swords")).unwrap().level, b.skills.get(&crate::skills::SkillId::new("swords")).unwrap().level);
        assert_eq!(a.skills.get(&crate::skills::SkillId::new("swords")).unwrap().progress, b.skills.get(&crate::skills::SkillId::new("swords")).unwrap().progress);
    }

    #[test]
    fn wait_advances_game_time_by_requested_minutes() {
        let mut sim = Simulation::new(Config::default());
        let snapshot = PlayerSnapshot::default();
        sim.step(PlayerIntent::Wait { minutes: 5 }, &snapshot);
        assert_eq!(sim.world.clock.total_minutes, 5);
    }

    #[test]
    fn crossing_midnight_increments_day_and_resets_daily_skill_limits() {
        let mut sim = Simulation::new(Config::default());
        sim.skills.register(crate::skills::Skill::new(
            crate::skills::SkillId::new("swords"),
            crate::skills::SkillCategory::Combat,
            WallInstant::now(),
        ));
        if let Some(skill) = sim.skills.get_mut(&crate::skills::SkillId::new("swords")) {
            skill.uses_today = 10;
        }
        let snapshot = PlayerSnapshot::default();
        sim.step(PlayerIntent::Wait { minutes: 1441 }, &snapshot);
        assert_eq!(sim.world.clock.day, 2);
        assert_eq!(sim.skills.get(&crate::skills::SkillId::new("swords")).unwrap().uses_today, 0);
    }

    #[test]
    fn serialize_then_deserialize_round_trips_game_time() {
        let mut sim = Simulation::new(Config::default());
        let snapshot = PlayerSnapshot::default();
        sim.step(PlayerIntent::Wait { minutes: 10 }, &snapshot);
        let blob = sim.serialize();
        let restored = Simulation::deserialize(blob, Config::default()).unwrap();
        assert_eq!(restored.world.clock.total_minutes, 10);
    }

    #[test]
    fn deserialize_rejects_unsupported_schema_version() {
        let sim = Simulation::new(Config::default());
        let mut blob = sim.serialize();
        blob.schema_version = 999;
        let result = Simulation::deserialize(blob, Config::default());
        assert!(matches!(result, Err(CoreError::SchemaMismatch { .. })));
    }

    #[test]
    fn quit_sets_menu_mode() {
        let mut sim = Simulation::new(Config::default());
        let snapshot = PlayerSnapshot::default();
        let result = sim.step(PlayerIntent::Quit, &snapshot);
        assert!(result.success);
        assert_eq!(sim.view().mode, Mode::Menu);
    }

    #[test]
    fn content_source_filters_by_category_prefix() {
        let mut source = InMemoryContentSource::new();
        source.insert("weapons.sword", "a blade");
        source.insert("tools.hammer", "a hammer");
        let weapons = source.load(Some("weapons"));
        assert_eq!(weapons.len(), 1);
    }
}

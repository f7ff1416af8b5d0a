//! THE CORE: simulation engine for a text-based prison RPG.
//!
//! Four subsystems share one mutable [`world::WorldState`] graph: the
//! [`bus`] event dispatcher, the [`quests`] emergent quest engine, the
//! [`consequences`] scheduler, and the [`skills`] progression system.
//! [`simulation::Simulation`] owns all four and is the only thing a
//! presentation layer needs to hold.

pub mod bus;
pub mod config;
pub mod consequences;
pub mod error;
pub mod quests;
pub mod simulation;
pub mod skills;
pub mod world;

pub use bus::{BusStats, EventBus, SubscriptionId};
pub use config::Config;
pub use consequences::{ConsequenceKind, ConsequenceScheduler, Effect, EffectOp, EffectTargetKind, ScheduledConsequence};
pub use error::{CoreError, UnmetRequirement};
pub use quests::{EmergentQuest, PlayerSnapshot, QuestBranch, QuestEngine, QuestSeed, QuestState};
pub use simulation::{ContentSource, GameStateView, Mode, PlayerIntent, SaveBlob, Simulation, StepResult};
pub use skills::{Skill, SkillCategory, SkillId, SkillSystem};
pub use world::WorldState;

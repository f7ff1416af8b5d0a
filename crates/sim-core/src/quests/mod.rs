//! Emergent Quest Engine (spec §3.5–§3.7, §4.3).

pub mod branch;
pub mod engine;
pub mod investigation;
pub mod seed;
pub mod strategy;

pub use branch::{BranchConsequences, DelayedEffect, PlayerSnapshot, QuestBranch, Requirement, RequirementKind};
pub use engine::{DiscoveryResult, EmergentQuest, QuestEngine, QuestState, QuestStatus, ResolutionResult};
pub use investigation::Investigation;
pub use seed::{DiscoveryMethod, QuestSeed};
pub use strategy::{GenericQuestStrategy, InvestigationExtension, QuestStrategy};

//! Quest-kind strategy interface (spec §9 "Duck-typed quest subtypes").
//!
//! The source derives a class per quest flavor (escape, contraband, gang
//! war...) from a shared base, each overriding investigation behavior. The
//! engine here knows only this interface; concrete behavior is registered
//! per quest_id rather than baked into an inheritance tree.

use crate::quests::branch::PlayerSnapshot;
use crate::quests::investigation::Investigation;

/// Extra fields an `investigate` call can return beyond the generic
/// clue/dialogue handling in §4.3.5.
#[derive(Debug, Clone, Default)]
pub struct InvestigationExtension {
    pub discoveries: Vec<String>,
    pub dialogue: Vec<String>,
}

pub trait QuestStrategy: std::fmt::Debug {
    /// Handles quest-type-specific investigation actions (`scout`,
    /// `recruit`, `prepare`, or an override of the generic ones). Returning
    /// `None` means this strategy has nothing to add for `action`.
    fn extend_investigation(
        &self,
        action: &str,
        target: &str,
        snapshot: &PlayerSnapshot,
        investigation: &mut Investigation,
    ) -> Option<InvestigationExtension>;

    /// Overrides the generic moral-weight table for a branch this quest
    /// kind treats specially. Returning `None` falls back to the shared
    /// table in §4.3.6 step 6.
    fn compute_moral_weight(&self, _branch_id: &str) -> Option<i32> {
        None
    }

    /// World-state effects to apply when this quest is abandoned by timeout
    /// (spec §4.3.9). The default policy is the shared
    /// `"quest.<id>.ignored" = true` flag, applied by the caller when this
    /// returns an empty list.
    fn compute_failure_consequences(&self, _quest_id: &str) -> Vec<(String, sim_events::WorldValue)> {
        Vec::new()
    }
}

/// The default strategy used by quests with no registered override: no
/// extension behavior, shared moral table, shared failure flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericQuestStrategy;

impl QuestStrategy for GenericQuestStrategy {
    fn extend_investigation(
        &self,
        _action: &str,
        _target: &str,
        _snapshot: &PlayerSnapshot,
        _investigation: &mut Investigation,
    ) -> Option<InvestigationExtension> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_strategy_adds_nothing_and_defers_to_shared_tables() {
        let strategy = GenericQuestStrategy;
        let snapshot = PlayerSnapshot::default();
        let mut investigation = Investigation::default();
        assert!(strategy
            .extend_investigation("scout", "yard", &snapshot, &mut investigation)
            .is_none());
        assert!(strategy.compute_moral_weight("betrayal").is_none());
        assert!(strategy.compute_failure_consequences("q1").is_empty());
    }
}

//! Investigation progress for a single emergent quest (spec §3.6).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Investigation {
    pub discovered_clues: BTreeSet<String>,
    pub interrogated_npcs: BTreeSet<String>,
    pub visited_locations: BTreeSet<String>,
    pub theories: Vec<String>,
    pub evidence: Vec<String>,
}

impl Investigation {
    /// Adds a clue if not already present; returns whether it was new.
    pub fn add_clue(&mut self, clue_id: impl Into<String>) -> bool {
        self.discovered_clues.insert(clue_id.into())
    }

    /// Rough completion percentage used by status queries (spec §4.3.8),
    /// treating five clues as a fully worked investigation.
    pub fn completion_percentage(&self) -> f64 {
        ((self.discovered_clues.len() as f64 / 5.0) * 100.0).min(100.0)
    }

    /// Theory fidelity tier for the current clue count (spec §4.3.5
    /// "analyze" action).
    pub fn theory_tier(&self) -> &'static str {
        let count = self.discovered_clues.len();
        if count >= 5 {
            "complete"
        } else if count >= 3 {
            "partial"
        } else {
            "vague"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_clue_reports_whether_it_was_new() {
        let mut investigation = Investigation::default();
        assert!(investigation.add_clue("clue_a"));
        assert!(!investigation.add_clue("clue_a"));
    }

    #[test]
    fn completion_percentage_caps_at_100() {
        let mut investigation = Investigation::default();
        for clue in ["a", "b", "c", "d", "e", "f"] {
            investigation.add_clue(clue);
        }
        assert_eq!(investigation.completion_percentage(), 100.0);
    }

    #[test]
    fn theory_tier_reflects_clue_count() {
        let mut investigation = Investigation::default();
        assert_eq!(investigation.theory_tier(), "vague");
        investigation.add_clue("a");
        investigation.add_clue("b");
        investigation.add_clue("c");
        assert_eq!(investigation.theory_tier(), "partial");
        investigation.add_clue("d");
        investigation.add_clue("e");
        assert_eq!(investigation.theory_tier(), "complete");
    }
}

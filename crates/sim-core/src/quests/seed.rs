//! Quest seeds: templates describing when a quest becomes discoverable
//! (spec §3.5).

use crate::world::WorldState;
use serde::{Deserialize, Serialize};
use sim_events::ConditionValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    Overheard,
    Witnessed,
    Found,
    Told,
    Stumbled,
    Consequence,
    Environmental,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestSeed {
    pub quest_id: String,
    pub name: String,
    pub activation_conditions: BTreeMap<String, ConditionValue>,
    pub discovery_methods: Vec<DiscoveryMethod>,
    pub initial_clues: BTreeMap<String, String>,
    pub time_sensitive: bool,
    pub expiry_hours: u64,
    pub priority: u8,
}

impl QuestSeed {
    /// All activation conditions must hold against `world` for the seed to
    /// instantiate (spec §4.3.3 step 1). An empty condition set never
    /// activates on its own — a seed is meant to gate on something.
    pub fn check_activation(&self, world: &WorldState) -> bool {
        if self.activation_conditions.is_empty() {
            return false;
        }
        self.activation_conditions
            .iter()
            .all(|(path, condition)| world.matches(path, condition))
    }

    /// Picks one discovery method deterministically: the first element in
    /// declaration order (spec §4.3.4's "implementation-chosen ordering").
    pub fn pick_discovery_method(&self) -> Option<DiscoveryMethod> {
        self.discovery_methods.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_events::WorldValue;

    #[test]
    fn activation_requires_every_condition() {
        let mut conditions = BTreeMap::new();
        conditions.insert(
            "prison.food_supplies".to_string(),
            ConditionValue::Operator {
                operator: sim_events::Comparator::Lt,
                value: WorldValue::Int(10),
            },
        );
        conditions.insert(
            "prison.riot".to_string(),
            ConditionValue::Literal(WorldValue::Bool(true)),
        );
        let seed = QuestSeed {
            quest_id: "s1".into(),
            name: "Food shortage".into(),
            activation_conditions: conditions,
            discovery_methods: vec![DiscoveryMethod::Overheard],
            initial_clues: BTreeMap::new(),
            time_sensitive: false,
            expiry_hours: 0,
            priority: 5,
        };

        let mut world = WorldState::new();
        world.set("prison.food_supplies", 5i64).unwrap();
        assert!(!seed.check_activation(&world));

        world.set("prison.riot", true).unwrap();
        assert!(seed.check_activation(&world));
    }

    #[test]
    fn seed_with_no_conditions_never_self_activates() {
        let seed = QuestSeed {
            quest_id: "s1".into(),
            name: "n".into(),
            activation_conditions: BTreeMap::new(),
            discovery_methods: vec![],
            initial_clues: BTreeMap::new(),
            time_sensitive: false,
            expiry_hours: 0,
            priority: 1,
        };
        assert!(!seed.check_activation(&WorldState::new()));
    }
}

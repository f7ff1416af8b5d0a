//! Error kinds surfaced from the core (spec §7).

use serde::{Deserialize, Serialize};

/// A single unmet branch requirement, carried by [`CoreError::RequirementUnmet`]
/// so the caller can render a specific reason instead of a bare failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmetRequirement {
    pub kind: String,
    pub target: String,
    pub reason: String,
}

/// Every fallible operation in the core returns `Result<T, CoreError>`.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("unknown {entity_kind} id: {id}")]
    UnknownEntity { entity_kind: &'static str, id: String },

    #[error("branch {branch_id} on quest {quest_id} has unmet requirements")]
    RequirementUnmet {
        quest_id: String,
        branch_id: String,
        unmet: Vec<UnmetRequirement>,
    },

    #[error("invalid transition for {entity_kind} {id}: {reason}")]
    InvalidTransition {
        entity_kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("save schema version {found} is not supported (expected {expected})")]
    SchemaMismatch { expected: u32, found: u32 },

    #[error("world invariant violated: {reason}")]
    WorldInvariantViolation { reason: String },

    #[error("content id {id} missing from {catalogue} catalogue")]
    ContentMissing { catalogue: &'static str, id: String },
}

impl CoreError {
    pub fn unknown(entity_kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::UnknownEntity {
            entity_kind,
            id: id.into(),
        }
    }

    pub fn invalid_transition(
        entity_kind: &'static str,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::InvalidTransition {
            entity_kind,
            id: id.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_entity_formats_with_kind_and_id() {
        let err = CoreError::unknown("quest", "keys_lost");
        assert_eq!(err.to_string(), "unknown quest id: keys_lost");
    }

    #[test]
    fn requirement_unmet_carries_structured_reasons() {
        let err = CoreError::RequirementUnmet {
            quest_id: "keys_lost".into(),
            branch_id: "return_keys".into(),
            unmet: vec![UnmetRequirement {
                kind: "skill".into(),
                target: "lockpicking".into(),
                reason: "level 2 < required 5".into(),
            }],
        };
        match err {
            CoreError::RequirementUnmet { unmet, .. } => assert_eq!(unmet.len(), 1),
            _ => panic!("wrong variant"),
        }
    }
}

//! World State Store (spec §3.1, §4.2).
//!
//! A single mutable store keyed by dotted string paths
//! (`"prison.food_supplies"`, `"relationships.Brutus"`). Segments create
//! intermediate mappings on demand; reads of an absent path return `None`
//! rather than a synthesized default (spec §9 open question resolution).

use serde::{Deserialize, Serialize};
use sim_events::{ConditionValue, GameClock, WorldValue};
use std::collections::BTreeMap;

/// Errors raised by malformed paths; never raised for absent data, only for
/// syntactically invalid paths (empty segments, trailing dots).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
    #[error("world-state path must not be empty")]
    Empty,
    #[error("world-state path '{0}' has an empty segment")]
    EmptySegment(String),
}

fn split_path(path: &str) -> Result<Vec<&str>, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(PathError::EmptySegment(path.to_string()));
    }
    Ok(segments)
}

/// Untyped, dotted-path keyed mutable store. Not thread-safe; all mutation
/// is expected to occur inside a single tick (spec §4.2 concurrency note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldState {
    root: BTreeMap<String, WorldValue>,
    /// In-game minute counter, day counter, and session start instant
    /// (spec §3.1).
    pub clock: GameClock,
}

impl WorldState {
    pub fn new() -> Self {
        Self {
            root: BTreeMap::new(),
            clock: GameClock::start(),
        }
    }

    /// Reads the value at `path`, or `None` if the path does not exist or is
    /// malformed.
    pub fn get(&self, path: &str) -> Option<&WorldValue> {
        let segments = split_path(path).ok()?;
        let (last, parents) = segments.split_last()?;
        let mut current = &self.root;
        for segment in parents {
            match current.get(*segment) {
                Some(WorldValue::Map(next)) => current = next,
                _ => return None,
            }
        }
        current.get(*last)
    }

    /// Writes `value` at `path`, creating intermediate maps as needed.
    pub fn set(&mut self, path: &str, value: impl Into<WorldValue>) -> Result<(), PathError> {
        let segments = split_path(path)?;
        let (last, parents) = segments.split_last().expect("split_path is non-empty");
        let mut current = &mut self.root;
        for segment in parents {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| WorldValue::Map(BTreeMap::new()));
            if !matches!(entry, WorldValue::Map(_)) {
                *entry = WorldValue::Map(BTreeMap::new());
            }
            current = match entry {
                WorldValue::Map(m) => m,
                _ => unreachable!(),
            };
        }
        current.insert(last.to_string(), value.into());
        Ok(())
    }

    /// Applies the comparator language from spec §3.5/§4.2. An absent path
    /// evaluates false for every operator.
    pub fn matches(&self, path: &str, condition: &ConditionValue) -> bool {
        match self.get(path) {
            Some(actual) => condition.matches(actual),
            None => condition.operator().eval_absent(),
        }
    }

    /// Adds `delta` to a numeric path, treating an absent path as zero.
    pub fn add_numeric(&mut self, path: &str, delta: f64) -> Result<(), PathError> {
        let current = self.get(path).and_then(|v| v.as_float()).unwrap_or(0.0);
        self.set(path, current + delta)
    }

    /// Multiplies a numeric path by `factor`, treating an absent path as
    /// having value `1.0` (a no-op multiplier), matching the scheduler's
    /// `mul` effect semantics (spec §4.4).
    pub fn mul_numeric(&mut self, path: &str, factor: f64) -> Result<(), PathError> {
        let current = self.get(path).and_then(|v| v.as_float()).unwrap_or(1.0);
        self.set(path, current * factor)
    }

    /// Opaque snapshot handle for persistence (spec §4.2 `snapshot()`); in
    /// this implementation it is simply a clone, since `WorldState` is plain
    /// data with no external handles to invalidate.
    pub fn snapshot(&self) -> WorldState {
        self.clone()
    }
}

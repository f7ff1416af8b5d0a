//! Event model shared by every producer and subscriber on the bus.

use crate::timestamp::WallInstant;
use serde::{Deserialize, Serialize};
use serde_json::Value as Payload;

/// Dispatch priority. Higher values are dispatched first within a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum Priority {
    Debug = 1,
    Low = 3,
    Normal = 5,
    High = 7,
    Critical = 10,
}

impl Priority {
    /// Raw ordinal used for sorting and for the clamp-above-critical rule.
    pub fn value(self) -> i32 {
        self as i32
    }

    /// Builds a priority from an arbitrary ordinal, clamping anything above
    /// `Critical` down to `Critical` (spec §8.3) and anything below `Debug`
    /// up to `Debug`.
    pub fn from_ordinal(raw: i32) -> Self {
        if raw >= Priority::Critical.value() {
            Priority::Critical
        } else if raw >= Priority::High.value() {
            Priority::High
        } else if raw >= Priority::Normal.value() {
            Priority::Normal
        } else if raw >= Priority::Low.value() {
            Priority::Low
        } else {
            Priority::Debug
        }
    }
}

/// Closed set of event categories (spec §3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Combat,
    Movement,
    Dialogue,
    Trade,
    Craft,
    Quest,
    NpcAction,
    Time,
    World,
    System,
    PlayerAction,
    Economy,
    Death,
    Discovery,
}

/// A single event flowing through the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// String identifier, e.g. `"player_moved"`, `"quest_completed"`.
    pub event_type: String,
    pub category: EventCategory,
    /// Arbitrary payload; the core does not interpret it beyond what
    /// individual subscribers agree on out of band.
    pub payload: Payload,
    pub priority: Priority,
    pub timestamp: WallInstant,
    pub source: Option<String>,
    pub target: Option<String>,
    /// If false, the event updates stats/history but reaches no handler.
    pub propagate: bool,
}

impl Event {
    /// Creates an event with `Normal` priority, `propagate = true`, and the
    /// current wall-clock instant.
    pub fn new(event_type: impl Into<String>, category: EventCategory, payload: Payload) -> Self {
        Self {
            event_type: event_type.into(),
            category,
            payload,
            priority: Priority::Normal,
            timestamp: WallInstant::now(),
            source: None,
            target: None,
            propagate: true,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_propagate(mut self, propagate: bool) -> Self {
        self.propagate = propagate;
        self
    }
}

/// Fluent builder mirroring the field-by-field construction style used
/// elsewhere in this workspace's event helpers.
///
/// # Panics
/// `build()` panics if `event_type` or `category` were never set — both are
/// required to identify the event to subscribers.
#[derive(Debug, Default)]
pub struct EventBuilder {
    event_type: Option<String>,
    category: Option<EventCategory>,
    payload: Option<Payload>,
    priority: Priority2,
    source: Option<String>,
    target: Option<String>,
    propagate: Option<bool>,
}

/// Local alias so `Default` on the builder doesn't require `Priority` to
/// implement `Default` itself (it intentionally has no "zero" variant).
type Priority2 = Option<Priority>;

impl EventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn category(mut self, category: EventCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn propagate(mut self, propagate: bool) -> Self {
        self.propagate = Some(propagate);
        self
    }

    pub fn build(self) -> Event {
        Event {
            event_type: self.event_type.expect("EventBuilder: event_type is required"),
            category: self.category.expect("EventBuilder: category is required"),
            payload: self.payload.unwrap_or(Payload::Null),
            priority: self.priority.unwrap_or(Priority::Normal),
            timestamp: WallInstant::now(),
            source: self.source,
            target: self.target,
            propagate: self.propagate.unwrap_or(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn priority_ordinal_clamps_above_critical() {
        assert_eq!(Priority::from_ordinal(999), Priority::Critical);
        assert_eq!(Priority::from_ordinal(10), Priority::Critical);
    }

    #[test]
    fn priority_ordinal_clamps_below_debug() {
        assert_eq!(Priority::from_ordinal(-5), Priority::Debug);
    }

    #[test]
    fn priority_ordering_sorts_critical_first() {
        let mut priorities = vec![Priority::Low, Priority::Critical, Priority::Normal];
        priorities.sort_by(|a, b| b.cmp(a));
        assert_eq!(
            priorities,
            vec![Priority::Critical, Priority::Normal, Priority::Low]
        );
    }

    #[test]
    fn new_event_defaults_to_normal_and_propagating() {
        let event = Event::new("player_moved", EventCategory::Movement, json!({"to": "yard"}));
        assert_eq!(event.priority, Priority::Normal);
        assert!(event.propagate);
        assert!(event.source.is_none());
    }

    #[test]
    fn builder_sets_all_fields() {
        let event = EventBuilder::new()
            .event_type("quest_completed")
            .category(EventCategory::Quest)
            .payload(json!({"quest_id": "keys_lost"}))
            .priority(Priority::High)
            .source("quest_engine")
            .build();
        assert_eq!(event.event_type, "quest_completed");
        assert_eq!(event.priority, Priority::High);
        assert_eq!(event.source.as_deref(), Some("quest_engine"));
    }

    #[test]
    #[should_panic(expected = "event_type is required")]
    fn builder_panics_without_event_type() {
        EventBuilder::new().category(EventCategory::System).build();
    }

    #[test]
    fn category_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&EventCategory::NpcAction).unwrap(),
            r#""npc_action""#
        );
    }
}

//! Event Bus & dispatch (spec §4.1).
//!
//! Priority-ordered, single-threaded cooperative dispatch with batching,
//! bounded history, and per-category statistics. Subscriber panics are
//! caught and logged; they never abort the drain.

use sim_events::{Event, EventCategory, Priority};
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A subscriber callback. Boxed because subscribers are heterogeneous
/// closures owned by the bus for its own lifetime.
pub type Handler = Box<dyn Fn(&Event)>;

#[derive(Debug, Default, Clone)]
pub struct BusStats {
    pub total_events: u64,
    pub events_by_category: HashMap<EventCategory, u64>,
    pub events_by_type: HashMap<String, u64>,
}

/// Each registered handler carries an opaque token so `unsubscribe` can
/// remove the right one without requiring `Fn` closures to implement
/// equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
}

/// Priority-ordered event bus. Not `Send`/`Sync` by construction — the
/// simulation is single-threaded cooperative (spec §5).
pub struct EventBus {
    type_subscribers: HashMap<String, Vec<Subscription>>,
    category_subscribers: HashMap<EventCategory, Vec<Subscription>>,
    pending: VecDeque<Event>,
    history: VecDeque<Event>,
    history_cap: usize,
    processing: bool,
    batch_mode: bool,
    next_subscription_id: u64,
    stats: BusStats,
}

impl EventBus {
    pub fn new(history_cap: usize) -> Self {
        Self {
            type_subscribers: HashMap::new(),
            category_subscribers: HashMap::new(),
            pending: VecDeque::new(),
            history: VecDeque::new(),
            history_cap,
            processing: false,
            batch_mode: false,
            next_subscription_id: 0,
            stats: BusStats::default(),
        }
    }

    /// Registers `handler` for a specific event type. Returns a token usable
    /// with [`EventBus::unsubscribe`].
    pub fn subscribe(&mut self, event_type: impl Into<String>, handler: Handler) -> SubscriptionId {
        let id = self.alloc_id();
        self.type_subscribers
            .entry(event_type.into())
            .or_default()
            .push(Subscription { id, handler });
        id
    }

    /// Registers `handler` for every event in `category`.
    pub fn subscribe_category(&mut self, category: EventCategory, handler: Handler) -> SubscriptionId {
        let id = self.alloc_id();
        self.category_subscribers
            .entry(category)
            .or_default()
            .push(Subscription { id, handler });
        id
    }

    /// Removes a type subscription registered with the given id. Removing an
    /// id that was never registered, or was already removed, is a no-op.
    pub fn unsubscribe(&mut self, event_type: &str, id: SubscriptionId) {
        if let Some(subs) = self.type_subscribers.get_mut(event_type) {
            subs.retain(|s| s.id != id);
        }
    }

    pub fn unsubscribe_category(&mut self, category: EventCategory, id: SubscriptionId) {
        if let Some(subs) = self.category_subscribers.get_mut(&category) {
            subs.retain(|s| s.id != id);
        }
    }

    fn alloc_id(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription_id);
        self.next_subscription_id += 1;
        id
    }

    /// Appends to the pending queue; drains immediately unless a drain is
    /// already in progress or batch mode is active.
    pub fn emit(&mut self, event: Event) {
        self.pending.push_back(event);
        if !self.processing && !self.batch_mode {
            self.drain();
        }
    }

    /// Dispatches `event` synchronously, bypassing the pending queue.
    pub fn emit_immediate(&mut self, event: Event) {
        self.dispatch_one(event);
    }

    pub fn start_batch(&mut self) {
        self.batch_mode = true;
    }

    /// Ends batch mode and drains whatever accumulated while it was active.
    pub fn process_batch(&mut self) {
        self.batch_mode = false;
        if !self.processing {
            self.drain();
        }
    }

    fn drain(&mut self) {
        self.processing = true;
        while !self.pending.is_empty() {
            stable_sort_by_priority_desc(&mut self.pending);
            let event = self.pending.pop_front().expect("checked non-empty above");
            if event.propagate {
                self.dispatch_one(event);
            } else {
                self.record_stats(&event);
                self.push_history(event);
            }
        }
        self.processing = false;
    }

    fn dispatch_one(&mut self, event: Event) {
        self.record_stats(&event);

        if let Some(subs) = self.type_subscribers.get(&event.event_type) {
            // Re-fetch the subscriber list by index each iteration rather than
            // holding a borrow across the callback, since a re-entrant `emit`
            // inside a handler needs mutable access to `self`.
            let len = subs.len();
            for i in 0..len {
                let Some(subs) = self.type_subscribers.get(&event.event_type) else {
                    break;
                };
                let Some(sub) = subs.get(i) else { break };
                invoke_guarded(&sub.handler, &event, "type", &event.event_type);
            }
        }

        if let Some(subs) = self.category_subscribers.get(&event.category) {
            let len = subs.len();
            for i in 0..len {
                let Some(subs) = self.category_subscribers.get(&event.category) else {
                    break;
                };
                let Some(sub) = subs.get(i) else { break };
                invoke_guarded(&sub.handler, &event, "category", &format!("{:?}", event.category));
            }
        }

        self.push_history(event);
    }

    fn record_stats(&mut self, event: &Event) {
        self.stats.total_events += 1;
        *self.stats.events_by_category.entry(event.category).or_insert(0) += 1;
        *self
            .stats
            .events_by_type
            .entry(event.event_type.clone())
            .or_insert(0) += 1;
    }

    fn push_history(&mut self, event: Event) {
        self.history.push_back(event);
        if self.history.len() > self.history_cap {
            self.history.pop_front();
        }
    }

    /// Reads a bounded slice of history, most-recent-last, optionally
    /// filtered by category and/or type.
    pub fn get_history(
        &self,
        category: Option<EventCategory>,
        event_type: Option<&str>,
        limit: usize,
    ) -> Vec<&Event> {
        self.history
            .iter()
            .filter(|e| category.map(|c| c == e.category).unwrap_or(true))
            .filter(|e| event_type.map(|t| t == e.event_type).unwrap_or(true))
            .rev()
            .take(limit)
            .rev()
            .collect()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn stats(&self) -> &BusStats {
        &self.stats
    }
}

fn invoke_guarded(handler: &Handler, event: &Event, scope: &str, key: &str) {
    let result = catch_unwind(AssertUnwindSafe(|| handler(event)));
    if let Err(payload) = result {
        let message = panic_message(&payload);
        tracing::warn!(
            scope,
            key,
            event_type = %event.event_type,
            error = %message,
            "subscriber handler panicked; dispatch continues"
        );
    }
}

fn stable_sort_by_priority_desc(queue: &mut VecDeque<Event>) {
    let mut items: Vec<Event> = queue.drain(..).collect();
    items.sort_by(|a, b| b.priority.cmp(&a.priority));
    *queue = items.into();
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Priority {
    /// Clamps an externally supplied priority up to `Debug`/down to
    /// `Critical`. Alias kept local to the bus module since only dispatch
    /// needs this boundary behavior (spec §8.3).
}

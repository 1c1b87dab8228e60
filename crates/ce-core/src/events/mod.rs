//! Session events
//!
//! Hosts subscribe to typed pipeline events (content loaded, traces resolved,
//! ...) on a shared [`EventBus`]. Handlers run synchronously on the
//! publishing thread, in subscription order.

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use parking_lot::Mutex;

/// Marker for types that can travel over the bus
pub trait Event: Any + Send + Sync {}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ErasedHandler = Box<dyn FnMut(&dyn Any) + Send>;

/// Type-keyed publish/subscribe bus
#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<AHashMap<TypeId, Vec<(SubscriptionId, ErasedHandler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `handler` for every published `E`
    pub fn subscribe<E, F>(&self, mut handler: F) -> SubscriptionId
    where
        E: Event,
        F: FnMut(&E) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let erased: ErasedHandler = Box::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });
        self.handlers
            .lock()
            .entry(TypeId::of::<E>())
            .or_default()
            .push((id, erased));
        id
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let mut removed = false;
        for list in handlers.values_mut() {
            let before = list.len();
            list.retain(|(sub, _)| *sub != id);
            removed |= list.len() != before;
        }
        removed
    }

    /// Deliver `event` to its subscribers. Handlers must not publish on the
    /// same bus.
    pub fn publish<E: Event>(&self, event: &E) {
        let mut handlers = self.handlers.lock();
        if let Some(list) = handlers.get_mut(&TypeId::of::<E>()) {
            for (_, handler) in list.iter_mut() {
                handler(event);
            }
        }
    }

    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.handlers
            .lock()
            .get(&TypeId::of::<E>())
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// New table content was loaded and the column registry rebuilt
#[derive(Debug, Clone, PartialEq)]
pub struct ContentLoaded {
    pub source_name: String,
    pub row_count: usize,
    pub column_count: usize,
    /// Whether columns are materialized on demand
    pub lazy: bool,
}

/// Table content could not be parsed
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRejected {
    pub source_name: String,
    pub error: String,
}

/// An edit was resolved and is ready to draw
#[derive(Debug, Clone, PartialEq)]
pub struct TracesResolved {
    pub trace_count: usize,
    pub render_revision: u64,
}

/// A trace referenced a column the table does not have
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionFailed {
    pub trace_index: usize,
    pub field: String,
    pub column: String,
}

impl Event for ContentLoaded {}
impl Event for ContentRejected {}
impl Event for TracesResolved {}
impl Event for ResolutionFailed {}

//! Fermenter events and the site event bus.
//!
//! Each [`crate::fermenter::FermenterState`] queues [`FermenterEvent`]s as its
//! batches change state. The site drains those queues after every advance and
//! emits them on an [`EventBus`], which keeps one ring buffer per event kind
//! and hands buffered events to passive listeners on delivery. Delivery
//! follows emission order across every kind.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`], which prevents
//! any allocation or recording for that kind.

use crate::fixed::Ticks;
use crate::id::*;
use crate::quality::QualityCategory;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A state transition inside one fermenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FermenterEvent {
    /// The fermenter went from empty to holding something.
    Filled,
    /// The fermenter no longer holds anything.
    Emptied,
    BatchStarted {
        record: ProgressId,
        process: ProcessId,
        count: u32,
    },
    /// Ingredients were merged into an existing batch.
    IngredientAdded {
        record: ProgressId,
        process: ProcessId,
        count: u32,
    },
    BatchFinished {
        record: ProgressId,
        process: ProcessId,
    },
    RuinedByTemperature {
        record: ProgressId,
        process: ProcessId,
    },
    ProductTakenOut {
        record: ProgressId,
        process: ProcessId,
        product: ItemKindId,
        count: u32,
        quality: Option<QualityCategory>,
    },
    /// A ruined batch was taken out without output.
    WreckageCleared {
        record: ProgressId,
        process: ProcessId,
    },
    /// Every batch was cleared at once.
    Reset { dropped: u32, destroyed: u32 },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Filled,
    Emptied,
    BatchStarted,
    IngredientAdded,
    BatchFinished,
    RuinedByTemperature,
    ProductTakenOut,
    WreckageCleared,
    Reset,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 9;

impl FermenterEvent {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            FermenterEvent::Filled => EventKind::Filled,
            FermenterEvent::Emptied => EventKind::Emptied,
            FermenterEvent::BatchStarted { .. } => EventKind::BatchStarted,
            FermenterEvent::IngredientAdded { .. } => EventKind::IngredientAdded,
            FermenterEvent::BatchFinished { .. } => EventKind::BatchFinished,
            FermenterEvent::RuinedByTemperature { .. } => EventKind::RuinedByTemperature,
            FermenterEvent::ProductTakenOut { .. } => EventKind::ProductTakenOut,
            FermenterEvent::WreckageCleared { .. } => EventKind::WreckageCleared,
            FermenterEvent::Reset { .. } => EventKind::Reset,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

/// A fermenter event stamped with where and when it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteEvent {
    pub fermenter: FermenterId,
    pub tick: Ticks,
    pub event: FermenterEvent,
}

impl SiteEvent {
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

// ---------------------------------------------------------------------------
// EventBuffer: pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    /// Each event with the bus-wide sequence number it was emitted under.
    events: Vec<Option<(u64, SiteEvent)>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    /// Push an event. If full, the oldest event is dropped.
    pub fn push(&mut self, event: SiteEvent) {
        self.push_sequenced(self.total_written, event);
    }

    fn push_sequenced(&mut self, sequence: u64, event: SiteEvent) {
        self.events[self.head] = Some((sequence, event));
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Number of events that were dropped because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Iterate over events in order from oldest to newest.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &SiteEvent> + '_ {
        self.sequenced().map(|(_, event)| event)
    }

    fn sequenced(&self) -> EventBufferIter<'_> {
        // head is the oldest entry once the buffer has wrapped
        let start = if self.len < self.capacity() { 0 } else { self.head };
        EventBufferIter {
            buffer: self,
            index: start,
            remaining: self.len,
        }
    }

    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

/// Iterator over sequenced events in an [`EventBuffer`], oldest first.
struct EventBufferIter<'a> {
    buffer: &'a EventBuffer,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventBufferIter<'a> {
    type Item = (u64, &'a SiteEvent);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let event = self.buffer.events[self.index]
            .as_ref()
            .map(|(sequence, event)| (*sequence, event));
        self.index = (self.index + 1) % self.buffer.capacity();
        self.remaining -= 1;
        event
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EventBufferIter<'_> {}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&SiteEvent) + Send>;

/// Optional predicate that filters events for a listener.
pub type EventFilter = Box<dyn Fn(&SiteEvent) -> bool + Send>;

/// Priority level for listeners. Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

struct ListenerEntry {
    listener: PassiveListener,
    priority: ListenerPriority,
    filter: Option<EventFilter>,
    insertion_order: u64,
}

impl std::fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("priority", &self.priority)
            .field("filtered", &self.filter.is_some())
            .field("insertion_order", &self.insertion_order)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// One ring buffer per event kind, listener lists, and suppression flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    listeners: [Vec<ListenerEntry>; EVENT_KIND_COUNT],
    default_capacity: usize,
    next_insertion_order: u64,
    next_sequence: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity per kind.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Default::default(),
            default_capacity,
            next_insertion_order: 0,
            next_sequence: 0,
        }
    }

    /// Suppress an event kind. Suppressed events are never buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Buffer an event. No-ops if the kind is suppressed.
    pub fn emit(&mut self, event: SiteEvent) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push_sequenced(sequence, event);
    }

    /// Register a listener with Normal priority and no filter.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.on_passive_filtered(kind, ListenerPriority::Normal, None, listener);
    }

    /// Register a listener with explicit priority and optional filter.
    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        priority: ListenerPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;
        self.listeners[kind.index()].push(ListenerEntry {
            listener,
            priority,
            filter,
            insertion_order: order,
        });
    }

    /// Hand every buffered event to its listeners in emission order, then
    /// clear the buffers. For each event, listeners of its kind run in
    /// `(priority, registration)` order.
    pub fn deliver(&mut self) {
        let mut pending: Vec<(u64, usize, SiteEvent)> = Vec::new();
        for (idx, slot) in self.buffers.iter_mut().enumerate() {
            let Some(buffer) = slot.as_mut() else {
                continue;
            };
            pending.extend(buffer.sequenced().map(|(seq, e)| (seq, idx, e.clone())));
            buffer.clear();
        }
        if pending.is_empty() {
            return;
        }
        pending.sort_by_key(|(seq, _, _)| *seq);

        for list in &mut self.listeners {
            list.sort_by_key(|entry| (entry.priority, entry.insertion_order));
        }
        for (_, idx, event) in &pending {
            for entry in &mut self.listeners[*idx] {
                if let Some(filter) = &entry.filter
                    && !filter(event)
                {
                    continue;
                }
                (entry.listener)(event);
            }
        }
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffer(kind).map(|b| b.len()).unwrap_or(0)
    }

    /// Total events ever emitted for a kind (including dropped).
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffer(kind).map(|b| b.total_written()).unwrap_or(0)
    }

    /// Clear all buffers. Listeners and suppression stay.
    pub fn clear_all(&mut self) {
        for b in self.buffers.iter_mut().flatten() {
            b.clear();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

//! Typed event bus with one bounded ring per event kind.
//!
//! Subsystems emit events while processes run; the engine delivers them in a
//! batch at the end of the tick. Passive listeners only observe. Reactive
//! handlers may answer with [`SimCommand`]s, which the engine applies at the
//! next tick boundary. Suppressed kinds are never buffered.

use crate::command::SimCommand;
use crate::fixed::Ticks;
use crate::id::{EntityId, OrderId};
use crate::material::ProductionMaterial;
use crate::status::StateChange;
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Which production boundary a batch of units crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Source -> production.
    Released,
    /// Production -> Sink.
    Delivered,
}

/// Why an entity needs attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// Blocked for `ticks` consecutive ticks.
    Stuck { ticks: Ticks },
    /// No station holds the material a machine is waiting for.
    MaterialNotFound {
        material: ProductionMaterial,
        attempts: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    UnitsCompleted {
        boundary: Boundary,
        material: ProductionMaterial,
        quantity: u32,
        tick: Ticks,
    },
    UnitProduced {
        machine: EntityId,
        material: ProductionMaterial,
        tick: Ticks,
    },
    StateChanged {
        entity: EntityId,
        change: StateChange,
        tick: Ticks,
    },
    TransportAssigned {
        robot: EntityId,
        pickup: EntityId,
        dropoff: EntityId,
        material: ProductionMaterial,
        quantity: u32,
        tick: Ticks,
    },
    OrderReleased {
        order: OrderId,
        tick: Ticks,
    },
    OrderCompleted {
        order: OrderId,
        tick: Ticks,
    },
    Diagnostic {
        entity: EntityId,
        issue: Issue,
        tick: Ticks,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    UnitsCompleted,
    UnitProduced,
    StateChanged,
    TransportAssigned,
    OrderReleased,
    OrderCompleted,
    Diagnostic,
}

const EVENT_KIND_COUNT: usize = 7;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::UnitsCompleted { .. } => EventKind::UnitsCompleted,
            Event::UnitProduced { .. } => EventKind::UnitProduced,
            Event::StateChanged { .. } => EventKind::StateChanged,
            Event::TransportAssigned { .. } => EventKind::TransportAssigned,
            Event::OrderReleased { .. } => EventKind::OrderReleased,
            Event::OrderCompleted { .. } => EventKind::OrderCompleted,
            Event::Diagnostic { .. } => EventKind::Diagnostic,
        }
    }

    pub fn tick(&self) -> Ticks {
        match self {
            Event::UnitsCompleted { tick, .. }
            | Event::UnitProduced { tick, .. }
            | Event::StateChanged { tick, .. }
            | Event::TransportAssigned { tick, .. }
            | Event::OrderReleased { tick, .. }
            | Event::OrderCompleted { tick, .. }
            | Event::Diagnostic { tick, .. } => *tick,
        }
    }
}

// ---------------------------------------------------------------------------
// Ring buffer
// ---------------------------------------------------------------------------

/// Bounded FIFO of events. When full, the oldest event is dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: VecDeque<Event>,
    capacity: usize,
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
        self.total_written += 1;
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity as u64)
    }

    /// Oldest first.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Event> {
        self.events.iter()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// Returns commands to apply at the next tick boundary.
pub type ReactiveHandler = Box<dyn FnMut(&Event) -> Vec<SimCommand>>;

enum Subscriber {
    Passive(PassiveListener),
    Reactive(ReactiveHandler),
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    subscribers: [Vec<Subscriber>; EVENT_KIND_COUNT],
    pending_commands: Vec<SimCommand>,
    capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("pending_commands", &self.pending_commands)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            subscribers: Default::default(),
            pending_commands: Vec::new(),
            capacity,
        }
    }

    /// Stop buffering a kind and release its buffer.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind as usize] = true;
        self.buffers[kind as usize] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind as usize]
    }

    pub fn emit(&mut self, event: Event) {
        let idx = event.kind() as usize;
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.subscribers[kind as usize].push(Subscriber::Passive(listener));
    }

    pub fn on_reactive(&mut self, kind: EventKind, handler: ReactiveHandler) {
        self.subscribers[kind as usize].push(Subscriber::Reactive(handler));
    }

    /// Hand every buffered event to its subscribers in registration order,
    /// then clear the buffers. Kinds are delivered in declaration order.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }
            let events: Vec<Event> = buffer.events.drain(..).collect();
            for subscriber in &mut self.subscribers[idx] {
                for event in &events {
                    match subscriber {
                        Subscriber::Passive(listener) => listener(event),
                        Subscriber::Reactive(handler) => {
                            self.pending_commands.extend(handler(event));
                        }
                    }
                }
            }
        }
    }

    pub fn drain_commands(&mut self) -> Vec<SimCommand> {
        std::mem::take(&mut self.pending_commands)
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffers[kind as usize].as_ref().map_or(0, |b| b.len())
    }

    /// Events emitted for a kind since creation, dropped ones included.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffers[kind as usize]
            .as_ref()
            .map_or(0, |b| b.total_written())
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind as usize].as_ref()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

//! Resume-time ordered process queue.
//!
//! Every entity process is a step function that reports when it wants to
//! run next. The queue is a `BinaryHeap` min-heap over `(tick, sequence)`,
//! so processes due on the same tick run in the order they were scheduled.
//! An entity has at most one live entry; older entries are skipped on pop.

use floorsim_core::fixed::Ticks;
use floorsim_core::id::EntityId;
use slotmap::SecondaryMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// What a process step asks of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Run again next tick.
    Continue,
    /// Run again at the given tick.
    ResumeAt(Ticks),
    /// Nothing to do until dispatch hands the process new work.
    Done,
}

#[derive(Debug, PartialEq, Eq)]
struct Scheduled {
    tick: Ticks,
    seq: u64,
    entity: EntityId,
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .tick
            .cmp(&self.tick)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
    /// Live resume tick per entity.
    due: SecondaryMap<EntityId, Ticks>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any pending entry for `entity` with one at `tick`.
    pub fn schedule(&mut self, entity: EntityId, tick: Ticks) {
        self.due.insert(entity, tick);
        self.heap.push(Scheduled {
            tick,
            seq: self.next_seq,
            entity,
        });
        self.next_seq += 1;
    }

    /// Schedule a parked process at `tick`. Processes that already have a
    /// pending entry keep it.
    pub fn wake(&mut self, entity: EntityId, tick: Ticks) {
        if !self.due.contains_key(entity) {
            self.schedule(entity, tick);
        }
    }

    pub fn is_scheduled(&self, entity: EntityId) -> bool {
        self.due.contains_key(entity)
    }

    /// Pop the next live entry due at or before `now`.
    pub fn pop_due(&mut self, now: Ticks) -> Option<EntityId> {
        while let Some(top) = self.heap.peek() {
            if top.tick > now {
                return None;
            }
            let Some(entry) = self.heap.pop() else {
                break;
            };
            if self.due.get(entry.entity) == Some(&entry.tick) {
                self.due.remove(entry.entity);
                return Some(entry.entity);
            }
        }
        None
    }

    /// Earliest live resume tick.
    pub fn next_due(&mut self) -> Option<Ticks> {
        while let Some(top) = self.heap.peek() {
            if self.due.get(top.entity) == Some(&top.tick) {
                return Some(top.tick);
            }
            self.heap.pop();
        }
        None
    }

    /// Record what a finished step asked for.
    pub fn apply(&mut self, entity: EntityId, outcome: StepOutcome, now: Ticks) {
        match outcome {
            StepOutcome::Continue => self.schedule(entity, now + 1),
            StepOutcome::ResumeAt(t) => self.schedule(entity, t.max(now + 1)),
            StepOutcome::Done => {}
        }
    }

    pub fn len(&self) -> usize {
        self.due.len()
    }

    pub fn is_empty(&self) -> bool {
        self.due.is_empty()
    }
}

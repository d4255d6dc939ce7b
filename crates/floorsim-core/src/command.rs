//! External control commands.
//!
//! Commands are queued by the runner or by reactive event handlers and
//! applied at the start of the next tick, so every process observes them at
//! the same point of the pipeline.

use crate::fixed::Ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimCommand {
    /// Idle every process. Robots pause where they stand.
    Stop,
    /// Machines hold their state and start no new units.
    StopProduction,
    /// Lift a previous `Stop` or `StopProduction`.
    Resume,
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Vec<SimCommand>,
    history: Vec<(Ticks, SimCommand)>,
    /// 0 keeps no history.
    max_history: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history,
            ..Self::default()
        }
    }

    pub fn push(&mut self, command: SimCommand) {
        self.pending.push(command);
    }

    pub fn extend(&mut self, commands: impl IntoIterator<Item = SimCommand>) {
        self.pending.extend(commands);
    }

    /// Take all pending commands in submission order, recording them at
    /// `tick`.
    pub fn drain(&mut self, tick: Ticks) -> Vec<SimCommand> {
        let commands = std::mem::take(&mut self.pending);
        if self.max_history > 0 {
            self.history.extend(commands.iter().map(|&c| (tick, c)));
            let excess = self.history.len().saturating_sub(self.max_history);
            self.history.drain(..excess);
        }
        commands
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn history(&self) -> &[(Ticks, SimCommand)] {
        &self.history
    }
}

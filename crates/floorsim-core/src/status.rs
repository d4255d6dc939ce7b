//! States of the three entity state machines.
//!
//! The engine owns the transition logic; these enums live here so events
//! and snapshots can name them without depending on the engine.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MachineState {
    #[default]
    Idle,
    WaitingNextOrder,
    Setup,
    ReadyToProduce,
    ProducingProduct,
    PausedInputEmpty,
    PausedOutputFull,
    FinishedToProduce,
}

impl MachineState {
    pub const ALL: [MachineState; 8] = [
        MachineState::Idle,
        MachineState::WaitingNextOrder,
        MachineState::Setup,
        MachineState::ReadyToProduce,
        MachineState::ProducingProduct,
        MachineState::PausedInputEmpty,
        MachineState::PausedOutputFull,
        MachineState::FinishedToProduce,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransportState {
    #[default]
    Idle,
    MovingToPickup,
    Loading,
    MovingToDropoff,
    Unloading,
    Returning,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OperatorState {
    #[default]
    Idle,
    MovingToMachine,
    WaitingInFrontOfMachine,
    WorkingOnMachine,
    WaitingToExit,
    Returning,
}

/// A transition of one entity's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateChange {
    Machine {
        from: MachineState,
        to: MachineState,
    },
    Transport {
        from: TransportState,
        to: TransportState,
    },
    Operator {
        from: OperatorState,
        to: OperatorState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_state_indices_are_dense() {
        for (i, s) in MachineState::ALL.iter().enumerate() {
            assert_eq!(s.index(), i);
        }
    }

    #[test]
    fn defaults_are_idle() {
        assert_eq!(MachineState::default(), MachineState::Idle);
        assert_eq!(TransportState::default(), TransportState::Idle);
        assert_eq!(OperatorState::default(), OperatorState::Idle);
    }
}

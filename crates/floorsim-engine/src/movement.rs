//! Route following for mobile robots.
//!
//! A robot keeps the route it last planned and replays it one cell per
//! move. A refused step (another entity moved in the way) throws the route
//! away and starts a randomized backoff; once it runs out a fresh path is
//! planned against the current floor.

use floorsim_core::fixed::Ticks;
use floorsim_core::id::EntityId;
use floorsim_core::rng::SimRng;
use floorsim_spatial::{FloorGrid, GridPosition, find_path_to_any};
use std::collections::VecDeque;

/// What one navigation attempt achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NavStep {
    Arrived,
    Moved,
    /// Backing off or waiting for a path.
    Waiting,
    /// Blocked long enough to be reported.
    Stuck(Ticks),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct NavParams {
    pub backoff_min: u32,
    pub backoff_max: u32,
    pub stuck_threshold: Ticks,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Navigator {
    route: VecDeque<GridPosition>,
    goals: Vec<GridPosition>,
    backoff: u32,
    blocked_ticks: Ticks,
}

impl Navigator {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Try to advance `entity` one cell towards any of `goals`.
    pub fn advance(
        &mut self,
        grid: &mut FloorGrid,
        rng: &mut SimRng,
        entity: EntityId,
        goals: &[GridPosition],
        params: NavParams,
    ) -> NavStep {
        let Some(anchor) = grid.anchor(entity) else {
            return NavStep::Waiting;
        };
        if goals.contains(&anchor) {
            self.reset();
            return NavStep::Arrived;
        }
        if self.backoff > 0 {
            self.backoff -= 1;
            return self.blocked(params);
        }
        if self.goals != goals || self.route.is_empty() {
            self.goals = goals.to_vec();
            match find_path_to_any(grid, entity, goals, None) {
                Ok(path) if path.is_empty() => {
                    self.reset();
                    return NavStep::Arrived;
                }
                Ok(path) => self.route = path.into(),
                Err(_) => {
                    self.route.clear();
                    self.start_backoff(rng, params);
                    return self.blocked(params);
                }
            }
        }
        let Some(dir) = self.route.front().and_then(|&next| anchor.direction_to(next)) else {
            self.route.clear();
            return NavStep::Waiting;
        };
        match grid.move_one_step(entity, dir) {
            Ok(_) => {
                self.route.pop_front();
                self.blocked_ticks = 0;
                NavStep::Moved
            }
            Err(_) => {
                self.route.clear();
                self.start_backoff(rng, params);
                self.blocked(params)
            }
        }
    }

    fn start_backoff(&mut self, rng: &mut SimRng, params: NavParams) {
        self.backoff = rng.range_inclusive(params.backoff_min, params.backoff_max);
    }

    fn blocked(&mut self, params: NavParams) -> NavStep {
        self.blocked_ticks += 1;
        if params.stuck_threshold > 0 && self.blocked_ticks % params.stuck_threshold == 0 {
            NavStep::Stuck(self.blocked_ticks)
        } else {
            NavStep::Waiting
        }
    }
}

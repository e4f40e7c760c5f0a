//! Tick-synchronized action scheduling, one state machine per controlled
//! agent.

use std::collections::HashMap;

use crate::actions::Action;

/// Frame jumps beyond this are treated as a session discontinuity; per-agent
/// state is discarded rather than replayed tick by tick.
pub const RESET_TICK_THRESHOLD: u32 = 240;

/// Per-agent state machine reconciling inference cadence with delayed output.
///
/// A fresh plan is requested at the start of every macro-step (`tick_skip`
/// ticks). The previously applied action keeps being emitted for the first
/// `action_delay` ticks of the step, after which the new plan takes over; at
/// the step boundary the plan becomes the applied baseline for the next step.
#[derive(Debug, Clone, Default)]
pub struct AgentScheduler {
    tick_in_step: u32,
    prev_applied: Action,
    planned: Action,
    has_planned: bool,
    current_out: Action,
}

impl AgentScheduler {
    /// Advances the machine by `dt` ticks, stepping each tick individually so
    /// bursty updates cannot skip macro-step boundaries. `plan` runs once per
    /// macro-step and receives the previously applied action.
    ///
    /// `tick_skip` is raised to at least 1 and `action_delay` clamped into
    /// `[0, tick_skip]`; a zero `dt` is normalized to 1.
    pub fn advance<F>(&mut self, dt: u32, tick_skip: u32, action_delay: u32, mut plan: F) -> Action
    where
        F: FnMut(&Action) -> Action,
    {
        let tick_skip = tick_skip.max(1);
        let action_delay = action_delay.min(tick_skip);

        for _ in 0..dt.max(1) {
            // A new macro-step starts: compute the plan once
            if self.tick_in_step == 0 {
                self.planned = plan(&self.prev_applied);
                self.has_planned = true;
            }

            self.current_out = if self.tick_in_step < action_delay || !self.has_planned {
                self.prev_applied
            } else {
                self.planned
            };

            self.tick_in_step += 1;

            // Macro-step boundary
            if self.tick_in_step >= tick_skip {
                self.tick_in_step = 0;
                // The plan becomes the applied baseline for the next step
                if self.has_planned {
                    self.prev_applied = self.planned;
                }
                self.has_planned = false;
            }
        }

        self.current_out
    }

    pub fn last_output(&self) -> Action {
        self.current_out
    }
}

/// Lazily-created schedulers for every controlled agent index, plus the frame
/// bookkeeping that turns raw frame numbers into per-update tick deltas.
#[derive(Debug, Default)]
pub struct SchedulerBank {
    agents: HashMap<u32, AgentScheduler>,
    prev_frame: Option<u32>,
}

impl SchedulerBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the tick delta for `frame`. A zero delta is normalized to 1.
    /// A jump past [`RESET_TICK_THRESHOLD`] (including a frame counter moving
    /// backwards, which wraps the unsigned delta) discards all per-agent state
    /// and collapses the delta to 1.
    pub fn begin_frame(&mut self, frame: u32) -> u32 {
        let mut dt = match self.prev_frame {
            Some(prev) => frame.wrapping_sub(prev).max(1),
            None => 1,
        };

        if dt > RESET_TICK_THRESHOLD {
            tracing::debug!("frame jump of {dt} ticks, resetting all agent schedulers");
            dt = 1;
            self.agents.clear();
        }

        self.prev_frame = Some(frame);
        dt
    }

    /// The scheduler for `index`, created on first sight.
    pub fn agent(&mut self, index: u32) -> &mut AgentScheduler {
        self.agents.entry(index).or_default()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Drops all per-agent state and frame bookkeeping.
    pub fn reset(&mut self) {
        self.agents.clear();
        self.prev_frame = None;
    }
}

//! Hysteresis filter for the per-frame detection signal
//!
//! Separate rising and falling thresholds: a handful of positive frames
//! asserts the stable signal, and it takes a much longer run of negative
//! frames to retract it, so a momentary miss does not drop the route.

use tracing::debug;

/// Counters and output of the debounce filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceState {
    pub consecutive_true: u32,
    pub consecutive_false: u32,
    pub stable: bool,
}

/// Converts a noisy boolean sample stream into a stable signal
#[derive(Debug, Clone)]
pub struct DebounceEngine {
    trigger: u32,
    idle: u32,
    state: DebounceState,
    /// Cleared by a reset, set again once a fresh run reaches a threshold
    valid: bool,
}

impl DebounceEngine {
    /// Create an engine asserting after `trigger` positives and
    /// retracting after `idle` negatives. Zero thresholds are raised to 1.
    pub fn new(trigger: u32, idle: u32) -> Self {
        Self {
            trigger: trigger.max(1),
            idle: idle.max(1),
            state: DebounceState::default(),
            valid: true,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// Last stable value, including one frozen by a reset
    pub fn stable(&self) -> bool {
        self.state.stable
    }

    /// Stable value backed by samples seen since the last reset, `None`
    /// while only the frozen value is available
    pub fn current(&self) -> Option<bool> {
        self.valid.then_some(self.state.stable)
    }

    /// Feed one sample and return the resulting stable value
    pub fn update(&mut self, sample: bool) -> bool {
        let state = &mut self.state;
        if sample {
            state.consecutive_false = 0;
            state.consecutive_true = state.consecutive_true.saturating_add(1);
            if state.consecutive_true >= self.trigger {
                if !state.stable {
                    debug!(frames = state.consecutive_true, "stable signal asserted");
                    state.stable = true;
                }
                self.valid = true;
            }
        } else {
            state.consecutive_true = 0;
            state.consecutive_false = state.consecutive_false.saturating_add(1);
            if state.consecutive_false >= self.idle {
                if state.stable {
                    debug!(frames = state.consecutive_false, "stable signal retracted");
                    state.stable = false;
                }
                self.valid = true;
            }
        }
        state.stable
    }

    /// Zero both counters, leaving `stable` untouched but no longer current
    pub fn reset_counters(&mut self) {
        self.state.consecutive_true = 0;
        self.state.consecutive_false = 0;
        self.valid = false;
    }
}

//! Quota governor
//!
//! Bounds how long an unsupervised bot conversation may run. The quota is a
//! clamped integer budget: every bot turn debits one unit (charged before
//! the generation call is issued, so a failed attempt still consumes
//! budget), and every accepted human message credits one unit. Reaching zero
//! is a scheduler trigger, not an error.

/// Lower bound of the budget
pub const MIN_QUOTA: i64 = 0;

/// Upper bound of the budget
pub const MAX_QUOTA: i64 = 100;

/// Budget a fresh conversation starts with
pub const INITIAL_QUOTA: i64 = 10;

/// Units debited per bot-generated turn
pub const BOT_RESPONSE_COST: i64 = 1;

/// Units credited per accepted human message
pub const USER_MESSAGE_BONUS: i64 = 1;

/// Clamped integer budget in [MIN_QUOTA, MAX_QUOTA]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    remaining: i64,
}

impl Quota {
    /// Create a quota with the given starting budget, clamped into range
    pub fn new(remaining: i64) -> Self {
        Self {
            remaining: remaining.clamp(MIN_QUOTA, MAX_QUOTA),
        }
    }

    /// Remaining budget
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// Apply a delta, clamping the result into [MIN_QUOTA, MAX_QUOTA].
    ///
    /// Never fails; overshoot in either direction saturates at the bound.
    pub fn add(&mut self, delta: i64) {
        self.remaining = self
            .remaining
            .saturating_add(delta)
            .clamp(MIN_QUOTA, MAX_QUOTA);
    }

    /// True once the budget is spent
    pub fn is_exhausted(&self) -> bool {
        self.remaining <= MIN_QUOTA
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self::new(INITIAL_QUOTA)
    }
}

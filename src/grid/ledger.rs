//! Aggregate record of the pool level and per-tick flows.

use super::storage::non_negative;
use super::types::{Actionable, Amount};

/// Default length of the moving-average window, in ticks.
pub const DEFAULT_AVERAGE_WINDOW: f64 = 40.0;

/// Result of a ledger operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    /// Extracted amount, or leftover for injections.
    pub amount: Amount,
    /// Amount that must now be written to participants (positive pushes into
    /// consumers, negative pulls from providers).
    pub sync: Option<Amount>,
}

impl Settlement {
    fn unsynced(amount: Amount) -> Self {
        Self { amount, sync: None }
    }
}

/// Pool ledger.
///
/// `stored` is the energy the grid accounts for, `written` the part of it the
/// participants have actually been told about. The two converge on every
/// sync.
#[derive(Debug, Clone)]
pub struct Ledger {
    stored: Amount,
    max: Amount,
    written: Amount,
    capped: bool,
    was_capped: bool,
    window: f64,
    avg_drain: Amount,
    avg_injection: Amount,
    tick_drain: Amount,
    tick_injection: Amount,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(DEFAULT_AVERAGE_WINDOW)
    }
}

impl Ledger {
    /// Creates an empty ledger. Windows shorter than one tick become one tick.
    pub fn new(window: f64) -> Self {
        Self {
            stored: 0.0,
            max: 0.0,
            written: 0.0,
            capped: false,
            was_capped: false,
            window: if window.is_finite() { window.max(1.0) } else { DEFAULT_AVERAGE_WINDOW },
            avg_drain: 0.0,
            avg_injection: 0.0,
            tick_drain: 0.0,
            tick_injection: 0.0,
        }
    }

    /// Takes up to `amount` out of the pool.
    pub fn extract(&mut self, amount: Amount, mode: Actionable) -> Settlement {
        let amount = non_negative(amount);
        if amount == 0.0 {
            return Settlement::unsynced(0.0);
        }
        let extracted = amount.min(self.stored());
        if mode == Actionable::Simulate {
            return Settlement::unsynced(extracted);
        }

        self.stored -= extracted;
        self.tick_drain += extracted;
        let mut sync = None;
        if self.stored <= 0.0 {
            self.stored = 0.0;
            if self.written >= 0.0 {
                sync = Some(-self.written);
            }
            self.capped = true;
        }
        Settlement {
            amount: extracted,
            sync,
        }
    }

    /// Puts up to `amount` into the pool; `Settlement::amount` is the leftover.
    pub fn inject(&mut self, amount: Amount, mode: Actionable) -> Settlement {
        let amount = non_negative(amount);
        if amount == 0.0 {
            return Settlement::unsynced(0.0);
        }
        let accepted = amount.min(self.demand());
        if mode == Actionable::Simulate {
            return Settlement::unsynced(amount - accepted);
        }

        self.stored += accepted;
        self.tick_injection += accepted;
        let mut sync = None;
        if self.stored >= self.max {
            self.stored = self.max;
            if self.written <= self.max {
                sync = Some(self.max - self.written);
            }
            self.capped = true;
        }
        Settlement {
            amount: amount - accepted,
            sync,
        }
    }

    /// Amount the pool could still absorb.
    pub fn demand(&self) -> Amount {
        (self.max - self.stored).max(0.0)
    }

    pub fn stored(&self) -> Amount {
        self.stored.max(0.0)
    }

    pub fn max(&self) -> Amount {
        self.max
    }

    /// Amount last written to participants.
    pub fn written(&self) -> Amount {
        self.written
    }

    /// The pool hit 0 or max during the current tick.
    pub fn is_capped(&self) -> bool {
        self.capped
    }

    /// The pool hit 0 or max during the previous tick.
    pub fn was_capped(&self) -> bool {
        self.was_capped
    }

    pub fn avg_drain(&self) -> Amount {
        self.avg_drain
    }

    pub fn avg_injection(&self) -> Amount {
        self.avg_injection
    }

    /// Drift between the aggregate and the participants, if a sync is due.
    pub fn pending_sync(&self) -> Option<Amount> {
        if self.capped {
            None
        } else {
            Some(self.stored - self.written)
        }
    }

    /// Records that `delta` is being written to participants.
    pub fn record_written(&mut self, delta: Amount) {
        self.written += delta;
    }

    /// Rolls the capped flag over into `was_capped`.
    pub fn begin_tick(&mut self) {
        self.was_capped = self.capped;
        self.capped = false;
    }

    /// Folds the tick accumulators into the moving averages and resets them.
    pub fn update_averages(&mut self) {
        let n = self.window;
        self.avg_drain = self.avg_drain * (n - 1.0) / n + self.tick_drain / n;
        self.avg_injection = self.avg_injection * (n - 1.0) / n + self.tick_injection / n;
        self.tick_drain = 0.0;
        self.tick_injection = 0.0;
    }

    /// A provider with capacity `max` holding `current` joined.
    pub fn add_provider(&mut self, max: Amount, current: Amount) {
        self.max += max;
        if current > 0.0 {
            self.stored += current;
            self.written += current;
        }
        self.membership_changed();
    }

    /// A provider with capacity `max` holding `current` left.
    pub fn remove_provider(&mut self, max: Amount, current: Amount) {
        self.max = (self.max - max).max(0.0);
        self.stored -= current;
        self.written -= current;
        self.membership_changed();
    }

    /// Any membership change invalidates the capped state.
    pub fn membership_changed(&mut self) {
        self.capped = false;
        self.stored = self.stored.clamp(0.0, self.max);
    }
}

//! Per-tick record of a simulation run.

use std::fmt;

use serde::Serialize;

use crate::grid::Amount;

/// Complete record of one simulation tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    /// Grid tick counter (starts at 1).
    pub tick: u64,
    /// Pool level after the tick.
    pub stored: Amount,
    /// Pool capacity after the tick.
    pub max: Amount,
    /// Free space after the tick.
    pub demand: Amount,
    /// Generator output offered this tick.
    pub generated: Amount,
    /// Part of the output the pool could not take.
    pub wasted: Amount,
    /// Total idle draw of member nodes.
    pub idle_draw: Amount,
    /// Moving average of extractions.
    pub avg_usage: Amount,
    /// Moving average of injections.
    pub avg_injection: Amount,
    /// Thresholds delivered this tick.
    pub thresholds_notified: usize,
    /// Probe result before hysteresis.
    pub raw_powered: bool,
    /// Published network-powered flag.
    pub powered: bool,
    /// Pool hit empty or full during the tick.
    pub capped: bool,
    /// Published flag changed this tick.
    pub status_changed: bool,
    pub providers: usize,
    pub consumers: usize,
    pub members: usize,
    /// Emitters whose level is met.
    pub active_emitters: usize,
    /// Accounting anomalies so far.
    pub anomalies: u64,
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>4} | stored={:>9.2}/{:<9.2} | gen={:>6.2} waste={:>6.2} idle={:>6.2} \
             | avg(out={:.2}, in={:.2}) | roles(p={}, c={}) members={} \
             | powered={}{} emitters={} thresholds={}",
            self.tick,
            self.stored,
            self.max,
            self.generated,
            self.wasted,
            self.idle_draw,
            self.avg_usage,
            self.avg_injection,
            self.providers,
            self.consumers,
            self.members,
            self.powered,
            if self.raw_powered == self.powered {
                ""
            } else {
                "*"
            },
            self.active_emitters,
            self.thresholds_notified,
        )
    }
}

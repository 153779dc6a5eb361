//! Post-hoc summary of a simulation run.

use std::fmt;

use serde::Serialize;

use crate::grid::Amount;

use super::types::TickReport;

/// Aggregate figures derived from a complete run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSummary {
    pub ticks: usize,
    /// Fraction of ticks with the published powered flag set.
    pub powered_share: f64,
    /// Published power status transitions.
    pub status_changes: usize,
    pub peak_stored: Amount,
    pub min_stored: Amount,
    pub final_stored: Amount,
    /// Generator output offered over the run.
    pub generated_total: Amount,
    /// Output the pool could not take.
    pub wasted_total: Amount,
    /// Accounting anomalies at the end of the run.
    pub anomalies: u64,
    pub thresholds_notified: usize,
}

impl GridSummary {
    /// Computes the summary from the full report vector.
    ///
    /// An empty run yields an all-zero summary.
    pub fn from_reports(reports: &[TickReport]) -> Self {
        let Some(last) = reports.last() else {
            return Self {
                ticks: 0,
                powered_share: 0.0,
                status_changes: 0,
                peak_stored: 0.0,
                min_stored: 0.0,
                final_stored: 0.0,
                generated_total: 0.0,
                wasted_total: 0.0,
                anomalies: 0,
                thresholds_notified: 0,
            };
        };

        let mut powered = 0_usize;
        let mut changes = 0_usize;
        let mut peak = Amount::MIN;
        let mut min = Amount::MAX;
        let mut generated = 0.0;
        let mut wasted = 0.0;
        let mut notified = 0_usize;

        for r in reports {
            if r.powered {
                powered += 1;
            }
            if r.status_changed {
                changes += 1;
            }
            peak = peak.max(r.stored);
            min = min.min(r.stored);
            generated += r.generated;
            wasted += r.wasted;
            notified += r.thresholds_notified;
        }

        Self {
            ticks: reports.len(),
            powered_share: powered as f64 / reports.len() as f64,
            status_changes: changes,
            peak_stored: peak,
            min_stored: min,
            final_stored: last.stored,
            generated_total: generated,
            wasted_total: wasted,
            anomalies: last.anomalies,
            thresholds_notified: notified,
        }
    }
}

impl fmt::Display for GridSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Grid Summary ---")?;
        writeln!(f, "Ticks:                 {}", self.ticks)?;
        writeln!(
            f,
            "Powered:               {:.1}% ({} status changes)",
            100.0 * self.powered_share,
            self.status_changes
        )?;
        writeln!(
            f,
            "Stored (min/peak/end): {:.2} / {:.2} / {:.2}",
            self.min_stored, self.peak_stored, self.final_stored
        )?;
        writeln!(
            f,
            "Generated:             {:.2} ({:.2} wasted)",
            self.generated_total, self.wasted_total
        )?;
        writeln!(f, "Thresholds notified:   {}", self.thresholds_notified)?;
        write!(f, "Accounting anomalies:  {}", self.anomalies)
    }
}

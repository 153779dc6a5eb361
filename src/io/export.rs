//! CSV export for simulation tick reports.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::TickReport;

/// Column header for CSV telemetry export.
const HEADER: &str = "tick,stored,max,demand,generated,wasted,idle_draw,\
                      avg_usage,avg_injection,thresholds_notified,raw_powered,\
                      powered,capped,providers,consumers,members,active_emitters,anomalies";

/// Exports tick reports to a CSV file at the given path.
///
/// Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(reports: &[TickReport], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(reports, buf)
}

/// Writes tick reports as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(reports: &[TickReport], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in reports {
        wtr.write_record(&[
            r.tick.to_string(),
            format!("{:.4}", r.stored),
            format!("{:.4}", r.max),
            format!("{:.4}", r.demand),
            format!("{:.4}", r.generated),
            format!("{:.4}", r.wasted),
            format!("{:.4}", r.idle_draw),
            format!("{:.4}", r.avg_usage),
            format!("{:.4}", r.avg_injection),
            r.thresholds_notified.to_string(),
            r.raw_powered.to_string(),
            r.powered.to_string(),
            r.capped.to_string(),
            r.providers.to_string(),
            r.consumers.to_string(),
            r.members.to_string(),
            r.active_emitters.to_string(),
            r.anomalies.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

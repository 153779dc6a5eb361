//! API response and query types.

use serde::{Deserialize, Serialize};

use crate::config::ScenarioConfig;
use crate::sim::{GridSummary, TickReport};

/// Combined state response.
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub config: ScenarioConfig,
    pub summary: GridSummary,
    /// Last tick of the run, absent for an empty run.
    pub latest_tick: Option<TickReport>,
}

/// Optional range query parameters for the telemetry endpoint.
#[derive(Debug, Deserialize)]
pub struct TelemetryQuery {
    /// First tick (inclusive).
    pub from: Option<u64>,
    /// Last tick (inclusive).
    pub to: Option<u64>,
}

impl TelemetryQuery {
    /// Inclusive bounds, or `None` if `from` is past `to`.
    pub fn bounds(&self) -> Option<(u64, u64)> {
        let from = self.from.unwrap_or(0);
        let to = self.to.unwrap_or(u64::MAX);
        (from <= to).then_some((from, to))
    }
}

/// Error response body for 400-class errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_query_spans_every_tick() {
        let q = TelemetryQuery { from: None, to: None };
        assert_eq!(q.bounds(), Some((0, u64::MAX)));
    }

    #[test]
    fn inverted_query_has_no_bounds() {
        let q = TelemetryQuery {
            from: Some(10),
            to: Some(5),
        };
        assert_eq!(q.bounds(), None);
        let q = TelemetryQuery {
            from: Some(5),
            to: Some(5),
        };
        assert_eq!(q.bounds(), Some((5, 5)));
    }
}

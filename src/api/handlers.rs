//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::types::{ErrorResponse, StateResponse, TelemetryQuery};
use crate::sim::TickReport;

/// `GET /state` returns 200 with a [`StateResponse`].
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    Json(StateResponse {
        config: state.config.clone(),
        summary: state.summary.clone(),
        latest_tick: state.reports.last().cloned(),
    })
}

/// Returns tick reports, optionally filtered by an inclusive tick range.
///
/// `GET /telemetry?from=10&to=5` is answered with 400.
pub async fn get_telemetry(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TelemetryQuery>,
) -> impl IntoResponse {
    let Some((from, to)) = query.bounds() else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!(
                    "`from` ({}) must be <= `to` ({})",
                    query.from.unwrap_or(0),
                    query.to.unwrap_or(u64::MAX)
                ),
            }),
        ));
    };

    let reports: Vec<TickReport> = state
        .reports
        .iter()
        .filter(|r| r.tick >= from && r.tick <= to)
        .cloned()
        .collect();

    Ok(Json(reports))
}

//! HTTP request handlers
//!
//! Implements the leaderboard, roster, and race clock endpoints. "Not
//! found" and "bad input" are always non-fatal and leave state unchanged;
//! notification happens after store guards are dropped.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use bibtrack_common::events::RaceEvent;
use bibtrack_common::time::time_string_to_ms;
use bibtrack_common::types::{RaceClockState, ResultEntry};

use crate::api::AppState;
use crate::error::Error;
use crate::store::{parse_roster_csv, EntryPatch, FinishRecord, RecordOutcome};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Serialize)]
pub struct ResultResponse {
    success: bool,
    data: ResultEntry,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    success: bool,
    data: Vec<ResultEntry>,
}

#[derive(Debug, Serialize)]
pub struct ClockResponse {
    success: bool,
    data: RaceClockState,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    success: bool,
    message: String,
    created: u32,
    updated: u32,
    errors: Vec<String>,
}

/// A finish time as operators send it: either milliseconds or a legacy
/// `MM:SS.cc` string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TimeInput {
    Millis(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFinishRequest {
    pub bib_number: String,
    /// Unix seconds of the crossing; converted via the race clock.
    #[serde(default)]
    pub wall_clock_time: Option<f64>,
    /// Direct finish time for manual entry.
    #[serde(default)]
    pub finish_time: Option<TimeInput>,
    #[serde(default)]
    pub racer_name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResultRequest {
    #[serde(default)]
    pub bib_number: Option<String>,
    #[serde(default)]
    pub racer_name: Option<String>,
    #[serde(default)]
    pub finish_time: Option<TimeInput>,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub order: Vec<ReorderItem>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderItem {
    pub id: Uuid,
    pub rank: u32,
}

#[derive(Debug, Deserialize)]
pub struct ClockEditRequest {
    pub time: TimeInput,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            success: false,
            message: message.into(),
        }),
    )
}

fn parse_time_input(input: &TimeInput) -> Option<f64> {
    match input {
        TimeInput::Millis(ms) if ms.is_finite() && *ms >= 0.0 => Some(*ms),
        TimeInput::Millis(_) => None,
        TimeInput::Text(s) => time_string_to_ms(s).map(|ms| ms as f64),
    }
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "bibtrack-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Result Endpoints
// ============================================================================

/// GET /api/results - Current finishers, ascending by finish time
pub async fn list_results(State(state): State<AppState>) -> Json<ResultsResponse> {
    let finished = state.shared.store.read().await.list_finished();
    Json(ResultsResponse {
        success: true,
        data: finished,
    })
}

/// POST /api/results - Record a finish (pipeline wall-clock or manual entry)
pub async fn record_result(
    State(state): State<AppState>,
    Json(req): Json<RecordFinishRequest>,
) -> Result<Json<ResultResponse>, ApiError> {
    let bib_number = req.bib_number.trim().to_string();
    if bib_number.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "bibNumber is required"));
    }

    let finish_time_ms = if let Some(wall_seconds) = req.wall_clock_time {
        let wall = DateTime::from_timestamp_millis((wall_seconds * 1000.0) as i64)
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "invalid wallClockTime"))?;

        let clock = state.shared.clock.read().await;
        match clock.official_ms(wall) {
            Ok(ms) => ms,
            Err(Error::ClockNotRunning) => {
                return Err(api_error(
                    StatusCode::CONFLICT,
                    "Race clock is not running. Please start the race clock first.",
                ));
            }
            Err(e) => {
                error!("Failed to compute official time: {}", e);
                return Err(api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("error: {}", e),
                ));
            }
        }
    } else if let Some(input) = &req.finish_time {
        parse_time_input(input).ok_or_else(|| {
            api_error(StatusCode::BAD_REQUEST, "Invalid time format. Use MM:SS.cc")
        })?
    } else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Either wallClockTime or finishTime is required",
        ));
    };

    let outcome = {
        let mut store = state.shared.store.write().await;
        store.record_finish(FinishRecord {
            bib_number,
            finish_time_ms,
            racer_name: req.racer_name,
            gender: req.gender,
            team: req.team,
        })
    };

    let entry = outcome.entry().clone();
    match outcome {
        RecordOutcome::Added(e) => state.shared.broadcast_event(RaceEvent::result_added(e)),
        RecordOutcome::Updated(e) => state.shared.broadcast_event(RaceEvent::result_updated(e)),
    }

    Ok(Json(ResultResponse {
        success: true,
        data: entry,
    }))
}

/// PUT /api/results/:id - Edit an entry
///
/// A bib renumber re-derives identity from the roster-of-truth and goes out
/// to subscribers as a reload.
pub async fn update_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateResultRequest>,
) -> Result<Json<ResultResponse>, ApiError> {
    // validate the time string before touching anything
    let finish_time_ms = match &req.finish_time {
        Some(input) => Some(parse_time_input(input).ok_or_else(|| {
            api_error(StatusCode::BAD_REQUEST, "Invalid time format. Use MM:SS.cc")
        })?),
        None => None,
    };

    let result = {
        let mut store = state.shared.store.write().await;
        store.update_entry(
            id,
            EntryPatch {
                bib_number: req.bib_number,
                racer_name: req.racer_name,
                finish_time_ms,
                rank: req.rank,
                gender: req.gender,
                team: req.team,
            },
        )
    };

    match result {
        Ok((entry, bib_changed)) => {
            if bib_changed {
                // renumbering invalidates naive client-side patches
                state.shared.broadcast_event(RaceEvent::reload());
            } else {
                state
                    .shared
                    .broadcast_event(RaceEvent::result_updated(entry.clone()));
            }
            Ok(Json(ResultResponse {
                success: true,
                data: entry,
            }))
        }
        Err(Error::NotFound(_)) => Err(api_error(StatusCode::NOT_FOUND, "Finisher not found")),
        Err(e) => {
            error!("Failed to update entry {}: {}", id, e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("error: {}", e),
            ))
        }
    }
}

/// DELETE /api/results/:id - Remove an entry
pub async fn delete_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = {
        let mut store = state.shared.store.write().await;
        store.delete_entry(id)
    };

    match result {
        Ok(_) => {
            // ranks below the removed entry shifted; clients must refetch
            state.shared.broadcast_event(RaceEvent::reload());
            Ok(Json(MessageResponse {
                success: true,
                message: "Finisher deleted".to_string(),
            }))
        }
        Err(Error::NotFound(_)) => Err(api_error(StatusCode::NOT_FOUND, "Finisher not found")),
        Err(e) => {
            error!("Failed to delete entry {}: {}", id, e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("error: {}", e),
            ))
        }
    }
}

/// POST /api/reorder - Manually reassign ranks
pub async fn reorder_results(
    State(state): State<AppState>,
    Json(req): Json<ReorderRequest>,
) -> Json<MessageResponse> {
    let order: Vec<(Uuid, u32)> = req.order.iter().map(|item| (item.id, item.rank)).collect();

    let survivors = {
        let mut store = state.shared.store.write().await;
        store.reorder(&order)
    };

    info!("Reordered leaderboard: {} entries survive", survivors.len());
    state.shared.broadcast_event(RaceEvent::reload());

    Json(MessageResponse {
        success: true,
        message: "Finishers reordered successfully".to_string(),
    })
}

// ============================================================================
// Roster Endpoints
// ============================================================================

/// POST /api/roster/upload - Import a CSV roster
///
/// Row-level failures come back alongside the rows that succeeded; only a
/// missing required header rejects the upload.
pub async fn upload_roster(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportResponse>, ApiError> {
    let batch = match parse_roster_csv(&body) {
        Ok(batch) => batch,
        Err(Error::BadRequest(msg)) => return Err(api_error(StatusCode::BAD_REQUEST, msg)),
        Err(e) => {
            error!("Roster parse failed: {}", e);
            return Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("error: {}", e),
            ));
        }
    };

    let summary = {
        let mut store = state.shared.store.write().await;
        store.import_roster(batch)
    };

    state.shared.broadcast_event(RaceEvent::reload());

    let mut parts = Vec::new();
    if summary.created > 0 {
        parts.push(format!("{} new racers added", summary.created));
    }
    if summary.updated > 0 {
        parts.push(format!("{} existing racers updated", summary.updated));
    }
    let message = if parts.is_empty() {
        "No roster rows applied".to_string()
    } else {
        format!("Successfully processed roster: {}", parts.join(", "))
    };

    Ok(Json(ImportResponse {
        success: true,
        message,
        created: summary.created,
        updated: summary.updated,
        errors: summary.errors,
    }))
}

// ============================================================================
// Race Clock Endpoints
// ============================================================================

/// GET /api/clock/status - Current race clock state
pub async fn clock_status(State(state): State<AppState>) -> Json<ClockResponse> {
    let snapshot = state.shared.clock.read().await.state();
    Json(ClockResponse {
        success: true,
        data: snapshot,
    })
}

/// POST /api/clock/start - Start the race clock
pub async fn clock_start(State(state): State<AppState>) -> Json<ClockResponse> {
    let snapshot = {
        let mut clock = state.shared.clock.write().await;
        clock.start();
        clock.state()
    };

    info!("Race clock started");
    state
        .shared
        .broadcast_event(RaceEvent::clock_updated(snapshot.clone()));

    Json(ClockResponse {
        success: true,
        data: snapshot,
    })
}

/// POST /api/clock/stop - Stop the race clock
pub async fn clock_stop(State(state): State<AppState>) -> Json<ClockResponse> {
    let snapshot = {
        let mut clock = state.shared.clock.write().await;
        clock.stop();
        clock.state()
    };

    info!("Race clock stopped");
    state
        .shared
        .broadcast_event(RaceEvent::clock_updated(snapshot.clone()));

    Json(ClockResponse {
        success: true,
        data: snapshot,
    })
}

/// POST /api/clock/edit - Set the clock to a desired elapsed time
pub async fn clock_edit(
    State(state): State<AppState>,
    Json(req): Json<ClockEditRequest>,
) -> Result<Json<ClockResponse>, ApiError> {
    let desired_ms = parse_time_input(&req.time)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Invalid time format. Use MM:SS.cc"))?;

    let snapshot = {
        let mut clock = state.shared.clock.write().await;
        clock.edit(desired_ms);
        clock.state()
    };

    info!(
        "Race clock edited to {:.0}ms (offset {:.0}ms)",
        desired_ms, snapshot.offset
    );
    state
        .shared
        .broadcast_event(RaceEvent::clock_updated(snapshot.clone()));

    Ok(Json(ClockResponse {
        success: true,
        data: snapshot,
    }))
}

/// POST /api/clock/reset - Clear the race clock
pub async fn clock_reset(State(state): State<AppState>) -> Json<ClockResponse> {
    let snapshot = {
        let mut clock = state.shared.clock.write().await;
        clock.reset();
        clock.state()
    };

    info!("Race clock reset");
    state
        .shared
        .broadcast_event(RaceEvent::clock_updated(snapshot.clone()));

    Json(ClockResponse {
        success: true,
        data: snapshot,
    })
}

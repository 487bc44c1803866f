use axum::{
    extract::{Query, State},
    http::StatusCode,
    Form,
};
use log::{error, info};
use serde::Deserialize;

use super::common::{non_empty, open_db, parse_threshold};
use super::state::AppState;
use crate::records::SerialRecord;
use crate::serial;

#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    pub serial_number: String,
}

#[derive(Debug, Deserialize)]
pub struct CountParams {
    pub serial_number: Option<String>,
    pub threshold: Option<String>,
}

/// POST /submit
/// Validates a scanned serial and records the scan. Invalid serials are
/// rejected before the database is touched.
pub async fn submit(
    State(state): State<AppState>,
    Form(form): Form<SubmitForm>,
) -> (StatusCode, String) {
    let serial = serial::normalize(&form.serial_number);

    if !serial::validate(&serial) {
        info!("Rejected invalid serial '{}'", form.serial_number);
        return (StatusCode::BAD_REQUEST, "Invalid serial number!".to_string());
    }

    let mut db = match open_db(&state) {
        Ok(db) => db,
        Err(e) => return e,
    };

    match SerialRecord::record_scan(&mut db, &serial) {
        Ok(count) => {
            info!("Recorded scan of {} (total {})", serial, count.total_count);
            (
                StatusCode::OK,
                "Serial number recorded successfully!".to_string(),
            )
        }
        Err(e) => {
            error!("Error recording serial number {}: {}", serial, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error recording serial number: {}", e),
            )
        }
    }
}

/// GET /count?serial_number=...|threshold=...
/// Answers with plain text for a single serial or a threshold.
pub async fn count(
    State(state): State<AppState>,
    Query(params): Query<CountParams>,
) -> (StatusCode, String) {
    let serial_number = non_empty(params.serial_number);
    let threshold = non_empty(params.threshold);

    if serial_number.is_none() && threshold.is_none() {
        return (StatusCode::BAD_REQUEST, "Invalid request.".to_string());
    }

    let db = match open_db(&state) {
        Ok(db) => db,
        Err(e) => return e,
    };

    if let Some(raw) = serial_number {
        let serial = serial::normalize(&raw);
        return match SerialRecord::lookup(&db, &serial) {
            Ok(Some(found)) => (
                StatusCode::OK,
                format!(
                    "The serial number {} has been scanned {} time(s). Last scanned time: {}",
                    serial,
                    found.total_count,
                    found.last_used.as_deref().unwrap_or("unknown")
                ),
            ),
            Ok(None) => (
                StatusCode::OK,
                format!("The serial number {} has not been scanned yet.", serial),
            ),
            Err(e) => {
                error!("Failed to look up {}: {}", serial, e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to look up serial number. Error: {}", e),
                )
            }
        };
    }

    // Only the threshold is left at this point
    let raw = threshold.unwrap_or_default();
    let threshold = match parse_threshold(&raw) {
        Ok(t) => t,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()),
    };

    match SerialRecord::above_threshold(&db, threshold) {
        Ok(records) if records.is_empty() => (
            StatusCode::OK,
            format!(
                "No serial numbers have been scanned more than {} time(s).",
                threshold
            ),
        ),
        Ok(records) => {
            let listed: Vec<String> = records
                .iter()
                .map(|r| {
                    format!(
                        "{} (Last scanned time: {})",
                        r.serial,
                        r.last_used.as_deref().unwrap_or("unknown")
                    )
                })
                .collect();
            (
                StatusCode::OK,
                format!(
                    "The following serial numbers have been scanned more than {} time(s): {}",
                    threshold,
                    listed.join(", ")
                ),
            )
        }
        Err(e) => {
            error!("Threshold query failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to query serial numbers. Error: {}", e),
            )
        }
    }
}

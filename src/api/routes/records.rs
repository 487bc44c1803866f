use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::common::{error_text, non_empty, open_db, parse_filter_date, parse_threshold};
use super::state::AppState;
use crate::records::{RecordSummary, SerialRecord, DATE_FORMAT};

#[derive(Debug, Deserialize)]
pub struct ThresholdParams {
    pub threshold: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DateParams {
    pub filter_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AllSerialsResponse {
    pub empty_db: bool,
    pub serial_data: Vec<RecordSummary>,
}

#[derive(Debug, Serialize)]
pub struct FilteredResponse {
    pub filter_date: String,
    pub serial_data: Vec<RecordSummary>,
}

/// GET /above_threshold?threshold=N
pub async fn above_threshold(
    State(state): State<AppState>,
    Query(params): Query<ThresholdParams>,
) -> Response {
    let Some(raw) = non_empty(params.threshold) else {
        return (
            StatusCode::BAD_REQUEST,
            "Invalid request. Please provide a threshold.".to_string(),
        )
            .into_response();
    };

    let threshold = match parse_threshold(&raw) {
        Ok(t) => t,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let db = match open_db(&state) {
        Ok(db) => db,
        Err(e) => return e.into_response(),
    };

    match SerialRecord::above_threshold(&db, threshold) {
        Ok(records) if records.is_empty() => format!(
            "No serial numbers have been scanned more than {} time(s).",
            threshold
        )
        .into_response(),
        Ok(records) => Json(records).into_response(),
        Err(e) => error_text("Failed to query serial numbers", &e).into_response(),
    }
}

/// GET /all_serial_numbers
pub async fn all_serial_numbers(State(state): State<AppState>) -> Response {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(e) => return e.into_response(),
    };

    match SerialRecord::all(&db) {
        Ok(records) => Json(AllSerialsResponse {
            empty_db: records.is_empty(),
            serial_data: records,
        })
        .into_response(),
        Err(e) => error_text("Failed to list serial numbers", &e).into_response(),
    }
}

/// GET /filter_by_date?filter_date=MM/DD/YYYY
/// Records last used on or after the given day.
pub async fn filter_by_date(
    State(state): State<AppState>,
    Query(params): Query<DateParams>,
) -> Response {
    let Some(raw) = non_empty(params.filter_date) else {
        return (StatusCode::BAD_REQUEST, "No date provided".to_string()).into_response();
    };

    let date = match parse_filter_date(&raw) {
        Ok(date) => date,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                "Date format does not match. Please provide a date in the format MM/DD/YYYY."
                    .to_string(),
            )
                .into_response()
        }
    };
    let formatted = date.format(DATE_FORMAT).to_string();

    let db = match open_db(&state) {
        Ok(db) => db,
        Err(e) => return e.into_response(),
    };

    match SerialRecord::since(&db, date) {
        Ok(records) if records.is_empty() => {
            format!("No data found for {}", formatted).into_response()
        }
        Ok(records) => Json(FilteredResponse {
            filter_date: formatted,
            serial_data: records,
        })
        .into_response(),
        Err(e) => error_text("Failed to filter serial numbers", &e).into_response(),
    }
}

use axum::http::StatusCode;
use chrono::NaiveDate;
use log::error;

use super::state::AppState;
use crate::database::Database;
use crate::error::BbuError;

/// Plain-text error response.
pub type TextError = (StatusCode, String);

/// Date format accepted by the date filter.
pub const FILTER_DATE_FORMAT: &str = "%m/%d/%Y";

pub fn open_db(state: &AppState) -> Result<Database, TextError> {
    Database::open(&state.storage).map_err(|e| {
        error!("Failed to open database: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Database connection error: {}", e),
        )
    })
}

/// Maps an error to a response: caller mistakes are 400, the rest are 500
/// and get logged.
pub fn error_text(context: &str, err: &BbuError) -> TextError {
    if err.is_user_error() {
        (StatusCode::BAD_REQUEST, format!("{}. Error: {}", context, err))
    } else {
        error!("{}: {}", context, err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}. Error: {}", context, err),
        )
    }
}

/// Treats an empty query parameter the same as a missing one.
pub fn non_empty(param: Option<String>) -> Option<String> {
    param.filter(|s| !s.trim().is_empty())
}

pub fn parse_threshold(raw: &str) -> Result<i64, BbuError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| BbuError::InvalidThreshold(raw.to_owned()))
}

pub fn parse_filter_date(raw: &str) -> Result<NaiveDate, BbuError> {
    NaiveDate::parse_from_str(raw.trim(), FILTER_DATE_FORMAT)
        .map_err(|_| BbuError::InvalidDate(raw.to_owned()))
}

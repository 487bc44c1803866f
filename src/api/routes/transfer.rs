use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use log::info;

use super::common::{error_text, non_empty, open_db, parse_threshold, TextError};
use super::records::ThresholdParams;
use super::state::AppState;
use crate::error::BbuError;
use crate::export;
use crate::records::{ImportEntry, SerialRecord};

fn csv_attachment(body: String, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment;filename={}", filename),
            ),
        ],
        body,
    )
        .into_response()
}

/// Pulls the uploaded JSON document out of the `file` field.
async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, TextError> {
    loop {
        let field = multipart.next_field().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to upload file. Error: {}", e),
            )
        })?;

        let Some(field) = field else {
            return Err((StatusCode::BAD_REQUEST, "No file part".to_string()));
        };

        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_owned();
        if file_name.is_empty() {
            return Err((StatusCode::BAD_REQUEST, "No selected file".to_string()));
        }
        if !file_name.to_ascii_lowercase().ends_with(".json") {
            return Err((
                StatusCode::BAD_REQUEST,
                "Invalid file format. Please upload a JSON file.".to_string(),
            ));
        }

        let bytes = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to upload file. Error: {}", e),
            )
        })?;

        return Ok(bytes.to_vec());
    }
}

/// POST /import_json
/// Multipart upload of a JSON array of import entries.
pub async fn import_json(State(state): State<AppState>, mut multipart: Multipart) -> (StatusCode, String) {
    let bytes = match read_upload(&mut multipart).await {
        Ok(bytes) => bytes,
        Err(e) => return e,
    };

    let entries: Vec<ImportEntry> = match serde_json::from_slice(&bytes) {
        Ok(entries) => entries,
        Err(e) => return error_text("Failed to import data", &BbuError::JsonError(e)),
    };

    let mut db = match open_db(&state) {
        Ok(db) => db,
        Err(e) => return e,
    };

    match SerialRecord::import(&mut db, &entries) {
        Ok(summary) => (
            StatusCode::OK,
            format!(
                "Data imported successfully! {} inserted, {} duplicates skipped, {} rejected.",
                summary.inserted, summary.skipped_duplicates, summary.rejected
            ),
        ),
        Err(e) => error_text("Failed to import data", &e),
    }
}

/// GET /export_csv
pub async fn export_csv(State(state): State<AppState>) -> Response {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(e) => return e.into_response(),
    };

    match export::export_all(&db) {
        Ok(csv) => csv_attachment(csv, export::ALL_FILENAME),
        Err(e) => error_text("Failed to export data", &e).into_response(),
    }
}

/// GET /export_above_threshold?threshold=N
pub async fn export_above_threshold(
    State(state): State<AppState>,
    Query(params): Query<ThresholdParams>,
) -> Response {
    let Some(raw) = non_empty(params.threshold) else {
        return "No data to export".into_response();
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
        Ok(records) if records.is_empty() => "No data to export".into_response(),
        Ok(records) => csv_attachment(
            export::to_csv(&export::THRESHOLD_HEADER, &records),
            &export::threshold_filename(threshold),
        ),
        Err(e) => error_text("Failed to export data", &e).into_response(),
    }
}

/// GET /export_json
/// Writes the JSON snapshot file and returns the same document.
pub async fn export_json(State(state): State<AppState>) -> Response {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(e) => return e.into_response(),
    };

    match export::write_snapshot(&db, &state.storage) {
        Ok(json) => {
            info!("Exported JSON snapshot to {}", state.storage.snapshot_path.display());
            ([(header::CONTENT_TYPE, "application/json")], json).into_response()
        }
        Err(e) => error_text("Failed to export data", &e).into_response(),
    }
}

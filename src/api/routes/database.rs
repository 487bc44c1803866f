use axum::{extract::State, http::StatusCode, response::Html};
use log::{error, info};

use super::common::open_db;
use super::state::AppState;
use crate::backup;

const CONFIRM_HTML: &str = r#"<form method="post" action="/clear_confirm">
    <p>Are you sure you want to clear the database?</p>
    <input type="submit" value="Yes, clear the database">
</form>
"#;

/// GET /clear_db
/// Asks for confirmation before the destructive clear.
pub async fn clear_db() -> Html<&'static str> {
    Html(CONFIRM_HTML)
}

/// POST /clear_confirm
/// Deletes every record and moves the database and snapshot to backups.
pub async fn clear_confirm(State(state): State<AppState>) -> (StatusCode, String) {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err((status, msg)) => {
            return (status, format!("Failed to clear database. Error: {}", msg));
        }
    };

    match backup::clear_all(db, &state.storage) {
        Ok(outcome) => {
            info!(
                "Database cleared: {} records removed, backup at {:?}",
                outcome.deleted, outcome.db_backup
            );
            (StatusCode::OK, "Database cleared successfully!".to_string())
        }
        Err(e) => {
            error!("Failed to clear database: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to clear database. Error: {}", e),
            )
        }
    }
}

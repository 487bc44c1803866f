pub mod routes;

// Re-export route handlers for convenience
pub use routes::database;
pub use routes::records;
pub use routes::scans;
pub use routes::state::AppState;
pub use routes::transfer;

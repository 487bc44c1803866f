use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::api::{self, AppState};
use crate::config::{ServerConfig, StorageConfig};
use crate::error::BbuError;

pub struct WebServer {
    host: String,
    port: u16,
    storage: StorageConfig,
}

impl WebServer {
    pub fn new(server: &ServerConfig, storage: StorageConfig) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            storage,
        }
    }

    pub async fn start(&self) -> Result<(), BbuError> {
        let app = create_router(AppState::new(self.storage.clone()));

        let addr: SocketAddr = format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| BbuError::Error(format!("Invalid address: {}", e)))?;

        println!("bbu_tracker server starting on http://{}", addr);
        println!("   Database: {}", self.storage.db_path.display());

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BbuError::Error(format!("Failed to bind to {}: {}", addr, e)))?;

        log::info!("Server ready to handle requests");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_signal().await;
                log::info!("Shutdown signal received");
                println!("\nShutdown signal received - stopping server gracefully...");
            })
            .await
            .map_err(|e| BbuError::Error(format!("Server error: {}", e)))?;

        log::info!("Server shutdown complete");

        Ok(())
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Scanning
        .route("/submit", post(api::scans::submit))
        .route("/count", get(api::scans::count))

        // Listings
        .route("/above_threshold", get(api::records::above_threshold))
        .route("/all_serial_numbers", get(api::records::all_serial_numbers))
        .route("/filter_by_date", get(api::records::filter_by_date))

        // Import / export
        .route("/import_json", post(api::transfer::import_json))
        .route("/export_csv", get(api::transfer::export_csv))
        .route("/export_above_threshold", get(api::transfer::export_above_threshold))
        .route("/export_json", get(api::transfer::export_json))

        // Clearing
        .route("/clear_db", get(api::database::clear_db))
        .route("/clear_confirm", post(api::database::clear_confirm))

        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}

/// Waits for a shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received SIGINT (Ctrl+C)");
        },
        _ = terminate => {
            log::info!("Received SIGTERM");
        },
    }
}

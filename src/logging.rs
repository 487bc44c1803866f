use flexi_logger::{Logger, LoggerHandle};

use crate::config::LoggingConfig;
use crate::error::BbuError;

/// Starts the global logger at the configured level, writing to stderr.
///
/// The returned handle must be kept alive for the lifetime of the process.
pub fn init(logging: &LoggingConfig) -> Result<LoggerHandle, BbuError> {
    Logger::try_with_env_or_str(logging.log_spec())
        .map_err(|e| BbuError::Error(format!("Invalid log specification: {}", e)))?
        .log_to_stderr()
        .format(flexi_logger::detailed_format)
        .start()
        .map_err(|e| BbuError::Error(format!("Failed to start logger: {}", e)))
}

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggingConfig {
    pub bbu_tracker: String,
}

impl LoggingConfig {
    const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    const BBU_TRACKER_LEVEL: &str = "info";

    fn default() -> Self {
        LoggingConfig {
            bbu_tracker: Self::BBU_TRACKER_LEVEL.to_string(),
        }
    }

    /// Builds the flexi_logger spec string for the configured level.
    pub fn log_spec(&self) -> String {
        format!("bbu_tracker={}", self.bbu_tracker)
    }

    fn ensure_valid(&mut self) {
        let str_original = self.bbu_tracker.clone();
        self.bbu_tracker = self.bbu_tracker.trim().to_ascii_lowercase();
        if !Self::LOG_LEVELS.contains(&self.bbu_tracker.as_str()) {
            eprintln!(
                "Config error: bbu_tracker log level of '{}' is invalid - using default of '{}'",
                str_original,
                Self::BBU_TRACKER_LEVEL
            );
            self.bbu_tracker = Self::BBU_TRACKER_LEVEL.to_owned();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    const HOST: &str = "127.0.0.1";
    const PORT: u16 = 5000;

    fn default() -> Self {
        ServerConfig {
            host: Self::HOST.to_owned(),
            port: Self::PORT,
        }
    }

    fn ensure_valid(&mut self) {
        self.host = self.host.trim().to_owned();
        if self.host.is_empty() {
            eprintln!(
                "Config error: server host is empty - using default of '{}'",
                Self::HOST
            );
            self.host = Self::HOST.to_owned();
        }
    }
}

/// Where the record store lives and how its backups are named.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub backup_dir: PathBuf,
    pub db_backup_prefix: String,
    pub snapshot_backup_prefix: String,
}

impl StorageConfig {
    const DB_FILENAME: &str = "BBU_Rack.db";
    const SNAPSHOT_FILENAME: &str = "data.json";
    const DB_BACKUP_PREFIX: &str = "backup_serial_numbers";
    const SNAPSHOT_BACKUP_PREFIX: &str = "backup_data";

    fn default() -> Self {
        StorageConfig {
            db_path: PathBuf::from(Self::DB_FILENAME),
            snapshot_path: PathBuf::from(Self::SNAPSHOT_FILENAME),
            backup_dir: PathBuf::from("."),
            db_backup_prefix: Self::DB_BACKUP_PREFIX.to_owned(),
            snapshot_backup_prefix: Self::SNAPSHOT_BACKUP_PREFIX.to_owned(),
        }
    }

    /// Storage rooted in a single directory, default file names.
    pub fn in_dir(dir: &Path) -> Self {
        StorageConfig {
            db_path: dir.join(Self::DB_FILENAME),
            snapshot_path: dir.join(Self::SNAPSHOT_FILENAME),
            backup_dir: dir.to_path_buf(),
            ..Self::default()
        }
    }

    fn ensure_valid(&mut self) {
        if self.db_backup_prefix.trim().is_empty() {
            eprintln!(
                "Config error: db_backup_prefix is empty - using default of '{}'",
                Self::DB_BACKUP_PREFIX
            );
            self.db_backup_prefix = Self::DB_BACKUP_PREFIX.to_owned();
        }

        if self.snapshot_backup_prefix.trim().is_empty() {
            eprintln!(
                "Config error: snapshot_backup_prefix is empty - using default of '{}'",
                Self::SNAPSHOT_BACKUP_PREFIX
            );
            self.snapshot_backup_prefix = Self::SNAPSHOT_BACKUP_PREFIX.to_owned();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    const ENV_PREFIX: &str = "BBU_";

    /// Default config file location in the app's local data directory.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "bbu_tracker")
            .map(|dirs| dirs.data_local_dir().join("config.toml"))
    }

    /// Loads configuration from `config_path` (or the default location).
    /// Missing or unreadable files fall back to defaults; a default file is
    /// written when none exists. `BBU_` environment variables override both.
    pub fn load_config(config_path: Option<&Path>) -> Self {
        let default_config = Config::default();

        let config_path = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_config_path(),
        };

        let mut figment = Figment::from(Serialized::defaults(default_config.clone()));

        if let Some(config_path) = &config_path {
            if !config_path.exists() {
                Self::write_default(config_path, &default_config);
            }
            figment = figment.merge(Toml::file(config_path));
        }

        figment = figment.merge(Env::prefixed(Self::ENV_PREFIX).split("__"));

        // Attempt to extract the configuration; on error, log a message and fall back to defaults.
        let mut config: Config = figment.extract().unwrap_or_else(|err| {
            eprintln!("Could not load configuration: {}. Using default configuration.", err);
            default_config
        });

        config.ensure_valid();

        config
    }

    fn write_default(config_path: &Path, default_config: &Config) {
        if let Some(parent) = config_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!(
                    "Failed to create configuration directory {}: {}",
                    parent.display(),
                    e
                );
                return;
            }
        }
        match toml::to_string_pretty(default_config) {
            Ok(toml_string) => {
                if let Err(e) = fs::write(config_path, toml_string) {
                    eprintln!(
                        "Failed to write default config to {}: {}",
                        config_path.display(),
                        e
                    );
                }
            }
            Err(_) => eprintln!("Failed to serialize default config."),
        }
    }

    fn ensure_valid(&mut self) {
        self.server.ensure_valid();
        self.logging.ensure_valid();
        self.storage.ensure_valid();
    }
}

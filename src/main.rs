mod api;
mod backup;
mod cli;
mod config;
mod database;
mod error;
mod export;
mod logging;
mod records;
mod schema;
mod serial;
mod server;

use cli::Cli;
use config::Config;
use log::{debug, error};

fn main() {
    let cli = Cli::parse_args();
    let config = Config::load_config(cli.config.as_deref());

    // Keep the handle alive so buffered log output is flushed on exit
    let _logger = match logging::init(&config.logging) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("{}", e);
            None
        }
    };

    debug!("Command-line args: {:?}", std::env::args_os().collect::<Vec<_>>());
    debug!("Configuration: {:?}", config);

    if let Err(err) = cli.handle_command(config) {
        error!("{:?}", err);
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

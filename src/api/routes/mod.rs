pub mod common;
pub mod database;
pub mod records;
pub mod scans;
pub mod state;
pub mod transfer;

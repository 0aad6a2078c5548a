//! Async services shared by clients

mod base_station;
mod checkpoint;
mod database;

pub use base_station::BaseStationService;
pub use checkpoint::CheckpointService;
pub use database::DatabaseService;

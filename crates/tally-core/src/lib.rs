//! tally-core - Core library for Tally
//!
//! Checkpoint record keeping and base station reconciliation for race
//! events: time segmentation of sightings, the export package codec, the
//! import pipeline with conflict detection, the resolution workflow and the
//! runner by checkpoint matrix. Shared by every Tally client.

pub mod db;
pub mod error;
pub mod export;
pub mod matrix;
pub mod models;
pub mod reconcile;
pub mod resolution;
pub mod segment;
pub mod services;
mod util;

pub use error::{DecodeError, Error, ImportError, Result};
pub use models::{RaceId, SightingKey, SightingRecord};

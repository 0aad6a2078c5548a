pub mod audit;
pub mod common;
pub mod completions;
pub mod export;
pub mod import;
pub mod matrix;
pub mod race;
pub mod record;
pub mod segments;
pub mod settings;

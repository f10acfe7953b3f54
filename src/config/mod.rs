pub mod engine_config;
pub mod importer_config;

pub use engine_config::{EngineConfig, OverlapPolicy};
pub use importer_config::ImporterConfig;

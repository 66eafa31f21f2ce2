pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::{Orchestrator, Repl};
pub use config::AppConfig;
pub use core::pipeline::{PipelineReport, Stages, SumoPipeline};
pub use utils::error::{Result, SumoError};

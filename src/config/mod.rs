#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

pub use toml_config::{AppConfig, PlannerKind};

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "sumo-agent")]
#[command(about = "Download an OSM map, build a SUMO network and generate traffic demand")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Planner that turns free-text instructions into tool calls
    #[arg(long, value_enum)]
    pub planner: Option<PlannerKind>,

    /// Run a single instruction and exit (defaults to the Pamplona instruction)
    #[arg(long, num_args = 0..=1, default_missing_value = crate::app::DEFAULT_INSTRUCTION)]
    pub once: Option<String>,

    /// Run the pipeline directly for a place, without a planner
    #[arg(long, conflicts_with = "once")]
    pub place: Option<String>,

    /// Simulated duration in seconds
    #[arg(long)]
    pub duration: Option<u32>,

    /// Seconds between generated trips
    #[arg(long)]
    pub period: Option<f64>,

    /// Directory where the .osm/.net.xml/.rou.xml files are written
    #[arg(long)]
    pub work_dir: Option<String>,

    /// Show the resolved configuration without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Log memory and elapsed time after each stage
    #[arg(long)]
    pub monitor: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

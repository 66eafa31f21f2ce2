pub mod orchestrator;
pub mod planners;
pub mod repl;

pub use orchestrator::Orchestrator;
pub use planners::{OpenAiPlanner, Planner, RuleBasedPlanner};
pub use repl::{Repl, ReplStats};

/// Instruction used by `--once` when none is given.
pub const DEFAULT_INSTRUCTION: &str =
    "Download the map of Pamplona, convert it to a SUMO network and generate traffic demand";

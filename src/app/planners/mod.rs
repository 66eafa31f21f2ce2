pub mod openai;
pub mod rule_based;

pub use openai::OpenAiPlanner;
pub use rule_based::RuleBasedPlanner;

use crate::config::{AppConfig, PlannerKind};
use crate::core::registry::ToolRegistry;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Maps a free-text instruction onto registry invocations.
#[async_trait]
pub trait Planner: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs whatever the instruction asks for and returns a summary for the operator.
    async fn plan_and_run(&self, instruction: &str, registry: &ToolRegistry) -> Result<String>;
}

pub fn build_planner(config: &AppConfig) -> Result<Box<dyn Planner>> {
    match config.agent.planner {
        PlannerKind::Rules => Ok(Box::new(RuleBasedPlanner::new(config.demand_params())?)),
        PlannerKind::Openai => Ok(Box::new(OpenAiPlanner::from_config(config)?)),
    }
}

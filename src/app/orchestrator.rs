use crate::app::planners::{build_planner, Planner};
use crate::config::AppConfig;
use crate::core::pipeline::Stages;
use crate::core::registry::ToolRegistry;
use crate::utils::error::Result;
use std::time::Instant;

/// Registry of stage operations plus the planner that drives them.
pub struct Orchestrator {
    registry: ToolRegistry,
    planner: Box<dyn Planner>,
}

impl Orchestrator {
    pub fn new(registry: ToolRegistry, planner: Box<dyn Planner>) -> Self {
        Self { registry, planner }
    }

    pub fn from_config(config: &AppConfig, stages: &Stages) -> Result<Self> {
        let registry = ToolRegistry::for_stages(stages, config.demand_params());
        let planner = build_planner(config)?;
        Ok(Self::new(registry, planner))
    }

    pub fn planner_name(&self) -> &'static str {
        self.planner.name()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 每個指令都是獨立的一次執行，不保留任何狀態
    pub async fn handle(&self, instruction: &str) -> Result<String> {
        let started = Instant::now();
        tracing::info!("📝 Instruction ({} planner): {}", self.planner.name(), instruction);

        let result = self.planner.plan_and_run(instruction, &self.registry).await;
        match &result {
            Ok(_) => tracing::info!("✅ Instruction completed in {:?}", started.elapsed()),
            Err(e) => tracing::error!(
                "❌ Instruction failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            ),
        }
        result
    }
}

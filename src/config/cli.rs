use crate::config::{AppConfig, CliConfig};
use crate::utils::error::Result;
use crate::utils::validation::Validate;

impl CliConfig {
    /// 載入設定檔並套用命令列覆蓋
    pub fn resolve(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path);
                AppConfig::from_file(path)?
            }
            None => AppConfig::default(),
        };

        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(planner) = self.planner {
            config.agent.planner = planner;
            tracing::info!("🔧 Planner overridden to: {:?}", planner);
        }
        if let Some(duration) = self.duration {
            config.demand.duration = duration;
        }
        if let Some(period) = self.period {
            config.demand.period = period;
        }
        if let Some(dir) = &self.work_dir {
            config.workspace.output_dir = dir.clone();
        }
    }
}

use crate::domain::model::{DemandParams, DEFAULT_DURATION_SECS, DEFAULT_PERIOD_SECS};
use crate::utils::error::{Result, SumoError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub workspace: WorkspaceConfig,
    pub map: MapConfig,
    pub sumo: SumoConfig,
    pub process: ProcessConfig,
    pub demand: DemandConfig,
    pub agent: AgentConfig,
    pub repl: ReplConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// 產出檔案的目錄
    pub output_dir: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            output_dir: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub nominatim_endpoint: String,
    pub overpass_endpoint: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            nominatim_endpoint: "https://nominatim.openstreetmap.org".to_string(),
            overpass_endpoint: "https://overpass-api.de/api/interpreter".to_string(),
            timeout_seconds: 180,
            user_agent: concat!("sumo-agent/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SumoConfig {
    /// SUMO 安裝目錄，未設定時使用 SUMO_HOME
    pub home: Option<String>,
    /// 直接指定 tools 目錄，優先於 home
    pub tools_dir: Option<String>,
    pub python: String,
}

impl Default for SumoConfig {
    fn default() -> Self {
        Self {
            home: None,
            tools_dir: None,
            python: "python".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_seconds: u64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 900,
            retry_attempts: 1,
            retry_delay_seconds: 2,
        }
    }
}

impl ProcessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandConfig {
    pub duration: u32,
    pub period: f64,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION_SECS,
            period: DEFAULT_PERIOD_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum PlannerKind {
    Rules,
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub planner: PlannerKind,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_turns: u32,
    pub timeout_seconds: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            planner: PlannerKind::Rules,
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1".to_string(),
            api_key: None,
            max_turns: 8,
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    pub exit_tokens: Vec<String>,
    pub prompt: String,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            exit_tokens: vec!["exit".to_string(), "quit".to_string()],
            prompt: "➡️  You: ".to_string(),
        }
    }
}

impl ReplConfig {
    pub fn is_exit_token(&self, input: &str) -> bool {
        self.exit_tokens
            .iter()
            .any(|token| token.eq_ignore_ascii_case(input.trim()))
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SumoError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| SumoError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OPENAI_API_KEY})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| SumoError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.workspace.output_dir)
    }

    pub fn demand_params(&self) -> DemandParams {
        DemandParams::new(Some(self.demand.duration), Some(self.demand.period))
    }

    /// 決定 API key：設定檔優先，其次環境變數
    pub fn api_key(&self) -> Option<String> {
        self.agent
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty() && !key.starts_with("${"))
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_path("workspace.output_dir", &self.workspace.output_dir)?;
        validation::validate_url("map.nominatim_endpoint", &self.map.nominatim_endpoint)?;
        validation::validate_url("map.overpass_endpoint", &self.map.overpass_endpoint)?;
        validation::validate_positive_number("map.timeout_seconds", self.map.timeout_seconds, 1)?;
        validation::validate_non_empty_string("sumo.python", &self.sumo.python)?;
        validation::validate_positive_number(
            "process.timeout_seconds",
            self.process.timeout_seconds,
            1,
        )?;
        validation::validate_range("process.retry_attempts", self.process.retry_attempts, 0, 5)?;
        validation::validate_positive_number("demand.duration", u64::from(self.demand.duration), 1)?;
        validation::validate_positive_real("demand.period", self.demand.period)?;
        validation::validate_url("agent.endpoint", &self.agent.endpoint)?;
        validation::validate_non_empty_string("agent.model", &self.agent.model)?;
        validation::validate_range("agent.max_turns", self.agent.max_turns, 1, 32)?;

        if self.repl.exit_tokens.is_empty() {
            return Err(SumoError::InvalidConfigValueError {
                field: "repl.exit_tokens".to_string(),
                value: "[]".to_string(),
                reason: "At least one exit token is required".to_string(),
            });
        }

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();

        assert_eq!(config.workspace.output_dir, ".");
        assert_eq!(config.demand.duration, 1800);
        assert_eq!(config.demand.period, 1.0);
        assert_eq!(config.agent.planner, PlannerKind::Rules);
        assert_eq!(config.repl.exit_tokens, vec!["exit", "quit"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
[workspace]
output_dir = "./maps"

[sumo]
tools_dir = "/usr/share/sumo/tools"
python = "python3"

[demand]
duration = 3600
period = 0.5

[agent]
planner = "openai"
model = "gpt-4.1-mini"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.output_dir(), PathBuf::from("./maps"));
        assert_eq!(config.sumo.tools_dir.as_deref(), Some("/usr/share/sumo/tools"));
        assert_eq!(config.sumo.python, "python3");
        assert_eq!(config.demand_params().duration_secs, 3600);
        assert_eq!(config.demand_params().period_secs, 0.5);
        assert_eq!(config.agent.planner, PlannerKind::Openai);
        // 未指定的區段維持預設值
        assert_eq!(config.process.timeout_seconds, 900);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SUMO_AGENT_TEST_KEY", "sk-test-123");

        let toml_content = r#"
[agent]
api_key = "${SUMO_AGENT_TEST_KEY}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.api_key().as_deref(), Some("sk-test-123"));

        std::env::remove_var("SUMO_AGENT_TEST_KEY");
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[map]
overpass_endpoint = "invalid-url"
"#;
        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());

        let toml_content = r#"
[demand]
period = 0.0
"#;
        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_exit_tokens_are_case_insensitive() {
        let config = AppConfig::default();
        assert!(config.repl.is_exit_token("exit"));
        assert!(config.repl.is_exit_token(" QUIT "));
        assert!(!config.repl.is_exit_token("exit now"));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[workspace]\noutput_dir = \"./from-file\"\n")
            .unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.workspace.output_dir, "./from-file");
    }
}

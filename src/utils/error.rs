use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SumoError {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Tool '{tool}' not found at {}", location.display())]
    ToolUnavailable { tool: String, location: PathBuf },

    #[error("{tool} failed: {reason}")]
    ProcessFailure {
        tool: String,
        reason: ProcessFailureReason,
    },

    #[error("Map retrieval for '{place}' failed: {message}")]
    UpstreamRetrieval { place: String, message: String },

    #[error("Expected a {expected} file, got {}", path.display())]
    WrongArtifact { expected: String, path: PathBuf },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Planner error: {message}")]
    Planner { message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

/// 外部工具失敗的原因
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessFailureReason {
    NonZeroExit { code: Option<i32>, stderr: String },
    OutputMissing { expected: PathBuf },
    TimedOut { after: Duration },
}

impl ProcessFailureReason {
    /// 子程序的 stderr（僅 NonZeroExit 有值）
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonZeroExit { code: Some(code), stderr } => {
                write!(f, "exit status {}: {}", code, stderr.trim_end())
            }
            Self::NonZeroExit { code: None, stderr } => {
                write!(f, "terminated by signal: {}", stderr.trim_end())
            }
            Self::OutputMissing { expected } => {
                write!(f, "output missing: {} was not created", expected.display())
            }
            Self::TimedOut { after } => write!(f, "timed out after {:?}", after),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Tooling,
    Process,
    Upstream,
    Planning,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl SumoError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } | Self::WrongArtifact { .. } => ErrorCategory::Input,
            Self::ToolUnavailable { .. } => ErrorCategory::Tooling,
            Self::ProcessFailure { .. } => ErrorCategory::Process,
            Self::UpstreamRetrieval { .. } | Self::HttpError(_) => ErrorCategory::Upstream,
            Self::UnknownTool { .. } | Self::InvalidArguments { .. } | Self::Planner { .. } => {
                ErrorCategory::Planning
            }
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) | Self::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Planning => ErrorSeverity::High,
            ErrorCategory::Upstream => ErrorSeverity::Medium,
            ErrorCategory::Process => match self {
                Self::ProcessFailure {
                    reason: ProcessFailureReason::TimedOut { .. },
                    ..
                } => ErrorSeverity::Medium,
                _ => ErrorSeverity::High,
            },
            ErrorCategory::Tooling | ErrorCategory::Configuration | ErrorCategory::System => {
                ErrorSeverity::Critical
            }
        }
    }

    /// 可重試的錯誤（網路或逾時）
    pub fn is_transient(&self) -> bool {
        self.severity() == ErrorSeverity::Medium
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "Check the file path or run the previous stage first",
            Self::ToolUnavailable { .. } => {
                "Install SUMO and set SUMO_HOME, or point [sumo].tools_dir at the SUMO tools directory"
            }
            Self::ProcessFailure {
                reason: ProcessFailureReason::TimedOut { .. },
                ..
            } => "Increase [process].timeout_seconds or try a smaller area",
            Self::ProcessFailure { .. } => "Inspect the tool output above and verify the input file",
            Self::UpstreamRetrieval { .. } => {
                "Check the place name spelling and your network connection"
            }
            Self::HttpError(_) => "Check your network connection and the endpoint URL",
            Self::WrongArtifact { .. } => {
                "Pass the file produced by the previous stage (.osm → .net.xml → .rou.xml)"
            }
            Self::UnknownTool { .. } | Self::InvalidArguments { .. } => {
                "Rephrase the instruction; the planner requested an unsupported operation"
            }
            Self::Planner { .. } => "Check OPENAI_API_KEY and [agent] settings, or use --planner rules",
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => "Review the configuration file",
            Self::IoError(_) => "Check file permissions and free disk space",
            Self::SerializationError(_) => "The response format was unexpected; retry or report it",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Input => format!("Input problem: {}", self),
            ErrorCategory::Tooling => format!("SUMO tooling unavailable: {}", self),
            ErrorCategory::Process => format!("External tool failed: {}", self),
            ErrorCategory::Upstream => format!("Could not download the map: {}", self),
            ErrorCategory::Planning => format!("Could not plan the request: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, SumoError>;

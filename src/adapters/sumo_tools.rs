use crate::config::toml_config::SumoConfig;
use crate::domain::ports::Invocation;
use crate::utils::error::{Result, SumoError};
use std::path::{Path, PathBuf};

pub const OSM_BUILD: &str = "osmBuild.py";
pub const RANDOM_TRIPS: &str = "randomTrips.py";

/// Locates the SUMO python tools and builds invocations for them.
#[derive(Debug, Clone)]
pub struct SumoTools {
    python: String,
    tools_dir: Option<PathBuf>,
}

impl SumoTools {
    pub fn new(python: impl Into<String>, tools_dir: Option<PathBuf>) -> Self {
        Self {
            python: python.into(),
            tools_dir,
        }
    }

    /// `tools_dir`, then `<home>/tools`, then `$SUMO_HOME/tools`.
    pub fn from_config(config: &SumoConfig) -> Self {
        let tools_dir = config
            .tools_dir
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| config.home.as_ref().map(|home| Path::new(home).join("tools")))
            .or_else(|| {
                std::env::var_os("SUMO_HOME").map(|home| PathBuf::from(home).join("tools"))
            });
        Self::new(config.python.clone(), tools_dir)
    }

    pub fn tools_dir(&self) -> Option<&Path> {
        self.tools_dir.as_deref()
    }

    pub fn expected_location(&self, script: &str) -> PathBuf {
        match &self.tools_dir {
            Some(dir) => dir.join(script),
            None => Path::new("$SUMO_HOME").join("tools").join(script),
        }
    }

    pub fn locate(&self, script: &str) -> Result<PathBuf> {
        let location = self.expected_location(script);
        if self.tools_dir.is_some() && location.is_file() {
            Ok(location)
        } else {
            Err(SumoError::ToolUnavailable {
                tool: script.to_string(),
                location,
            })
        }
    }

    /// `python <script>` ready for arguments.
    pub fn invocation(&self, script: &str) -> Result<Invocation> {
        let path = self.locate(script)?;
        Ok(Invocation::new(self.python.clone())
            .tool(script)
            .arg(path.to_string_lossy()))
    }
}

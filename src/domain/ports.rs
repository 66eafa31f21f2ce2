use crate::domain::model::PlaceName;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    /// Roads open to private cars.
    Drive,
}

#[derive(Debug, Clone)]
pub struct MapRequest {
    pub place: PlaceName,
    pub network_type: NetworkType,
    /// When false every OSM node is kept, including the ones that only shape a way.
    pub simplify: bool,
}

impl MapRequest {
    pub fn drivable_unsimplified(place: PlaceName) -> Self {
        Self {
            place,
            network_type: NetworkType::Drive,
            simplify: false,
        }
    }
}

/// 取得道路網路原始資料 (OSM XML)
#[async_trait]
pub trait MapSource: Send + Sync {
    async fn fetch(&self, request: &MapRequest) -> Result<Vec<u8>>;
}

/// 一次外部程式呼叫
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Name reported in errors, e.g. the script run by `python`.
    pub tool: Option<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            tool: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn tool(mut self, name: impl Into<String>) -> Self {
        self.tool = Some(name.into());
        self
    }

    pub fn tool_name(&self) -> &str {
        self.tool.as_deref().unwrap_or(&self.program)
    }

    /// Value following `flag` in the argument list.
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// 執行外部程式並擷取輸出
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput>;
}

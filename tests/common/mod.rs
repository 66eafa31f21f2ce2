#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use sumo_agent::adapters::sumo_tools::{SumoTools, OSM_BUILD, RANDOM_TRIPS};
use sumo_agent::config::AppConfig;
use sumo_agent::domain::ports::{
    CommandRunner, Invocation, MapRequest, MapSource, ProcessOutput,
};
use sumo_agent::utils::error::{Result, SumoError};
use sumo_agent::Stages;

pub const SAMPLE_OSM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <node id="1" lat="42.8125" lon="-1.6458"/>
  <node id="2" lat="42.8130" lon="-1.6450"/>
  <way id="10"><nd ref="1"/><nd ref="2"/><tag k="highway" v="residential"/></way>
</osm>
"#;

/// How the stubbed SUMO script behaves when invoked.
#[derive(Debug, Clone)]
pub enum StubBehaviour {
    /// Exit 0 and write the expected output file.
    Succeed,
    /// Exit 0 without writing anything.
    SucceedWithoutOutput,
    Fail { code: i32, stderr: String },
}

/// In-process stand-in for osmBuild.py / randomTrips.py.
#[derive(Default)]
pub struct StubRunner {
    calls: Mutex<Vec<Invocation>>,
    behaviours: Mutex<HashMap<&'static str, StubBehaviour>>,
}

impl StubRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, script: &'static str, behaviour: StubBehaviour) {
        self.behaviours.lock().unwrap().insert(script, behaviour);
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, script: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| script_of(c) == Some(script))
            .collect()
    }
}

fn script_of(invocation: &Invocation) -> Option<&'static str> {
    let first = invocation.args.first()?;
    [OSM_BUILD, RANDOM_TRIPS]
        .into_iter()
        .find(|script| first.ends_with(script))
}

#[async_trait]
impl CommandRunner for StubRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        self.calls.lock().unwrap().push(invocation.clone());

        let script = script_of(invocation).expect("stub only knows the SUMO scripts");
        let behaviour = self
            .behaviours
            .lock()
            .unwrap()
            .get(script)
            .cloned()
            .unwrap_or(StubBehaviour::Succeed);

        match behaviour {
            StubBehaviour::Succeed => {
                let output = if script == OSM_BUILD {
                    format!("{}.net.xml", invocation.arg_value("--prefix").unwrap())
                } else {
                    invocation.arg_value("--route-file").unwrap().to_string()
                };
                std::fs::write(&output, "<stub/>")?;
                Ok(ProcessOutput {
                    code: Some(0),
                    stdout: format!("Success.\nWrote {}\n", output),
                    stderr: String::new(),
                })
            }
            StubBehaviour::SucceedWithoutOutput => Ok(ProcessOutput {
                code: Some(0),
                ..Default::default()
            }),
            StubBehaviour::Fail { code, stderr } => Ok(ProcessOutput {
                code: Some(code),
                stdout: String::new(),
                stderr,
            }),
        }
    }
}

/// Always answers with the same OSM document, or fails like an unknown place.
pub struct StaticMapSource {
    pub body: Option<String>,
    pub requests: Mutex<Vec<String>>,
}

impl StaticMapSource {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            body: Some(SAMPLE_OSM.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn not_found() -> Arc<Self> {
        Arc::new(Self {
            body: None,
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl MapSource for StaticMapSource {
    async fn fetch(&self, request: &MapRequest) -> Result<Vec<u8>> {
        self.requests
            .lock()
            .unwrap()
            .push(request.place.as_str().to_string());
        match &self.body {
            Some(body) => Ok(body.as_bytes().to_vec()),
            None => Err(SumoError::UpstreamRetrieval {
                place: request.place.to_string(),
                message: "place not found".to_string(),
            }),
        }
    }
}

/// Creates empty osmBuild.py / randomTrips.py so the tools are locatable.
pub fn fake_tools(dir: &Path) -> SumoTools {
    let tools_dir = dir.join("sumo-tools");
    std::fs::create_dir_all(&tools_dir).unwrap();
    std::fs::write(tools_dir.join(OSM_BUILD), "").unwrap();
    std::fs::write(tools_dir.join(RANDOM_TRIPS), "").unwrap();
    SumoTools::new("python", Some(tools_dir))
}

/// Config whose outputs and tools live under `dir`.
pub fn test_config(dir: &Path) -> AppConfig {
    fake_tools(dir);
    let mut config = AppConfig::default();
    config.workspace.output_dir = dir.join("out").to_string_lossy().to_string();
    config.sumo.tools_dir = Some(dir.join("sumo-tools").to_string_lossy().to_string());
    config
}

pub fn stub_stages(
    config: &AppConfig,
    source: Arc<dyn MapSource>,
    runner: Arc<StubRunner>,
) -> Stages {
    Stages::with_ports(config, source, runner)
}

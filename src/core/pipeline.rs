use crate::adapters::{OverpassMapSource, SumoTools, TokioCommandRunner};
use crate::config::AppConfig;
use crate::core::converter::NetworkConverter;
use crate::core::demand::DemandGenerator;
use crate::core::fetcher::MapFetcher;
use crate::domain::model::{Artifact, DemandParams, DemandSummary, PlaceName, RunState, Stage};
use crate::domain::ports::{CommandRunner, MapSource};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 三個階段，由直接執行與工具註冊表共用
#[derive(Clone)]
pub struct Stages {
    pub fetcher: Arc<MapFetcher>,
    pub converter: Arc<NetworkConverter>,
    pub demand: Arc<DemandGenerator>,
}

impl Stages {
    pub fn new(fetcher: MapFetcher, converter: NetworkConverter, demand: DemandGenerator) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            converter: Arc::new(converter),
            demand: Arc::new(demand),
        }
    }

    pub fn with_ports(
        config: &AppConfig,
        source: Arc<dyn MapSource>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let tools = SumoTools::from_config(&config.sumo);
        Self::new(
            MapFetcher::new(source, config.output_dir()),
            NetworkConverter::new(tools.clone(), runner.clone()),
            DemandGenerator::new(tools, runner),
        )
    }

    /// Overpass + real child processes.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let source = Arc::new(OverpassMapSource::new(&config.map)?);
        let runner = Arc::new(TokioCommandRunner::from_config(&config.process));
        Ok(Self::with_ports(config, source, runner))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub started_at: DateTime<Local>,
    pub place: PlaceName,
    pub extract: Artifact,
    pub network: Artifact,
    pub demand: DemandSummary,
    pub states: Vec<RunState>,
    pub duration: Duration,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline for '{}' completed in {:.1?}:", self.place, self.duration)?;
        writeln!(f, "1. OSM map downloaded: {}", self.extract)?;
        writeln!(f, "2. SUMO network generated: {}", self.network)?;
        write!(f, "3. {}", self.demand)
    }
}

/// 追蹤單次執行的狀態轉換
#[derive(Debug)]
struct PipelineRun {
    state: RunState,
    history: Vec<RunState>,
}

impl PipelineRun {
    fn new() -> Self {
        Self {
            state: RunState::Start,
            history: vec![RunState::Start],
        }
    }

    async fn step<T, F>(&mut self, stage: Stage, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        debug_assert_eq!(self.state.next_stage(), Some(stage));
        match work.await {
            Ok(value) => {
                self.state = match stage {
                    Stage::Fetch => RunState::Fetched,
                    Stage::Convert => RunState::Converted,
                    Stage::Generate => RunState::DemandGenerated,
                };
                self.history.push(self.state);
                Ok(value)
            }
            Err(e) => {
                self.state = RunState::Failed { at: stage };
                self.history.push(self.state);
                tracing::error!("❌ Stage '{}' failed: {}", stage, e);
                Err(e)
            }
        }
    }
}

/// Fixed fetch → convert → generate run, without a planner.
pub struct SumoPipeline {
    stages: Stages,
    monitor: SystemMonitor,
}

impl SumoPipeline {
    pub fn new(stages: Stages) -> Self {
        Self {
            stages,
            monitor: SystemMonitor::new(false),
        }
    }

    pub fn new_with_monitoring(stages: Stages, monitor_enabled: bool) -> Self {
        Self {
            stages,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn stages(&self) -> &Stages {
        &self.stages
    }

    pub async fn run(&self, place: &str, params: DemandParams) -> Result<PipelineReport> {
        let place = PlaceName::new(place)?;
        params.validate()?;

        let started = Instant::now();
        let started_at = Local::now();
        let run_id = format!("{}-{}", started_at.format("%Y%m%dT%H%M%S"), place.slug());
        tracing::info!("🚀 Starting pipeline run {}", run_id);

        let mut run = PipelineRun::new();

        let extract = run
            .step(Stage::Fetch, self.stages.fetcher.fetch(&place))
            .await?;
        self.monitor.log_stats("fetch");

        let network = run
            .step(Stage::Convert, self.stages.converter.convert(&extract))
            .await?;
        self.monitor.log_stats("convert");

        let demand = run
            .step(Stage::Generate, self.stages.demand.generate(&network, params))
            .await?;
        self.monitor.log_stats("generate");

        let report = PipelineReport {
            run_id,
            started_at,
            place,
            extract,
            network,
            demand,
            states: run.history,
            duration: started.elapsed(),
        };
        tracing::info!("🏁 Pipeline run {} finished in {:?}", report.run_id, report.duration);
        Ok(report)
    }
}

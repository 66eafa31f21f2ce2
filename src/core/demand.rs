use crate::adapters::sumo_tools::{SumoTools, RANDOM_TRIPS};
use crate::domain::model::{Artifact, ArtifactKind, DemandParams, DemandSummary};
use crate::domain::ports::CommandRunner;
use crate::utils::error::{ProcessFailureReason, Result, SumoError};
use std::sync::Arc;

pub const TRIP_ATTRIBUTES: &str = r#"departLane="best" departSpeed="max""#;

/// Stage 3: `<stem>.net.xml` → `<stem>.rou.xml` through randomTrips.py.
pub struct DemandGenerator {
    tools: SumoTools,
    runner: Arc<dyn CommandRunner>,
}

impl DemandGenerator {
    pub fn new(tools: SumoTools, runner: Arc<dyn CommandRunner>) -> Self {
        Self { tools, runner }
    }

    pub async fn generate(&self, network: &Artifact, params: DemandParams) -> Result<DemandSummary> {
        network.ensure_kind(ArtifactKind::Network)?;
        params.validate()?;
        if !network.exists() {
            return Err(SumoError::NotFound {
                path: network.path.clone(),
            });
        }

        let routes = network.derive(ArtifactKind::Routes);
        let trips = network.derive(ArtifactKind::Trips);
        let invocation = self
            .tools
            .invocation(RANDOM_TRIPS)?
            .arg("-n")
            .arg(network.path.to_string_lossy())
            .arg("-e")
            .arg(params.duration_arg())
            .arg("-p")
            .arg(params.period_arg())
            .arg("--trip-attributes")
            .arg(TRIP_ATTRIBUTES)
            .arg("-o")
            .arg(trips.path.to_string_lossy())
            .arg("--route-file")
            .arg(routes.path.to_string_lossy());

        crate::core::remove_previous_output(&routes.path).await?;
        crate::core::remove_previous_output(&trips.path).await?;

        tracing::info!(
            "🚦 Generating SUMO demand for {} (duration {}s, period {}s)...",
            network,
            params.duration_arg(),
            params.period_arg()
        );
        let output = self.runner.run(&invocation).await?;

        if !output.success() {
            return Err(SumoError::ProcessFailure {
                tool: RANDOM_TRIPS.to_string(),
                reason: ProcessFailureReason::NonZeroExit {
                    code: output.code,
                    stderr: output.stderr,
                },
            });
        }

        if !routes.exists() {
            return Err(SumoError::ProcessFailure {
                tool: RANDOM_TRIPS.to_string(),
                reason: ProcessFailureReason::OutputMissing {
                    expected: routes.path,
                },
            });
        }

        tracing::info!("✅ Demand generated: {}", routes);
        Ok(DemandSummary {
            network: network.clone(),
            routes,
            trips,
            params,
        })
    }
}

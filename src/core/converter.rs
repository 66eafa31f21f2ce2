use crate::adapters::sumo_tools::{SumoTools, OSM_BUILD};
use crate::domain::model::{Artifact, ArtifactKind};
use crate::domain::ports::CommandRunner;
use crate::utils::error::{ProcessFailureReason, Result, SumoError};
use std::sync::Arc;

/// Stage 2: `<stem>.osm` → `<stem>.net.xml` through osmBuild.py.
pub struct NetworkConverter {
    tools: SumoTools,
    runner: Arc<dyn CommandRunner>,
}

impl NetworkConverter {
    pub fn new(tools: SumoTools, runner: Arc<dyn CommandRunner>) -> Self {
        Self { tools, runner }
    }

    pub async fn convert(&self, extract: &Artifact) -> Result<Artifact> {
        extract.ensure_kind(ArtifactKind::Extract)?;
        if !extract.exists() {
            return Err(SumoError::NotFound {
                path: extract.path.clone(),
            });
        }

        let network = extract.derive(ArtifactKind::Network);
        let invocation = self
            .tools
            .invocation(OSM_BUILD)?
            .arg("--osm-file")
            .arg(extract.path.to_string_lossy())
            .arg("--prefix")
            .arg(extract.base_path().to_string_lossy());

        crate::core::remove_previous_output(&network.path).await?;

        tracing::info!("⚙️ Converting {} to a SUMO network...", extract);
        let output = self.runner.run(&invocation).await?;

        if !output.success() {
            return Err(SumoError::ProcessFailure {
                tool: OSM_BUILD.to_string(),
                reason: ProcessFailureReason::NonZeroExit {
                    code: output.code,
                    stderr: output.stderr,
                },
            });
        }

        // 結束碼為 0 不代表真的產生了檔案
        if !network.exists() {
            return Err(SumoError::ProcessFailure {
                tool: OSM_BUILD.to_string(),
                reason: ProcessFailureReason::OutputMissing {
                    expected: network.path,
                },
            });
        }

        tracing::info!("✅ SUMO network generated: {}", network);
        Ok(network)
    }
}

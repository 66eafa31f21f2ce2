pub mod converter;
pub mod demand;
pub mod fetcher;
pub mod pipeline;
pub mod registry;

pub use crate::domain::model::{Artifact, ArtifactKind, DemandParams, DemandSummary, PlaceName};
pub use crate::domain::ports::{CommandRunner, MapSource};
pub use crate::utils::error::Result;

use std::path::Path;

/// 工具執行前清掉同名的舊輸出，之後檢查到的檔案一定是這次產生的
pub(crate) async fn remove_previous_output(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!("Removed previous output {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

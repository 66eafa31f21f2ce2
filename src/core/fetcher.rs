use crate::domain::model::{Artifact, ArtifactKind, PlaceName};
use crate::domain::ports::{MapRequest, MapSource};
use crate::utils::error::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Stage 1: place name → `<slug>.osm` in the output directory.
pub struct MapFetcher {
    source: Arc<dyn MapSource>,
    output_dir: PathBuf,
}

impl MapFetcher {
    pub fn new(source: Arc<dyn MapSource>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            output_dir: output_dir.into(),
        }
    }

    pub fn extract_for(&self, place: &PlaceName) -> Artifact {
        let file_name = format!("{}{}", place.slug(), ArtifactKind::Extract.extension());
        Artifact::new(ArtifactKind::Extract, self.output_dir.join(file_name))
    }

    pub async fn fetch(&self, place: &PlaceName) -> Result<Artifact> {
        let extract = self.extract_for(place);
        tracing::info!("📥 Downloading OSM map for '{}' (drivable roads, unsimplified)...", place);

        let request = MapRequest::drivable_unsimplified(place.clone());
        let data = self.source.fetch(&request).await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        tokio::fs::write(&extract.path, &data).await?;

        tracing::info!("✅ OSM file written: {} ({} bytes)", extract, data.len());
        Ok(extract)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::SumoError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StaticSource {
        body: Option<&'static str>,
        requests: Mutex<Vec<MapRequest>>,
    }

    #[async_trait]
    impl MapSource for StaticSource {
        async fn fetch(&self, request: &MapRequest) -> Result<Vec<u8>> {
            self.requests.lock().unwrap().push(request.clone());
            match self.body {
                Some(body) => Ok(body.as_bytes().to_vec()),
                None => Err(SumoError::UpstreamRetrieval {
                    place: request.place.to_string(),
                    message: "place not found".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_writes_normalized_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(StaticSource {
            body: Some("<osm><way id=\"1\"/></osm>"),
            requests: Mutex::new(Vec::new()),
        });
        let fetcher = MapFetcher::new(source.clone(), dir.path().join("maps"));

        let place = PlaceName::new("San Sebastián").unwrap();
        let extract = fetcher.fetch(&place).await.unwrap();

        assert_eq!(extract.kind, ArtifactKind::Extract);
        assert_eq!(extract.path, dir.path().join("maps").join("san_sebastian.osm"));
        assert_eq!(
            std::fs::read_to_string(&extract.path).unwrap(),
            "<osm><way id=\"1\"/></osm>"
        );

        let requests = source.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].simplify);
        assert_eq!(requests[0].network_type, crate::domain::ports::NetworkType::Drive);
    }

    #[tokio::test]
    async fn test_retrieval_failure_propagates_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(StaticSource {
            body: None,
            requests: Mutex::new(Vec::new()),
        });
        let fetcher = MapFetcher::new(source, dir.path());

        let place = PlaceName::new("Atlantis").unwrap();
        let err = fetcher.fetch(&place).await.unwrap_err();

        assert!(matches!(err, SumoError::UpstreamRetrieval { .. }));
        assert!(!dir.path().join("atlantis.osm").exists());
    }
}

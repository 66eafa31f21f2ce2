use crate::config::toml_config::MapConfig;
use crate::domain::ports::{MapRequest, MapSource, NetworkType};
use crate::utils::error::{Result, SumoError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Overpass area ids are OSM ids shifted by a fixed offset per element type.
const RELATION_AREA_OFFSET: u64 = 3_600_000_000;
const WAY_AREA_OFFSET: u64 = 2_400_000_000;

/// Same highway filter OSMnx uses for its "drive" network type.
const DRIVE_FILTER: &str = concat!(
    r#"["highway"]["area"!~"yes"]"#,
    r#"["highway"!~"abandoned|bicycle|bridleway|bus_guideway|construction|corridor|cycleway|elevator|escalator|footway|no|path|pedestrian|planned|platform|proposed|raceway|razed|service|steps|track"]"#,
    r#"["motor_vehicle"!~"no"]["motorcar"!~"no"]"#,
    r#"["service"!~"alley|driveway|emergency_access|parking|parking_aisle|private"]"#,
);

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    osm_type: String,
    osm_id: u64,
    #[serde(default)]
    display_name: String,
}

impl NominatimPlace {
    fn area_id(&self) -> Option<u64> {
        match self.osm_type.as_str() {
            "relation" => Some(RELATION_AREA_OFFSET + self.osm_id),
            "way" => Some(WAY_AREA_OFFSET + self.osm_id),
            _ => None,
        }
    }
}

/// 透過 Nominatim 地理編碼，再向 Overpass 下載原始 OSM XML
pub struct OverpassMapSource {
    client: Client,
    nominatim_endpoint: String,
    overpass_endpoint: String,
    timeout: Duration,
}

impl OverpassMapSource {
    pub fn new(config: &MapConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            nominatim_endpoint: config.nominatim_endpoint.trim_end_matches('/').to_string(),
            overpass_endpoint: config.overpass_endpoint.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    async fn geocode(&self, place: &str) -> Result<NominatimPlace> {
        let url = format!("{}/search", self.nominatim_endpoint);
        tracing::debug!("Geocoding '{}' via {}", place, url);

        let response = self
            .client
            .get(&url)
            .query(&[("q", place), ("format", "json"), ("limit", "5")])
            .send()
            .await
            .map_err(|e| upstream(place, format!("geocoding request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(upstream(
                place,
                format!("geocoder answered {}", response.status()),
            ));
        }

        let candidates: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| upstream(place, format!("unreadable geocoder answer: {}", e)))?;

        // 只有 relation / way 能當成 Overpass 的 area
        candidates
            .into_iter()
            .find(|c| c.area_id().is_some())
            .ok_or_else(|| upstream(place, "place not found".to_string()))
    }

    fn build_query(&self, area_id: u64, network_type: NetworkType) -> String {
        let filter = match network_type {
            NetworkType::Drive => DRIVE_FILTER,
        };
        format!(
            "[out:xml][timeout:{timeout}];\narea(id:{area_id})->.searchArea;\n(way{filter}(area.searchArea););\n(._;>;);\nout body;",
            timeout = self.timeout.as_secs(),
            area_id = area_id,
            filter = filter,
        )
    }
}

#[async_trait]
impl MapSource for OverpassMapSource {
    async fn fetch(&self, request: &MapRequest) -> Result<Vec<u8>> {
        let place = request.place.as_str();
        if request.simplify {
            tracing::warn!("Overpass extracts are never simplified; ignoring simplify=true");
        }

        let found = self.geocode(place).await?;
        let area_id = found.area_id().unwrap_or_default();
        tracing::info!(
            "📍 Resolved '{}' to {} {} ({})",
            place,
            found.osm_type,
            found.osm_id,
            found.display_name
        );

        let query = self.build_query(area_id, request.network_type);
        tracing::debug!("Overpass query:\n{}", query);

        let response = self
            .client
            .post(&self.overpass_endpoint)
            .form(&[("data", query.as_str())])
            .send()
            .await
            .map_err(|e| upstream(place, format!("Overpass request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upstream(
                place,
                format!("Overpass answered {}: {}", status, body.trim()),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| upstream(place, format!("Overpass download interrupted: {}", e)))?;

        let text = String::from_utf8_lossy(&body);
        if !text.contains("<way") {
            return Err(upstream(place, "no drivable roads in the result".to_string()));
        }

        tracing::debug!("Downloaded {} bytes of OSM XML", body.len());
        Ok(body.to_vec())
    }
}

fn upstream(place: &str, message: String) -> SumoError {
    SumoError::UpstreamRetrieval {
        place: place.to_string(),
        message,
    }
}

use crate::core::converter::NetworkConverter;
use crate::core::demand::DemandGenerator;
use crate::core::fetcher::MapFetcher;
use crate::core::pipeline::Stages;
use crate::domain::model::{Artifact, ArtifactKind, DemandParams, PlaceName};
use crate::utils::error::{Result, SumoError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const DOWNLOAD_OSM_MAP: &str = "download_osm_map";
pub const CONVERT_OSM_TO_SUMO: &str = "convert_osm_to_sumo";
pub const GENERATE_SUMO_DEMAND: &str = "generate_sumo_demand";

/// 提供給規劃器的工具描述
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> Result<Value>;
}

struct RegisteredTool {
    spec: ToolSpec,
    handler: Arc<dyn ToolHandler>,
}

/// Named operations a planner may invoke, kept in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the three pipeline stages.
    pub fn for_stages(stages: &Stages, defaults: DemandParams) -> Self {
        let mut registry = Self::new();
        registry.register(
            ToolSpec {
                name: DOWNLOAD_OSM_MAP.to_string(),
                description: "Download the unsimplified drivable road network of a place from \
                              OpenStreetMap and save it as an .osm file. Returns the file path."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "place_name": {"type": "string", "description": "Place or municipality, e.g. \"Pamplona, Spain\""}
                    },
                    "required": ["place_name"],
                    "additionalProperties": false
                }),
            },
            Arc::new(DownloadMapTool {
                fetcher: stages.fetcher.clone(),
            }),
        );
        registry.register(
            ToolSpec {
                name: CONVERT_OSM_TO_SUMO.to_string(),
                description: "Convert an .osm file into a SUMO network (.net.xml) with osmBuild.py. \
                              Returns the network file path."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "osm_file": {"type": "string", "description": "Path returned by download_osm_map"}
                    },
                    "required": ["osm_file"],
                    "additionalProperties": false
                }),
            },
            Arc::new(ConvertNetworkTool {
                converter: stages.converter.clone(),
            }),
        );
        registry.register(
            ToolSpec {
                name: GENERATE_SUMO_DEMAND.to_string(),
                description: "Generate random traffic demand (.rou.xml) for a SUMO network with \
                              randomTrips.py. Returns a summary."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "net_file": {"type": "string", "description": "Path returned by convert_osm_to_sumo"},
                        "duration": {"type": "integer", "minimum": 1, "description": format!("Simulated seconds (default {})", defaults.duration_secs)},
                        "period": {"type": "number", "exclusiveMinimum": 0, "description": format!("Seconds between trips (default {})", defaults.period_arg())}
                    },
                    "required": ["net_file"],
                    "additionalProperties": false
                }),
            },
            Arc::new(GenerateDemandTool {
                demand: stages.demand.clone(),
                defaults,
            }),
        );
        registry
    }

    /// Replaces an existing tool with the same name.
    pub fn register(&mut self, spec: ToolSpec, handler: Arc<dyn ToolHandler>) {
        self.tools.retain(|t| t.spec.name != spec.name);
        self.tools.push(RegisteredTool { spec, handler });
    }

    pub fn specs(&self) -> Vec<&ToolSpec> {
        self.tools.iter().map(|t| &t.spec).collect()
    }

    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.spec.name == name)
            .ok_or_else(|| SumoError::UnknownTool {
                name: name.to_string(),
            })?;

        tracing::debug!("🔧 Invoking {} with {}", name, args);
        tool.handler.call(args).await
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| SumoError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

#[derive(Deserialize)]
struct DownloadArgs {
    place_name: String,
}

struct DownloadMapTool {
    fetcher: Arc<MapFetcher>,
}

#[async_trait]
impl ToolHandler for DownloadMapTool {
    async fn call(&self, args: Value) -> Result<Value> {
        let args: DownloadArgs = parse_args(DOWNLOAD_OSM_MAP, args)?;
        let place = PlaceName::new(&args.place_name)?;
        let extract = self.fetcher.fetch(&place).await?;
        Ok(json!({ "kind": extract.kind, "path": extract.path }))
    }
}

#[derive(Deserialize)]
struct ConvertArgs {
    osm_file: String,
}

struct ConvertNetworkTool {
    converter: Arc<NetworkConverter>,
}

#[async_trait]
impl ToolHandler for ConvertNetworkTool {
    async fn call(&self, args: Value) -> Result<Value> {
        let args: ConvertArgs = parse_args(CONVERT_OSM_TO_SUMO, args)?;
        let extract = Artifact::expecting(ArtifactKind::Extract, args.osm_file)?;
        let network = self.converter.convert(&extract).await?;
        Ok(json!({ "kind": network.kind, "path": network.path }))
    }
}

#[derive(Deserialize)]
struct DemandArgs {
    net_file: String,
    duration: Option<u32>,
    period: Option<f64>,
}

struct GenerateDemandTool {
    demand: Arc<DemandGenerator>,
    defaults: DemandParams,
}

#[async_trait]
impl ToolHandler for GenerateDemandTool {
    async fn call(&self, args: Value) -> Result<Value> {
        let args: DemandArgs = parse_args(GENERATE_SUMO_DEMAND, args)?;
        let network = Artifact::expecting(ArtifactKind::Network, args.net_file)?;
        let params = DemandParams {
            duration_secs: args.duration.unwrap_or(self.defaults.duration_secs),
            period_secs: args.period.unwrap_or(self.defaults.period_secs),
        };

        let summary = self.demand.generate(&network, params).await?;
        Ok(json!({
            "kind": summary.routes.kind,
            "network": summary.network.path,
            "routes": summary.routes.path,
            "duration": summary.params.duration_secs,
            "period": summary.params.period_secs,
            "summary": summary.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        async fn call(&self, args: Value) -> Result<Value> {
            Ok(args)
        }
    }

    fn echo_spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: "echo".to_string(),
            parameters: json!({"type": "object"}),
        }
    }

    #[test]
    fn test_invoke_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_spec("echo"), Arc::new(EchoTool));

        let result = tokio_test::block_on(registry.invoke("echo", json!({"a": 1}))).unwrap();
        assert_eq!(result, json!({"a": 1}));
    }

    #[test]
    fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = tokio_test::block_on(registry.invoke("missing", json!({}))).unwrap_err();
        assert!(matches!(err, SumoError::UnknownTool { name } if name == "missing"));
    }

    #[test]
    fn test_register_replaces_same_name_and_keeps_order() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_spec("first"), Arc::new(EchoTool));
        registry.register(echo_spec("second"), Arc::new(EchoTool));
        registry.register(echo_spec("first"), Arc::new(EchoTool));

        let names: Vec<&str> = registry.specs().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[test]
    fn test_parse_args_rejects_missing_field() {
        let err = parse_args::<ConvertArgs>(CONVERT_OSM_TO_SUMO, json!({"file": "a.osm"}))
            .err()
            .unwrap();
        assert!(matches!(err, SumoError::InvalidArguments { tool, .. } if tool == CONVERT_OSM_TO_SUMO));
    }
}

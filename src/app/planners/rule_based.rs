use crate::app::planners::Planner;
use crate::core::registry::{
    ToolRegistry, CONVERT_OSM_TO_SUMO, DOWNLOAD_OSM_MAP, GENERATE_SUMO_DEMAND,
};
use crate::domain::model::DemandParams;
use crate::utils::error::{Result, SumoError};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

/// What the rules could read out of an instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInstruction {
    pub place: String,
    pub duration: Option<u32>,
    pub period: Option<f64>,
}

/// Deterministic planner: finds the place (and optional duration/period) and
/// always runs download → convert → generate through the registry.
pub struct RuleBasedPlanner {
    defaults: DemandParams,
    duration_re: Regex,
    period_re: Regex,
    place_re: Regex,
    terminator_re: Regex,
}

impl RuleBasedPlanner {
    pub fn new(defaults: DemandParams) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| SumoError::ConfigError {
                message: format!("invalid instruction pattern: {}", e),
            })
        };

        Ok(Self {
            defaults,
            duration_re: compile(
                r"(?i)\b(?:duration|duración|duracion|durante|during|for)\s*(?:of|de|=|:)?\s*(\d+)\s*(?:seconds|segundos|secs|sec|s)?\b",
            )?,
            period_re: compile(
                r"(?i)\b(?:period|periodo|período|every|cada)\s*(?:of|de|=|:)?\s*(\d+(?:\.\d+)?)\s*(?:seconds|segundos|secs|sec|s)?\b",
            )?,
            place_re: compile(
                r"(?i)\b(?:map of|map for|mapa de|mapa del|municipality of|municipio de|city of|ciudad de|town of|network of)\s+",
            )?,
            terminator_re: compile(
                r"(?i)[,;!?]|\.(?:\s|$)|\s(?:with|con|and|y|using|usando|then|luego|for|para)(?:\s|$)",
            )?,
        })
    }

    pub fn parse(&self, instruction: &str) -> Result<Option<ParsedInstruction>> {
        let duration = self
            .duration_re
            .captures(instruction)
            .map(|c| parse_number::<u32>("duration", &c[1]))
            .transpose()?;
        let period = self
            .period_re
            .captures(instruction)
            .map(|c| parse_number::<f64>("period", &c[1]))
            .transpose()?;

        // 先移除參數片段，避免數字被當成地名
        let stripped = self.duration_re.replace_all(instruction, " ");
        let stripped = self.period_re.replace_all(&stripped, " ");
        let stripped = stripped.trim();

        let place = match self.place_re.find(stripped) {
            Some(marker) => {
                let rest = &stripped[marker.end()..];
                let end = self
                    .terminator_re
                    .find(rest)
                    .map(|t| t.start())
                    .unwrap_or(rest.len());
                rest[..end].trim().to_string()
            }
            // 只輸入地名的情況，例如 "Pamplona"；至少要有一個大寫開頭的字
            None if stripped.split_whitespace().count() <= 4
                && !stripped.chars().any(|c| c.is_ascii_digit())
                && stripped
                    .split_whitespace()
                    .any(|w| w.chars().next().is_some_and(char::is_uppercase)) =>
            {
                stripped.trim_end_matches(['.', '!', '?']).trim().to_string()
            }
            None => String::new(),
        };

        if place.is_empty() {
            return Ok(None);
        }

        Ok(Some(ParsedInstruction {
            place,
            duration,
            period,
        }))
    }
}

fn parse_number<T>(field: &str, text: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    text.parse::<T>().map_err(|e| SumoError::InvalidArguments {
        tool: GENERATE_SUMO_DEMAND.to_string(),
        message: format!("{} '{}' is not usable: {}", field, text, e),
    })
}

fn path_of(value: &Value) -> Result<String> {
    value
        .get("path")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SumoError::Planner {
            message: format!("tool result without a path: {}", value),
        })
}

#[async_trait]
impl Planner for RuleBasedPlanner {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn plan_and_run(&self, instruction: &str, registry: &ToolRegistry) -> Result<String> {
        let parsed = self.parse(instruction)?.ok_or_else(|| SumoError::Planner {
            message: format!("could not find a place name in \"{}\"", instruction.trim()),
        })?;
        tracing::info!("🧭 Planned run for '{}'", parsed.place);

        let extract = registry
            .invoke(DOWNLOAD_OSM_MAP, json!({ "place_name": parsed.place }))
            .await?;
        let osm_file = path_of(&extract)?;

        let network = registry
            .invoke(CONVERT_OSM_TO_SUMO, json!({ "osm_file": osm_file }))
            .await?;
        let net_file = path_of(&network)?;

        let demand = registry
            .invoke(
                GENERATE_SUMO_DEMAND,
                json!({
                    "net_file": net_file,
                    "duration": parsed.duration.unwrap_or(self.defaults.duration_secs),
                    "period": parsed.period.unwrap_or(self.defaults.period_secs),
                }),
            )
            .await?;
        let summary = demand
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default();

        Ok(format!(
            "Pipeline completed for '{}':\n1. OSM map downloaded: {}\n2. SUMO network generated: {}\n3. {}",
            parsed.place, osm_file, net_file, summary
        ))
    }
}

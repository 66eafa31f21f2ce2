use crate::app::planners::Planner;
use crate::config::toml_config::AgentConfig;
use crate::config::AppConfig;
use crate::core::registry::ToolRegistry;
use crate::utils::error::{Result, SumoError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You orchestrate traffic-simulation setup for SUMO.\n\
When the user names a place or municipality, ALWAYS run this flow:\n\
1. Call download_osm_map with the place name.\n\
2. Pass the returned .osm path to convert_osm_to_sumo.\n\
3. Pass the returned .net.xml path to generate_sumo_demand.\n\
Never ask the user whether to continue. When done, reply with a complete \
summary of every step and the files produced.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Value,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    /// JSON-encoded arguments object.
    arguments: String,
}

/// 透過 OpenAI chat completions 的 tool calling 決定要呼叫哪些工具
pub struct OpenAiPlanner {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_turns: u32,
}

impl OpenAiPlanner {
    pub fn new(config: &AgentConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            max_turns: config.max_turns,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| SumoError::MissingConfigError {
            field: "OPENAI_API_KEY (or agent.api_key)".to_string(),
        })?;
        Self::new(&config.agent, api_key)
    }

    fn tool_definitions(registry: &ToolRegistry) -> Vec<Value> {
        registry
            .specs()
            .into_iter()
            .map(|spec| {
                json!({
                    "type": "function",
                    "function": {
                        "name": spec.name,
                        "description": spec.description,
                        "parameters": spec.parameters,
                    }
                })
            })
            .collect()
    }

    async fn complete(&self, messages: &[Value], tools: &[Value]) -> Result<Value> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "tools": tools,
            "tool_choice": "auto",
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SumoError::Planner {
                message: format!("model endpoint answered {}: {}", status, text.trim()),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| SumoError::Planner {
                message: "model returned no choices".to_string(),
            })
    }
}

#[async_trait]
impl Planner for OpenAiPlanner {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn plan_and_run(&self, instruction: &str, registry: &ToolRegistry) -> Result<String> {
        let tools = Self::tool_definitions(registry);
        let mut messages = vec![
            json!({ "role": "system", "content": SYSTEM_PROMPT }),
            json!({ "role": "user", "content": instruction }),
        ];

        for turn in 1..=self.max_turns {
            let raw = self.complete(&messages, &tools).await?;
            let message: AssistantMessage = serde_json::from_value(raw.clone())?;

            let calls = message.tool_calls.unwrap_or_default();
            if calls.is_empty() {
                tracing::debug!("Model finished after {} turn(s)", turn);
                return Ok(message.content.unwrap_or_default());
            }

            messages.push(raw);
            for call in calls {
                tracing::info!("🤖 Model requested {}", call.function.name);
                let args: Value = serde_json::from_str(&call.function.arguments).map_err(|e| {
                    SumoError::InvalidArguments {
                        tool: call.function.name.clone(),
                        message: format!("arguments are not valid JSON: {}", e),
                    }
                })?;

                // 工具失敗直接中止，不讓模型在失敗後繼續
                let result = registry.invoke(&call.function.name, args).await?;
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "content": result.to_string(),
                }));
            }
        }

        Err(SumoError::Planner {
            message: format!("no final answer after {} turns", self.max_turns),
        })
    }
}

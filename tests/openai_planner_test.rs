mod common;

use common::{stub_stages, test_config, StaticMapSource, StubRunner};
use httpmock::prelude::*;
use regex::Regex;
use serde_json::json;
use sumo_agent::adapters::sumo_tools::{OSM_BUILD, RANDOM_TRIPS};
use sumo_agent::app::{OpenAiPlanner, Planner};
use sumo_agent::config::toml_config::AgentConfig;
use sumo_agent::core::registry::ToolRegistry;
use sumo_agent::domain::model::DemandParams;
use sumo_agent::utils::error::SumoError;
use tempfile::TempDir;

fn planner_for(server: &MockServer) -> OpenAiPlanner {
    let config = AgentConfig {
        endpoint: server.url("/v1"),
        model: "gpt-test".to_string(),
        max_turns: 3,
        timeout_seconds: 5,
        ..AgentConfig::default()
    };
    OpenAiPlanner::new(&config, "sk-test".to_string()).unwrap()
}

fn registry_in(temp_dir: &TempDir, runner: std::sync::Arc<StubRunner>) -> ToolRegistry {
    let config = test_config(temp_dir.path());
    let stages = stub_stages(&config, StaticMapSource::ok(), runner);
    ToolRegistry::for_stages(&stages, DemandParams::default())
}

fn tool_call(name: &str, arguments: &str) -> serde_json::Value {
    tool_call_with_id("call_1", name, arguments)
}

fn tool_call_with_id(id: &str, name: &str, arguments: &str) -> serde_json::Value {
    json!({
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": arguments}
                }]
            },
            "finish_reason": "tool_calls"
        }]
    })
}

#[tokio::test]
async fn test_final_answer_without_tools() {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new().unwrap();
    let runner = StubRunner::new();

    let completion = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-test")
                .body_contains("\"model\":\"gpt-test\"")
                .body_contains("download_osm_map")
                .body_contains("generate_sumo_demand");
            then.status(200).json_body(json!({
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Which municipality do you mean?"},
                    "finish_reason": "stop"
                }]
            }));
        })
        .await;

    let planner = planner_for(&server);
    let registry = registry_in(&temp_dir, runner.clone());
    let answer = planner.plan_and_run("hello", &registry).await.unwrap();

    completion.assert_async().await;
    assert_eq!(planner.name(), "openai");
    assert_eq!(answer, "Which municipality do you mean?");
    assert!(runner.calls().is_empty());
}

/// 只在 messages 最後一筆符合 `last` 時成立
fn last_message_is(last: &str) -> Regex {
    Regex::new(&format!(r#"{}[^\]]*\],"(?:model|tools)""#, regex::escape(last))).unwrap()
}

#[tokio::test]
async fn test_tool_results_are_fed_back_until_final_answer() {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new().unwrap();
    let runner = StubRunner::new();
    let out = temp_dir.path().join("out");

    let download = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_matches(last_message_is(r#""role":"user""#));
            then.status(200).json_body(tool_call_with_id(
                "call_download",
                "download_osm_map",
                r#"{"place_name": "Pamplona"}"#,
            ));
        })
        .await;

    let convert_args = json!({ "osm_file": out.join("pamplona.osm") }).to_string();
    let convert = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_matches(last_message_is(r#""tool_call_id":"call_download""#))
                .body_contains(r#"\"kind\":\"extract\""#)
                .body_contains("pamplona.osm");
            then.status(200).json_body(tool_call_with_id(
                "call_convert",
                "convert_osm_to_sumo",
                &convert_args,
            ));
        })
        .await;

    let generate_args =
        json!({ "net_file": out.join("pamplona.net.xml"), "duration": 600 }).to_string();
    let generate = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_matches(last_message_is(r#""tool_call_id":"call_convert""#))
                .body_contains(r#"\"kind\":\"network\""#);
            then.status(200).json_body(tool_call_with_id(
                "call_generate",
                "generate_sumo_demand",
                &generate_args,
            ));
        })
        .await;

    let finish = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_matches(last_message_is(r#""tool_call_id":"call_generate""#))
                .body_contains("pamplona.rou.xml");
            then.status(200).json_body(json!({
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Pamplona is ready: pamplona.rou.xml"},
                    "finish_reason": "stop"
                }]
            }));
        })
        .await;

    let planner = {
        let config = AgentConfig {
            endpoint: server.url("/v1"),
            model: "gpt-test".to_string(),
            max_turns: 5,
            timeout_seconds: 5,
            ..AgentConfig::default()
        };
        OpenAiPlanner::new(&config, "sk-test".to_string()).unwrap()
    };
    let registry = registry_in(&temp_dir, runner.clone());
    let answer = planner
        .plan_and_run("Download the map of Pamplona", &registry)
        .await
        .unwrap();

    download.assert_hits_async(1).await;
    convert.assert_hits_async(1).await;
    generate.assert_hits_async(1).await;
    finish.assert_hits_async(1).await;
    assert_eq!(answer, "Pamplona is ready: pamplona.rou.xml");

    assert_eq!(runner.calls_to(OSM_BUILD).len(), 1);
    let demand_calls = runner.calls_to(RANDOM_TRIPS);
    assert_eq!(demand_calls.len(), 1);
    assert_eq!(demand_calls[0].arg_value("-e"), Some("600"));
    assert!(out.join("pamplona.rou.xml").exists());
}

#[tokio::test]
async fn test_unknown_tool_aborts_the_run() {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new().unwrap();
    let runner = StubRunner::new();

    let completion = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(tool_call("run_simulation", "{}"));
        })
        .await;

    let planner = planner_for(&server);
    let registry = registry_in(&temp_dir, runner.clone());
    let err = planner
        .plan_and_run("Simulate Pamplona", &registry)
        .await
        .unwrap_err();

    assert!(matches!(err, SumoError::UnknownTool { ref name } if name == "run_simulation"));
    // 失敗後不再詢問模型
    completion.assert_hits_async(1).await;
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_tool_failure_aborts_the_run() {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new().unwrap();
    let runner = StubRunner::new();

    let completion = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(tool_call(
                "convert_osm_to_sumo",
                "{\"osm_file\": \"/nowhere/pamplona.osm\"}",
            ));
        })
        .await;

    let planner = planner_for(&server);
    let registry = registry_in(&temp_dir, runner.clone());
    let err = planner
        .plan_and_run("Convert Pamplona", &registry)
        .await
        .unwrap_err();

    assert!(matches!(err, SumoError::NotFound { .. }));
    completion.assert_hits_async(1).await;
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_arguments_are_rejected() {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new().unwrap();
    let runner = StubRunner::new();

    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .json_body(tool_call("download_osm_map", "{\"place_name\": "));
        })
        .await;

    let planner = planner_for(&server);
    let registry = registry_in(&temp_dir, runner);
    let err = planner
        .plan_and_run("Download Pamplona", &registry)
        .await
        .unwrap_err();

    assert!(matches!(err, SumoError::InvalidArguments { ref tool, .. } if tool == "download_osm_map"));
}

#[tokio::test]
async fn test_rejected_credentials_are_planner_error() {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new().unwrap();

    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(401)
                .json_body(json!({"error": {"message": "Incorrect API key provided"}}));
        })
        .await;

    let planner = planner_for(&server);
    let registry = registry_in(&temp_dir, StubRunner::new());
    let err = planner
        .plan_and_run("Download the map of Pamplona", &registry)
        .await
        .unwrap_err();

    match err {
        SumoError::Planner { message } => {
            assert!(message.contains("401"));
            assert!(message.contains("Incorrect API key"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_turn_limit_is_planner_error() {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new().unwrap();
    let runner = StubRunner::new();

    // 模型一直要求下載，從不給出最終回答
    let completion = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .json_body(tool_call("download_osm_map", "{\"place_name\": \"Pamplona\"}"));
        })
        .await;

    let planner = planner_for(&server);
    let registry = registry_in(&temp_dir, runner);
    let err = planner
        .plan_and_run("Download the map of Pamplona", &registry)
        .await
        .unwrap_err();

    assert!(matches!(err, SumoError::Planner { .. }));
    completion.assert_hits_async(3).await;
    assert!(temp_dir.path().join("out").join("pamplona.osm").exists());
}

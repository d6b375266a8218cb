mod common;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use common::*;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use skyquery::config::{GenerationConfig, TracingConfig};
use skyquery::error::Error;
use skyquery::observability::Tracer;
use skyquery::providers::openai::{ContentPart, MessageContent};
use skyquery::providers::{ChatProvider, OpenAiClient};
use skyquery::request::{
  GenerationOptions, GenerationRequest, ImageInput, ResponseShape, SamplingParams
, Substitutions
};
use skyquery::{GenerationClient, GenerationResult, GenerationStatus, Task};

fn question(q: &str) -> Substitutions
{   Substitutions::from([("question".to_string(), q.to_string())])
}

fn raw_request(system: &str, human: &str) -> GenerationRequest
{   GenerationRequest
    {   name: "test".to_string()
      , system_template: system.to_string()
      , human_template: human.to_string()
      , substitutions: question("How many flights?")
      , images: None
      , sampling: SamplingParams
        {   temperature: 0.0
          , presence_penalty: 0.0
          , frequency_penalty: 0.0
          , seed: 7
        }
      , shape: ResponseShape::Text
    }
}

#[tokio::test]
async fn test_generate_returns_raw_text()
{   let provider = ScriptedProvider::new(vec![ok("SELECT 1;")]);
    let client = client_with(provider.clone());

    let result = client.generate(
      Task::SqlGeneration, question("q"), GenerationOptions::default()
    ).await;

    assert_eq!(result.status(), GenerationStatus::Ok);
    assert_eq!(result.text(), Some("SELECT 1;"));
    assert!(result.payload().unwrap().structured.is_none());
}

#[tokio::test]
async fn test_provider_error_becomes_failed_result()
{   let provider = ScriptedProvider::new(vec![
      Err(Error::ApiError("401: bad key".into()))
    ]);
    let client = client_with(provider);

    let result = client.generate(
      Task::SqlGeneration, question("q"), GenerationOptions::default()
    ).await;

    assert_eq!(result, GenerationResult::Failed);
    assert!(result.payload().is_none());
}

#[tokio::test]
async fn test_unresolved_placeholder_fails_without_calling_endpoint()
{   let provider = ScriptedProvider::new(vec![ok("unused")]);
    let client = client_with(provider.clone());

    // validation needs {query}, not {question}
    let result = client.generate(
      Task::SqlValidation, question("q"), GenerationOptions::default()
    ).await;

    assert_eq!(result.status(), GenerationStatus::Failed);
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn test_structured_response_is_parsed()
{   let provider = ScriptedProvider::new(vec![ok("```json\n{\"is_valid\": true}\n```")]);
    let client = client_with(provider);

    let result = client.generate(
      Task::SqlValidation
    , Substitutions::from([("query".to_string(), "SELECT 1".to_string())])
    , GenerationOptions::structured()
    ).await;

    let payload = result.payload().unwrap();
    assert_eq!(payload.structured, Some(json!({"is_valid": true})));
    assert!(payload.raw.starts_with("```json"));
}

#[tokio::test]
async fn test_unparseable_structured_response_keeps_raw_text()
{   let provider = ScriptedProvider::new(vec![ok("valid: yes")]);
    let client = client_with(provider);

    let mut request = raw_request("", "{question}");
    request.shape = ResponseShape::Structured;
    let result = client.run(&request).await;

    assert!(result.is_ok());
    assert_eq!(result.text(), Some("valid: yes"));
    assert!(result.payload().unwrap().structured.is_none());
}

#[tokio::test]
async fn test_messages_are_role_ordered()
{   let provider = ScriptedProvider::new(vec![ok("a"), ok("b")]);
    let client = client_with(provider.clone());

    client.run(&raw_request("You are terse.", "Q: {question}")).await;
    client.run(&raw_request("", "Q: {question}")).await;

    let requests = provider.requests();
    assert_eq!(requests[0].messages.len(), 2);
    assert_eq!(requests[0].messages[0].role, "system");
    assert_eq!(
      requests[0].messages[1].content
    , MessageContent::Text("Q: How many flights?".to_string())
    );
    assert_eq!(requests[1].messages.len(), 1);
    assert_eq!(requests[1].messages[0].role, "user");
    assert_eq!(requests[0].seed, 7);
    assert_eq!(requests[0].model, "scripted-model");
}

#[tokio::test]
async fn test_sampling_overrides_and_fresh_seed()
{   let provider = ScriptedProvider::new(vec![ok("a"), ok("b")]);
    let client = client_with(provider.clone());

    client.generate(
      Task::SqlGeneration
    , question("q")
    , GenerationOptions
      {   temperature: Some(0.7)
        , frequency_penalty: Some(0.5)
        , seed: Some(1234)
        , ..Default::default()
      }
    ).await;
    client.generate(
      Task::SqlGeneration, question("q"), GenerationOptions::default()
    ).await;

    let requests = provider.requests();
    assert_eq!(requests[0].temperature, 0.7);
    assert_eq!(requests[0].frequency_penalty, 0.5);
    assert_eq!(requests[0].presence_penalty, 0.0);
    assert_eq!(requests[0].seed, 1234);
    assert_eq!(requests[1].temperature, 0.0);
    assert!(requests[1].seed < 10_000);
}

#[tokio::test]
async fn test_images_are_attached_as_data_uris()
{   let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("chart.png");
    std::fs::write(&png, [0x89, b'P', b'N', b'G']).unwrap();

    let provider = ScriptedProvider::new(vec![ok("a"), ok("b")]);
    let client = client_with(provider.clone());

    for image in [
      ImageInput::Paths(vec![png.clone(), png.clone()])
    , ImageInput::Base64("aGVsbG8=".to_string())
    ]
    {   client.generate(
          Task::SqlGeneration
        , question("q")
        , GenerationOptions { image: Some(image), ..Default::default() }
        ).await;
    }

    let requests = provider.requests();
    let MessageContent::Parts(parts) = &requests[0].messages[1].content else
    {   panic!("expected multimodal content");
    };
    assert_eq!(parts.len(), 3);
    assert!(matches!(&parts[0], ContentPart::Text { .. }));
    match &parts[1]
    {   ContentPart::ImageUrl { image_url } => {
          assert!(image_url.url.starts_with("data:image/png;base64,"));
          assert_eq!(image_url.detail, "high");
        }
      , other => panic!("unexpected part {:?}", other)
    }

    let MessageContent::Parts(parts) = &requests[1].messages[1].content else
    {   panic!("expected multimodal content");
    };
    assert!(matches!(
      &parts[1],
      ContentPart::ImageUrl { image_url } if image_url.url == "data:image/jpeg;base64,aGVsbG8="
    ));
}

#[tokio::test]
async fn test_bad_image_fails_the_call()
{   let provider = ScriptedProvider::new(vec![ok("a")]);
    let client = client_with(provider.clone());

    for image in [
      ImageInput::Url("ftp://example.com/a.png".to_string())
    , ImageInput::Path("/definitely/not/here.jpg".into())
    ]
    {   let result = client.generate(
          Task::SqlGeneration
        , question("q")
        , GenerationOptions { image: Some(image), ..Default::default() }
        ).await;
        assert_eq!(result, GenerationResult::Failed);
    }
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn test_slow_endpoint_times_out()
{   let config = GenerationConfig
    {   timeout_secs: 1
      , ..Default::default()
    };
    let client = GenerationClient::new(
      Box::new(StalledProvider), Tracer::Null, &config
    );

    let result = client.generate(
      Task::SqlGeneration, question("q"), GenerationOptions::default()
    ).await;

    assert_eq!(result, GenerationResult::Failed);
}

#[tokio::test]
async fn test_openai_client_without_key_fails_before_sending()
{   let provider = OpenAiClient::new(GenerationConfig::default()).unwrap();
    let client = GenerationClient::new(
      Box::new(provider), Tracer::Null, &GenerationConfig::default()
    );

    let result = client.generate(
      Task::SqlGeneration, question("q"), GenerationOptions::default()
    ).await;

    assert_eq!(result, GenerationResult::Failed);
}

#[tokio::test]
async fn test_openai_endpoint_routing()
{   let openai = OpenAiClient::new(GenerationConfig
    {   api_base: "https://api.openai.com/v1/".to_string()
      , ..Default::default()
    }).unwrap();
    assert_eq!(openai.endpoint(), "https://api.openai.com/v1/chat/completions");
    assert_eq!(openai.model_name(), "gpt-4o");

    let azure = OpenAiClient::new(GenerationConfig
    {   api_base: "https://example.openai.azure.com".to_string()
      , model: "gpt4o-deploy".to_string()
      , api_version: Some("2024-06-01".to_string())
      , ..Default::default()
    }).unwrap();
    assert_eq!(
      azure.endpoint()
    , "https://example.openai.azure.com/openai/deployments/gpt4o-deploy/chat/completions?api-version=2024-06-01"
    );
}

#[tokio::test]
async fn test_tracer_requires_keys_when_enabled()
{   let config = TracingConfig
    {   enabled: true
      , ..Default::default()
    };
    assert!(matches!(
      Tracer::from_config(&config)
    , Err(Error::MissingApiKey(_))
    ));

    let disabled = Tracer::from_config(&TracingConfig::default()).unwrap();
    assert!(!disabled.is_active());
}

#[tokio::test]
async fn test_active_tracer_is_best_effort()
{   // nothing listens on the discard port, so every flush fails
    let config = TracingConfig
    {   enabled: true
      , host: "http://127.0.0.1:9".to_string()
      , public_key: Some("pk-test".to_string())
      , secret_key: Some("sk-test".to_string())
      , batch_size: 2
      , ..Default::default()
    };
    let tracer = Tracer::from_config(&config).unwrap();
    assert!(tracer.is_active());
    assert!(tracer.trace_id().is_some());

    let provider = ScriptedProvider::new(vec![ok("SELECT 1;"), Err(Error::Timeout)]);
    let client = GenerationClient::new(
      Box::new(provider), tracer, &GenerationConfig::default()
    );
    let first = client.generate(
      Task::SqlGeneration, question("q"), GenerationOptions::default()
    ).await;
    let second = client.generate(
      Task::SqlGeneration, question("q"), GenerationOptions::default()
    ).await;
    client.score_generation(5, "user-feedback", "great");
    client.tracer().flush().await;

    assert!(first.is_ok());
    assert_eq!(second, GenerationResult::Failed);
    tokio_test::assert_ok!(client.shutdown().await);
}

type Received = Arc<Mutex<Vec<(Option<String>, Value)>>>;

async fn ingest(
  State(received): State<Received>
, headers: HeaderMap
, Json(body): Json<Value>
) -> StatusCode
{   let auth = headers.get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .map(str::to_string);
    received.lock().unwrap().push((auth, body));
    StatusCode::OK
}

/// Local Langfuse ingestion endpoint that keeps every posted batch
async fn ingestion_receiver() -> (String, Received)
{   let received = Received::default();
    let app = Router::new()
      .route("/api/public/ingestion", post(ingest))
      .with_state(received.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), received)
}

fn batches(received: &Received) -> Vec<Vec<Value>>
{   received.lock().unwrap()
      .iter()
      .map(|(_, body)| body["batch"].as_array().unwrap().clone())
      .collect()
}

#[tokio::test]
async fn test_active_tracer_delivers_batches()
{   let (host, received) = ingestion_receiver().await;
    let config = TracingConfig
    {   enabled: true
      , host
      , public_key: Some("pk-test".to_string())
      , secret_key: Some("sk-test".to_string())
      , batch_size: 3
      , flush_interval_ms: 600_000
      , ..Default::default()
    };
    let tracer = Tracer::from_config(&config).unwrap();
    let trace_id = tracer.trace_id().unwrap().to_string();

    let provider = ScriptedProvider::new(vec![ok("SELECT 1;"), Err(Error::Timeout)]);
    let client = GenerationClient::new(
      Box::new(provider), tracer, &GenerationConfig::default()
    );

    // trace-create plus the first call's pair fills a batch of three
    client.generate(
      Task::SqlGeneration, question("q"), GenerationOptions::default()
    ).await;
    client.generate(
      Task::SqlGeneration, question("q"), GenerationOptions::default()
    ).await;
    client.tracer().flush().await;
    let sizes: Vec<usize> = batches(&received).iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![3, 2]);

    client.score_generation(5, "user-feedback", "great");
    tokio_test::assert_ok!(client.shutdown().await);

    let sent = batches(&received);
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[2].len(), 1);

    let expected_auth = format!(
      "Basic {}",
      base64::engine::general_purpose::STANDARD.encode("pk-test:sk-test")
    );
    for (auth, _) in received.lock().unwrap().iter()
    {   assert_eq!(auth.as_deref(), Some(expected_auth.as_str()));
    }

    let events: Vec<Value> = sent.into_iter().flatten().collect();
    let kinds: Vec<&str> = events.iter()
      .map(|e| e["type"].as_str().unwrap())
      .collect();
    assert_eq!(kinds, vec![
      "trace-create"
    , "generation-create"
    , "generation-update"
    , "generation-create"
    , "generation-update"
    , "score-create"
    ]);

    assert_eq!(events[0]["body"]["id"], json!(trace_id));
    assert_eq!(events[0]["body"]["name"], json!("Air Q&A"));
    for event in &events[1..]
    {   assert_eq!(event["body"]["traceId"], json!(trace_id));
    }

    // each update closes the span its create opened
    assert_eq!(events[1]["body"]["id"], events[2]["body"]["id"]);
    assert_eq!(events[3]["body"]["id"], events[4]["body"]["id"]);
    assert_eq!(events[1]["body"]["name"], json!("SQL Query Generation"));
    assert_eq!(events[2]["body"]["output"], json!("SELECT 1;"));
    assert_eq!(events[2]["body"]["level"], json!("DEFAULT"));
    assert_eq!(events[4]["body"]["level"], json!("ERROR"));

    let score = &events[5]["body"];
    assert_eq!(score["name"], json!("user-feedback"));
    assert_eq!(score["value"], json!(5));
    assert_eq!(score["comment"], json!("great"));
}

//! Trace recording for generation calls
//!
//! `Tracer::Active` ships events to a Langfuse ingestion endpoint from a
//! background task; `Tracer::Null` accepts the same calls and drops them.

use chrono::{SecondsFormat, Utc};
use log::{debug, error, info, trace, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Status recorded when a span closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStatus
{   Success
  , Error
}

impl SpanStatus
{   fn level(self) -> &'static str
    {   match self
        {   SpanStatus::Success => "DEFAULT"
          , SpanStatus::Error => "ERROR"
        }
    }
}

/// Handle to an open generation span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span
{   pub id: Uuid
}

// ===== Ingestion Events =====

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionEvent
{   pub id: Uuid
  , pub timestamp: String
  , #[serde(rename = "type")]
    pub kind: String
  , pub body: Value
}

impl IngestionEvent
{   fn new(kind: &str, body: Value) -> Self
    {   IngestionEvent
        {   id: Uuid::new_v4()
          , timestamp: now()
          , kind: kind.to_string()
          , body
        }
    }

    pub fn trace_create(trace_id: Uuid, name: &str) -> Self
    {   Self::new("trace-create", json!({
          "id": trace_id,
          "name": name,
          "timestamp": now(),
        }))
    }

    pub fn generation_create(
      span_id: Uuid
    , trace_id: Uuid
    , name: &str
    , model: &str
    , model_parameters: Value
    , input: Value
    ) -> Self
    {   Self::new("generation-create", json!({
          "id": span_id,
          "traceId": trace_id,
          "name": name,
          "startTime": now(),
          "model": model,
          "modelParameters": model_parameters,
          "input": input,
        }))
    }

    pub fn generation_update(
      span_id: Uuid
    , trace_id: Uuid
    , output: Option<&str>
    , status: SpanStatus
    , status_message: Option<&str>
    ) -> Self
    {   Self::new("generation-update", json!({
          "id": span_id,
          "traceId": trace_id,
          "endTime": now(),
          "output": output,
          "level": status.level(),
          "statusMessage": status_message,
        }))
    }

    pub fn score_create(
      trace_id: Uuid
    , name: &str
    , value: i64
    , comment: &str
    ) -> Self
    {   Self::new("score-create", json!({
          "id": Uuid::new_v4(),
          "traceId": trace_id,
          "name": name,
          "value": value,
          "comment": comment,
        }))
    }
}

fn now() -> String
{   Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ===== Langfuse Tracer Actor =====

/// Commands for the ingestion actor
pub enum TraceCommand
{   Record(IngestionEvent)
  , Flush
    {   reply: mpsc::UnboundedSender<()>
    }
  , Shutdown
    {   reply: mpsc::UnboundedSender<()>
    }
}

/// Ingestion actor state
struct IngestionState
{   endpoint: String
  , public_key: String
  , secret_key: String
  , batch_size: usize
  , buffer: Vec<IngestionEvent>
  , http_client: reqwest::Client
}

impl IngestionState
{   fn push(&mut self, event: IngestionEvent) -> bool
    {   trace!("Buffering {} event", event.kind);
        self.buffer.push(event);
        self.buffer.len() >= self.batch_size
    }

    /// Ship buffered events; failures are logged and the batch dropped
    async fn flush(&mut self)
    {   if self.buffer.is_empty()
        {   return;
        }
        let batch = std::mem::take(&mut self.buffer);
        debug!("Flushing {} trace events", batch.len());

        let result = self.http_client
          .post(&self.endpoint)
          .basic_auth(&self.public_key, Some(&self.secret_key))
          .json(&json!({ "batch": batch }))
          .send()
          .await;

        match result
        {   Ok(response) if response.status().is_success() => {
              trace!("Ingestion accepted: {}", response.status());
            }
          , Ok(response) => {
              let status = response.status();
              let text = response.text().await
                .unwrap_or_else(|_| "Unknown error".to_string());
              warn!("Ingestion rejected ({}): {}", status, text);
            }
          , Err(e) => {
              warn!("Ingestion request failed: {}", e);
            }
        }
    }
}

/// Active tracer; owns the session trace and the ingestion task
pub struct LangfuseTracer
{   trace_id: Uuid
  , model_name: String
  , tx: mpsc::UnboundedSender<TraceCommand>
  , task: tokio::task::JoinHandle<()>
}

impl LangfuseTracer
{   /// Create and spawn the ingestion task; must run inside a tokio runtime
    pub fn new(
      config: &crate::config::TracingConfig
    ) -> Result<Self, crate::error::Error>
    {   let public_key = config.public_key.clone().ok_or_else(|| {
          crate::error::Error::MissingApiKey(
            "Langfuse (public)".to_string()
          )
        })?;
        let secret_key = config.secret_key.clone().ok_or_else(|| {
          crate::error::Error::MissingApiKey(
            "Langfuse (secret)".to_string()
          )
        })?;

        let http_client = reqwest::Client::builder()
          .timeout(Duration::from_secs(10))
          .build()
          .map_err(|e| crate::error::Error::HttpError(e.to_string()))?;

        let state = IngestionState
        {   endpoint: format!(
              "{}/api/public/ingestion",
              config.host.trim_end_matches('/')
            )
          , public_key
          , secret_key
          , batch_size: config.batch_size.max(1)
          , buffer: Vec::new()
          , http_client
        };

        let trace_id = Uuid::now_v7();
        debug!("Creating LangfuseTracer with trace {}", trace_id);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let flush_interval
          = Duration::from_millis(config.flush_interval_ms.max(1));
        let task = tokio::spawn(async move {
          run_ingestion_loop(cmd_rx, state, flush_interval).await;
        });

        let tracer = LangfuseTracer
        {   trace_id
          , model_name: config.track_model_name.clone()
          , tx: cmd_tx
          , task
        };
        tracer.record(IngestionEvent::trace_create(
          trace_id, &config.trace_name
        ));
        Ok(tracer)
    }

    fn record(&self, event: IngestionEvent)
    {   if self.tx.send(TraceCommand::Record(event)).is_err()
        {   error!("Tracer task disconnected");
        }
    }

    async fn flush(&self)
    {   let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        if self.tx.send(TraceCommand::Flush { reply: reply_tx }).is_ok()
        {   let _ = reply_rx.recv().await;
        }
    }

    async fn shutdown(self) -> Result<(), crate::error::Error>
    {   debug!("Shutting down LangfuseTracer");
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();

        self.tx.send(TraceCommand::Shutdown { reply: reply_tx })
          .map_err(|_| {
            crate::error::Error::Other(
              "Tracer already shutdown".to_string()
            )
          })?;

        // Wait for the final flush
        if reply_rx.recv().await.is_none()
        {   error!("Tracer shutdown timeout");
            return Err(crate::error::Error::Timeout);
        }
        let _ = self.task.await;
        Ok(())
    }
}

/// Main ingestion loop
async fn run_ingestion_loop(
  mut cmd_rx: mpsc::UnboundedReceiver<TraceCommand>
, mut state: IngestionState
, flush_interval: Duration
)
{   debug!("Starting ingestion loop");
    let mut ticker = tokio::time::interval_at(
      tokio::time::Instant::now() + flush_interval
    , flush_interval
    );
    ticker.set_missed_tick_behavior(
      tokio::time::MissedTickBehavior::Delay
    );

    loop
    { tokio::select!
      { cmd = cmd_rx.recv() => match cmd
        {   Some(TraceCommand::Record(event)) => {
              if state.push(event)
              {   state.flush().await;
              }
            }
          , Some(TraceCommand::Flush { reply }) => {
              state.flush().await;
              let _ = reply.send(());
            }
          , Some(TraceCommand::Shutdown { reply }) => {
              state.flush().await;
              info!("Tracer shutting down");
              let _ = reply.send(());
              break;
            }
          , None => {
              debug!("Trace channel closed");
              state.flush().await;
              break;
            }
        }
      , _ = ticker.tick() => {
          state.flush().await;
        }
      }
    }
}

// ===== Tracer =====

/// Tracer selected once at startup
pub enum Tracer
{   Active(LangfuseTracer)
  , Null
}

impl Tracer
{   pub fn from_config(
      config: &crate::config::TracingConfig
    ) -> Result<Self, crate::error::Error>
    {   if config.enabled
        {   info!("Langfuse tracing enabled ({})", config.host);
            Ok(Tracer::Active(LangfuseTracer::new(config)?))
        } else
        {   debug!("Tracing disabled");
            Ok(Tracer::Null)
        }
    }

    pub fn is_active(&self) -> bool
    {   matches!(self, Tracer::Active(_))
    }

    /// Session trace id, if tracing
    pub fn trace_id(&self) -> Option<Uuid>
    {   match self
        {   Tracer::Active(t) => Some(t.trace_id)
          , Tracer::Null => None
        }
    }

    /// Open a span for one generation call
    pub fn start_generation(
      &self
    , name: &str
    , input: &crate::request::Substitutions
    , sampling: &crate::request::SamplingParams
    ) -> Span
    {   match self
        {   Tracer::Active(t) => {
              let id = Uuid::new_v4();
              t.record(IngestionEvent::generation_create(
                id
              , t.trace_id
              , name
              , &t.model_name
              , json!(sampling)
              , json!(input)
              ));
              Span { id }
            }
          , Tracer::Null => Span { id: Uuid::nil() }
        }
    }

    /// Close a span with its output and status
    pub fn end_generation(
      &self
    , span: Span
    , output: Option<&str>
    , status: SpanStatus
    , status_message: Option<&str>
    )
    {   if let Tracer::Active(t) = self
        {   t.record(IngestionEvent::generation_update(
              span.id, t.trace_id, output, status, status_message
            ));
        }
    }

    /// Attach a score to the current trace; best effort
    pub fn score(&self, value: i64, name: &str, comment: &str)
    {   match self
        {   Tracer::Active(t) => {
              debug!("Scoring trace {} ({}={})", t.trace_id, name, value);
              t.record(IngestionEvent::score_create(
                t.trace_id, name, value, comment
              ));
            }
          , Tracer::Null => debug!("Score dropped, tracing disabled")
        }
    }

    pub async fn flush(&self)
    {   if let Tracer::Active(t) = self
        {   t.flush().await;
        }
    }

    /// Flush outstanding events and stop the ingestion task
    pub async fn shutdown(self) -> Result<(), crate::error::Error>
    {   match self
        {   Tracer::Active(t) => t.shutdown().await
          , Tracer::Null => Ok(())
        }
    }
}

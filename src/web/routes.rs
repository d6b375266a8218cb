use axum::{
  extract::State,
  response::Html,
  routing::{get, post},
  Form, Router,
};
use log::{debug, info};
use serde::Deserialize;
use std::sync::Arc;

use super::pages;

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState
{   pub pipeline: Arc<crate::Pipeline>
}

#[derive(Debug, Deserialize)]
pub struct QueryForm
{   pub query: String
}

#[derive(Debug, Deserialize)]
pub struct FeedbackForm
{   pub rating: i64
  , #[serde(default)]
    pub comment: String
}

pub fn create_router(state: AppState) -> Router
{   Router::new()
      .route("/", get(index))
      .route("/process-query", post(process_query))
      .route("/submit-feedback", post(submit_feedback))
      .with_state(state)
}

async fn index() -> Html<String>
{   Html(pages::index_page())
}

async fn process_query(
  State(state): State<AppState>
, Form(form): Form<QueryForm>
) -> Html<String>
{   debug!("POST /process-query");
    let answer = state.pipeline.answer(&form.query).await;
    let columns = answer.columns();
    Html(pages::results_page(
      &form.query, &columns, &answer.message, &answer.records
    ))
}

async fn submit_feedback(
  State(state): State<AppState>
, Form(form): Form<FeedbackForm>
) -> Html<String>
{   info!("POST /submit-feedback rating={}", form.rating);
    state.pipeline.score_feedback(
      form.rating
    , crate::pipeline::FEEDBACK_SCORE_NAME
    , &form.comment
    );
    Html(pages::feedback_ack())
}

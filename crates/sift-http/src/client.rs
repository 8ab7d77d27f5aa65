//! Async HTTP client for the Cortex analyst endpoints.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use sift_core::{
  api::{
    ANALYST_ERROR_HEADLINE, ANALYST_MESSAGE_PATH, API_TIMEOUT, AnalystApi, DEFAULT_MODEL,
    FEEDBACK_PATH, GRAPH_PLAN_ERROR_HEADLINE, GRAPH_PLAN_PATH, MISSING_REQUEST_ID, Reply,
  },
  envelope::{Envelope, format_api_error},
  transcript::Transcript,
};

use crate::{Error, Result};

const TOKEN_TYPE_HEADER: &str = "X-Snowflake-Authorization-Token-Type";

/// Connection settings for the analyst API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
  /// Account URL, e.g. `https://myorg-myaccount.snowflakecomputing.com`.
  pub base_url:   String,
  /// Sent as `Authorization: Bearer <token>` when set.
  pub token:      Option<String>,
  /// Sent as `X-Snowflake-Authorization-Token-Type` when set.
  pub token_type: Option<String>,
  /// Model identifier for graph-plan requests.
  pub model:      String,
  pub timeout:    Duration,
}

impl ClientConfig {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      base_url:   base_url.into(),
      token:      None,
      token_type: None,
      model:      DEFAULT_MODEL.to_owned(),
      timeout:    API_TIMEOUT,
    }
  }
}

// ─── Request bodies ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GraphPlanRequest<'a> {
  messages: &'a Transcript,
  model:    &'a str,
}

#[derive(Serialize)]
struct AnalystMessageRequest<'a> {
  messages:            &'a Transcript,
  semantic_model_file: String,
}

#[derive(Serialize)]
struct FeedbackRequest<'a> {
  request_id:       &'a str,
  positive:         bool,
  feedback_message: &'a str,
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// HTTP implementation of [`AnalystApi`].
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct CortexClient {
  client: Client,
  config: ClientConfig,
}

impl CortexClient {
  pub fn new(config: ClientConfig) -> Result<Self> {
    if !(config.base_url.starts_with("http://") || config.base_url.starts_with("https://")) {
      return Err(Error::BaseUrl(config.base_url));
    }
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &ClientConfig { &self.config }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    let req = match &self.config.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    };
    match &self.config.token_type {
      Some(kind) => req.header(TOKEN_TYPE_HEADER, kind),
      None => req,
    }
  }

  /// POST `body` as JSON; returns the status and raw response text.
  async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<(u16, String), String> {
    let resp = self
      .auth(self.client.post(self.url(path)))
      .json(body)
      .send()
      .await
      .map_err(|e| e.to_string())?;
    let status = resp.status().as_u16();
    let text = resp.text().await.map_err(|e| e.to_string())?;
    tracing::debug!(path, status, bytes = text.len(), "analyst api responded");
    Ok((status, text))
  }

  /// Shared handling for the two planning endpoints: success is `< 400`.
  async fn planning_call<B: Serialize>(&self, path: &str, body: &B, headline: &str) -> Reply {
    let (status, text) = match self.post(path, body).await {
      Ok(r) => r,
      Err(cause) => {
        tracing::warn!(path, %cause, "analyst api unreachable");
        return Reply::failed(
          None,
          Envelope::default(),
          format!("🚨 {headline} 🚨\n\nPOST {path} request failed: {cause}"),
        );
      }
    };

    let parsed = serde_json::from_str::<Envelope>(&text);
    if status < 400 {
      match parsed {
        Ok(envelope) => {
          let reply = Reply::ok(status, envelope);
          if reply.has_request_id() {
            reply
          } else {
            tracing::warn!(path, status, "success response without request_id");
            Reply::failed(
              Some(status),
              reply.envelope,
              format!("🚨 {headline} 🚨\n\n{MISSING_REQUEST_ID} from {path} ({status})"),
            )
          }
        }
        Err(e) => Reply::failed(
          Some(status),
          Envelope::default(),
          format!("🚨 {headline} 🚨\n\nMalformed response from {path} ({status}): {e}"),
        ),
      }
    } else {
      let envelope = parsed.unwrap_or_default();
      let error = format_api_error(headline, status, &envelope);
      tracing::warn!(path, status, request_id = ?envelope.request_id, "analyst api error");
      Reply::failed(Some(status), envelope, error)
    }
  }
}

impl AnalystApi for CortexClient {
  /// `POST /api/v2/cortex/inference:complete`
  async fn create_graph_plan(&self, transcript: &Transcript) -> Reply {
    let body = GraphPlanRequest {
      messages: transcript,
      model:    &self.config.model,
    };
    self
      .planning_call(GRAPH_PLAN_PATH, &body, GRAPH_PLAN_ERROR_HEADLINE)
      .await
  }

  /// `POST /api/v2/cortex/analyst/message`
  async fn analyst_message(&self, transcript: &Transcript, semantic_model_path: &str) -> Reply {
    let body = AnalystMessageRequest {
      messages:            transcript,
      semantic_model_file: format!("@{semantic_model_path}"),
    };
    self
      .planning_call(ANALYST_MESSAGE_PATH, &body, ANALYST_ERROR_HEADLINE)
      .await
  }

  /// `POST /api/v2/cortex/analyst/feedback` — only `200` counts as accepted.
  async fn submit_feedback(
    &self,
    request_id: &str,
    positive: bool,
    message: &str,
  ) -> Option<String> {
    let body = FeedbackRequest {
      request_id,
      positive,
      feedback_message: message,
    };
    match self.post(FEEDBACK_PATH, &body).await {
      Ok((200, _)) => None,
      Ok((status, text)) => {
        let envelope = serde_json::from_str::<Envelope>(&text).unwrap_or_default();
        Some(format_api_error(ANALYST_ERROR_HEADLINE, status, &envelope))
      }
      Err(cause) => Some(format!(
        "🚨 {ANALYST_ERROR_HEADLINE} 🚨\n\nPOST {FEEDBACK_PATH} request failed: {cause}"
      )),
    }
  }
}

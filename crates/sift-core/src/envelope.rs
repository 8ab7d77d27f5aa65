//! The parsed JSON body of an analyst API response.
//!
//! Success and failure share one shape so that a failed call still yields a
//! usable `request_id`:
//!
//! ```json
//! { "message": { "content": [ ... ] }, "request_id": "...", "warnings": [ ... ] }
//! { "request_id": "...", "error_code": "...", "message": "..." }
//! ```

use serde::{Deserialize, Serialize};

use crate::message::ContentBlock;

/// A non-fatal notice returned alongside a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
  pub message: String,
}

impl Warning {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// The `message` field: structured content on success, a string on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvelopeMessage {
  Content {
    #[serde(default)]
    content: Vec<ContentBlock>,
  },
  Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
  #[serde(default)]
  pub message:    Option<EnvelopeMessage>,
  #[serde(default)]
  pub request_id: Option<String>,
  #[serde(default)]
  pub error_code: Option<String>,
  #[serde(default)]
  pub warnings:   Vec<Warning>,
}

impl Envelope {
  /// Content blocks of a successful response; empty when absent.
  pub fn content(&self) -> &[ContentBlock] {
    match &self.message {
      Some(EnvelopeMessage::Content { content }) => content,
      _ => &[],
    }
  }

  /// The human-readable error message of a failed response.
  pub fn error_message(&self) -> Option<&str> {
    match &self.message {
      Some(EnvelopeMessage::Text(m)) => Some(m),
      _ => None,
    }
  }
}

/// Build the readable error shown in place of an analyst answer.
///
/// Fields missing from the envelope are shown as `unknown`.
pub fn format_api_error(headline: &str, status: u16, envelope: &Envelope) -> String {
  let request_id = envelope.request_id.as_deref().unwrap_or("unknown");
  let error_code = envelope.error_code.as_deref().unwrap_or("unknown");
  let message = envelope.error_message().unwrap_or("unknown");
  format!(
    "🚨 {headline} 🚨\n\n\
     * response code: `{status}`\n\
     * request-id: `{request_id}`\n\
     * error code: `{error_code}`\n\n\
     Message:\n```\n{message}\n```"
  )
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn success_envelope() {
    let env: Envelope = serde_json::from_value(json!({
      "message": { "content": [{ "type": "text", "text": "hi" }] },
      "request_id": "r2",
      "warnings": [{ "message": "partial data" }]
    }))
    .unwrap();
    assert_eq!(env.content(), &[ContentBlock::text("hi")]);
    assert_eq!(env.request_id.as_deref(), Some("r2"));
    assert_eq!(env.warnings, vec![Warning::new("partial data")]);
    assert!(env.error_message().is_none());
  }

  #[test]
  fn failure_envelope_formats_all_fields() {
    let env: Envelope = serde_json::from_value(json!({
      "request_id": "r1", "error_code": "E1", "message": "bad"
    }))
    .unwrap();
    assert!(env.content().is_empty());

    let msg = format_api_error("An Analyst API error has occurred", 500, &env);
    assert!(msg.contains("`500`"));
    assert!(msg.contains("`r1`"));
    assert!(msg.contains("`E1`"));
    assert!(msg.contains("bad"));
  }

  #[test]
  fn missing_fields_render_as_unknown() {
    let msg = format_api_error("oops", 502, &Envelope::default());
    assert!(msg.contains("request-id: `unknown`"));
    assert!(msg.contains("error code: `unknown`"));
  }
}

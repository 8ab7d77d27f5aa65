//! Message types — the unit of conversation exchanged with the analyst API.
//!
//! A [`Turn`] is one entry in the transcript. Its content is a list of
//! [`ContentBlock`]s, tagged on the wire by a string `type` field. Block types
//! this crate does not understand are kept verbatim so that they are resent
//! unchanged as conversation context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

// ─── Role ────────────────────────────────────────────────────────────────────

/// Who authored a turn.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  System,
  User,
  Analyst,
}

// ─── Verified queries ────────────────────────────────────────────────────────

/// A human-vetted query the planner cited as the basis for generated SQL.
///
/// Individual fields degrade to empty values when the API omits them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedQuery {
  #[serde(default, deserialize_with = "null_as_default")]
  pub name:        String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub question:    String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub verified_by: String,
  /// Unix timestamp in seconds.
  #[serde(default, deserialize_with = "lenient_timestamp")]
  pub verified_at: i64,
  #[serde(default, deserialize_with = "null_as_default")]
  pub sql:         String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Whole seconds from an integer, a float, or numeric text. Anything else
/// is treated as absent.
fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
  let seconds = match Value::deserialize(deserializer)? {
    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_seconds)),
    Value::String(s) => s.trim().parse::<f64>().ok().and_then(whole_seconds),
    _ => None,
  };
  Ok(seconds.unwrap_or_default())
}

fn whole_seconds(f: f64) -> Option<i64> {
  (f.is_finite() && f.abs() < i64::MAX as f64).then(|| f.trunc() as i64)
}

impl VerifiedQuery {
  /// `verified_at` as a UTC timestamp, if it is in range.
  pub fn verified_at_utc(&self) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(self.verified_at, 0)
  }
}

/// Provenance attached to a generated SQL statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlConfidence {
  /// `None` means no verified query was used.
  #[serde(default)]
  pub verified_query_used: Option<VerifiedQuery>,
}

// ─── Content blocks ──────────────────────────────────────────────────────────

/// One typed unit of displayable content within a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
  Text {
    text: String,
  },
  Suggestions {
    suggestions: Vec<String>,
  },
  Sql {
    statement:  String,
    confidence: Option<SqlConfidence>,
  },
  /// A block of a type this crate does not know, or a known type whose
  /// required fields are missing. Kept verbatim; renders as nothing.
  Unknown(Value),
}

impl ContentBlock {
  /// Shorthand for a `text` block.
  pub fn text(text: impl Into<String>) -> Self {
    Self::Text { text: text.into() }
  }

  /// The wire discriminant (`"text"`, `"sql"`, …), if known.
  pub fn discriminant(&self) -> Option<&str> {
    match self {
      Self::Text { .. } => Some("text"),
      Self::Suggestions { .. } => Some("suggestions"),
      Self::Sql { .. } => Some("sql"),
      Self::Unknown(v) => v.get("type").and_then(Value::as_str),
    }
  }
}

/// Wire mirror of the known variants.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Tagged {
  Text {
    text: String,
  },
  Suggestions {
    suggestions: Vec<String>,
  },
  Sql {
    statement:  String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    confidence: Option<SqlConfidence>,
  },
}

/// Read side of [`Tagged`]: `confidence` is decoded on its own so that a
/// malformed one only drops the provenance, never the statement.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaggedIn {
  Text {
    text: String,
  },
  Suggestions {
    suggestions: Vec<String>,
  },
  Sql {
    statement:  String,
    #[serde(default)]
    confidence: Option<Value>,
  },
}

impl Serialize for ContentBlock {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let tagged = match self {
      Self::Unknown(raw) => return raw.serialize(serializer),
      Self::Text { text } => Tagged::Text { text: text.clone() },
      Self::Suggestions { suggestions } => Tagged::Suggestions {
        suggestions: suggestions.clone(),
      },
      Self::Sql {
        statement,
        confidence,
      } => Tagged::Sql {
        statement:  statement.clone(),
        confidence: confidence.clone(),
      },
    };
    tagged.serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for ContentBlock {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    Ok(match serde_json::from_value::<TaggedIn>(raw.clone()) {
      Ok(TaggedIn::Text { text }) => Self::Text { text },
      Ok(TaggedIn::Suggestions { suggestions }) => Self::Suggestions { suggestions },
      Ok(TaggedIn::Sql {
        statement,
        confidence,
      }) => Self::Sql {
        statement,
        confidence: confidence
          .filter(|v| !v.is_null())
          .and_then(|v| match serde_json::from_value(v) {
            Ok(c) => Some(c),
            Err(e) => {
              tracing::debug!(error = %e, "ignoring malformed sql confidence");
              None
            }
          }),
      },
      Err(_) => Self::Unknown(raw),
    })
  }
}

// ─── Turn ────────────────────────────────────────────────────────────────────

/// One entry in the conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
  pub role:       Role,
  pub content:    Vec<ContentBlock>,
  /// Correlates an analyst turn with its remote call, for feedback.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub request_id: Option<String>,
}

impl Turn {
  /// A system turn holding a single text block.
  pub fn system(prompt: impl Into<String>) -> Self {
    Self {
      role:       Role::System,
      content:    vec![ContentBlock::text(prompt)],
      request_id: None,
    }
  }

  /// A user turn holding a single text block.
  pub fn user(input: impl Into<String>) -> Self {
    Self {
      role:       Role::User,
      content:    vec![ContentBlock::text(input)],
      request_id: None,
    }
  }

  /// An analyst turn with the given content.
  pub fn analyst(content: Vec<ContentBlock>, request_id: Option<String>) -> Self {
    Self {
      role: Role::Analyst,
      content,
      request_id,
    }
  }
}

//! Runtime settings: config file, then `SIFT_*` environment, then CLI flags.

use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use serde::Deserialize;
use sift_core::{
  api::{API_TIMEOUT, DEFAULT_MODEL},
  orchestrator::{DEFAULT_OPENING_QUESTION, Planner},
};

/// Warehouse path meaning "in-memory database".
pub const IN_MEMORY: &str = ":memory:";

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You translate questions about graph-shaped data into a single SQL statement.

- Answer with SQL only, no prose and no code fences.
- Pick the graph algorithm that fits the question: centrality for importance, \
community detection for clusters, shortest path for routes, similarity or \
embeddings for likeness.
- Use only the node and relationship tables and columns described in the \
semantic model. Qualify table names fully.
- If the data needed for the request is not described, say which table or \
column is missing instead of guessing.";

/// Shape of the config file and environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub base_url:         String,
  pub token:            Option<String>,
  pub token_type:       Option<String>,
  pub model:            String,
  pub planner:          Planner,
  /// `DB.SCHEMA.STAGE/file.yaml` paths.
  pub semantic_models:  Vec<String>,
  pub warehouse:        String,
  pub warehouse_init:   Option<PathBuf>,
  pub system_prompt:    String,
  pub opening_question: String,
  pub log_file:         Option<PathBuf>,
  pub timeout_ms:       u64,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      base_url:         "http://localhost:8080".into(),
      token:            None,
      token_type:       None,
      model:            DEFAULT_MODEL.into(),
      planner:          Planner::default(),
      semantic_models:  Vec::new(),
      warehouse:        IN_MEMORY.into(),
      warehouse_init:   None,
      system_prompt:    DEFAULT_SYSTEM_PROMPT.into(),
      opening_question: DEFAULT_OPENING_QUESTION.into(),
      log_file:         None,
      timeout_ms:       API_TIMEOUT.as_millis() as u64,
    }
  }
}

impl Settings {
  /// Layer an optional TOML file under `SIFT_*` environment variables.
  pub fn load(file: Option<&std::path::Path>) -> anyhow::Result<Self> {
    let mut builder = config::Config::builder();
    if let Some(path) = file {
      builder = builder.add_source(config::File::from(path).required(false));
    }
    builder = builder.add_source(
      config::Environment::with_prefix("SIFT")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("semantic_models"),
    );
    builder
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }

  pub fn in_memory_warehouse(&self) -> bool { self.warehouse == IN_MEMORY }
}

#[cfg(test)]
mod tests {
  use config::{Config, File, FileFormat};

  use super::*;

  fn from_toml(raw: &str) -> Settings {
    Config::builder()
      .add_source(File::from_str(raw, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_file_gives_defaults() {
    let s = from_toml("");
    assert_eq!(s.model, "mistral-large2");
    assert_eq!(s.planner, Planner::GraphPlan);
    assert_eq!(s.timeout(), Duration::from_secs(50));
    assert!(s.in_memory_warehouse());
    assert_eq!(s.opening_question, "What questions can I ask?");
  }

  #[test]
  fn file_values_override_defaults() {
    let s = from_toml(
      r#"
        base_url = "https://acme.snowflakecomputing.com"
        planner = "analyst_message"
        semantic_models = ["DB.S.STAGE/a.yaml", "DB.S.STAGE/b.yml"]
        warehouse = "/tmp/wh.db"
      "#,
    );
    assert_eq!(s.planner, Planner::AnalystMessage);
    assert_eq!(s.semantic_models.len(), 2);
    assert!(!s.in_memory_warehouse());
  }
}

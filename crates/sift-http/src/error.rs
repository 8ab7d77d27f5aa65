//! Error type for `sift-http`. Only client construction can fail.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build HTTP client: {0}")]
  Build(#[from] reqwest::Error),

  #[error("invalid base url {0:?}")]
  BaseUrl(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

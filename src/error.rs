//! Error taxonomy for a download run.
//!
//! Per-item errors (`ItemError`) are caught by the queue runners and decide whether an
//! item is retried; everything in `PipelineError` ends the run.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("request to {url} failed: {source}")]
  Network {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{url} answered with HTTP {status}")]
  Status { url: String, status: u16 },

  #[error("response body of {url} was cut short: {source}")]
  Transfer {
    url: String,
    #[source]
    source: io::Error,
  },

  #[error("could not write response body of {url}: {source}")]
  Io {
    url: String,
    #[source]
    source: io::Error,
  },
}

impl FetchError {
  /// Transport failures, timeouts, 5xx and 429 are worth another attempt.
  pub fn is_transient(&self) -> bool {
    match self {
      FetchError::Network { .. } | FetchError::Transfer { .. } => true,
      FetchError::Status { status, .. } => *status == 429 || *status >= 500,
      FetchError::Io { .. } => false,
    }
  }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
  #[error("document could not be parsed as HTML")]
  Html,

  #[error("page has no {0}")]
  MissingElement(&'static str),
}

/// Why a single queue item failed.
#[derive(Debug, Error)]
pub enum ItemError {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error(transparent)]
  Parse(#[from] ParseError),

  #[error("record has no download link")]
  NoDownloadLink,

  #[error("could not save {path}: {source}")]
  Save {
    path: String,
    #[source]
    source: io::Error,
  },
}

impl ItemError {
  pub fn is_transient(&self) -> bool {
    match self {
      ItemError::Fetch(e) => e.is_transient(),
      ItemError::Parse(_) | ItemError::NoDownloadLink | ItemError::Save { .. } => false,
    }
  }
}

#[derive(Debug, Error)]
pub enum CacheError {
  #[error("cache file {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("cache file {path} is not a valid record list: {source}")]
  Json {
    path: String,
    #[source]
    source: serde_json::Error,
  },
}

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("number of articles ({found}) does not match the reported result count ({expected})")]
  CountMismatch { expected: usize, found: usize },

  #[error("search request failed: {0}")]
  Search(#[source] ItemError),

  #[error(transparent)]
  Cache(#[from] CacheError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Prompt(#[from] PromptError),

  #[error("{context}: {source}")]
  Io {
    context: String,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("{var} must be a positive integer, got {value:?}")]
  InvalidNumber { var: &'static str, value: String },

  #[error("could not determine the working directory")]
  NoHome,
}

#[derive(Debug, Error)]
pub enum PromptError {
  #[error("search term must match [A-Za-z0-9-: ]{{1,128}}, got {0:?}")]
  InvalidSearchTerm(String),

  #[error("input closed before a valid search term was entered")]
  EndOfInput,

  #[error("terminal i/o failed: {0}")]
  Io(#[from] io::Error),
}

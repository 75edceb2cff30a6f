//! Error taxonomy shared by the engine, the repositories and the HTTP layer.

use serde::Serialize;
use thiserror::Error;

/// Which external collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collaborator {
  Persistence,
  Rating,
  History,
  Notification,
}

impl std::fmt::Display for Collaborator {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Collaborator::Persistence => write!(f, "persistence"),
      Collaborator::Rating => write!(f, "rating"),
      Collaborator::History => write!(f, "history"),
      Collaborator::Notification => write!(f, "notification"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
  /// Bad shape or size, detected before anything is written.
  #[error("validation error: {0}")]
  Validation(String),
  /// A result that cannot be applied to the addressed match.
  #[error("invalid result: {0}")]
  InvalidResult(String),
  /// The stored graph violates its own wiring. Should be unreachable.
  #[error("inconsistent bracket: {0}")]
  InconsistentBracket(String),
  #[error("{collaborator} collaborator failed: {detail}")]
  Collaborator {
    collaborator: Collaborator,
    detail: String,
  },
}

impl EngineError {
  pub fn validation(detail: impl Into<String>) -> Self {
    Self::Validation(detail.into())
  }

  pub fn invalid_result(detail: impl Into<String>) -> Self {
    Self::InvalidResult(detail.into())
  }

  pub fn inconsistent(detail: impl Into<String>) -> Self {
    Self::InconsistentBracket(detail.into())
  }

  pub fn collaborator(collaborator: Collaborator, detail: impl Into<String>) -> Self {
    Self::Collaborator {
      collaborator,
      detail: detail.into(),
    }
  }

  pub fn persistence(detail: impl Into<String>) -> Self {
    Self::collaborator(Collaborator::Persistence, detail)
  }

  /// Stable machine-readable kind, used in HTTP error bodies.
  pub fn kind(&self) -> &'static str {
    match self {
      EngineError::Validation(_) => "validation",
      EngineError::InvalidResult(_) => "invalid_result",
      EngineError::InconsistentBracket(_) => "inconsistent_bracket",
      EngineError::Collaborator { .. } => "collaborator",
    }
  }
}

pub type EngineResult<T> = Result<T, EngineError>;

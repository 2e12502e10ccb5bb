use std::io;

use thiserror::Error;

/// Failures of the ingestion / merge / filter pipeline.
///
/// Each variant maps to one recovery policy: a `Transport` or `Parse` failure
/// leaves the session with an empty dataset, a `Join` failure keeps the
/// unenriched officials, and a `Filter` failure shows nothing.
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("download from {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("could not parse {dataset}: {reason}")]
    Parse { dataset: String, reason: String },
    #[error("could not merge town coordinates: {reason}")]
    Join { reason: String },
    #[error("could not apply filters: {reason}")]
    Filter { reason: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ExplorerError {
    pub fn transport(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(dataset: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            dataset: dataset.into(),
            reason: reason.to_string(),
        }
    }

    pub fn join(reason: impl ToString) -> Self {
        Self::Join {
            reason: reason.to_string(),
        }
    }

    pub fn filter(reason: impl ToString) -> Self {
        Self::Filter {
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExplorerError>;

/// Result of an operation that never fails outright.
///
/// `Degraded` carries the fallback value together with the reason it was
/// produced, so "no rows matched" and "the load failed" stay distinguishable.
#[derive(Debug)]
pub enum Outcome<T> {
    Complete(T),
    Degraded { value: T, error: ExplorerError },
}

impl<T> Outcome<T> {
    /// Turn a strict result into an outcome, using `fallback` on failure.
    pub fn recover(result: Result<T>, fallback: impl FnOnce() -> T) -> Self {
        match result {
            Ok(value) => Outcome::Complete(value),
            Err(error) => Outcome::Degraded {
                value: fallback(),
                error,
            },
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Complete(value) | Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Complete(value) | Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn error(&self) -> Option<&ExplorerError> {
        match self {
            Outcome::Complete(_) => None,
            Outcome::Degraded { error, .. } => Some(error),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn into_parts(self) -> (T, Option<ExplorerError>) {
        match self {
            Outcome::Complete(value) => (value, None),
            Outcome::Degraded { value, error } => (value, Some(error)),
        }
    }
}

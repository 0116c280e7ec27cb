use thiserror::Error;

/// Failures the session layer turns into user-visible outcomes.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("analysis failed: {0}")]
    Analysis(String),
    #[error("remote analysis failed: {0}")]
    Remote(#[source] anyhow::Error),
    #[error("remote response is missing '{0}'")]
    MissingField(&'static str),
    #[error("could not store record: {0}")]
    Storage(#[source] anyhow::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

use thiserror::Error;

/// Errors surfaced by the learner crates.
///
/// Most failures are recoverable control flow: parse errors skip the
/// offending rule, illegal rules are discarded, evaluation errors drop the
/// affected sample. Only persistence I/O is reported upward, and it aborts
/// only the persistence step.
#[derive(Debug, Error)]
pub enum CerError {
    #[error("parse error in `{text}`: {message}")]
    Parse { text: String, message: String },

    #[error("illegal rule: {0}")]
    IllegalRule(String),

    #[error("predicate `{predicate}` does not match its schema declaration: {message}")]
    SchemaMismatch { predicate: String, message: String },

    #[error("unknown domain `{0}`")]
    UnknownDomain(String),

    #[error("query engine failure: {0}")]
    Query(String),

    #[error("policy evaluation failed: {0}")]
    Evaluation(String),

    #[error("malformed generator file: {0}")]
    Persist(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CerError {
    pub fn parse(text: impl Into<String>, message: impl Into<String>) -> Self {
        CerError::Parse {
            text: text.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CerError>;

/// Result alias that carries the custom [`EmotiveError`] type.
pub type Result<T> = std::result::Result<T, EmotiveError>;

/// Common error type for the core crate.
///
/// Only caller mistakes end up here. Degraded-but-fine situations such as an
/// exhausted particle pool or a full gesture queue are reported through
/// counters and outcome enums instead.
#[derive(Debug, thiserror::Error)]
pub enum EmotiveError {
    #[error("unknown emotion `{id}` (valid: {})", valid.join(", "))]
    UnknownEmotion { id: String, valid: Vec<String> },
    #[error("unknown undertone `{id}` (valid: {})", valid.join(", "))]
    UnknownUndertone { id: String, valid: Vec<String> },
    #[error("unknown gesture `{id}` (valid: {})", valid.join(", "))]
    UnknownGesture { id: String, valid: Vec<String> },
    #[error("unknown shape `{id}` (valid: {})", valid.join(", "))]
    UnknownShape { id: String, valid: Vec<String> },
    /// Tempo must be a finite, strictly positive BPM value.
    #[error("invalid tempo {0} bpm: tempo must be finite and greater than zero")]
    InvalidTempo(f32),
    /// A definition handed to `register` failed schema validation.
    #[error("invalid {kind} definition `{id}`: {reason}")]
    InvalidDefinition {
        kind: &'static str,
        id: String,
        reason: String,
    },
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Message(String),
}

impl EmotiveError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn invalid(kind: &'static str, id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            kind,
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&str> for EmotiveError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for EmotiveError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

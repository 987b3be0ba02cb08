use thiserror::Error;

/// Failure of one of the semester endpoints.
///
/// Cloneable so a single failed request can be handed to every caller
/// that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The endpoint answered, but with an error message meant for the user.
    #[error("{0}")]
    Rejected(String),

    #[error("semester service unreachable: {0}")]
    Unreachable(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Message to show to the user. Only a message sent by the backend is
    /// surfaced verbatim, anything else falls back to `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            FetchError::Rejected(message) if !message.trim().is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

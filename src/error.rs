use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Text shown in place of the answer when the user stops a response.
pub const STOPPED_MESSAGE: &str = "Response generation stopped.";

#[derive(Debug, Clone, Error)]
pub enum ChatError {
    /// The endpoint answered with a non-success status.
    #[error("{0}")]
    Api(String),

    /// Network failure or a body we could not make sense of.
    #[error("{0}")]
    Transport(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("could not read attachment {}: {source}", path.display())]
    AttachmentRead {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl ChatError {
    /// Text to render in place of the bot's answer.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Cancelled => STOPPED_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChatError::Cancelled)
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_uses_fixed_text() {
        assert_eq!(ChatError::Cancelled.user_message(), STOPPED_MESSAGE);
        assert!(ChatError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_api_message_is_verbatim() {
        let err = ChatError::Api("API key not valid".to_string());
        assert_eq!(err.user_message(), "API key not valid");
        assert!(!err.is_cancelled());
    }
}

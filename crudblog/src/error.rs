use thiserror::Error;

use crate::message::GraphQLError;

/// Result type alias for crudblog operations
pub type Result<T> = std::result::Result<T, BlogError>;

/// Error types for the blog client
#[derive(Error, Debug)]
pub enum BlogError {
    /// The request never produced a response (DNS, connect, TLS, timeout)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered but rejected the request
    #[error("API error{}: {}", status_suffix(.status), join_messages(.errors))]
    Api {
        /// HTTP status when the rejection came from the transport layer
        status: Option<u16>,
        errors: Vec<GraphQLError>,
    },

    /// Payload serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sign-in rejected or token unusable
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A mutation was attempted without an authenticated session
    #[error("Sign in to create, update or delete posts")]
    NotAuthenticated,

    /// The signed-in user does not own the post
    #[error("Post '{post_id}' belongs to another user")]
    Forbidden { post_id: String },

    /// Post not present in the local list
    #[error("Post '{post_id}' not found")]
    NotFound { post_id: String },

    /// Local I/O errors (session file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

fn join_messages(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "no details".to_string();
    }
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<config::ConfigError> for BlogError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl BlogError {
    /// Create an API error from a single message
    pub fn api_error<T: ToString>(message: T) -> Self {
        Self::Api {
            status: None,
            errors: vec![GraphQLError::new(message)],
        }
    }

    /// Create an API error for a non-success HTTP status
    pub fn http_status<T: ToString>(status: u16, body: T) -> Self {
        Self::Api {
            status: Some(status),
            errors: vec![GraphQLError::new(body)],
        }
    }

    /// Create a new config error
    pub fn config_error<T: ToString>(message: T) -> Self {
        Self::Config(message.to_string())
    }

    /// Create a new auth error
    pub fn auth_error<T: ToString>(message: T) -> Self {
        Self::Auth(message.to_string())
    }

    /// Check if error is recoverable (worth retrying by the user)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => !e.is_builder(),
            Self::Api { status: Some(s), .. } => *s >= 500 || *s == 429,
            _ => false,
        }
    }

    /// Check if the backend refused the caller's credentials
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Api { status: Some(401 | 403), .. } => true,
            Self::Api { errors, .. } => errors.iter().any(GraphQLError::is_unauthorized),
            Self::NotAuthenticated => true,
            _ => false,
        }
    }
}

use thiserror::Error;

/// A convenience `Result` alias using [`BridgeError`].
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Top-level error type for the bridge.
///
/// Variants carrying a subsystem name are per-operation failures that the
/// caller logs and moves past. [`BridgeError::AuthRejected`] and
/// [`BridgeError::TeamNotFound`] are fatal, [`BridgeError::Transient`] is
/// retried with backoff.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Credentials or session token were refused by the remote server.
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    /// The configured team does not exist for the logged-in user.
    #[error("Team not found: {0}")]
    TeamNotFound(String),

    /// A network-level failure that is worth retrying.
    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IRC error: {0}")]
    Irc(String),

    #[error("Mattermost error: {0}")]
    Remote(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Media lookup error: {0}")]
    Media(String),

    /// An in-process queue between bridge tasks was closed.
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the operation that produced this error should be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Transient(_) | BridgeError::Io(_))
    }

    /// Whether this error must abort the bridge instead of being retried or logged.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::AuthRejected(_) | BridgeError::TeamNotFound(_) | BridgeError::Config(_)
        )
    }
}

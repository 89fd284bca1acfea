//! Error types for the session layer.

/// Errors that can occur while persisting or restoring a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Reading or writing the session file failed.
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The session file could not be (de)serialised.
    #[error("session store format error: {0}")]
    Json(#[from] serde_json::Error),
}

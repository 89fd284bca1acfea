//! Saving and restoring sessions across process restarts.
//!
//! A SLOW peer keeps a session alive for its TTL even after the client
//! goes away. Persisting the [`Session`] lets a new process present the
//! same id and sequence numbers and revive it instead of opening a fresh
//! one.
//!
//! The file is JSON. A restored session is always [`ConnectionState::Idle`]
//! with nothing in flight: whatever was outstanding belonged to the old
//! process's retransmission queue, which is gone.

use std::path::Path;

use crate::{ConnectionState, Session, SessionError};

/// Writes `session` to `path`, replacing any existing file.
pub fn save(session: &Session, path: impl AsRef<Path>) -> Result<(), SessionError> {
    let path = path.as_ref();
    let json = serde_json::to_vec_pretty(session)?;
    std::fs::write(path, json)?;
    tracing::debug!(
        path = %path.display(),
        session_id = %session.session_id,
        "session saved"
    );
    Ok(())
}

/// Reads a session previously written by [`save`].
///
/// The result is never established; call revive to resume it.
pub fn load(path: impl AsRef<Path>) -> Result<Session, SessionError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let mut session: Session = serde_json::from_slice(&bytes)?;
    session.state = ConnectionState::Idle;
    session.bytes_in_flight = 0;
    tracing::debug!(
        path = %path.display(),
        session_id = %session.session_id,
        "session loaded"
    );
    Ok(session)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use slow_protocol::SessionId;

    use super::*;
    use crate::SessionConfig;

    /// A unique path under the system temp dir, removed on drop.
    struct TempFile(PathBuf);

    impl TempFile {
        fn new(name: &str) -> Self {
            let unique = format!("slow-{}-{}-{name}.json", std::process::id(), SessionId::random_v8());
            Self(std::env::temp_dir().join(unique))
        }
    }

    impl Drop for TempFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn test_save_then_load_restores_identity_and_counters() {
        let file = TempFile::new("roundtrip");
        let mut session = Session::new(&SessionConfig::default());
        session.session_id = SessionId::random_v8();
        session.local_seq = 120;
        session.peer_seq = 99;
        session.session_ttl = 3000;
        session.peer_window = 4096;

        save(&session, &file.0).expect("save should succeed");
        let loaded = load(&file.0).expect("load should succeed");

        assert_eq!(loaded, session);
    }

    #[test]
    fn test_load_resets_liveness() {
        let file = TempFile::new("liveness");
        let mut session = Session::new(&SessionConfig::default());
        session.session_id = SessionId::random_v8();
        session.state = ConnectionState::Established;
        session.bytes_in_flight = 512;

        save(&session, &file.0).unwrap();
        let loaded = load(&file.0).unwrap();

        assert_eq!(loaded.state, ConnectionState::Idle);
        assert_eq!(loaded.bytes_in_flight, 0);
        assert_eq!(loaded.session_id, session.session_id);
    }

    #[test]
    fn test_load_missing_file_returns_io_error() {
        let file = TempFile::new("missing");
        let result = load(&file.0);
        assert!(matches!(result, Err(SessionError::Io(_))));
    }

    #[test]
    fn test_load_garbage_returns_json_error() {
        let file = TempFile::new("garbage");
        std::fs::write(&file.0, b"not json").unwrap();
        let result = load(&file.0);
        assert!(matches!(result, Err(SessionError::Json(_))));
    }
}

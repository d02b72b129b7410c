use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use chatpilot_core_types::ClientId;

use crate::error::SessionError;

/// Filesystem home for one browser profile, keyed by an optional client id.
/// The directory is created before launch, never mutated by this layer, and
/// removed only on explicit logout.
#[derive(Clone, Debug)]
pub struct SessionStore {
    base_dir: PathBuf,
    client_id: Option<ClientId>,
}

impl SessionStore {
    pub const DEFAULT_BASE_DIR: &'static str = "./.chatpilot";

    pub fn new(
        base_dir: impl Into<PathBuf>,
        client_id: Option<ClientId>,
    ) -> Result<Self, SessionError> {
        if let Some(id) = &client_id {
            if !id.is_valid() {
                return Err(SessionError::InvalidClientId(id.0.clone()));
            }
        }
        Ok(Self {
            base_dir: base_dir.into(),
            client_id,
        })
    }

    pub fn with_defaults(client_id: Option<ClientId>) -> Result<Self, SessionError> {
        Self::new(Self::DEFAULT_BASE_DIR, client_id)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `<base>/session` or `<base>/session-<client_id>`; unique per client id.
    pub fn profile_dir(&self) -> PathBuf {
        let leaf = match &self.client_id {
            Some(id) => format!("session-{id}"),
            None => "session".to_string(),
        };
        self.base_dir.join(leaf)
    }

    pub fn exists(&self) -> bool {
        self.profile_dir().is_dir()
    }

    /// Create the profile directory (recursively) ahead of a launch.
    pub async fn ensure(&self) -> Result<PathBuf, SessionError> {
        let dir = self.profile_dir();
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "session profile ready");
        Ok(dir)
    }

    /// Remove the profile directory recursively. Missing directories are not
    /// an error; logout must be repeatable.
    pub async fn remove(&self) -> Result<(), SessionError> {
        let dir = self.profile_dir();
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(dir = %dir.display(), "session profile removed");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn profile_dir_is_keyed_by_client_id() {
        let plain = SessionStore::new("/tmp/base", None).unwrap();
        assert_eq!(plain.profile_dir(), PathBuf::from("/tmp/base/session"));

        let keyed =
            SessionStore::new("/tmp/base", Some(ClientId("bot-7".to_string()))).unwrap();
        assert_eq!(keyed.profile_dir(), PathBuf::from("/tmp/base/session-bot-7"));
    }

    #[test]
    fn rejects_unsafe_client_ids() {
        let err = SessionStore::new("/tmp/base", Some(ClientId("../up".to_string())));
        assert!(matches!(err, Err(SessionError::InvalidClientId(_))));
    }

    #[tokio::test]
    async fn ensure_then_remove_round_trips() {
        let base = tempdir().unwrap();
        let store =
            SessionStore::new(base.path(), Some(ClientId("t1".to_string()))).unwrap();

        assert!(!store.exists());
        let dir = store.ensure().await.unwrap();
        assert!(dir.is_dir());
        assert!(store.exists());

        store.remove().await.unwrap();
        assert!(!store.exists());
        // removing again is a no-op, not an error
        store.remove().await.unwrap();
    }
}

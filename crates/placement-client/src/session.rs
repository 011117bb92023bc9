//! Session context: who is logged in, and with which bearer token.
//!
//! A [`SessionContext`] is created once and handed to every component at
//! construction. It is set at login and cleared at logout; nothing reads the
//! identity from anywhere else. When backed by a [`SessionStore`] the session
//! survives restarts as a small JSON file.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use placement_shared::constants::APP_NAME;
use placement_shared::{SenderRole, SubjectId};

use crate::error::{ClientError, Result};

/// The logged-in identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub subject_id: SubjectId,
    /// Role this client speaks as in conversations.
    pub role: SenderRole,
    /// Bearer token attached to every request when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Session {
    pub fn new(subject_id: SubjectId, role: SenderRole, token: Option<String>) -> Self {
        Self {
            subject_id,
            role,
            token: token.filter(|t| !t.is_empty()),
        }
    }
}

/// Shared handle to the current session.
#[derive(Clone, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<Option<Session>>>,
    store: Option<Arc<SessionStore>>,
}

impl SessionContext {
    /// An empty, non-persistent context.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context backed by `store`, pre-filled with whatever it holds.
    pub fn with_store(store: SessionStore) -> Result<Self> {
        let session = store.load()?;
        if let Some(ref s) = session {
            debug!(subject = %s.subject_id, "Restored persisted session");
        }
        Ok(Self {
            inner: Arc::new(RwLock::new(session)),
            store: Some(Arc::new(store)),
        })
    }

    pub fn login(&self, session: Session) -> Result<()> {
        if let Some(ref store) = self.store {
            store.save(&session)?;
        }
        info!(subject = %session.subject_id, role = %session.role, "Logged in");
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(session);
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        if let Some(ref store) = self.store {
            store.clear()?;
        }
        let previous = self.inner.write().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(s) = previous {
            info!(subject = %s.subject_id, "Logged out");
        }
        Ok(())
    }

    pub fn current(&self) -> Option<Session> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The current session, or [`ClientError::NoSession`].
    pub fn require(&self) -> Result<Session> {
        self.current().ok_or(ClientError::NoSession)
    }

    pub fn subject_id(&self) -> Option<SubjectId> {
        self.current().map(|s| s.subject_id)
    }

    /// Role used for outgoing messages. Defaults to the subject side when
    /// nobody is logged in.
    pub fn role(&self) -> SenderRole {
        self.current()
            .map(|s| s.role)
            .unwrap_or(SenderRole::Subject)
    }

    pub fn bearer_token(&self) -> Option<String> {
        self.current().and_then(|s| s.token)
    }
}

/// JSON file holding the persisted session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store in the platform data directory:
    /// - Linux:   `~/.local/share/placement/session.json`
    /// - macOS:   `~/Library/Application Support/com.Placement.Placement/session.json`
    /// - Windows: `{FOLDERID_RoamingAppData}\Placement\Placement\data\session.json`
    pub fn default_location() -> Result<Self> {
        let dirs = ProjectDirs::from("com", APP_NAME, APP_NAME).ok_or_else(|| {
            ClientError::Config("could not determine application data directory".into())
        })?;
        Ok(Self::at(dirs.data_dir().join("session.json")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when no session has been saved.
    pub fn load(&self) -> Result<Option<Session>> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> Session {
        Session::new(SubjectId::from("student-1"), SenderRole::Subject, Some("tok".into()))
    }

    #[test]
    fn test_login_logout_lifecycle() {
        let ctx = SessionContext::new();
        assert!(matches!(ctx.require(), Err(ClientError::NoSession)));
        assert_eq!(ctx.role(), SenderRole::Subject);

        ctx.login(student()).unwrap();
        assert_eq!(ctx.subject_id(), Some(SubjectId::from("student-1")));
        assert_eq!(ctx.bearer_token().as_deref(), Some("tok"));

        let shared = ctx.clone();
        ctx.logout().unwrap();
        assert!(shared.current().is_none());
    }

    #[test]
    fn test_empty_token_is_dropped() {
        let s = Session::new(SubjectId::from("s"), SenderRole::Counterparty, Some(String::new()));
        assert!(s.token.is_none());
    }

    #[test]
    fn test_store_persists_across_contexts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let ctx = SessionContext::with_store(SessionStore::at(&path)).unwrap();
        assert!(ctx.current().is_none());
        ctx.login(student()).unwrap();
        assert!(path.exists());

        let restored = SessionContext::with_store(SessionStore::at(&path)).unwrap();
        assert_eq!(restored.current(), Some(student()));

        restored.logout().unwrap();
        assert!(!path.exists());
        assert!(SessionStore::at(&path).load().unwrap().is_none());
    }

    #[test]
    fn test_default_location_is_under_the_app_directory() {
        // No home directory in some sandboxes; nothing to check there.
        let Ok(store) = SessionStore::default_location() else {
            return;
        };
        assert!(store.path().ends_with("session.json"));
        let lowered = store.path().to_string_lossy().to_lowercase();
        assert!(lowered.contains(&APP_NAME.to_lowercase()));
    }
}

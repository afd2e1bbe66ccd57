use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use tempfile::TempDir;

use crate::{
    error::SessionError,
    render::Renderer,
    session::{Detached, Session},
};

/// Prefix of the per-process scratch root in the system temp directory.
pub const SCRATCH_ROOT_PREFIX: &str = "DeepFakeECGPlus-";

/// Registry of live sessions keyed by id.
///
/// The map lock only guards inserts, removals and lookups. Sessions are
/// handed out as `Arc`s and all further work happens on the session itself.
pub struct SessionStore {
    root: Mutex<Option<TempDir>>,
    root_path: PathBuf,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    renderer: Arc<dyn Renderer>,
}

impl SessionStore {
    /// Create the scratch root under the system temp directory.
    pub fn new(renderer: Arc<dyn Renderer>) -> io::Result<Self> {
        Self::new_in(std::env::temp_dir(), renderer)
    }

    pub fn new_in(parent: impl AsRef<Path>, renderer: Arc<dyn Renderer>) -> io::Result<Self> {
        let root = tempfile::Builder::new()
            .prefix(SCRATCH_ROOT_PREFIX)
            .tempdir_in(parent)?;
        let root_path = root.path().canonicalize()?;
        log::info!("scratch root at {}", root_path.display());
        Ok(Self {
            root: Mutex::new(Some(root)),
            root_path,
            sessions: Mutex::new(HashMap::new()),
            renderer,
        })
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(|poisoned| {
            log::warn!("session map lock was poisoned; recovering");
            poisoned.into_inner()
        })
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Register a new session under `id`. A session already registered
    /// under that id is destroyed.
    pub fn create(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        let session = Arc::new(
            Session::open(id, &self.root_path).map_err(SessionError::ResourceExhaustion)?,
        );
        let (previous, active) = {
            let mut sessions = self.sessions();
            let previous = sessions.insert(id.to_string(), Arc::clone(&session));
            (previous, sessions.len())
        };
        if let Some(previous) = previous {
            log::warn!("Session {id} was already registered; replacing it");
            self.release(&previous);
        }
        log::info!("Session {id} initialized => {active} active sessions");
        Ok(session)
    }

    /// Remove the session and release its figure and scratch directory.
    /// Unknown ids are ignored.
    pub fn destroy(&self, id: &str) {
        let (removed, active) = {
            let mut sessions = self.sessions();
            let removed = sessions.remove(id);
            (removed, sessions.len())
        };
        match removed {
            Some(session) => {
                self.release(&session);
                log::info!("Session {id} cleaned up => {active} active sessions");
            }
            None => log::debug!("destroy of unknown session {id} ignored"),
        }
    }

    pub fn get(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        self.sessions()
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::SessionNotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether `path` resolves to a location inside the scratch root.
    pub fn contains_path(&self, path: &Path) -> bool {
        path.canonicalize()
            .map(|resolved| resolved.starts_with(&self.root_path) && resolved != self.root_path)
            .unwrap_or(false)
    }

    /// Destroy every session, then remove the scratch root.
    pub fn shutdown(&self) {
        let drained: Vec<(String, Arc<Session>)> = self.sessions().drain().collect();
        for (id, session) in &drained {
            self.release(session);
            log::debug!("Session {id} cleaned up at shutdown");
        }
        let root = self
            .root
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(root) = root {
            if let Err(err) = root.close() {
                log::error!("failed to remove {}: {err}", self.root_path.display());
            }
        }
        log::info!("shutdown complete, {} sessions destroyed", drained.len());
    }

    fn release(&self, session: &Session) {
        let Some(Detached { analysis, scratch }) = session.close() else {
            return;
        };
        if let Some(figure) = analysis {
            self.renderer.release(figure);
        }
        if let Some(dir) = scratch {
            let path = dir.path().to_path_buf();
            if let Err(err) = dir.close() {
                log::error!("failed to remove {}: {err}", path.display());
            }
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("root", &self.root_path)
            .field("sessions", &self.len())
            .finish()
    }
}

use ecg_lib::signal::{EcgSignal, EcgType};
use serde::Serialize;
use std::{
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tempfile::TempDir;

use crate::{error::SessionError, render::AnalysisFigure};

/// Opaque session key minted by the web layer.
pub type SessionId = String;

/// State of one browser page. Every mutation happens under the session
/// mutex; expensive work (generation, rendering) happens outside it and is
/// committed afterwards.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: Mutex<SessionState>,
}

#[derive(Debug, Default)]
struct SessionState {
    /// Reserved; never incremented.
    counter: u64,
    selected_index: usize,
    results: Vec<Arc<EcgSignal>>,
    analysis: Option<AnalysisFigure>,
    ecg_type: Option<EcgType>,
    scratch: Option<TempDir>,
    batch: u64,
    closed: bool,
}

/// Read-only copy of a session's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub counter: u64,
    /// `None` while no batch has been generated.
    pub selected_index: Option<usize>,
    pub result_count: usize,
    pub ecg_type: Option<EcgType>,
    /// Batch position the cached analysis was computed from.
    pub analysis_index: Option<usize>,
    pub scratch_dir: Option<PathBuf>,
    pub batch: u64,
    pub closed: bool,
}

/// What an export needs from the session, borrowed under its lock.
pub(crate) struct ExportSource<'a> {
    pub signal: &'a EcgSignal,
    /// 1-based batch position of `signal`.
    pub number: usize,
    pub analysis: Option<&'a AnalysisFigure>,
    pub dir: &'a Path,
}

/// Resources detached from a closed session, to be released by the caller.
pub(crate) struct Detached {
    pub analysis: Option<AnalysisFigure>,
    pub scratch: Option<TempDir>,
}

impl Session {
    /// Create a session with a fresh scratch directory under `root`.
    pub(crate) fn open(id: &str, root: &Path) -> io::Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("session-")
            .tempdir_in(root)?;
        Ok(Self {
            id: id.to_string(),
            state: Mutex::new(SessionState {
                scratch: Some(scratch),
                ..SessionState::default()
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            log::warn!("session {} state lock was poisoned; recovering", self.id);
            poisoned.into_inner()
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            id: self.id.clone(),
            counter: state.counter,
            selected_index: (!state.results.is_empty()).then_some(state.selected_index),
            result_count: state.results.len(),
            ecg_type: state.ecg_type,
            analysis_index: state.analysis.as_ref().map(AnalysisFigure::signal_index),
            scratch_dir: state.scratch.as_ref().map(|dir| dir.path().to_path_buf()),
            batch: state.batch,
            closed: state.closed,
        }
    }

    pub fn scratch_dir(&self) -> Option<PathBuf> {
        self.lock()
            .scratch
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Replace the batch, its type, the selection and the cached analysis as
    /// one unit. Returns the previous figure for release, or hands `analysis`
    /// back when the session was closed in the meantime.
    pub(crate) fn commit_batch(
        &self,
        ecg_type: EcgType,
        results: Vec<Arc<EcgSignal>>,
        analysis: AnalysisFigure,
    ) -> Result<Option<AnalysisFigure>, AnalysisFigure> {
        let mut state = self.lock();
        if state.closed {
            return Err(analysis);
        }
        state.results = results;
        state.ecg_type = Some(ecg_type);
        state.selected_index = analysis.signal_index();
        state.batch += 1;
        Ok(state.analysis.replace(analysis))
    }

    /// The signal at `index` together with the batch epoch it belongs to.
    pub(crate) fn signal_at(&self, index: usize) -> Result<(Arc<EcgSignal>, u64), SessionError> {
        let state = self.lock();
        if state.closed {
            return Err(SessionError::SessionNotFound(self.id.clone()));
        }
        if state.results.is_empty() {
            return Err(SessionError::NoSelection);
        }
        let signal = state
            .results
            .get(index)
            .cloned()
            .ok_or(SessionError::IndexOutOfRange {
                index,
                len: state.results.len(),
            })?;
        Ok((signal, state.batch))
    }

    /// Cache `analysis` as the selection if the session still holds batch
    /// `batch`. On refusal the figure is handed back with the reason.
    pub(crate) fn commit_selection(
        &self,
        batch: u64,
        analysis: AnalysisFigure,
    ) -> Result<Option<AnalysisFigure>, (AnalysisFigure, SessionError)> {
        let mut state = self.lock();
        if state.closed {
            return Err((analysis, SessionError::SessionNotFound(self.id.clone())));
        }
        if state.batch != batch || analysis.signal_index() >= state.results.len() {
            return Err((analysis, SessionError::StaleSelection));
        }
        state.selected_index = analysis.signal_index();
        Ok(state.analysis.replace(analysis))
    }

    /// Run `write` against the selected signal while holding the session
    /// lock, so the scratch directory outlives the write.
    pub(crate) fn with_selected<T>(
        &self,
        write: impl FnOnce(ExportSource<'_>) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let state = self.lock();
        if state.closed {
            return Err(SessionError::SessionNotFound(self.id.clone()));
        }
        let signal = state
            .results
            .get(state.selected_index)
            .ok_or(SessionError::NoDataAvailable)?;
        let dir = state
            .scratch
            .as_ref()
            .ok_or_else(|| SessionError::SessionNotFound(self.id.clone()))?;
        write(ExportSource {
            signal,
            number: state.selected_index + 1,
            analysis: state
                .analysis
                .as_ref()
                .filter(|figure| figure.signal_index() == state.selected_index),
            dir: dir.path(),
        })
    }

    /// Mark the session closed and detach its resources. Returns `None` if
    /// it was already closed.
    pub(crate) fn close(&self) -> Option<Detached> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        state.closed = true;
        state.results.clear();
        state.ecg_type = None;
        Some(Detached {
            analysis: state.analysis.take(),
            scratch: state.scratch.take(),
        })
    }
}

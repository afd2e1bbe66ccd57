use ecg_lib::{generator::GeneratorError, io::ExportError, signal::UnknownEcgType};
use thiserror::Error;

use crate::render::RenderError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0:?} not found")]
    SessionNotFound(String),
    #[error(transparent)]
    InvalidLeadConfiguration(#[from] UnknownEcgType),
    #[error("no ECGs have been generated yet")]
    NoDataAvailable,
    #[error("no ECG is available to select")]
    NoSelection,
    #[error("ECG index {index} is out of range for a batch of {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("the batch changed while the selection was being analyzed")]
    StaleSelection,
    #[error("generator failure: {0}")]
    GeneratorFailure(#[from] GeneratorError),
    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),
    #[error("could not create scratch directory: {0}")]
    ResourceExhaustion(#[source] std::io::Error),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

impl SessionError {
    /// Short machine-readable code for the web layer.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::SessionNotFound(_) => "session_not_found",
            SessionError::InvalidLeadConfiguration(_) => "invalid_lead_configuration",
            SessionError::NoDataAvailable => "no_data_available",
            SessionError::NoSelection => "no_selection",
            SessionError::IndexOutOfRange { .. } => "index_out_of_range",
            SessionError::StaleSelection => "stale_selection",
            SessionError::GeneratorFailure(_) => "generator_failure",
            SessionError::Render(_) => "render_failure",
            SessionError::ResourceExhaustion(_) => "resource_exhaustion",
            SessionError::Export(_) => "export_failure",
        }
    }
}

//! Session-scoped state for the ECG generator service.
//!
//! A [`SessionStore`] maps opaque session ids to [`Session`]s; the
//! [`Handlers`] context runs generation, selection and export against one
//! session at a time, calling the generator, renderer and exporter
//! collaborators without holding the store lock.

pub mod error;
pub mod export;
pub mod handlers;
pub mod render;
pub mod session;
pub mod store;

pub use error::SessionError;
pub use export::{ExportKind, Exporter, FileExporter};
pub use handlers::{GalleryItem, GenerationOutput, GenerationRequest, Handlers};
pub use render::{
    AnalysisFigure, AnalysisSummary, AnalysisView, PlotRenderer, RenderConfig, RenderError,
    RenderedImage, Renderer,
};
pub use session::{Session, SessionId, SessionSnapshot};
pub use store::SessionStore;

//! Request handlers for one session: batch generation, selection of a
//! gallery item for analysis, and file export.

use ecg_lib::{
    generator::{Generator, GeneratorModel, MAX_BATCH},
    signal::{EcgSignal, EcgType},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};

use crate::{
    error::SessionError,
    export::{ExportKind, Exporter},
    render::{AnalysisView, RenderedImage, Renderer},
    store::SessionStore,
};

pub const DEFAULT_COUNT: usize = 4;

/// Parameters of a generation request as they arrive from the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    pub count: usize,
    pub ecg_type: String,
    pub model: String,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            ecg_type: EcgType::TwelveLead.to_string(),
            model: GeneratorModel::Default.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GalleryItem {
    pub image: RenderedImage,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutput {
    pub gallery: Vec<GalleryItem>,
    pub analysis: AnalysisView,
}

/// Collaborators shared by every request. The store owns the renderer so
/// that destroying a session can release its figure.
pub struct Handlers {
    store: Arc<SessionStore>,
    generator: Arc<dyn Generator>,
    exporter: Arc<dyn Exporter>,
}

impl Handlers {
    pub fn new(
        store: Arc<SessionStore>,
        generator: Arc<dyn Generator>,
        exporter: Arc<dyn Exporter>,
    ) -> Self {
        Self {
            store,
            generator,
            exporter,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    fn renderer(&self) -> &dyn Renderer {
        self.store.renderer().as_ref()
    }

    /// Page load: register `id` and fill it with a default batch.
    pub fn load(&self, id: &str) -> Result<GenerationOutput, SessionError> {
        self.store.create(id)?;
        self.generate(id, &GenerationRequest::default())
    }

    /// Page unload.
    pub fn unload(&self, id: &str) {
        self.store.destroy(id);
    }

    pub fn generate(
        &self,
        id: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, SessionError> {
        let session = self.store.get(id)?;
        let ecg_type = parse_lead_configuration(&request.ecg_type);
        let model = parse_model(&request.model);
        let count = clamp_count(request.count);

        let signals: Vec<Arc<EcgSignal>> = self
            .generator
            .generate(count, ecg_type)
            .map_err(|err| {
                log::error!("Session {id}: generation failed: {err}");
                SessionError::from(err)
            })?
            .into_iter()
            .map(Arc::new)
            .collect();

        let renderer = self.renderer();
        let gallery = signals
            .iter()
            .enumerate()
            .map(|(i, signal)| -> Result<GalleryItem, SessionError> {
                Ok(GalleryItem {
                    image: renderer.render(signal)?,
                    label: format!("ECG Number {}", i + 1),
                })
            })
            .collect::<Result<Vec<_>, SessionError>>()?;
        let first = signals.first().ok_or(SessionError::NoDataAvailable)?;
        let figure = renderer.analyze(0, first)?;
        let analysis = figure.view();

        match session.commit_batch(ecg_type, signals, figure) {
            Ok(previous) => {
                if let Some(previous) = previous {
                    renderer.release(previous);
                }
            }
            Err(discarded) => {
                renderer.release(discarded);
                log::info!("Session {id} closed during generation; result discarded");
                return Err(SessionError::SessionNotFound(id.to_string()));
            }
        }
        log::info!(
            "Session {id}: generated {count} {ecg_type} signal(s) with model {}",
            model.as_str()
        );
        Ok(GenerationOutput { gallery, analysis })
    }

    /// Analyse the gallery item at `index` and make it the selection.
    pub fn select(&self, id: &str, index: usize) -> Result<AnalysisView, SessionError> {
        let session = self.store.get(id)?;
        let (signal, batch) = session.signal_at(index)?;
        let renderer = self.renderer();
        let figure = renderer.analyze(index, &signal)?;
        let view = figure.view();
        match session.commit_selection(batch, figure) {
            Ok(previous) => {
                if let Some(previous) = previous {
                    renderer.release(previous);
                }
                log::debug!("Session {id}: selected ECG {}", index + 1);
                Ok(view)
            }
            Err((discarded, err)) => {
                renderer.release(discarded);
                log::info!("Session {id}: selection of ECG {} dropped: {err}", index + 1);
                Err(err)
            }
        }
    }

    /// Write the selected signal into the session scratch directory and
    /// return the file path. Repeating an export overwrites the same file.
    pub fn export(&self, id: &str, kind: ExportKind) -> Result<PathBuf, SessionError> {
        let session = self.store.get(id)?;
        let path = session.with_selected(|source| {
            let path = source.dir.join(kind.file_name(source.number));
            match kind {
                ExportKind::TabularData => self.exporter.write_csv(source.signal, &path)?,
                ExportKind::Document => {
                    self.exporter
                        .write_pdf(source.signal, &path, source.number, None)?
                }
                ExportKind::DocumentWithAnalysis => self.exporter.write_pdf(
                    source.signal,
                    &path,
                    source.number,
                    source.analysis,
                )?,
            }
            Ok(path)
        });
        match &path {
            Ok(path) => log::info!("Session {id}: exported {kind} to {}", path.display()),
            Err(err) => log::warn!("Session {id}: {kind} export failed: {err}"),
        }
        path
    }
}

/// Unknown lead configurations fall back to twelve leads.
pub fn parse_lead_configuration(value: &str) -> EcgType {
    value.parse::<EcgType>().unwrap_or_else(|err| {
        log::warn!("{}; using {}", SessionError::from(err), EcgType::TwelveLead);
        EcgType::TwelveLead
    })
}

pub fn parse_model(value: &str) -> GeneratorModel {
    value.parse::<GeneratorModel>().unwrap_or_else(|err| {
        log::warn!("{err}; using {}", GeneratorModel::Default.as_str());
        GeneratorModel::Default
    })
}

pub fn clamp_count(count: usize) -> usize {
    let clamped = count.clamp(1, MAX_BATCH);
    if clamped != count {
        log::warn!("requested {count} ECGs, generating {clamped}");
    }
    clamped
}

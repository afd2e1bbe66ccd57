#![allow(dead_code)]

use ecg_lib::generator::{Generator, GeneratorConfig, SyntheticGenerator};
use ecg_session::{FileExporter, Handlers, PlotRenderer, Renderer, RenderConfig, SessionStore};
use std::sync::Arc;
use tempfile::TempDir;

pub struct Fixture {
    pub handlers: Handlers,
    pub renderer: Arc<PlotRenderer>,
    _parent: TempDir,
}

impl Fixture {
    pub fn store(&self) -> &Arc<SessionStore> {
        self.handlers.store()
    }
}

pub fn seeded_generator() -> SyntheticGenerator {
    SyntheticGenerator::new(&GeneratorConfig {
        seed: Some(42),
        ..GeneratorConfig::default()
    })
}

/// Small images keep the suite fast; the layout logic is the same.
pub fn renderer() -> Arc<PlotRenderer> {
    Arc::new(PlotRenderer::new(RenderConfig {
        gallery_size: (800, 700),
        px_per_mm: 1.5,
        max_points: 400,
        ..RenderConfig::default()
    }))
}

pub fn fixture_with(generator: Arc<dyn Generator>) -> Fixture {
    let parent = tempfile::tempdir().expect("tempdir");
    let renderer = renderer();
    let shared: Arc<dyn Renderer> = renderer.clone();
    let store = Arc::new(SessionStore::new_in(parent.path(), shared).expect("store"));
    Fixture {
        handlers: Handlers::new(store, generator, Arc::new(FileExporter)),
        renderer,
        _parent: parent,
    }
}

pub fn fixture() -> Fixture {
    fixture_with(Arc::new(seeded_generator()))
}

pub fn request(count: usize, ecg_type: &str) -> ecg_session::GenerationRequest {
    ecg_session::GenerationRequest {
        count,
        ecg_type: ecg_type.to_string(),
        ..Default::default()
    }
}

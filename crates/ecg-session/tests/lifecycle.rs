mod common;

use common::{fixture, fixture_with, request, seeded_generator};
use ecg_lib::generator::{Device, Generator, GeneratorError, SyntheticGenerator};
use ecg_lib::signal::{EcgSignal, EcgType};
use ecg_session::{ExportKind, Renderer, SessionError};
use std::{
    error::Error,
    fs,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

#[test]
fn created_session_starts_empty() -> Result<(), Box<dyn Error>> {
    let fx = fixture();
    fx.store().create("s1")?;
    let snap = fx.store().get("s1")?.snapshot();
    assert_eq!(snap.result_count, 0);
    assert_eq!(snap.selected_index, None);
    assert_eq!(snap.analysis_index, None);
    assert_eq!(snap.counter, 0);
    assert!(snap.scratch_dir.as_ref().is_some_and(|dir| dir.is_dir()));
    Ok(())
}

#[test]
fn unknown_sessions_are_not_created_implicitly() {
    let fx = fixture();
    let err = fx.handlers.generate("ghost", &request(2, "ECG-8"));
    assert!(matches!(err, Err(SessionError::SessionNotFound(id)) if id == "ghost"));
    assert!(matches!(fx.handlers.select("ghost", 0), Err(SessionError::SessionNotFound(_))));
    assert!(matches!(
        fx.handlers.export("ghost", ExportKind::TabularData),
        Err(SessionError::SessionNotFound(_))
    ));
    assert!(fx.store().is_empty());
}

#[test]
fn generation_fills_gallery_and_selects_first() -> Result<(), Box<dyn Error>> {
    let fx = fixture();
    fx.store().create("s1")?;
    let out = fx.handlers.generate("s1", &request(3, "ECG-8"))?;
    let labels: Vec<&str> = out.gallery.iter().map(|item| item.label.as_str()).collect();
    assert_eq!(labels, ["ECG Number 1", "ECG Number 2", "ECG Number 3"]);
    assert_eq!(out.analysis.signal_index, 0);

    let snap = fx.store().get("s1")?.snapshot();
    assert_eq!(snap.result_count, 3);
    assert_eq!(snap.selected_index, Some(0));
    assert_eq!(snap.analysis_index, Some(0));
    assert_eq!(snap.ecg_type, Some(EcgType::EightLead));
    assert_eq!(fx.renderer.live_figures(), 1);
    Ok(())
}

#[test]
fn invalid_lead_configuration_falls_back_to_twelve_leads() -> Result<(), Box<dyn Error>> {
    let fx = fixture();
    fx.store().create("s1")?;
    let out = fx.handlers.generate("s1", &request(1, "ECG-99"))?;
    assert_eq!(out.gallery.len(), 1);
    assert_eq!(fx.store().get("s1")?.snapshot().ecg_type, Some(EcgType::TwelveLead));

    let path = fx.handlers.export("s1", ExportKind::TabularData)?;
    let text = fs::read_to_string(path)?;
    let header = text.lines().next().unwrap_or_default();
    assert_eq!(header.split(',').count(), 13);
    Ok(())
}

#[test]
fn selection_replaces_cached_analysis() -> Result<(), Box<dyn Error>> {
    let fx = fixture();
    fx.store().create("s1")?;
    fx.handlers.generate("s1", &request(4, "ECG-12"))?;
    for index in [2, 1, 3] {
        let view = fx.handlers.select("s1", index)?;
        assert_eq!(view.signal_index, index);
        assert_eq!(fx.renderer.live_figures(), 1);
    }
    let snap = fx.store().get("s1")?.snapshot();
    assert_eq!(snap.selected_index, Some(3));
    assert_eq!(snap.analysis_index, Some(3));

    let err = fx.handlers.select("s1", 4);
    assert!(matches!(err, Err(SessionError::IndexOutOfRange { index: 4, len: 4 })));
    assert_eq!(fx.store().get("s1")?.snapshot().selected_index, Some(3));
    Ok(())
}

#[test]
fn selection_and_export_need_a_batch() -> Result<(), Box<dyn Error>> {
    let fx = fixture();
    fx.store().create("s1")?;
    assert!(matches!(fx.handlers.select("s1", 0), Err(SessionError::NoSelection)));
    for kind in [
        ExportKind::TabularData,
        ExportKind::Document,
        ExportKind::DocumentWithAnalysis,
    ] {
        assert!(matches!(
            fx.handlers.export("s1", kind),
            Err(SessionError::NoDataAvailable)
        ));
    }
    let dir = fx.store().get("s1")?.scratch_dir().ok_or("no scratch dir")?;
    assert_eq!(fs::read_dir(dir)?.count(), 0);
    Ok(())
}

#[test]
fn repeated_export_overwrites_one_file() -> Result<(), Box<dyn Error>> {
    let fx = fixture();
    fx.store().create("s1")?;
    fx.handlers.generate("s1", &request(2, "ECG-8"))?;
    fx.handlers.select("s1", 1)?;

    let first = fx.handlers.export("s1", ExportKind::TabularData)?;
    let first_bytes = fs::read(&first)?;
    let second = fx.handlers.export("s1", ExportKind::TabularData)?;
    assert_eq!(first, second);
    assert_eq!(first_bytes, fs::read(&second)?);
    assert!(first.ends_with("ECG-2.csv"));

    let plain = fx.handlers.export("s1", ExportKind::Document)?;
    let plain_len = fs::metadata(&plain)?.len();
    let annotated = fx.handlers.export("s1", ExportKind::DocumentWithAnalysis)?;
    assert_eq!(plain, annotated);
    assert!(annotated.ends_with("ECG-2.pdf"));
    assert!(fs::metadata(&annotated)?.len() > plain_len);

    let dir = fx.store().get("s1")?.scratch_dir().ok_or("no scratch dir")?;
    assert_eq!(fs::read_dir(dir)?.count(), 2);
    Ok(())
}

#[test]
fn destroy_releases_everything() -> Result<(), Box<dyn Error>> {
    let fx = fixture();
    fx.handlers.load("s1")?;
    fx.handlers.export("s1", ExportKind::Document)?;
    let dir = fx.store().get("s1")?.scratch_dir().ok_or("no scratch dir")?;
    assert!(dir.is_dir());

    fx.handlers.unload("s1");
    assert!(!dir.exists());
    assert!(matches!(fx.store().get("s1"), Err(SessionError::SessionNotFound(_))));
    assert_eq!(fx.renderer.live_figures(), 0);
    fx.handlers.unload("s1");
    Ok(())
}

#[test]
fn page_load_generates_default_batch() -> Result<(), Box<dyn Error>> {
    let fx = fixture();
    let out = fx.handlers.load("s1")?;
    assert_eq!(out.gallery.len(), 4);
    let snap = fx.store().get("s1")?.snapshot();
    assert_eq!(snap.ecg_type, Some(EcgType::TwelveLead));
    assert_eq!(snap.batch, 1);
    Ok(())
}

#[test]
fn browse_select_download_close() -> Result<(), Box<dyn Error>> {
    let fx = fixture();
    fx.store().create("A")?;
    let out = fx.handlers.generate("A", &request(4, "ECG-8"))?;
    assert_eq!(out.gallery.len(), 4);
    assert_eq!(fx.store().get("A")?.snapshot().ecg_type, Some(EcgType::EightLead));
    fx.handlers.select("A", 2)?;

    let path = fx.handlers.export("A", ExportKind::DocumentWithAnalysis)?;
    assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("ECG-3.pdf"));
    assert!(fs::read(&path)?.starts_with(b"%PDF"));
    assert!(fx.store().contains_path(&path));

    let dir = fx.store().get("A")?.scratch_dir().ok_or("no scratch dir")?;
    fx.handlers.unload("A");
    assert!(!dir.exists());
    assert!(fx.store().is_empty());
    assert_eq!(fx.renderer.live_figures(), 0);
    Ok(())
}

/// Fails every batch once `failing` is set.
struct SwitchableGenerator {
    inner: SyntheticGenerator,
    failing: AtomicBool,
}

impl Generator for SwitchableGenerator {
    fn generate(&self, count: usize, ecg_type: EcgType) -> Result<Vec<EcgSignal>, GeneratorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GeneratorError::DeviceUnavailable(Device::Cuda));
        }
        self.inner.generate(count, ecg_type)
    }

    fn device(&self) -> Device {
        self.inner.device()
    }

    fn describe(&self) -> String {
        "switchable".into()
    }
}

#[test]
fn generator_failure_keeps_previous_batch() -> Result<(), Box<dyn Error>> {
    let generator = Arc::new(SwitchableGenerator {
        inner: seeded_generator(),
        failing: AtomicBool::new(false),
    });
    let fx = fixture_with(generator.clone());
    fx.store().create("s1")?;
    fx.handlers.generate("s1", &request(4, "ECG-8"))?;
    fx.handlers.select("s1", 2)?;
    let before = fx.store().get("s1")?.snapshot();

    generator.failing.store(true, Ordering::SeqCst);
    let err = fx.handlers.generate("s1", &request(1, "ECG-12"));
    assert!(matches!(err, Err(SessionError::GeneratorFailure(_))));

    let after = fx.store().get("s1")?.snapshot();
    assert_eq!(after, before);
    assert_eq!(after.result_count, 4);
    assert_eq!(after.selected_index, Some(2));
    assert_eq!(after.analysis_index, Some(2));
    assert_eq!(after.ecg_type, Some(EcgType::EightLead));
    assert_eq!(after.batch, 1);
    assert_eq!(fx.renderer.live_figures(), 1);

    let path = fx.handlers.export("s1", ExportKind::DocumentWithAnalysis)?;
    assert!(path.ends_with("ECG-3.pdf"));
    Ok(())
}

#[test]
fn sessions_do_not_share_scratch_dirs() -> Result<(), Box<dyn Error>> {
    let fx = fixture();
    fx.handlers.load("a")?;
    fx.handlers.load("b")?;
    let a = fx.handlers.export("a", ExportKind::TabularData)?;
    let b = fx.handlers.export("b", ExportKind::TabularData)?;
    assert_ne!(a.parent(), b.parent());
    fx.handlers.unload("a");
    assert!(!a.exists());
    assert!(b.exists());
    Ok(())
}

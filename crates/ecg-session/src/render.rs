//! Gallery images and analysis figures.
//!
//! Images are SVG documents produced with plotters. Analysis figures are
//! owned handles: a [`Renderer`] hands one out per analysis and expects it
//! back through [`Renderer::release`] once the session no longer caches it.

use ecg_lib::{
    detectors::ecg::{run_beat_hrv_pipeline, EcgPipelineConfig},
    metrics::hrv::HRVTime,
    plot::{analysis_figures, lead_figures, Figure, Series},
    signal::EcgSignal,
};
use plotters::{coord::Shift, prelude::*};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use thiserror::Error;

/// Lead analysed for the heart rate summary.
pub const ANALYSIS_LEAD: &str = "I";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("signal has no lead {0}")]
    MissingLead(String),
    #[error("drawing failed: {0}")]
    Draw(String),
}

fn draw_err<E: std::fmt::Display>(err: E) -> RenderError {
    RenderError::Draw(err.to_string())
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Gallery image size in pixels.
    pub gallery_size: (u32, u32),
    /// Analysis figure size in millimetres.
    pub analysis_size_mm: (f64, f64),
    pub px_per_mm: f64,
    /// Points kept per trace after decimation.
    pub max_points: usize,
    pub detector: EcgPipelineConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            gallery_size: (1400, 900),
            analysis_size_mm: (508.0, 122.0),
            px_per_mm: 2.5,
            max_points: 2000,
            detector: EcgPipelineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedImage {
    pub width: u32,
    pub height: u32,
    pub svg: String,
}

/// Beat statistics printed under an analysis figure.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub lead: String,
    pub beats: usize,
    pub mean_heart_rate: Option<f64>,
    pub hrv: HRVTime,
}

impl AnalysisSummary {
    pub fn notes(&self) -> Vec<String> {
        let rate = self
            .mean_heart_rate
            .map(|bpm| format!("{bpm:.0} bpm"))
            .unwrap_or_else(|| "n/a".to_string());
        vec![
            format!("Lead {}: {} beats detected, mean heart rate {}", self.lead, self.beats, rate),
            format!(
                "AVNN {:.0} ms, SDNN {:.1} ms, RMSSD {:.1} ms, pNN50 {:.0} %",
                self.hrv.avnn * 1000.0,
                self.hrv.sdnn * 1000.0,
                self.hrv.rmssd * 1000.0,
                self.hrv.pnn50 * 100.0
            ),
        ]
    }
}

/// A rendered analysis owned by exactly one holder. Not `Clone`: copies for
/// callers go through [`AnalysisFigure::view`].
#[derive(Debug)]
pub struct AnalysisFigure {
    handle: u64,
    signal_index: usize,
    panels: Vec<Figure>,
    summary: AnalysisSummary,
    image: RenderedImage,
}

impl AnalysisFigure {
    pub fn new(
        handle: u64,
        signal_index: usize,
        panels: Vec<Figure>,
        summary: AnalysisSummary,
        image: RenderedImage,
    ) -> Self {
        Self {
            handle,
            signal_index,
            panels,
            summary,
            image,
        }
    }

    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Index in the batch of the signal this figure was computed from.
    pub fn signal_index(&self) -> usize {
        self.signal_index
    }

    pub fn panels(&self) -> &[Figure] {
        &self.panels
    }

    pub fn summary(&self) -> &AnalysisSummary {
        &self.summary
    }

    pub fn image(&self) -> &RenderedImage {
        &self.image
    }

    pub fn view(&self) -> AnalysisView {
        AnalysisView {
            signal_index: self.signal_index,
            image: self.image.clone(),
            summary: self.summary.clone(),
        }
    }
}

/// Detached copy of an analysis figure for responses.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisView {
    pub signal_index: usize,
    pub image: RenderedImage,
    pub summary: AnalysisSummary,
}

pub trait Renderer: Send + Sync {
    /// Gallery image with every lead of `signal` in display order.
    fn render(&self, signal: &EcgSignal) -> Result<RenderedImage, RenderError>;

    /// Analysis of the signal at `index` of its batch.
    fn analyze(&self, index: usize, signal: &EcgSignal) -> Result<AnalysisFigure, RenderError>;

    /// Hand back a figure obtained from [`Renderer::analyze`].
    fn release(&self, figure: AnalysisFigure);

    /// Figures handed out and not yet released.
    fn live_figures(&self) -> usize;
}

#[derive(Debug, Default)]
pub struct PlotRenderer {
    config: RenderConfig,
    next_handle: AtomicU64,
    live: AtomicUsize,
}

impl PlotRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            next_handle: AtomicU64::new(0),
            live: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    fn analysis_size_px(&self) -> (u32, u32) {
        let (w, h) = self.config.analysis_size_mm;
        (
            (w * self.config.px_per_mm).round() as u32,
            (h * self.config.px_per_mm).round() as u32,
        )
    }
}

impl Renderer for PlotRenderer {
    fn render(&self, signal: &EcgSignal) -> Result<RenderedImage, RenderError> {
        let names = signal.ecg_type.lead_names();
        let ordered: Vec<&str> = signal
            .ecg_type
            .display_order()
            .iter()
            .filter_map(|&i| names.get(i).copied())
            .collect();
        let panels = lead_figures(signal, &ordered, self.config.max_points);
        let title = format!("{} \u{2013} 25 mm/sec, 1 mV/10 mm", signal.ecg_type);
        let (width, height) = self.config.gallery_size;
        let svg = draw_grid(&title, &panels, 2, (width, height))?;
        Ok(RenderedImage { width, height, svg })
    }

    fn analyze(&self, index: usize, signal: &EcgSignal) -> Result<AnalysisFigure, RenderError> {
        let lead = signal
            .lead_index(ANALYSIS_LEAD)
            .and_then(|idx| signal.lead_mv(idx))
            .ok_or_else(|| RenderError::MissingLead(ANALYSIS_LEAD.to_string()))?;
        let beats = run_beat_hrv_pipeline(&lead, &self.config.detector);
        let panels = analysis_figures(ANALYSIS_LEAD, &lead, &beats, self.config.max_points);
        let summary = AnalysisSummary {
            lead: ANALYSIS_LEAD.to_string(),
            beats: beats.events.indices.len(),
            mean_heart_rate: beats.mean_heart_rate(),
            hrv: beats.hrv,
        };
        let (width, height) = self.analysis_size_px();
        let title = format!("ECG Number {} \u{2013} lead {} analysis", index + 1, ANALYSIS_LEAD);
        let svg = draw_grid(&title, &panels, 1, (width, height))?;
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_add(1, Ordering::AcqRel);
        Ok(AnalysisFigure::new(
            handle,
            index,
            panels,
            summary,
            RenderedImage { width, height, svg },
        ))
    }

    fn release(&self, figure: AnalysisFigure) {
        log::trace!("releasing analysis figure {}", figure.handle());
        let released = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if released.is_err() {
            log::warn!(
                "analysis figure {} released with no live figures outstanding",
                figure.handle()
            );
        }
    }

    fn live_figures(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

/// Lay `panels` out column-major on a grid with `columns` columns under a
/// common title and return the SVG text.
fn draw_grid(
    title: &str,
    panels: &[Figure],
    columns: usize,
    size: (u32, u32),
) -> Result<String, RenderError> {
    let columns = columns.max(1);
    let rows = panels.len().div_ceil(columns).max(1);
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        let root = root
            .titled(title, ("sans-serif", 22))
            .map_err(draw_err)?;
        let cells = root.split_evenly((rows, columns));
        for (i, figure) in panels.iter().enumerate() {
            let (col, row) = (i / rows, i % rows);
            if let Some(area) = cells.get(row * columns + col) {
                draw_figure(area, figure)?;
            }
        }
        root.present().map_err(draw_err)?;
    }
    Ok(svg)
}

fn draw_figure<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    figure: &Figure,
) -> Result<(), RenderError> {
    let (xmin, xmax, ymin, ymax) = figure.bounds();
    let mut chart = ChartBuilder::on(area)
        .caption(figure.title.clone().unwrap_or_default(), ("sans-serif", 14))
        .margin(4)
        .x_label_area_size(18)
        .y_label_area_size(36)
        .build_cartesian_2d(xmin..xmax, ymin..ymax)
        .map_err(draw_err)?;
    chart
        .configure_mesh()
        .light_line_style(RGBColor(0xF4, 0xD0, 0xD0).stroke_width(1))
        .bold_line_style(RGBColor(0xE8, 0x9A, 0x9A).stroke_width(1))
        .x_desc(figure.x.label.clone().unwrap_or_default())
        .y_desc(figure.y.label.clone().unwrap_or_default())
        .label_style(("sans-serif", 10))
        .draw()
        .map_err(draw_err)?;

    for series in &figure.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                let style = RGBColor(r, g, b).stroke_width(line.style.width.round().max(1.0) as u32);
                chart
                    .draw_series(LineSeries::new(
                        line.points.iter().map(|p| (p[0], p[1])),
                        style,
                    ))
                    .map_err(draw_err)?;
            }
            Series::Markers(markers) => {
                let (r, g, b) = markers.color.rgb();
                let style = RGBColor(r, g, b).filled();
                let radius = markers.radius as i32;
                chart
                    .draw_series(
                        markers
                            .points
                            .iter()
                            .map(|p| Circle::new((p[0], p[1]), radius, style)),
                    )
                    .map_err(draw_err)?;
            }
        }
    }
    Ok(())
}

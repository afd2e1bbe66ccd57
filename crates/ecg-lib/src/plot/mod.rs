use crate::{
    detectors::ecg::BeatHrvPipelineResult,
    signal::{EcgSignal, TimeSeries},
};
use serde::{Deserialize, Serialize};

/// Trace colour of ECG leads.
pub const LEAD_COLOR: Color = Color(0x1F1F1F);
/// Marker colour of detected R-peaks.
pub const PEAK_COLOR: Color = Color(0xD62728);
/// Trace colour of the heart rate panel.
pub const RATE_COLOR: Color = Color(0xFF7F0E);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }

    /// Components scaled to `0.0..=1.0`.
    pub fn unit_rgb(&self) -> (f32, f32, f32) {
        let (r, g, b) = self.rgb();
        (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

/// Unconnected point markers, e.g. R-peak annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub radius: u32,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Markers(MarkerSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(line) => &line.points,
            Series::Markers(markers) => &markers.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis::default(),
            y: Axis::default(),
            series: Vec::new(),
        }
    }

    pub fn with_axes(mut self, x: &str, y: &str) -> Self {
        self.x.label = Some(x.to_string());
        self.y.label = Some(y.to_string());
        self
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// Data bounds `(x_min, x_max, y_min, y_max)` over every series, padded so
    /// that a flat trace still spans a drawable range.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let mut x = (f64::INFINITY, f64::NEG_INFINITY);
        let mut y = (f64::INFINITY, f64::NEG_INFINITY);
        for p in self.series.iter().flat_map(|s| s.points()) {
            x = (x.0.min(p[0]), x.1.max(p[0]));
            y = (y.0.min(p[1]), y.1.max(p[1]));
        }
        if !x.0.is_finite() {
            return (0.0, 1.0, 0.0, 1.0);
        }
        if x.1 - x.0 < f64::EPSILON {
            x.1 = x.0 + 1.0;
        }
        if y.1 - y.0 < f64::EPSILON {
            y = (y.0 - 0.5, y.1 + 0.5);
        }
        (x.0, x.1, y.0, y.1)
    }
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points || max_points == 0 {
        return points.to_vec();
    }
    let bucket = points.len() as f64 / max_points as f64;
    (0..max_points)
        .map(|i| (i as f64 * bucket).floor() as usize)
        .take_while(|&start| start < points.len())
        .map(|start| points[start])
        .collect()
}

pub fn figure_from_timeseries(
    title: &str,
    series: &TimeSeries,
    max_points: usize,
    color: Color,
) -> Figure {
    let dt = 1.0 / series.fs.max(1.0);
    let points: Vec<[f64; 2]> = series
        .data
        .iter()
        .enumerate()
        .map(|(i, value)| [i as f64 * dt, *value])
        .collect();
    let mut fig = Figure::new(Some(title.to_string()));
    fig.add_series(Series::Line(LineSeries {
        name: title.to_string(),
        points: decimate_points(&points, max_points),
        style: Style { width: 1.0, color },
    }));
    fig
}

/// One panel per lead of `signal` in the given lead order, amplitudes in mV.
pub fn lead_figures(signal: &EcgSignal, leads: &[&str], max_points: usize) -> Vec<Figure> {
    leads
        .iter()
        .filter_map(|name| {
            let idx = signal.lead_index(name)?;
            let ts = signal.lead_mv(idx)?;
            Some(figure_from_timeseries(name, &ts, max_points, LEAD_COLOR).with_axes("s", "mV"))
        })
        .collect()
}

/// The two panels of a lead analysis: the trace with its R-peaks and the
/// instantaneous heart rate.
pub fn analysis_figures(
    lead_name: &str,
    lead: &TimeSeries,
    beats: &BeatHrvPipelineResult,
    max_points: usize,
) -> Vec<Figure> {
    let mut signal = figure_from_timeseries(
        &format!("Lead {lead_name}: signal and peaks"),
        lead,
        max_points,
        LEAD_COLOR,
    )
    .with_axes("Time (s)", "mV");
    let peaks: Vec<[f64; 2]> = beats
        .events
        .indices
        .iter()
        .filter_map(|&idx| lead.data.get(idx).map(|v| [idx as f64 / lead.fs, *v]))
        .collect();
    signal.add_series(Series::Markers(MarkerSeries {
        name: "R-peaks".into(),
        points: peaks,
        radius: 3,
        color: PEAK_COLOR,
    }));

    let mut rate = Figure::new(Some("Heart rate".to_string())).with_axes("Time (s)", "bpm");
    rate.add_series(Series::Line(LineSeries {
        name: "Heart rate".into(),
        points: beats.heart_rate_points(),
        style: Style {
            width: 1.5,
            color: RATE_COLOR,
        },
    }));
    vec![signal, rate]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::EcgType;

    #[test]
    fn decimation_caps_point_count() {
        let points: Vec<[f64; 2]> = (0..1000).map(|i| [i as f64, 0.0]).collect();
        let out = decimate_points(&points, 100);
        assert_eq!(out.len(), 100);
        assert_eq!(out[1][0], 10.0);
        assert_eq!(decimate_points(&points[..10], 100).len(), 10);
    }

    #[test]
    fn bounds_pad_flat_traces() {
        let mut fig = Figure::new(None::<String>);
        assert_eq!(fig.bounds(), (0.0, 1.0, 0.0, 1.0));
        fig.add_series(Series::Line(LineSeries {
            name: "flat".into(),
            points: vec![[0.0, 2.0], [3.0, 2.0]],
            style: Style {
                width: 1.0,
                color: LEAD_COLOR,
            },
        }));
        assert_eq!(fig.bounds(), (0.0, 3.0, 1.5, 2.5));
    }

    #[test]
    fn lead_figures_follow_requested_order() {
        let signal = EcgSignal {
            ecg_type: EcgType::EightLead,
            fs: 500.0,
            leads: vec![vec![0.0; 20]; 8],
        };
        let figs = lead_figures(&signal, &["V6", "I", "aVF"], 10);
        let titles: Vec<_> = figs.iter().filter_map(|f| f.title.clone()).collect();
        assert_eq!(titles, vec!["V6", "I"]);
        assert_eq!(figs[0].series[0].points().len(), 10);
    }

    #[test]
    fn color_components() {
        assert_eq!(Color(0x102030).rgb(), (0x10, 0x20, 0x30));
    }
}

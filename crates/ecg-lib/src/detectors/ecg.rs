use crate::{
    metrics::hrv::{hrv_time, HRVTime},
    signal::{Events, RRSeries, TimeSeries},
};
use serde::{Deserialize, Serialize};

/// Parameters of the Pan–Tompkins style R-peak detector.
#[derive(Debug, Clone, Copy)]
pub struct EcgPipelineConfig {
    /// Lower cutoff for the single-pole high-pass filter (Hz).
    pub lowcut_hz: f64,
    /// Upper cutoff for the single-pole low-pass filter (Hz).
    pub highcut_hz: f64,
    /// Moving window integration length (seconds).
    pub integration_window_s: f64,
    /// Refractory period between two beats (seconds).
    pub min_rr_s: f64,
    /// Weight of the signal envelope over the noise envelope in the threshold.
    pub threshold_scale: f64,
    /// How far back (seconds) to look for the true R apex after a detection.
    pub search_back_s: f64,
}

impl Default for EcgPipelineConfig {
    fn default() -> Self {
        Self {
            lowcut_hz: 5.0,
            highcut_hz: 15.0,
            integration_window_s: 0.150,
            min_rr_s: 0.250,
            threshold_scale: 0.6,
            search_back_s: 0.150,
        }
    }
}

/// Beats, RR intervals and time-domain HRV of a single lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatHrvPipelineResult {
    pub fs: f64,
    pub sample_count: usize,
    pub events: Events,
    pub rr: RRSeries,
    pub hrv: HRVTime,
}

impl BeatHrvPipelineResult {
    pub fn from_events(ts: &TimeSeries, events: Events) -> Self {
        let rr = RRSeries::from_events(&events, ts.fs);
        let hrv = hrv_time(&rr);
        Self {
            fs: ts.fs,
            sample_count: ts.len(),
            events,
            rr,
            hrv,
        }
    }

    /// Mean heart rate in beats per minute, if at least one RR interval exists.
    pub fn mean_heart_rate(&self) -> Option<f64> {
        (self.hrv.avnn > 0.0).then(|| 60.0 / self.hrv.avnn)
    }

    /// Instantaneous heart rate `[time_s, bpm]`, one point per RR interval,
    /// placed at the closing beat.
    pub fn heart_rate_points(&self) -> Vec<[f64; 2]> {
        self.events
            .indices
            .iter()
            .skip(1)
            .zip(&self.rr.rr)
            .filter(|(_, rr)| **rr > 0.0)
            .map(|(idx, rr)| [*idx as f64 / self.fs, 60.0 / rr])
            .collect()
    }
}

/// Adaptive-threshold R-peak detector.
pub struct RPeakDetector {
    cfg: EcgPipelineConfig,
}

impl RPeakDetector {
    pub fn new(cfg: EcgPipelineConfig) -> Self {
        Self { cfg }
    }

    pub fn detect(&self, ts: &TimeSeries) -> Events {
        if ts.is_empty() {
            return Events::default();
        }
        let fs = ts.fs.max(1.0);
        let filtered = self.bandpass(&ts.data, fs);
        let envelope = self.envelope(&filtered, fs);
        let peaks = self.pick(&filtered, &envelope, fs);
        if peaks.len() < 2 {
            log::debug!(
                "adaptive detector found {} peak(s), using local-maximum fallback",
                peaks.len()
            );
            return Events::from_indices(self.local_maxima(ts));
        }
        Events::from_indices(peaks)
    }

    fn bandpass(&self, data: &[f64], fs: f64) -> Vec<f64> {
        let hp = if self.cfg.lowcut_hz > 0.0 {
            highpass(data, fs, self.cfg.lowcut_hz)
        } else {
            data.to_vec()
        };
        if self.cfg.highcut_hz <= 0.0 || self.cfg.highcut_hz >= fs * 0.5 {
            hp
        } else {
            lowpass(&hp, fs, self.cfg.highcut_hz)
        }
    }

    /// Differentiate, square and integrate over the configured window.
    fn envelope(&self, filtered: &[f64], fs: f64) -> Vec<f64> {
        let mut squared = Vec::with_capacity(filtered.len());
        squared.push(0.0);
        squared.extend(filtered.windows(2).map(|w| (w[1] - w[0]).powi(2)));
        let win = ((self.cfg.integration_window_s * fs).round() as usize).max(1);
        moving_average(&squared, win)
    }

    fn pick(&self, filtered: &[f64], envelope: &[f64], fs: f64) -> Vec<usize> {
        let refractory = ((self.cfg.min_rr_s * fs).round() as usize).max(1);
        let search = ((self.cfg.search_back_s * fs).round() as usize).max(1);

        let warmup = envelope.len().min((fs as usize).max(1));
        let seed = envelope[..warmup].iter().sum::<f64>() / warmup as f64;
        let mut signal_level = seed;
        let mut noise_level = seed * 0.5;
        let threshold_of = |signal: f64, noise: f64| {
            noise + self.cfg.threshold_scale * (signal - noise).max(0.0)
        };
        let mut threshold = threshold_of(signal_level, noise_level);
        let mut last_detection: Option<usize> = None;
        let mut peaks = Vec::new();

        for (i, &sample) in envelope.iter().enumerate() {
            let past_refractory = last_detection.map_or(true, |last| i - last >= refractory);
            if sample >= threshold && past_refractory {
                let start = i.saturating_sub(search);
                let end = i.min(filtered.len() - 1);
                let apex = (start..=end)
                    .max_by(|a, b| filtered[*a].total_cmp(&filtered[*b]))
                    .unwrap_or(i);
                peaks.push(apex);
                last_detection = Some(i);
                signal_level = 0.125 * sample + 0.875 * signal_level;
            } else {
                noise_level = 0.125 * sample + 0.875 * noise_level;
            }
            threshold = threshold_of(signal_level, noise_level);
        }

        peaks.sort_unstable();
        peaks.dedup();
        peaks
    }

    fn local_maxima(&self, ts: &TimeSeries) -> Vec<usize> {
        let data = &ts.data;
        if data.len() < 3 {
            return Vec::new();
        }
        let min_gap = ((self.cfg.min_rr_s * ts.fs) as usize).max(1);
        let baseline = moving_average(data, ((0.150 * ts.fs) as usize).max(1));
        let detrended: Vec<f64> = data.iter().zip(&baseline).map(|(x, b)| x - b).collect();
        let mut peaks: Vec<usize> = Vec::new();
        for i in 1..detrended.len() - 1 {
            let y = detrended[i];
            let is_peak = y > 0.0 && y > detrended[i - 1] && y > detrended[i + 1];
            let spaced = peaks.last().map_or(true, |last| i - last >= min_gap);
            if is_peak && spaced {
                peaks.push(i);
            }
        }
        peaks
    }
}

/// R-peak detection → RR series → time-domain HRV.
pub fn run_beat_hrv_pipeline(ts: &TimeSeries, cfg: &EcgPipelineConfig) -> BeatHrvPipelineResult {
    let events = RPeakDetector::new(*cfg).detect(ts);
    BeatHrvPipelineResult::from_events(ts, events)
}

fn highpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    let Some(&first) = data.first() else {
        return Vec::new();
    };
    let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff.max(0.01));
    let alpha = rc / (rc + 1.0 / fs);
    let (mut prev_x, mut prev_y) = (first, first);
    data.iter()
        .map(|&x| {
            prev_y = alpha * (prev_y + x - prev_x);
            prev_x = x;
            prev_y
        })
        .collect()
}

fn lowpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    let Some(&first) = data.first() else {
        return Vec::new();
    };
    let dt = 1.0 / fs;
    let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff.max(0.01));
    let alpha = dt / (rc + dt);
    let mut state = first;
    data.iter()
        .map(|&x| {
            state += alpha * (x - state);
            state
        })
        .collect()
}

fn moving_average(data: &[f64], win: usize) -> Vec<f64> {
    if win <= 1 {
        return data.to_vec();
    }
    let mut acc = 0.0;
    data.iter()
        .enumerate()
        .map(|(i, &sample)| {
            acc += sample;
            if i >= win {
                acc -= data[i - win];
            }
            acc / win as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_timeseries(fs: f64, rr: &[f64]) -> TimeSeries {
        use std::f64::consts::PI;
        let mut beats = vec![0.5];
        for &interval in rr {
            let next = beats[beats.len() - 1] + interval;
            beats.push(next);
        }
        let duration = beats[beats.len() - 1] + 1.0;
        let data = (0..(duration * fs) as usize)
            .map(|i| {
                let time = i as f64 / fs;
                let wander = 0.05 * (2.0 * PI * time).sin();
                let qrs: f64 = beats
                    .iter()
                    .map(|bt| 1.2 * (-0.5 * ((time - bt) / 0.02).powi(2)).exp())
                    .sum();
                wander + qrs
            })
            .collect();
        TimeSeries { fs, data }
    }

    #[test]
    fn detects_regular_beats() {
        let rr = [0.82, 0.78, 0.8, 0.79, 0.81, 0.77, 0.84, 0.88];
        let ts = synthetic_timeseries(500.0, &rr);
        let events = RPeakDetector::new(EcgPipelineConfig {
            min_rr_s: 0.3,
            ..EcgPipelineConfig::default()
        })
        .detect(&ts);
        assert_eq!(events.indices.len(), rr.len() + 1);
    }

    #[test]
    fn pipeline_reports_heart_rate() {
        let rr = [1.0; 6];
        let ts = synthetic_timeseries(500.0, &rr);
        let result = run_beat_hrv_pipeline(&ts, &EcgPipelineConfig::default());
        assert_eq!(result.events.indices.len(), 7);
        assert_eq!(result.rr.rr.len(), 6);
        let hr = result.mean_heart_rate().expect("heart rate");
        assert!((hr - 60.0).abs() < 1.0, "hr {hr}");
        assert_eq!(result.heart_rate_points().len(), 6);
    }

    #[test]
    fn empty_series_has_no_beats() {
        let ts = TimeSeries {
            fs: 500.0,
            data: Vec::new(),
        };
        let result = run_beat_hrv_pipeline(&ts, &EcgPipelineConfig::default());
        assert!(result.events.indices.is_empty());
        assert_eq!(result.mean_heart_rate(), None);
        assert!(result.heart_rate_points().is_empty());
    }
}

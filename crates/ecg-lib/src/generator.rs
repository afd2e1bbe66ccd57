//! Synthetic multi-lead ECG generation.
//!
//! The [`Generator`] trait is the seam the session layer talks to; the
//! [`SyntheticGenerator`] shipped here builds each beat from Gaussian P, Q,
//! R, S and T components with per-lead weights and a modulated RR interval,
//! then derives the limb leads III, aVR, aVL and aVF for 12-lead output.

use crate::signal::{EcgSignal, EcgType, ECG_SAMPLING_RATE};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{
    f64::consts::PI,
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
};
use thiserror::Error;

/// Largest batch a single request may ask for.
pub const MAX_BATCH: usize = 100;
/// Default signal length in seconds.
pub const ECG_DEFAULT_LENGTH_S: u32 = 10;
/// Multiplier from generator units (mV) to stored units (µV).
pub const ECG_DEFAULT_SCALE_FACTOR: f64 = 1000.0;

/// Whether an accelerator backend was compiled into this build.
const ACCELERATOR_AVAILABLE: bool = false;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("device {0} is not available")]
    DeviceUnavailable(Device),
    #[error("requested an empty batch")]
    EmptyBatch,
    #[error("requested {0} signals, more than the supported maximum")]
    BatchTooLarge(usize),
}

/// Compute device used for all generation calls in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    pub fn is_available(&self) -> bool {
        match self {
            Device::Cpu => true,
            Device::Cuda => ACCELERATOR_AVAILABLE,
        }
    }

    /// `cuda` when an accelerator is usable, `cpu` otherwise.
    pub fn preferred() -> Self {
        if Device::Cuda.is_available() {
            Device::Cuda
        } else {
            Device::Cpu
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generator model selectable from the UI. Only one model exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeneratorModel {
    #[default]
    Default,
}

impl GeneratorModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorModel::Default => "Default",
        }
    }
}

impl FromStr for GeneratorModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Default" => Ok(GeneratorModel::Default),
            other => Err(format!("unknown generator model {other:?}")),
        }
    }
}

/// Process-wide generation settings, fixed at startup.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub device: Device,
    pub length_s: u32,
    pub fs: f64,
    pub scale_factor: f64,
    /// Fixed seed for reproducible batches; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            device: Device::preferred(),
            length_s: ECG_DEFAULT_LENGTH_S,
            fs: ECG_SAMPLING_RATE,
            scale_factor: ECG_DEFAULT_SCALE_FACTOR,
            seed: None,
        }
    }
}

pub trait Generator: Send + Sync {
    fn generate(&self, count: usize, ecg_type: EcgType) -> Result<Vec<EcgSignal>, GeneratorError>;

    fn device(&self) -> Device;

    /// Human-readable identification for version output and logs.
    fn describe(&self) -> String;
}

/// Amplitude weights (mV) of the P, Q, R, S and T components in one lead.
#[derive(Debug, Clone, Copy)]
struct LeadWeights([f64; 5]);

/// Weights for I, II, V1..V6, the independent leads every batch needs.
const BASE_WEIGHTS: [LeadWeights; 8] = [
    LeadWeights([0.10, -0.05, 0.70, -0.10, 0.20]),
    LeadWeights([0.15, -0.08, 1.10, -0.20, 0.30]),
    LeadWeights([0.08, 0.00, 0.30, -0.90, 0.05]),
    LeadWeights([0.10, 0.00, 0.60, -1.10, 0.35]),
    LeadWeights([0.10, -0.05, 0.90, -0.70, 0.40]),
    LeadWeights([0.10, -0.10, 1.30, -0.40, 0.40]),
    LeadWeights([0.10, -0.10, 1.20, -0.25, 0.30]),
    LeadWeights([0.10, -0.08, 0.90, -0.15, 0.25]),
];

/// Per-beat morphology: component offsets from the R apex and widths (s).
#[derive(Debug, Clone, Copy)]
struct Beat {
    at: f64,
    offsets: [f64; 5],
    widths: [f64; 5],
    gain: [f64; 5],
}

impl Beat {
    fn component_sum(&self, t: f64, weights: &LeadWeights) -> f64 {
        (0..5)
            .map(|k| {
                let x = (t - self.at - self.offsets[k]) / self.widths[k];
                weights.0[k] * self.gain[k] * (-0.5 * x * x).exp()
            })
            .sum()
    }
}

pub struct SyntheticGenerator {
    config: GeneratorConfig,
    calls: AtomicU64,
}

impl SyntheticGenerator {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            config: config.clone(),
            calls: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn rng(&self) -> StdRng {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(call)),
            None => StdRng::from_entropy(),
        }
    }

    fn beats(&self, rng: &mut StdRng) -> Vec<Beat> {
        let duration = self.config.length_s as f64;
        let base_rr = 60.0 / rng.gen_range(55.0..95.0);
        let resp_hz = rng.gen_range(0.2..0.33);
        let mayer_hz = rng.gen_range(0.08..0.12);
        let mut beats = Vec::new();
        let mut at = rng.gen_range(0.1..base_rr);
        while at < duration + 0.5 {
            let modulation = 1.0
                + 0.04 * (2.0 * PI * resp_hz * at).sin()
                + 0.03 * (2.0 * PI * mayer_hz * at).sin();
            let rr = base_rr * modulation;
            // QT shortens with heart rate (Bazett).
            let qt_scale = rr.sqrt();
            beats.push(Beat {
                at,
                offsets: [-0.16, -0.025, 0.0, 0.03, 0.26 * qt_scale],
                widths: [0.025, 0.010, 0.012, 0.012, 0.055 * qt_scale],
                gain: [
                    jittered(rng, 0.05),
                    jittered(rng, 0.03),
                    jittered(rng, 0.03),
                    jittered(rng, 0.03),
                    jittered(rng, 0.05),
                ],
            });
            at += rr;
        }
        beats
    }

    fn synthesize(&self, ecg_type: EcgType, rng: &mut StdRng) -> EcgSignal {
        let fs = self.config.fs;
        let samples = (self.config.length_s as f64 * fs).round() as usize;
        let beats = self.beats(rng);
        let wander_hz = rng.gen_range(0.05..0.3);
        let wander_phase = rng.gen_range(0.0..2.0 * PI);
        let scale = self.config.scale_factor;

        let mut leads: Vec<Vec<f64>> = vec![Vec::with_capacity(samples); BASE_WEIGHTS.len()];
        let mut first_beat = 0;
        for i in 0..samples {
            let t = i as f64 / fs;
            while first_beat < beats.len() && beats[first_beat].at < t - 0.6 {
                first_beat += 1;
            }
            let nearby = beats[first_beat..]
                .iter()
                .take_while(|beat| beat.at < t + 0.6);
            let mut values = [0.0f64; 8];
            for beat in nearby {
                for (value, weights) in values.iter_mut().zip(BASE_WEIGHTS.iter()) {
                    *value += beat.component_sum(t, weights);
                }
            }
            let wander = 0.03 * (2.0 * PI * wander_hz * t + wander_phase).sin();
            for (lead, value) in leads.iter_mut().zip(values) {
                let noise = 0.008 * gaussian(rng);
                lead.push((value + wander + noise) * scale);
            }
        }

        if ecg_type == EcgType::TwelveLead {
            let (lead_i, lead_ii) = (&leads[0], &leads[1]);
            let iii: Vec<f64> = lead_ii.iter().zip(lead_i).map(|(ii, i)| ii - i).collect();
            let avr: Vec<f64> = lead_i.iter().zip(lead_ii).map(|(i, ii)| -(i + ii) / 2.0).collect();
            let avl: Vec<f64> = lead_i.iter().zip(lead_ii).map(|(i, ii)| i - ii / 2.0).collect();
            let avf: Vec<f64> = lead_ii.iter().zip(lead_i).map(|(ii, i)| ii - i / 2.0).collect();
            leads.extend([iii, avr, avl, avf]);
        }

        EcgSignal {
            ecg_type,
            fs,
            leads,
        }
    }
}

impl Generator for SyntheticGenerator {
    fn generate(&self, count: usize, ecg_type: EcgType) -> Result<Vec<EcgSignal>, GeneratorError> {
        if !self.config.device.is_available() {
            return Err(GeneratorError::DeviceUnavailable(self.config.device));
        }
        if count == 0 {
            return Err(GeneratorError::EmptyBatch);
        }
        if count > MAX_BATCH {
            return Err(GeneratorError::BatchTooLarge(count));
        }
        let mut rng = self.rng();
        let batch = (0..count)
            .map(|_| self.synthesize(ecg_type, &mut rng))
            .collect();
        log::debug!(
            "generated {} {} signal(s) on {}",
            count,
            ecg_type,
            self.config.device
        );
        Ok(batch)
    }

    fn device(&self) -> Device {
        self.config.device
    }

    fn describe(&self) -> String {
        format!(
            "synthetic PQRST generator ({} s @ {} Hz)",
            self.config.length_s, self.config.fs
        )
    }
}

fn jittered(rng: &mut StdRng, spread: f64) -> f64 {
    1.0 + spread * gaussian(rng)
}

/// Standard normal sample (Box–Muller).
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-12);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::ecg::{run_beat_hrv_pipeline, EcgPipelineConfig};

    fn seeded() -> SyntheticGenerator {
        SyntheticGenerator::new(&GeneratorConfig {
            device: Device::Cpu,
            seed: Some(7),
            ..GeneratorConfig::default()
        })
    }

    #[test]
    fn produces_requested_batch_shape() {
        let generator = seeded();
        let batch = generator.generate(3, EcgType::TwelveLead).unwrap();
        assert_eq!(batch.len(), 3);
        for signal in &batch {
            assert_eq!(signal.ecg_type, EcgType::TwelveLead);
            assert_eq!(signal.leads.len(), 12);
            assert_eq!(signal.len(), 5000);
            assert!(signal.leads.iter().all(|lead| lead.len() == 5000));
        }
        let eight = generator.generate(1, EcgType::EightLead).unwrap();
        assert_eq!(eight[0].leads.len(), 8);
    }

    #[test]
    fn derived_limb_leads_follow_einthoven() {
        let signal = seeded().generate(1, EcgType::TwelveLead).unwrap().remove(0);
        let (i, ii, iii) = (
            signal.lead("I").unwrap(),
            signal.lead("II").unwrap(),
            signal.lead("III").unwrap(),
        );
        let avr = signal.lead("aVR").unwrap();
        for k in (0..signal.len()).step_by(97) {
            assert!((ii[k] - i[k] - iii[k]).abs() < 1e-9);
            assert!((avr[k] + (i[k] + ii[k]) / 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn lead_two_has_plausible_rhythm() {
        let signal = seeded().generate(1, EcgType::EightLead).unwrap().remove(0);
        let lead = signal.lead_mv(1).unwrap();
        let result = run_beat_hrv_pipeline(&lead, &EcgPipelineConfig::default());
        let hr = result.mean_heart_rate().expect("beats detected");
        assert!((45.0..110.0).contains(&hr), "heart rate {hr}");
    }

    #[test]
    fn rejects_unavailable_device_and_bad_counts() {
        let cuda = SyntheticGenerator::new(&GeneratorConfig {
            device: Device::Cuda,
            ..GeneratorConfig::default()
        });
        assert!(matches!(
            cuda.generate(1, EcgType::TwelveLead),
            Err(GeneratorError::DeviceUnavailable(Device::Cuda))
        ));
        let cpu = seeded();
        assert!(matches!(
            cpu.generate(0, EcgType::TwelveLead),
            Err(GeneratorError::EmptyBatch)
        ));
        assert!(matches!(
            cpu.generate(MAX_BATCH + 1, EcgType::TwelveLead),
            Err(GeneratorError::BatchTooLarge(_))
        ));
    }

    #[test]
    fn parses_model_names() {
        assert_eq!("Default".parse::<GeneratorModel>(), Ok(GeneratorModel::Default));
        assert!("GAN-2".parse::<GeneratorModel>().is_err());
    }
}

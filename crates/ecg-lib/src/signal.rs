use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sampling rate of every generated ECG (Hz).
pub const ECG_SAMPLING_RATE: f64 = 500.0;

/// Lead names in the order the generator emits them.
pub const ECG12_LEADS: [&str; 12] = [
    "I", "II", "V1", "V2", "V3", "V4", "V5", "V6", "III", "aVR", "aVL", "aVF",
];
pub const ECG8_LEADS: [&str; 8] = ["I", "II", "V1", "V2", "V3", "V4", "V5", "V6"];

/// Basic typed time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }
}

/// Point events on a timeline (e.g., R-peaks indices)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }
}

/// RR intervals (seconds)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RRSeries {
    pub rr: Vec<f64>,
}

impl RRSeries {
    pub fn from_events(events: &Events, fs: f64) -> Self {
        let rr = events
            .indices
            .windows(2)
            .map(|w| (w[1] as f64 - w[0] as f64) / fs)
            .collect();
        Self { rr }
    }
}

/// Lead configuration of a generated batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EcgType {
    #[serde(rename = "ECG-8")]
    EightLead,
    #[default]
    #[serde(rename = "ECG-12")]
    TwelveLead,
}

/// Returned when a lead configuration string names neither ECG-8 nor ECG-12.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid lead configuration {0:?}")]
pub struct UnknownEcgType(pub String);

impl EcgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EcgType::EightLead => "ECG-8",
            EcgType::TwelveLead => "ECG-12",
        }
    }

    /// Lead names in generator (storage) order.
    pub fn lead_names(&self) -> &'static [&'static str] {
        match self {
            EcgType::EightLead => &ECG8_LEADS,
            EcgType::TwelveLead => &ECG12_LEADS,
        }
    }

    pub fn lead_count(&self) -> usize {
        self.lead_names().len()
    }

    /// Order in which leads are laid out on gallery images, as indices into
    /// [`EcgType::lead_names`].
    pub fn display_order(&self) -> &'static [usize] {
        match self {
            EcgType::EightLead => &[0, 1, 2, 3, 4, 5, 6, 7],
            EcgType::TwelveLead => &[0, 1, 8, 9, 10, 11, 2, 3, 4, 5, 6, 7],
        }
    }

    /// Lead names in the order printed on exported documents.
    pub fn document_leads(&self) -> &'static [&'static str] {
        match self {
            EcgType::EightLead => &ECG8_LEADS,
            EcgType::TwelveLead => &[
                "I", "II", "III", "aVL", "aVR", "aVF", "V1", "V2", "V3", "V4", "V5", "V6",
            ],
        }
    }
}

impl fmt::Display for EcgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EcgType {
    type Err = UnknownEcgType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ECG-8" => Ok(EcgType::EightLead),
            "ECG-12" => Ok(EcgType::TwelveLead),
            other => Err(UnknownEcgType(other.to_string())),
        }
    }
}

/// One generated multi-lead ECG. Samples are stored in µV, one vector per
/// lead, in [`EcgType::lead_names`] order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcgSignal {
    pub ecg_type: EcgType,
    pub fs: f64,
    pub leads: Vec<Vec<f64>>,
}

impl EcgSignal {
    /// Number of samples per lead.
    pub fn len(&self) -> usize {
        self.leads.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.fs
    }

    pub fn lead_index(&self, name: &str) -> Option<usize> {
        self.ecg_type.lead_names().iter().position(|lead| *lead == name)
    }

    pub fn lead(&self, name: &str) -> Option<&[f64]> {
        self.lead_index(name)
            .and_then(|idx| self.leads.get(idx))
            .map(Vec::as_slice)
    }

    /// Lead converted from µV to mV as a [`TimeSeries`].
    pub fn lead_mv(&self, idx: usize) -> Option<TimeSeries> {
        self.leads.get(idx).map(|samples| TimeSeries {
            fs: self.fs,
            data: samples.iter().map(|uv| uv / 1000.0).collect(),
        })
    }

    /// Sample-index timestamps, one per row of the signal.
    pub fn timestamps(&self) -> impl Iterator<Item = usize> {
        0..self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lead_configurations() {
        assert_eq!("ECG-8".parse::<EcgType>(), Ok(EcgType::EightLead));
        assert_eq!(" ECG-12 ".parse::<EcgType>(), Ok(EcgType::TwelveLead));
        assert_eq!(
            "ECG-99".parse::<EcgType>(),
            Err(UnknownEcgType("ECG-99".into()))
        );
    }

    #[test]
    fn display_order_covers_every_lead_once() {
        for ecg_type in [EcgType::EightLead, EcgType::TwelveLead] {
            let mut order = ecg_type.display_order().to_vec();
            order.sort_unstable();
            let expected: Vec<usize> = (0..ecg_type.lead_count()).collect();
            assert_eq!(order, expected);
            assert_eq!(ecg_type.document_leads().len(), ecg_type.lead_count());
        }
    }

    #[test]
    fn lead_lookup_and_unit_conversion() {
        let signal = EcgSignal {
            ecg_type: EcgType::EightLead,
            fs: 500.0,
            leads: (0..8).map(|i| vec![1000.0 * i as f64; 10]).collect(),
        };
        assert_eq!(signal.len(), 10);
        assert_eq!(signal.lead("V1").map(|l| l[0]), Some(2000.0));
        assert!(signal.lead("aVF").is_none());
        let v1 = signal.lead_mv(2).unwrap();
        assert_eq!(v1.data[0], 2.0);
        assert!((signal.duration() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn rr_from_events() {
        let events = Events::from_indices(vec![0, 500, 900]);
        let rr = RRSeries::from_events(&events, 500.0);
        assert_eq!(rr.rr, vec![1.0, 0.8]);
    }
}

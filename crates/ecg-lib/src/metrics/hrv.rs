use crate::signal::RRSeries;
use serde::{Deserialize, Serialize};

/// Time-domain heart rate variability summary (all durations in seconds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HRVTime {
    pub n: usize,
    pub avnn: f64,
    pub sdnn: f64,
    pub rmssd: f64,
    pub pnn50: f64,
}

pub fn hrv_time(rr: &RRSeries) -> HRVTime {
    let n = rr.rr.len();
    if n == 0 {
        return HRVTime::default();
    }
    let avnn = rr.rr.iter().sum::<f64>() / n as f64;
    if n == 1 {
        return HRVTime {
            n,
            avnn,
            ..HRVTime::default()
        };
    }
    let dof = n as f64 - 1.0;
    let sdnn = (rr.rr.iter().map(|x| (x - avnn).powi(2)).sum::<f64>() / dof).sqrt();
    let successive: Vec<f64> = rr.rr.windows(2).map(|w| w[1] - w[0]).collect();
    let rmssd = (successive.iter().map(|d| d * d).sum::<f64>() / dof).sqrt();
    let pnn50 = successive.iter().filter(|d| d.abs() > 0.050).count() as f64 / dof;
    HRVTime {
        n,
        avnn,
        sdnn,
        rmssd,
        pnn50,
    }
}

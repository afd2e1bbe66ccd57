pub mod detectors;
pub mod generator;
pub mod io;
pub mod metrics;
pub mod plot;
pub mod signal;

pub use detectors::*;
pub use generator::*;
pub use metrics::*;
pub use signal::*;

pub mod csv;
pub mod pdf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("i/o error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("signal has no lead named {0}")]
    MissingLead(String),
}

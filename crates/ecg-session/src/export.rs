use ecg_lib::{
    io::{
        csv::write_signal_csv,
        pdf::{write_signal_pdf, AnalysisPage},
        ExportError,
    },
    signal::EcgSignal,
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr};

use crate::render::AnalysisFigure;

/// Downloadable representations of the selected signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportKind {
    #[serde(rename = "csv")]
    TabularData,
    #[serde(rename = "pdf")]
    Document,
    #[serde(rename = "pdf-analysis")]
    DocumentWithAnalysis,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::TabularData => "csv",
            ExportKind::Document => "pdf",
            ExportKind::DocumentWithAnalysis => "pdf-analysis",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportKind::TabularData => "csv",
            ExportKind::Document | ExportKind::DocumentWithAnalysis => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportKind::TabularData => "text/csv",
            ExportKind::Document | ExportKind::DocumentWithAnalysis => "application/pdf",
        }
    }

    /// File name for the signal with 1-based batch position `number`.
    pub fn file_name(&self, number: usize) -> String {
        format!("ECG-{number}.{}", self.extension())
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(ExportKind::TabularData),
            "pdf" => Ok(ExportKind::Document),
            "pdf-analysis" => Ok(ExportKind::DocumentWithAnalysis),
            other => Err(format!("unknown export kind {other:?}")),
        }
    }
}

pub trait Exporter: Send + Sync {
    fn write_csv(&self, signal: &EcgSignal, path: &Path) -> Result<(), ExportError>;

    /// `number` is the 1-based batch position printed in the title.
    fn write_pdf(
        &self,
        signal: &EcgSignal,
        path: &Path,
        number: usize,
        analysis: Option<&AnalysisFigure>,
    ) -> Result<(), ExportError>;
}

/// Writes CSV tables and paginated PDF documents to disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExporter;

impl Exporter for FileExporter {
    fn write_csv(&self, signal: &EcgSignal, path: &Path) -> Result<(), ExportError> {
        write_signal_csv(signal, path)
    }

    fn write_pdf(
        &self,
        signal: &EcgSignal,
        path: &Path,
        number: usize,
        analysis: Option<&AnalysisFigure>,
    ) -> Result<(), ExportError> {
        let page = analysis.map(|figure| AnalysisPage {
            title: format!("Analysis of ECG-{}", figure.signal_index() + 1),
            panels: figure.panels(),
            notes: figure.summary().notes(),
        });
        write_signal_pdf(
            signal,
            signal.ecg_type.document_leads(),
            path,
            number,
            page.as_ref(),
        )
    }
}

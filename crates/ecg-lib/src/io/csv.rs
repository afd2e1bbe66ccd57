use super::ExportError;
use crate::signal::EcgSignal;
use csv::WriterBuilder;
use std::path::Path;

/// Write `signal` as a comma-separated table: a `Timestamp` column (sample
/// index) followed by one µV column per lead in generator order.
pub fn write_signal_csv(signal: &EcgSignal, path: &Path) -> Result<(), ExportError> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    let mut header = vec!["Timestamp"];
    header.extend_from_slice(signal.ecg_type.lead_names());
    writer.write_record(&header)?;
    let mut row = Vec::with_capacity(header.len());
    for sample in signal.timestamps() {
        row.clear();
        row.push(sample.to_string());
        row.extend(signal.leads.iter().map(|lead| format!("{:.3}", lead[sample])));
        writer.write_record(&row)?;
    }
    writer.flush().map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

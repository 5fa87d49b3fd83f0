//! Per-run CSV summary rows (spec §6: "Results are persisted to CSV and
//! JSON files whose schemas are the key/value pairs listed in the output
//! bundle plus per-run identification fields").

use serde::Serialize;

use crate::engine::driver::EngineOutput;
use crate::error::{Error, Result};

/// One CSV row: a run's identification fields plus its metrics (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub workflow_name: String,
    pub task_count: usize,
    pub vm_count: usize,
    pub ccr: f64,
    pub makespan: f64,
    pub slr: f64,
    pub avu: f64,
    pub vf: f64,
    pub duplication_count: usize,
}

impl SummaryRow {
    pub fn from_output(workflow_name: &str, task_count: usize, vm_count: usize, ccr: f64, output: &EngineOutput) -> Self {
        Self {
            workflow_name: workflow_name.to_string(),
            task_count,
            vm_count,
            ccr,
            makespan: output.metrics.makespan,
            slr: output.metrics.slr,
            avu: output.metrics.avu,
            vf: output.metrics.vf,
            duplication_count: output.metrics.duplication_count,
        }
    }
}

/// Appends `rows` to a CSV file at `path`, writing the header only when the
/// file does not yet exist.
pub fn write_csv(path: &str, rows: &[SummaryRow]) -> Result<()> {
    let write_header = !std::path::Path::new(path).exists();

    let file = std::fs::OpenOptions::new().create(true).append(true).open(path).map_err(Error::IoError)?;
    let mut writer = csv::WriterBuilder::new().has_headers(write_header).from_writer(file);

    for row in rows {
        writer.serialize(row).map_err(|e| Error::IoError(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    }
    writer.flush().map_err(Error::IoError)?;
    Ok(())
}

pub mod api;
pub mod engine;
pub mod error;
pub mod loader;
pub mod logger;
pub mod model;
pub mod results;

use crate::api::dto::{build_output, build_scenario, OutputDto, ScenarioDto};
use crate::engine::driver::{self, EngineOutput};
use crate::error::Result;
use crate::loader::parser::parse_json_file;

/// Per-run identification fields carried alongside a scenario's raw DTO
/// (spec §6: "per-run identification fields").
#[derive(Debug, Clone, Copy)]
pub struct ScenarioMeta {
    pub task_count: usize,
    pub vm_count: usize,
    pub ccr: f64,
}

/// Loads a scenario from `file_path`, runs the two-pass engine, and returns
/// the raw [`EngineOutput`], its serializable [`OutputDto`], and the
/// scenario's identification fields.
pub fn run_scenario(file_path: &str) -> Result<(EngineOutput, OutputDto, ScenarioMeta)> {
    let dto: ScenarioDto = parse_json_file(file_path)?;
    let meta = ScenarioMeta { task_count: dto.tasks.len(), vm_count: dto.vms.len(), ccr: dto.ccr };
    let (graph, vms, table) = build_scenario(&dto)?;
    let output = driver::run(&graph, &vms, &table)?;
    let output_dto = build_output(&graph, &output);
    Ok((output, output_dto, meta))
}

use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;

use sm_cptd_scheduler::results::{write_csv, SummaryRow};
use sm_cptd_scheduler::{logger, run_scenario};

/// Runs the SM-CPTD scheduling engine against a single scenario file.
#[derive(Debug, Parser)]
#[command(name = "sm_cptd_scheduler", version, about = "SM-CPTD workflow scheduling engine")]
struct Cli {
    /// Path to the scenario JSON file (spec §6 input bundle: tasks, VMs, CCR, comm-cost table).
    input: PathBuf,

    /// Optional path to write the output bundle as JSON.
    #[arg(long)]
    output_json: Option<PathBuf>,

    /// Optional path to append a one-line CSV summary row to.
    #[arg(long)]
    output_csv: Option<PathBuf>,

    /// Name recorded in the CSV summary row's `workflow_name` field.
    #[arg(long, default_value = "scenario")]
    workflow_name: String,
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let cli = Cli::parse();

    let input_path = cli.input.to_string_lossy().into_owned();
    log::info!("loading scenario from {input_path}");

    let (output, output_dto, meta) = match run_scenario(&input_path) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            log::error!("scenario run failed: {err}");
            std::process::exit(1);
        }
    };

    println!(
        "{} makespan={:.3} slr={:.3} avu={:.3} vf={:.6} duplications={}",
        "ok:".green().bold(),
        output.metrics.makespan,
        output.metrics.slr,
        output.metrics.avu,
        output.metrics.vf,
        output.metrics.duplication_count
    );

    if let Some(json_path) = &cli.output_json {
        let json = serde_json::to_string_pretty(&output_dto)?;
        std::fs::write(json_path, json)?;
        log::info!("wrote output bundle to {}", json_path.display());
    }

    if let Some(csv_path) = &cli.output_csv {
        let row = SummaryRow::from_output(&cli.workflow_name, meta.task_count, meta.vm_count, meta.ccr, &output);
        write_csv(&csv_path.to_string_lossy(), std::slice::from_ref(&row))?;
        log::info!("appended summary row to {}", csv_path.display());
    }

    Ok(())
}

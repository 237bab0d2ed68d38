use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use qsw_core::Mode;
use qsw_exp::{export, load_plan, run_plan, RunOpts};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the plan YAML file.
    #[arg(long)]
    pub plan: PathBuf,
    /// Output directory for CSV tables and the JSON report.
    #[arg(long)]
    pub out: PathBuf,
    /// Override the plan's worker count.
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Override the per-invocation timeout in seconds (0 disables it).
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    /// Restrict the sweep to these modes.
    #[arg(long = "mode", value_name = "MODE")]
    pub modes: Vec<Mode>,
    /// Also write the combined `Mode,Buckets,Error` table.
    #[arg(long, default_value_t = false)]
    pub combined: bool,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let mut plan = load_plan(&args.plan)?;
    if let Some(concurrency) = args.concurrency {
        plan.scheduler.concurrency = concurrency;
    }
    if let Some(timeout_secs) = args.timeout_secs {
        plan.invocation.timeout_secs = timeout_secs;
    }
    if !args.modes.is_empty() {
        plan.modes = args.modes.clone();
        plan.modes.sort_unstable();
        plan.modes.dedup();
    }

    let report = run_plan(&plan, &RunOpts::from_plan(&plan))?;
    export::write_outputs(&report, &args.out, args.combined)?;

    for (mode, summary) in &report.summary {
        let best = summary
            .best
            .map(|(buckets, error)| format!("{buckets} buckets -> {error}"))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "mode {} ({}): {} records, {} measured, {} unparsed, {} failed, best {}",
            mode.token(),
            mode,
            summary.records,
            summary.measured,
            summary.unparsed,
            summary.failed,
            best
        );
    }
    Ok(())
}

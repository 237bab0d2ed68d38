use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use qsw_core::{Mode, ParameterRange};
use qsw_exp::SweepPlan;

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Destination path for the generated plan YAML.
    #[arg(long)]
    pub out: PathBuf,
    /// Executable implementing the quantisation protocol.
    #[arg(long, default_value = "./build/MyImageApplication")]
    pub program: PathBuf,
    /// Image handed to every invocation.
    #[arg(long, default_value = "./dataset/test5.rgb")]
    pub input: PathBuf,
    /// First bucket count, inclusive.
    #[arg(long, default_value_t = 2)]
    pub start: u32,
    /// Last bucket count, inclusive.
    #[arg(long, default_value_t = 256)]
    pub end: u32,
    /// Modes to sweep (`uniform`, `non-uniform`, `1` or `2`); defaults to both.
    #[arg(long = "mode", value_name = "MODE")]
    pub modes: Vec<Mode>,
    /// Worker count.
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,
    /// Literal preceding the measurement in the program output.
    #[arg(long)]
    pub marker: Option<String>,
}

pub fn run(args: &PlanArgs) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut plan = SweepPlan::new(&args.program, &args.input);
    plan.parameters = ParameterRange::new(args.start, args.end);
    if !args.modes.is_empty() {
        plan.modes = args.modes.clone();
        plan.modes.sort_unstable();
        plan.modes.dedup();
    }
    plan.scheduler.concurrency = args.concurrency;
    plan.parser.marker = args.marker.clone();
    plan.validate()?;
    fs::write(&args.out, plan.to_yaml_string()?)?;
    tracing::info!(path = %args.out.display(), "plan written");
    Ok(())
}

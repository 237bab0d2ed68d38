use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use qsw_core::{ErrorInfo, MeasurementParser, Mode, ParameterRange, QswError};
use serde::{Deserialize, Serialize};

use crate::codec::{from_yaml_slice, stable_hash_string, to_yaml_string};
use crate::invoke::ProcessInvoker;
use crate::protocol::validate_range;

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheduler {
    /// Number of invocations allowed to run at once.
    #[serde(default = "Scheduler::default_concurrency")]
    pub concurrency: usize,
}

impl Scheduler {
    const fn default_concurrency() -> usize {
        4
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            concurrency: Self::default_concurrency(),
        }
    }
}

/// Per-invocation process policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationSpec {
    /// Wall-clock budget per invocation in seconds; `0` disables the timeout.
    #[serde(default = "InvocationSpec::default_timeout_secs")]
    pub timeout_secs: u64,
    /// Record a failure when the program exits with a non-zero status.
    #[serde(default)]
    pub require_success: bool,
}

impl InvocationSpec {
    const fn default_timeout_secs() -> u64 {
        300
    }

    /// Timeout as a duration, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for InvocationSpec {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
            require_success: false,
        }
    }
}

/// Sweep description loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPlan {
    /// Executable implementing the quantisation protocol.
    pub program: PathBuf,
    /// Image handed to every invocation.
    pub input: PathBuf,
    /// Modes to sweep.
    #[serde(default = "SweepPlan::default_modes")]
    pub modes: Vec<Mode>,
    /// Inclusive range of bucket counts.
    #[serde(default)]
    pub parameters: ParameterRange,
    /// Worker pool settings.
    #[serde(default)]
    pub scheduler: Scheduler,
    /// Process policy.
    #[serde(default)]
    pub invocation: InvocationSpec,
    /// Output parsing settings.
    #[serde(default)]
    pub parser: MeasurementParser,
    /// Directory containing the plan on disk (ignored when serializing).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl SweepPlan {
    fn default_modes() -> Vec<Mode> {
        Mode::ALL.to_vec()
    }

    /// Plan with the observed defaults for `program` and `input`.
    pub fn new(program: impl Into<PathBuf>, input: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            input: input.into(),
            modes: Self::default_modes(),
            parameters: ParameterRange::default(),
            scheduler: Scheduler::default(),
            invocation: InvocationSpec::default(),
            parser: MeasurementParser::default(),
            base_dir: PathBuf::new(),
        }
    }

    /// Returns the deterministic hash associated with the plan contents.
    pub fn plan_hash(&self) -> Result<String, QswError> {
        stable_hash_string(self)
    }

    /// Distinct modes in ascending order.
    pub fn mode_set(&self) -> BTreeSet<Mode> {
        self.modes.iter().copied().collect()
    }

    /// Program path, resolved against the plan directory when relative.
    pub fn program_path(&self) -> PathBuf {
        self.base_dir.join(&self.program)
    }

    /// Input path, resolved against the plan directory when relative.
    pub fn input_path(&self) -> PathBuf {
        self.base_dir.join(&self.input)
    }

    /// Builds the process invoker described by the plan.
    pub fn invoker(&self) -> ProcessInvoker {
        ProcessInvoker::new(self.program_path())
            .with_timeout(self.invocation.timeout())
            .require_success(self.invocation.require_success)
    }

    /// Checks the plan before any process is spawned.
    pub fn validate(&self) -> Result<(), QswError> {
        if self.modes.is_empty() {
            return Err(QswError::config("no_modes", "plan selects no modes"));
        }
        if self.scheduler.concurrency == 0 {
            return Err(QswError::Config(
                ErrorInfo::new("zero_concurrency", "concurrency must be at least 1")
                    .with_hint("set scheduler.concurrency or pass --concurrency"),
            ));
        }
        validate_range(&self.parameters)
    }

    /// Serializes the plan to YAML.
    pub fn to_yaml_string(&self) -> Result<String, QswError> {
        to_yaml_string(self)
    }
}

/// Loads a plan from disk, deduplicating modes and recording its directory.
pub fn load_plan<P: AsRef<Path>>(path: P) -> Result<SweepPlan, QswError> {
    let plan_path = path.as_ref();
    let bytes = fs::read(plan_path).map_err(|err| {
        QswError::Io(
            ErrorInfo::new("plan_read", err.to_string())
                .with_context("path", plan_path.display().to_string()),
        )
    })?;
    let mut plan: SweepPlan = from_yaml_slice(&bytes, plan_path)?;
    plan.modes = plan.mode_set().into_iter().collect();
    plan.base_dir = plan_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    plan.validate()?;
    Ok(plan)
}

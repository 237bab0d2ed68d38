use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use qsw_core::{
    ErrorInfo, MeasurementParser, Mode, ParameterRange, QswError, ResultRecord, ResultSet,
    ResultSets, Task,
};
use rayon::prelude::*;

use crate::invoke::Invoker;
use crate::plan::{load_plan, SweepPlan};
use crate::protocol::{validate_range, InvocationArguments};
use crate::report::{SweepProvenance, SweepReport};

fn engine_error(code: &str, err: impl ToString) -> QswError {
    QswError::Engine(ErrorInfo::new(code, err.to_string()))
}

/// Shared flag for cooperative cancellation of a running sweep.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Tasks not yet started are skipped.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options governing sweep execution.
#[derive(Debug, Clone)]
pub struct RunOpts {
    /// Number of invocations executed in parallel.
    pub concurrency: usize,
    /// Cancellation flag observed by every worker.
    pub cancel: CancelFlag,
}

impl RunOpts {
    /// Options taking concurrency from the plan's scheduler.
    pub fn from_plan(plan: &SweepPlan) -> Self {
        Self {
            concurrency: plan.scheduler.concurrency,
            ..Self::default()
        }
    }
}

impl Default for RunOpts {
    fn default() -> Self {
        Self {
            concurrency: 4,
            cancel: CancelFlag::new(),
        }
    }
}

/// Expands the Cartesian product of `modes` and `range` into tasks.
pub fn generate_tasks(modes: &BTreeSet<Mode>, range: ParameterRange) -> Vec<Task> {
    modes
        .iter()
        .flat_map(|&mode| range.iter().map(move |parameter| Task::new(mode, parameter)))
        .collect()
}

/// Per-mode result sets under construction. Commit is the only synchronised step.
struct Collector {
    sets: BTreeMap<Mode, Mutex<ResultSet>>,
}

impl Collector {
    fn new(modes: &BTreeSet<Mode>, per_mode: usize) -> Self {
        let sets = modes
            .iter()
            .map(|&mode| (mode, Mutex::new(ResultSet::with_capacity(mode, per_mode))))
            .collect();
        Self { sets }
    }

    fn commit(&self, mode: Mode, record: ResultRecord) -> Result<(), QswError> {
        let slot = self.sets.get(&mode).ok_or_else(|| {
            QswError::Engine(
                ErrorInfo::new("unknown_mode", "task mode has no result set")
                    .with_context("mode", mode.to_string()),
            )
        })?;
        let mut set = slot
            .lock()
            .map_err(|err| engine_error("result_set_poisoned", err))?;
        set.push(record);
        Ok(())
    }

    fn finish(self) -> Result<ResultSets, QswError> {
        self.sets
            .into_values()
            .map(|slot| {
                slot.into_inner()
                    .map_err(|err| engine_error("result_set_poisoned", err))
            })
            .collect()
    }
}

/// Runs sweeps for one input image through an [`Invoker`].
#[derive(Debug)]
pub struct SweepEngine<I> {
    invoker: I,
    input: PathBuf,
    parser: MeasurementParser,
}

impl<I: Invoker> SweepEngine<I> {
    /// Engine feeding `input` to `invoker`, parsing with the plain digit rule.
    pub fn new(invoker: I, input: impl Into<PathBuf>) -> Self {
        Self {
            invoker,
            input: input.into(),
            parser: MeasurementParser::default(),
        }
    }

    /// Replaces the output parser.
    pub fn with_parser(mut self, parser: MeasurementParser) -> Self {
        self.parser = parser;
        self
    }

    /// Evaluates every (mode, parameter) pair and partitions the records by mode.
    ///
    /// Returns only after every task has been committed. Invocation and parse
    /// failures are recorded per task; an error means no results at all.
    pub fn run(
        &self,
        modes: &BTreeSet<Mode>,
        range: ParameterRange,
        opts: &RunOpts,
    ) -> Result<ResultSets, QswError> {
        if modes.is_empty() {
            return Err(QswError::config("no_modes", "no modes selected"));
        }
        if opts.concurrency == 0 {
            return Err(QswError::config(
                "zero_concurrency",
                "concurrency must be at least 1",
            ));
        }
        validate_range(&range)?;

        let tasks = generate_tasks(modes, range);
        let collector = Collector::new(modes, range.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.concurrency)
            .thread_name(|index| format!("qsw-worker-{index}"))
            .build()
            .map_err(|err| engine_error("thread_pool", err))?;

        tracing::info!(
            tasks = tasks.len(),
            modes = modes.len(),
            start = range.start,
            end = range.end,
            concurrency = opts.concurrency,
            "sweep started"
        );
        let started = Instant::now();

        pool.install(|| {
            tasks.par_iter().try_for_each(|&task| -> Result<(), QswError> {
                if opts.cancel.is_cancelled() {
                    return Ok(());
                }
                let record = self.execute(task)?;
                collector.commit(task.mode, record)
            })
        })?;

        if opts.cancel.is_cancelled() {
            tracing::warn!("sweep cancelled, discarding partial results");
            return Err(engine_error("cancelled", "sweep cancelled"));
        }

        let results = collector.finish()?;
        tracing::info!(
            records = results.total_records(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sweep finished"
        );
        Ok(results)
    }

    fn execute(&self, task: Task) -> Result<ResultRecord, QswError> {
        let args = InvocationArguments::for_task(&self.input, task)?;
        let record = match self.invoker.invoke(&args) {
            Ok(output) => ResultRecord::parsed(task.parameter, self.parser.parse(&output)),
            Err(failure) => {
                tracing::warn!(
                    mode = %task.mode,
                    parameter = task.parameter,
                    %failure,
                    "invocation failed"
                );
                ResultRecord::failed(task.parameter, failure)
            }
        };
        tracing::debug!(
            mode = %task.mode,
            parameter = task.parameter,
            measurement = ?record.measurement,
            "task committed"
        );
        Ok(record)
    }
}

/// Executes a sweep plan against its configured program.
pub fn run_plan(plan: &SweepPlan, opts: &RunOpts) -> Result<SweepReport, QswError> {
    plan.validate()?;
    let engine = SweepEngine::new(plan.invoker(), plan.input_path()).with_parser(plan.parser.clone());
    let started = Instant::now();
    let results = engine.run(&plan.mode_set(), plan.parameters, opts)?;
    let provenance = SweepProvenance::capture(plan, opts.concurrency, started.elapsed());
    Ok(SweepReport::new(plan.plan_hash()?, results, provenance))
}

/// Loads a plan from disk and executes it.
pub fn run_plan_from_path(plan_path: &Path, opts: &RunOpts) -> Result<SweepReport, QswError> {
    let plan = load_plan(plan_path)?;
    run_plan(&plan, opts)
}

#![deny(missing_docs)]
#![doc = "Concurrent sweep execution against the external quantisation program."]

/// JSON/YAML helpers and plan hashing.
pub mod codec;
/// Execution engine and plan runner.
pub mod dispatch;
/// CSV and JSON result sinks.
pub mod export;
/// Process invocation.
pub mod invoke;
/// Sweep plan schema and loading.
pub mod plan;
/// External program protocol.
pub mod protocol;
/// Report assembly.
pub mod report;

pub use codec::{from_json_slice, stable_hash_string, to_canonical_json_bytes};
pub use dispatch::{generate_tasks, run_plan, run_plan_from_path, CancelFlag, RunOpts, SweepEngine};
pub use export::{mode_csv_file, write_combined_csv, write_mode_csv, write_outputs};
pub use invoke::{Invoker, ProcessInvoker, DEFAULT_TIMEOUT};
pub use plan::{load_plan, InvocationSpec, Scheduler, SweepPlan};
pub use protocol::{transform_parameter, InvocationArguments, PROTOCOL_VERSION, SENTINEL};
pub use report::{ModeSummary, SweepProvenance, SweepReport};

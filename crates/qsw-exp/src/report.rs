use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use qsw_core::{Mode, ResultSet, ResultSets};
use serde::{Deserialize, Serialize};

use crate::plan::SweepPlan;
use crate::protocol::PROTOCOL_VERSION;

/// Record counts for one mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ModeSummary {
    /// Number of records collected.
    pub records: usize,
    /// Records with a measurement.
    pub measured: usize,
    /// Records whose output held no digits.
    pub unparsed: usize,
    /// Records whose invocation failed.
    pub failed: usize,
    /// Parameter with the smallest measurement, ties broken by smaller parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best: Option<(u32, u64)>,
}

impl ModeSummary {
    /// Summarises one result set.
    pub fn from_set(set: &ResultSet) -> Self {
        let mut summary = Self {
            records: set.len(),
            ..Self::default()
        };
        for record in set.iter() {
            match (record.measurement, &record.failure) {
                (_, Some(_)) => summary.failed += 1,
                (Some(value), None) => {
                    summary.measured += 1;
                    let candidate = (record.parameter, value);
                    summary.best = Some(match summary.best {
                        Some(best) if (best.1, best.0) <= (value, record.parameter) => best,
                        _ => candidate,
                    });
                }
                (None, None) => summary.unparsed += 1,
            }
        }
        summary
    }
}

/// Where and how a sweep ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SweepProvenance {
    /// RFC 3339 timestamp recording when the sweep finished.
    pub created_at: String,
    /// Harness version.
    pub tool_version: String,
    /// Executable that was invoked.
    pub program: String,
    /// Input image.
    pub input: String,
    /// Worker count used.
    pub concurrency: usize,
    /// Wall-clock duration of the sweep.
    pub elapsed_ms: u64,
}

impl SweepProvenance {
    /// Captures provenance for a sweep of `plan` that took `elapsed`.
    pub fn capture(plan: &SweepPlan, concurrency: usize, elapsed: Duration) -> Self {
        Self {
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            program: plan.program_path().display().to_string(),
            input: plan.input_path().display().to_string(),
            concurrency,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Complete output of one sweep, handed to the result sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Canonical hash of the plan driving the sweep.
    pub plan_hash: String,
    /// Program protocol version the sweep spoke.
    pub protocol_version: String,
    /// Mode-partitioned records, each set sorted by parameter.
    pub results: ResultSets,
    /// Per-mode counts.
    pub summary: BTreeMap<Mode, ModeSummary>,
    /// Provenance metadata describing the sweep.
    pub provenance: SweepProvenance,
}

impl SweepReport {
    /// Assembles a report, putting every set into parameter order.
    pub fn new(plan_hash: String, results: ResultSets, provenance: SweepProvenance) -> Self {
        let results = results.canonical();
        let summary = results
            .iter()
            .map(|set| (set.mode, ModeSummary::from_set(set)))
            .collect();
        Self {
            plan_hash,
            protocol_version: PROTOCOL_VERSION.to_string(),
            results,
            summary,
            provenance,
        }
    }

    /// Total records across every mode.
    pub fn total_records(&self) -> usize {
        self.results.total_records()
    }
}

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, QswError};

/// Processing mode understood by the external quantisation program.
///
/// Serialises as its kebab-case name. Deserialises from the name or the
/// protocol token, given either as a string (`"1"`) or a bare integer (`1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Uniform quantisation, protocol token `"1"`.
    Uniform,
    /// Non-uniform quantisation, protocol token `"2"`.
    NonUniform,
}

impl Mode {
    /// Every mode, in protocol token order.
    pub const ALL: [Mode; 2] = [Mode::Uniform, Mode::NonUniform];

    /// Literal token passed to the external program.
    pub const fn token(self) -> &'static str {
        match self {
            Mode::Uniform => "1",
            Mode::NonUniform => "2",
        }
    }

    /// Resolves a protocol token back to its mode.
    pub fn from_token(token: &str) -> Option<Mode> {
        Mode::ALL.into_iter().find(|mode| mode.token() == token)
    }

    /// Kebab-case name used in plans and reports.
    pub const fn name(self) -> &'static str {
        match self {
            Mode::Uniform => "uniform",
            Mode::NonUniform => "non-uniform",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = QswError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Mode::from_token(trimmed)
            .or_else(|| Mode::ALL.into_iter().find(|mode| mode.name() == trimmed))
            .ok_or_else(|| {
                QswError::Config(
                    ErrorInfo::new("unknown_mode", format!("unknown mode `{trimmed}`"))
                        .with_hint("expected one of: uniform, non-uniform, 1, 2"),
                )
            })
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ModeVisitor;

        impl Visitor<'_> for ModeVisitor {
            type Value = Mode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mode name or token (uniform, non-uniform, 1, 2)")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Mode, E> {
                value
                    .parse::<Mode>()
                    .map_err(|_| E::invalid_value(Unexpected::Str(value), &self))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Mode, E> {
                Mode::from_token(&value.to_string())
                    .ok_or_else(|| E::invalid_value(Unexpected::Unsigned(value), &self))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Mode, E> {
                Mode::from_token(&value.to_string())
                    .ok_or_else(|| E::invalid_value(Unexpected::Signed(value), &self))
            }
        }

        deserializer.deserialize_any(ModeVisitor)
    }
}

/// Inclusive range of swept parameter values (bucket counts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterRange {
    /// First parameter value, inclusive.
    pub start: u32,
    /// Last parameter value, inclusive.
    pub end: u32,
}

impl ParameterRange {
    /// Creates an inclusive range.
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Rejects empty ranges.
    pub fn validate(&self) -> Result<(), QswError> {
        if self.start > self.end {
            return Err(QswError::Config(
                ErrorInfo::new("empty_range", "parameter range is empty")
                    .with_context("start", self.start.to_string())
                    .with_context("end", self.end.to_string()),
            ));
        }
        Ok(())
    }

    /// Iterates every value in the range.
    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }

    /// Number of values covered by the range.
    pub fn len(&self) -> usize {
        if self.start > self.end {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }

    /// Returns true when the range covers no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ParameterRange {
    fn default() -> Self {
        Self::new(2, 256)
    }
}

/// One unit of work: a single (mode, parameter) evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Task {
    /// Mode the external program runs in.
    pub mode: Mode,
    /// Untransformed parameter value.
    pub parameter: u32,
}

impl Task {
    /// Creates a new task.
    pub const fn new(mode: Mode, parameter: u32) -> Self {
        Self { mode, parameter }
    }
}

/// Category of an invocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// The program could not be started.
    Spawn,
    /// Output collection or waiting on the child failed.
    Io,
    /// The program exceeded its wall-clock budget and was killed.
    Timeout,
    /// The program exited unsuccessfully while strict exit checking is on.
    ExitStatus,
}

/// Why a task produced no measurement beyond a plain parse miss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationFailure {
    /// Failure category.
    pub kind: FailureKind,
    /// Diagnostic message.
    pub message: String,
}

impl InvocationFailure {
    /// Creates a failure descriptor.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Display for InvocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FailureKind::Spawn => "spawn",
            FailureKind::Io => "io",
            FailureKind::Timeout => "timeout",
            FailureKind::ExitStatus => "exit-status",
        };
        write!(f, "{kind}: {}", self.message)
    }
}

/// Outcome of a single task, keyed by its parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Parameter value of the task that produced the record.
    pub parameter: u32,
    /// Parsed measurement, absent when the output held no digits.
    pub measurement: Option<u64>,
    /// Present when the invocation itself failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<InvocationFailure>,
}

impl ResultRecord {
    /// Record for an invocation that ran and was parsed (possibly to nothing).
    pub fn parsed(parameter: u32, measurement: Option<u64>) -> Self {
        Self {
            parameter,
            measurement,
            failure: None,
        }
    }

    /// Record for an invocation that failed before producing usable output.
    pub fn failed(parameter: u32, failure: InvocationFailure) -> Self {
        Self {
            parameter,
            measurement: None,
            failure: Some(failure),
        }
    }

    /// Returns true when a measurement was extracted.
    pub fn is_measured(&self) -> bool {
        self.measurement.is_some()
    }
}

/// Records collected for one mode. Insertion order is not significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Mode every record in the set was produced under.
    pub mode: Mode,
    /// Collected records.
    pub records: Vec<ResultRecord>,
}

impl ResultSet {
    /// Creates an empty set for `mode`.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            records: Vec::new(),
        }
    }

    /// Creates an empty set with room for `capacity` records.
    pub fn with_capacity(mode: Mode, capacity: usize) -> Self {
        Self {
            mode,
            records: Vec::with_capacity(capacity),
        }
    }

    /// Appends a record.
    pub fn push(&mut self, record: ResultRecord) {
        self.records.push(record);
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when no records were collected.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ResultRecord> {
        self.records.iter()
    }

    /// Parameter values in insertion order, duplicates included.
    pub fn parameters(&self) -> Vec<u32> {
        self.records.iter().map(|record| record.parameter).collect()
    }

    /// Looks up the record for `parameter`.
    pub fn get(&self, parameter: u32) -> Option<&ResultRecord> {
        self.records
            .iter()
            .find(|record| record.parameter == parameter)
    }

    /// `(parameter, measurement)` pairs sorted by parameter, the shape result sinks consume.
    pub fn pairs(&self) -> Vec<(u32, Option<u64>)> {
        let mut pairs: Vec<_> = self
            .records
            .iter()
            .map(|record| (record.parameter, record.measurement))
            .collect();
        pairs.sort_by_key(|(parameter, _)| *parameter);
        pairs
    }

    /// Returns a copy with records sorted by parameter, for order-insensitive comparison.
    pub fn canonical(&self) -> Self {
        let mut records = self.records.clone();
        records.sort_by_key(|record| record.parameter);
        Self {
            mode: self.mode,
            records,
        }
    }
}

/// Mode-partitioned output of one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSets {
    sets: BTreeMap<Mode, ResultSet>,
}

impl ResultSets {
    /// Creates an empty partition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the set for its mode.
    pub fn insert(&mut self, set: ResultSet) {
        self.sets.insert(set.mode, set);
    }

    /// Returns the set for `mode`.
    pub fn get(&self, mode: Mode) -> Option<&ResultSet> {
        self.sets.get(&mode)
    }

    /// Modes present in the partition, in ascending order.
    pub fn modes(&self) -> Vec<Mode> {
        self.sets.keys().copied().collect()
    }

    /// Iterates sets in mode order.
    pub fn iter(&self) -> impl Iterator<Item = &ResultSet> {
        self.sets.values()
    }

    /// Total record count across every mode.
    pub fn total_records(&self) -> usize {
        self.sets.values().map(ResultSet::len).sum()
    }

    /// Returns a copy with every set in canonical order.
    pub fn canonical(&self) -> Self {
        Self {
            sets: self
                .sets
                .iter()
                .map(|(mode, set)| (*mode, set.canonical()))
                .collect(),
        }
    }
}

impl FromIterator<ResultSet> for ResultSets {
    fn from_iter<T: IntoIterator<Item = ResultSet>>(iter: T) -> Self {
        Self {
            sets: iter.into_iter().map(|set| (set.mode, set)).collect(),
        }
    }
}

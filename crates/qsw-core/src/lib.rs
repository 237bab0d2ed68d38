#![deny(missing_docs)]
#![doc = "Core types, errors and output parsing shared by the QSW sweep harness."]

pub mod errors;
pub mod parse;
mod types;

pub use errors::{ErrorInfo, QswError};
pub use parse::{parse_measurement, MeasurementParser};
pub use types::{
    FailureKind, InvocationFailure, Mode, ParameterRange, ResultRecord, ResultSet, ResultSets,
    Task,
};

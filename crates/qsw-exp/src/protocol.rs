//! Command-line protocol spoken with the external quantisation program.
//!
//! Version 1 of the protocol invokes
//!
//! ```text
//! <program> <input-path> <mode-token> <parameter^3> n
//! ```
//!
//! and reads the measurement as the first digit run on standard output
//! (see [`qsw_core::parse_measurement`]). Any change to the argument template,
//! the transform or the extraction rule must bump [`PROTOCOL_VERSION`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use qsw_core::{ErrorInfo, ParameterRange, QswError, Task};

/// Version stamped into every sweep report.
pub const PROTOCOL_VERSION: &str = "1";

/// Trailing flag that switches the program's image viewer off.
pub const SENTINEL: &str = "n";

/// Maps a swept parameter to the value handed to the program (its cube).
///
/// Returns `None` when the cube does not fit in 64 bits.
pub fn transform_parameter(parameter: u32) -> Option<u64> {
    u64::from(parameter).checked_pow(3)
}

/// Ensures every value of `range` has a representable transform.
pub fn validate_range(range: &ParameterRange) -> Result<(), QswError> {
    range.validate()?;
    if transform_parameter(range.end).is_none() {
        return Err(QswError::Config(
            ErrorInfo::new("parameter_overflow", "cubed parameter does not fit in 64 bits")
                .with_context("end", range.end.to_string()),
        ));
    }
    Ok(())
}

/// Task-specific arguments, in protocol order, excluding the sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationArguments {
    /// Image the program quantises.
    pub input: PathBuf,
    /// Mode token (`"1"` or `"2"`).
    pub mode_token: &'static str,
    /// Cubed parameter value.
    pub transformed: u64,
}

impl InvocationArguments {
    /// Derives the arguments for `task` against `input`.
    pub fn for_task(input: &Path, task: Task) -> Result<Self, QswError> {
        let transformed = transform_parameter(task.parameter).ok_or_else(|| {
            QswError::Config(
                ErrorInfo::new("parameter_overflow", "cubed parameter does not fit in 64 bits")
                    .with_context("mode", task.mode.to_string())
                    .with_context("parameter", task.parameter.to_string()),
            )
        })?;
        Ok(Self {
            input: input.to_path_buf(),
            mode_token: task.mode.token(),
            transformed,
        })
    }

    /// Arguments as passed on the command line, without the sentinel.
    pub fn to_args(&self) -> Vec<OsString> {
        vec![
            self.input.clone().into_os_string(),
            OsString::from(self.mode_token),
            OsString::from(self.transformed.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use qsw_core::Mode;

    use super::*;

    #[test]
    fn cube_of_five() {
        let args =
            InvocationArguments::for_task(Path::new("img.rgb"), Task::new(Mode::NonUniform, 5))
                .expect("args");
        assert_eq!(args.transformed, 125);
        assert_eq!(args.mode_token, "2");
        assert_eq!(
            args.to_args(),
            vec![
                OsString::from("img.rgb"),
                OsString::from("2"),
                OsString::from("125")
            ]
        );
    }

    #[test]
    fn overflow_is_rejected() {
        assert_eq!(transform_parameter(2_642_245), Some(18_446_724_184_312_856_125));
        assert_eq!(transform_parameter(2_642_246), None);
        let err = validate_range(&ParameterRange::new(2, 3_000_000)).expect_err("overflow");
        assert_eq!(err.info().code, "parameter_overflow");
    }
}

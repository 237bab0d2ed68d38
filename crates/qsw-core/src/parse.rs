//! Measurement extraction from free-form program output.
//!
//! The rule is deliberately narrow: the measurement is the first run of ASCII
//! decimal digits in the output. Signs, decimal points and locale separators
//! are not recognised, so `"-12.5"` yields `12`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

fn digit_run() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new("[0-9]+").expect("digit pattern compiles"))
}

/// Returns the first digit run in `output`, or `None` when there is none.
///
/// Runs too large for `u64` are reported as absent.
pub fn parse_measurement(output: &str) -> Option<u64> {
    let found = digit_run().find(output)?;
    match found.as_str().parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(digits = found.as_str(), "measurement overflows u64");
            None
        }
    }
}

/// Configurable parser applied to every invocation's output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementParser {
    /// When set, only text after the first occurrence of this literal is searched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

impl MeasurementParser {
    /// Parser using the plain first-digit-run rule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser anchored after `marker`.
    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            marker: Some(marker.into()),
        }
    }

    /// Extracts the measurement from `output`.
    ///
    /// With a marker configured, output lacking the marker has no measurement.
    pub fn parse(&self, output: &str) -> Option<u64> {
        match self.marker.as_deref() {
            None | Some("") => parse_measurement(output),
            Some(marker) => {
                let (_, tail) = output.split_once(marker)?;
                parse_measurement(tail)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_zeros_are_dropped() {
        assert_eq!(parse_measurement("err=0042"), Some(42));
    }

    #[test]
    fn overflow_is_absent() {
        assert_eq!(parse_measurement("99999999999999999999999"), None);
    }

    #[test]
    fn unicode_digits_are_ignored() {
        assert_eq!(parse_measurement("٣٤ then 7"), Some(7));
    }
}

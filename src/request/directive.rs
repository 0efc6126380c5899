use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stage::error::StageError;

/// How many reads to keep
///
/// Exactly one variant is active per invocation. In request messages the variant is keyed by the
/// parameter name used in the workflow interface (`out_reads` or `sample_rate`).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub enum DownsampleDirective {
    /// Exact number of output reads (or pairs) desired
    #[serde(rename = "out_reads")]
    TargetCount(u64),
    /// Fraction of input reads to retain, in (0, 1]
    #[serde(rename = "sample_rate")]
    TargetFraction(f64),
}

impl DownsampleDirective {
    /// Check the directive value is in range before anything is spawned
    pub fn validate(&self) -> Result<(), StageError> {
        match *self {
            DownsampleDirective::TargetCount(0) => Err(StageError::InvalidDirective(
                "out_reads must be a positive integer, got 0".to_string(),
            )),
            DownsampleDirective::TargetCount(_) => Ok(()),
            DownsampleDirective::TargetFraction(f) if f > 0.0 && f <= 1.0 => Ok(()),
            DownsampleDirective::TargetFraction(f) => Err(StageError::InvalidDirective(format!(
                "sample_rate must be in (0, 1], got {f}"
            ))),
        }
    }

    /// The single reformat sampling control flag for this directive
    pub fn reformat_arg(&self) -> String {
        match self {
            DownsampleDirective::TargetCount(n) => format!("samplereadstarget={n}"),
            DownsampleDirective::TargetFraction(f) => format!("samplerate={f}"),
        }
    }
}

impl fmt::Display for DownsampleDirective {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DownsampleDirective::TargetCount(n) => write!(f, "{n} reads"),
            DownsampleDirective::TargetFraction(rate) => write!(f, "sample rate {rate}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_flag() {
        let directive = DownsampleDirective::TargetCount(1000);
        assert!(directive.validate().is_ok());
        assert_eq!(directive.reformat_arg(), "samplereadstarget=1000");
    }

    #[test]
    fn fraction_flag() {
        let directive = DownsampleDirective::TargetFraction(0.25);
        assert!(directive.validate().is_ok());
        assert_eq!(directive.reformat_arg(), "samplerate=0.25");
        assert!(DownsampleDirective::TargetFraction(1.0).validate().is_ok());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let bad = [
            DownsampleDirective::TargetCount(0),
            DownsampleDirective::TargetFraction(0.0),
            DownsampleDirective::TargetFraction(-0.5),
            DownsampleDirective::TargetFraction(1.5),
            DownsampleDirective::TargetFraction(f64::NAN),
        ];
        for directive in bad {
            match directive.validate() {
                Err(StageError::InvalidDirective(_)) => {}
                other => panic!("{directive:?} should be invalid, got {other:?}"),
            }
        }
    }

    #[test]
    fn deserialise_by_parameter_name() {
        let count: DownsampleDirective = serde_json::from_str(r#"{"out_reads": 50}"#).unwrap();
        assert_eq!(count, DownsampleDirective::TargetCount(50));
        let rate: DownsampleDirective = serde_json::from_str(r#"{"sample_rate": 0.1}"#).unwrap();
        assert_eq!(rate, DownsampleDirective::TargetFraction(0.1));
    }
}

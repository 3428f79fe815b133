//! Aggregation methods and the x-files-factor.
//!
//! When a metric's older data is downsampled into a coarser retention
//! tier, an aggregation policy decides which statistical method combines
//! the finer samples and how many of them must be non-null for the
//! result to count (the x-files-factor). This module only *selects*
//! policies; computing aggregates over samples belongs to the storage
//! engine.

use serde::{Deserialize, Serialize};

/// The x-files-factor applied when an aggregation rule omits one.
pub const DEFAULT_X_FILES_FACTOR: f64 = 0.5;

/// Statistical method used to downsample a metric's older data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    /// Arithmetic mean of the input samples.
    Average,

    /// Sum of the input samples.
    Sum,

    /// Minimum input sample.
    Min,

    /// Maximum input sample.
    Max,

    /// Most recent input sample.
    Last,
}

impl AggregationMethod {
    /// Looks up a method by its rule-file spelling.
    ///
    /// Returns `None` for unknown names; the loader turns that into a
    /// parse error carrying the rule's position.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "average" => Some(Self::Average),
            "sum" => Some(Self::Sum),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "last" => Some(Self::Last),
            _ => None,
        }
    }

    /// The rule-file spelling of this method.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Last => "last",
        }
    }
}

impl std::fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An aggregation policy: method plus x-files-factor.
///
/// The x-files-factor is the fraction (in [0, 1]) of input samples that
/// must be non-null for a downsampled point to be produced at all.
/// Range validation happens at load time, so a policy obtained from a
/// rule set is always well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregationPolicy {
    /// The downsampling method.
    pub method: AggregationMethod,

    /// Required fraction of non-null input samples, in [0, 1].
    pub x_files_factor: f64,
}

impl Default for AggregationPolicy {
    /// The synthetic default policy: `average` with an x-files-factor
    /// of 0.5. This is what every metric gets when no aggregation file
    /// is configured.
    fn default() -> Self {
        Self {
            method: AggregationMethod::Average,
            x_files_factor: DEFAULT_X_FILES_FACTOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names_round_trip() {
        for name in ["average", "sum", "min", "max", "last"] {
            let method = AggregationMethod::from_name(name).unwrap();
            assert_eq!(method.as_str(), name);
        }
    }

    #[test]
    fn test_unknown_method() {
        assert_eq!(AggregationMethod::from_name("median"), None);
        assert_eq!(AggregationMethod::from_name("AVERAGE"), None);
        assert_eq!(AggregationMethod::from_name(""), None);
    }

    #[test]
    fn test_default_policy() {
        let policy = AggregationPolicy::default();
        assert_eq!(policy.method, AggregationMethod::Average);
        assert!((policy.x_files_factor - 0.5).abs() < f64::EPSILON);
    }
}

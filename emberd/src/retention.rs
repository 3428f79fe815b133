//! Retention tiers and the compact duration syntax of schema files.
//!
//! A retention policy describes how long a metric is kept at each
//! resolution, as an ordered list of tiers. In a schemas file the list
//! is written graphite-style:
//!
//! ```text
//! retentions = 60:1440          # 60s per point, 1440 points (1 day)
//! retentions = 10s:6h,1m:30d,1h:5y
//! ```
//!
//! The first field of a tier is the sampling interval; the second is
//! either a bare point count (duration = count × interval) or a
//! duration with a unit suffix. Both fields share the same compact
//! units: `s`, `m`, `h`, `d`, `w`, `y`, with a bare integer meaning
//! seconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RetentionParseError;

/// Seconds in a year under the compact units syntax (365 days).
const YEAR_SECS: u64 = 365 * 86_400;

/// A single retention tier: one (sampling interval, retention duration)
/// pair.
///
/// Invariant: both durations are non-zero and `retention >= interval`,
/// enforced at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    /// Time between samples at this resolution.
    #[serde(with = "duration_secs")]
    pub interval: Duration,

    /// How long data is kept at this resolution.
    #[serde(with = "duration_secs")]
    pub retention: Duration,
}

impl Retention {
    /// Parses a single `interval:duration` tier.
    ///
    /// # Errors
    ///
    /// Returns [`RetentionParseError`] if the pair is malformed, a value
    /// fails to parse, or either duration is zero.
    pub fn parse(pair: &str) -> Result<Self, RetentionParseError> {
        let pair = pair.trim();
        let Some((interval_text, retention_text)) = pair.split_once(':') else {
            return Err(RetentionParseError::MalformedPair {
                pair: pair.to_string(),
            });
        };

        let interval_secs = parse_compact_duration(interval_text.trim())?;

        // A bare second field is a point count; a suffixed one is a
        // duration in its own right.
        let retention_text = retention_text.trim();
        let retention_secs = if retention_text.bytes().all(|b| b.is_ascii_digit()) {
            let points = parse_bare_integer(retention_text)?;
            points.saturating_mul(interval_secs)
        } else {
            parse_compact_duration(retention_text)?
        };

        if interval_secs == 0 || retention_secs == 0 {
            return Err(RetentionParseError::ZeroTier {
                pair: pair.to_string(),
            });
        }

        Ok(Self {
            interval: Duration::from_secs(interval_secs),
            retention: Duration::from_secs(retention_secs),
        })
    }

    /// Number of data points this tier holds (`retention / interval`).
    pub fn points(&self) -> u64 {
        let interval = self.interval.as_secs();
        if interval == 0 {
            return 0;
        }
        self.retention.as_secs() / interval
    }
}

/// An ordered, validated list of retention tiers.
///
/// Invariants, checked by [`RetentionPolicy::new`]:
/// - at least one tier is present;
/// - intervals strictly increase from tier to tier;
/// - retention coverage never decreases from tier to tier.
///
/// Out-of-order tiers are rejected outright rather than deferred to
/// first use: a schemas file that lists `300:3600,60:1440` fails the
/// whole load with a parse error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    tiers: Vec<Retention>,
}

impl RetentionPolicy {
    /// Creates a policy from tiers, validating the tier invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RetentionParseError`] if the list is empty, intervals
    /// do not strictly increase, or coverage decreases.
    pub fn new(tiers: Vec<Retention>) -> Result<Self, RetentionParseError> {
        if tiers.is_empty() {
            return Err(RetentionParseError::Empty);
        }

        for window in tiers.windows(2) {
            let (current, next) = (&window[0], &window[1]);

            if next.interval <= current.interval {
                return Err(RetentionParseError::IntervalsNotIncreasing {
                    previous_secs: current.interval.as_secs(),
                    next_secs: next.interval.as_secs(),
                });
            }

            if next.retention < current.retention {
                return Err(RetentionParseError::CoverageDecreasing {
                    previous_secs: current.retention.as_secs(),
                    next_secs: next.retention.as_secs(),
                });
            }
        }

        Ok(Self { tiers })
    }

    /// Parses a comma-separated `retentions` list from a schemas file.
    ///
    /// # Errors
    ///
    /// Returns [`RetentionParseError`] if any tier is malformed or the
    /// tier invariants are violated.
    pub fn parse(list: &str) -> Result<Self, RetentionParseError> {
        let list = list.trim();
        if list.is_empty() {
            return Err(RetentionParseError::Empty);
        }

        let tiers = list
            .split(',')
            .map(Retention::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(tiers)
    }

    /// The tiers of this policy, highest resolution first.
    pub fn tiers(&self) -> &[Retention] {
        &self.tiers
    }

    /// The fallback policy used when no schema rule matches a metric:
    /// one minute per point, kept for one day (`60:1440`).
    pub fn default_rule() -> Self {
        Self {
            tiers: vec![Retention {
                interval: Duration::from_secs(60),
                retention: Duration::from_secs(60 * 1440),
            }],
        }
    }
}

/// Parses a compact duration (`90`, `10s`, `1m`, `6h`, `30d`, `2w`,
/// `5y`) into whole seconds. A bare integer means seconds.
pub(crate) fn parse_compact_duration(text: &str) -> Result<u64, RetentionParseError> {
    if text.is_empty() {
        return Err(RetentionParseError::InvalidDuration {
            value: text.to_string(),
            reason: "empty value".to_string(),
        });
    }

    let (digits, multiplier) = match text.as_bytes()[text.len() - 1].to_ascii_lowercase() {
        b's' => (&text[..text.len() - 1], 1),
        b'm' => (&text[..text.len() - 1], 60),
        b'h' => (&text[..text.len() - 1], 3_600),
        b'd' => (&text[..text.len() - 1], 86_400),
        b'w' => (&text[..text.len() - 1], 7 * 86_400),
        b'y' => (&text[..text.len() - 1], YEAR_SECS),
        b if b.is_ascii_digit() => (text, 1),
        _ => {
            return Err(RetentionParseError::InvalidDuration {
                value: text.to_string(),
                reason: "unknown unit suffix (use s, m, h, d, w, or y)".to_string(),
            });
        }
    };

    let amount = parse_bare_integer(digits)?;
    Ok(amount.saturating_mul(multiplier))
}

/// Parses a plain non-negative integer field of a tier.
fn parse_bare_integer(text: &str) -> Result<u64, RetentionParseError> {
    text.parse::<u64>()
        .map_err(|e| RetentionParseError::InvalidDuration {
            value: text.to_string(),
            reason: e.to_string(),
        })
}

/// Serde support for whole-second Duration fields.
///
/// Retention durations are serialized as integer seconds for human
/// readability in JSON output.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(seconds))
    }
}

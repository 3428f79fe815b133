//! Rule file loader for schemas and aggregation files.
//!
//! Both rule files use the same INI-like layout: named sections holding
//! `key = value` entries, with `#` or `;` comments.
//!
//! ```text
//! [default_1min_for_1day]
//! pattern = .*
//! retentions = 60:1440
//! ```
//!
//! Section order is preserved exactly as declared — it *is* the rule
//! priority. Loading is all-or-nothing: the first malformed section
//! aborts the whole load and no partial rule set is ever produced, so a
//! failed reload can never clobber a previously installed configuration.
//!
//! Key names are matched case-insensitively (`xFilesFactor` and
//! `xfilesfactor` are the same key); unrecognized keys are ignored so
//! files written for other carbon implementations keep working.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::aggregation::{AggregationMethod, AggregationPolicy, DEFAULT_X_FILES_FACTOR};
use crate::error::{FileAccessError, Result, RuleParseError};
use crate::pattern::MetricPattern;
use crate::retention::RetentionPolicy;
use crate::rules::{Rule, RuleSet};

/// One `[section]` of a rule file, with entries in declaration order.
#[derive(Debug)]
struct Section {
    name: String,
    /// Line number of the section header, for error reporting.
    line: usize,
    /// `(lowercased key, value, line number)` triples.
    entries: Vec<(String, String, usize)>,
}

impl Section {
    /// Looks up an entry by (lowercased) key, returning its value and
    /// line number.
    fn get(&self, key: &str) -> Option<(&str, usize)> {
        self.entries
            .iter()
            .find(|(k, _, _)| k == key)
            .map(|(_, v, line)| (v.as_str(), *line))
    }
}

/// Splits rule file text into sections, preserving order.
fn scan_sections(text: &str) -> std::result::Result<Vec<Section>, RuleParseError> {
    let mut sections: Vec<Section> = Vec::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            sections.push(Section {
                name: name.trim().to_string(),
                line: line_no,
                entries: Vec::new(),
            });
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(RuleParseError::MalformedLine {
                line: line_no,
                text: line.to_string(),
            });
        };

        let key = key.trim().to_ascii_lowercase();
        let value = value.trim().to_string();

        let Some(section) = sections.last_mut() else {
            return Err(RuleParseError::KeyOutsideSection { line: line_no, key });
        };
        section.entries.push((key, value, line_no));
    }

    Ok(sections)
}

/// Compiles the mandatory `pattern` entry of a section.
fn compile_pattern(
    section: &Section,
) -> std::result::Result<(MetricPattern, String), RuleParseError> {
    let Some((text, line)) = section.get("pattern") else {
        return Err(RuleParseError::MissingPattern {
            section: section.name.clone(),
            line: section.line,
        });
    };

    let pattern = MetricPattern::compile(text).map_err(|source| RuleParseError::InvalidPattern {
        section: section.name.clone(),
        line,
        source,
    })?;

    Ok((pattern, text.to_string()))
}

/// Parses schema rule text into a retention rule set.
///
/// Exposed separately from [`read_retention_rules`] so rule text can be
/// validated without touching the filesystem.
///
/// # Errors
///
/// Returns [`RuleParseError`] for any malformed section; the whole
/// parse aborts at the first error.
pub fn parse_retention_rules(text: &str) -> Result<RuleSet<RetentionPolicy>> {
    let sections = scan_sections(text)?;
    let mut rules = Vec::with_capacity(sections.len());

    for section in &sections {
        let (pattern, pattern_text) = compile_pattern(section)?;

        let Some((retentions, line)) = section.get("retentions") else {
            return Err(RuleParseError::MissingRetentions {
                section: section.name.clone(),
                line: section.line,
            }
            .into());
        };

        let policy = RetentionPolicy::parse(retentions).map_err(|source| {
            RuleParseError::InvalidRetentions {
                section: section.name.clone(),
                line,
                source,
            }
        })?;

        rules.push(Rule::new(&section.name, pattern, pattern_text, policy));
    }

    Ok(RuleSet::new(rules, RetentionPolicy::default_rule()))
}

/// Parses aggregation rule text into an aggregation rule set.
///
/// `aggregationMethod` defaults to `average` and `xFilesFactor` to 0.5
/// when a section omits them.
///
/// # Errors
///
/// Returns [`RuleParseError`] for any malformed section; the whole
/// parse aborts at the first error.
pub fn parse_aggregation_rules(text: &str) -> Result<RuleSet<AggregationPolicy>> {
    let sections = scan_sections(text)?;
    let mut rules = Vec::with_capacity(sections.len());

    for section in &sections {
        let (pattern, pattern_text) = compile_pattern(section)?;

        let method = match section.get("aggregationmethod") {
            Some((name, line)) => AggregationMethod::from_name(name).ok_or_else(|| {
                RuleParseError::UnknownAggregationMethod {
                    section: section.name.clone(),
                    line,
                    method: name.to_string(),
                }
            })?,
            None => AggregationMethod::Average,
        };

        let x_files_factor = match section.get("xfilesfactor") {
            Some((value, line)) => {
                let factor: f64 =
                    value
                        .parse()
                        .map_err(|_| RuleParseError::InvalidXFilesFactor {
                            section: section.name.clone(),
                            line,
                            value: value.to_string(),
                        })?;
                if !(0.0..=1.0).contains(&factor) {
                    return Err(RuleParseError::XFilesFactorOutOfRange {
                        section: section.name.clone(),
                        line,
                        value: factor,
                    }
                    .into());
                }
                factor
            }
            None => DEFAULT_X_FILES_FACTOR,
        };

        let policy = AggregationPolicy {
            method,
            x_files_factor,
        };
        rules.push(Rule::new(&section.name, pattern, pattern_text, policy));
    }

    Ok(RuleSet::new(rules, AggregationPolicy::default()))
}

/// Reads and parses the mandatory schemas file.
///
/// # Errors
///
/// Returns [`FileAccessError`] if the file is missing or unreadable —
/// fatal at startup — or [`RuleParseError`] for malformed rules.
pub fn read_retention_rules<P: AsRef<Path>>(path: P) -> Result<RuleSet<RetentionPolicy>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| FileAccessError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let rules = parse_retention_rules(&text)?;
    debug!(
        path = %path.display(),
        rules = rules.len(),
        "loaded retention schema rules"
    );
    Ok(rules)
}

/// Reads and parses an aggregation file.
///
/// # Errors
///
/// Returns [`FileAccessError`] if the file is missing or unreadable, or
/// [`RuleParseError`] for malformed rules. Callers with no aggregation
/// file configured should use [`default_aggregation_rules`] instead of
/// calling this.
pub fn read_aggregation_rules<P: AsRef<Path>>(path: P) -> Result<RuleSet<AggregationPolicy>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| FileAccessError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let rules = parse_aggregation_rules(&text)?;
    debug!(
        path = %path.display(),
        rules = rules.len(),
        "loaded aggregation rules"
    );
    Ok(rules)
}

/// The synthetic rule set used when no aggregation file is configured:
/// no explicit rules, so every metric resolves to the default policy
/// (`average`, x-files-factor 0.5).
pub fn default_aggregation_rules() -> RuleSet<AggregationPolicy> {
    RuleSet::new(Vec::new(), AggregationPolicy::default())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn test_single_section_round_trip() {
        let rules = parse_retention_rules(
            "[default_1min_for_1day]\npattern = .*\nretentions = 60:1440\n",
        )
        .unwrap();

        assert_eq!(rules.len(), 1);
        let policy = rules.resolve("any.metric.at.all");
        assert_eq!(policy.tiers().len(), 1);
        assert_eq!(policy.tiers()[0].interval, Duration::from_secs(60));
        assert_eq!(policy.tiers()[0].retention, Duration::from_secs(1440 * 60));
    }

    #[test]
    fn test_section_order_preserved() {
        let text = "\
[carbon]
pattern = ^carbon\\.
retentions = 60:90d

[default]
pattern = .*
retentions = 60:1440
";
        let rules = parse_retention_rules(text).unwrap();
        assert_eq!(rules.rules()[0].name(), "carbon");
        assert_eq!(rules.rules()[1].name(), "default");
        assert_eq!(
            rules.resolve_rule("carbon.agents.web1.cpu").unwrap().name(),
            "carbon"
        );
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let text = "\
# schemas for the test fleet
; alternative comment style

[everything]
pattern = .*
retentions = 10s:6h,1m:30d
";
        let rules = parse_retention_rules(text).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.resolve("x").tiers().len(), 2);
    }

    #[test]
    fn test_missing_pattern_fails() {
        let err = parse_retention_rules("[nameless]\nretentions = 60:1440\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Rule(RuleParseError::MissingPattern { .. })
        ));
    }

    #[test]
    fn test_missing_retentions_fails() {
        let err = parse_retention_rules("[bare]\npattern = .*\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Rule(RuleParseError::MissingRetentions { .. })
        ));
    }

    #[test]
    fn test_out_of_order_tiers_rejected_at_load() {
        let err = parse_retention_rules("[bad]\npattern = .*\nretentions = 300:3600,60:1440\n")
            .unwrap_err();
        let ConfigError::Rule(RuleParseError::InvalidRetentions { section, .. }) = err else {
            panic!("expected InvalidRetentions, got {err}");
        };
        assert_eq!(section, "bad");
    }

    #[test]
    fn test_key_outside_section_fails() {
        let err = parse_retention_rules("pattern = .*\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Rule(RuleParseError::KeyOutsideSection { .. })
        ));
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let err = parse_retention_rules("[ok]\npattern = .*\nretentions = 60:1440\nwat\n")
            .unwrap_err();
        let ConfigError::Rule(RuleParseError::MalformedLine { line, text }) = err else {
            panic!("expected MalformedLine, got {err}");
        };
        assert_eq!(line, 4);
        assert_eq!(text, "wat");
    }

    #[test]
    fn test_aggregation_section_full() {
        let rules = parse_aggregation_rules(
            "[min_series]\npattern = \\.min$\nxFilesFactor = 0.1\naggregationMethod = min\n",
        )
        .unwrap();

        let policy = rules.resolve("stats.timers.req.min");
        assert_eq!(policy.method, AggregationMethod::Min);
        assert!((policy.x_files_factor - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aggregation_defaults_applied_per_key() {
        let rules = parse_aggregation_rules("[counts]\npattern = \\.count$\n").unwrap();
        let policy = rules.resolve("req.count");
        assert_eq!(policy.method, AggregationMethod::Average);
        assert!((policy.x_files_factor - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_method_fails() {
        let err =
            parse_aggregation_rules("[x]\npattern = .*\naggregationMethod = median\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Rule(RuleParseError::UnknownAggregationMethod { .. })
        ));
    }

    #[test]
    fn test_x_files_factor_range_enforced() {
        for bad in ["1.5", "-0.1"] {
            let text = format!("[x]\npattern = .*\nxFilesFactor = {bad}\n");
            let err = parse_aggregation_rules(&text).unwrap_err();
            assert!(
                matches!(
                    err,
                    ConfigError::Rule(RuleParseError::XFilesFactorOutOfRange { .. })
                ),
                "xFilesFactor {bad} should be out of range"
            );
        }

        let err = parse_aggregation_rules("[x]\npattern = .*\nxFilesFactor = lots\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Rule(RuleParseError::InvalidXFilesFactor { .. })
        ));
    }

    #[test]
    fn test_keys_match_case_insensitively() {
        let rules =
            parse_aggregation_rules("[s]\nPattern = \\.sum$\nXFILESFACTOR = 0.3\n").unwrap();
        let policy = rules.resolve("req.sum");
        assert!((policy.x_files_factor - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_duplicate_patterns_first_wins() {
        let text = "\
[a]
pattern = foo
aggregationMethod = sum

[b]
pattern = foo
aggregationMethod = max
";
        let rules = parse_aggregation_rules(text).unwrap();
        assert_eq!(rules.resolve("foo").method, AggregationMethod::Sum);
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn test_default_aggregation_rules() {
        let rules = default_aggregation_rules();
        assert!(rules.is_empty());
        let policy = rules.resolve("whatever.series");
        assert_eq!(policy.method, AggregationMethod::Average);
        assert!((policy.x_files_factor - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_read_missing_file_is_file_access_error() {
        let err = read_retention_rules("/nonexistent/schemas").unwrap_err();
        assert!(matches!(err, ConfigError::File(FileAccessError::Read { .. })));
    }
}

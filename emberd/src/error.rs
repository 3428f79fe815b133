//! Error types for emberd configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for configuration loading and rule resolution.
///
/// Everything that can go wrong between `Config::new()` and a fully
/// loaded configuration funnels through this enum. Errors are returned
/// unmodified to the caller of [`crate::config::Config::load`]; there is
/// no retry or partial recovery — a failed load aborts daemon startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A rule file contained a malformed rule.
    #[error("rule parse error: {0}")]
    Rule(#[from] RuleParseError),

    /// A rule file could not be read.
    #[error("file access error: {0}")]
    File(#[from] FileAccessError),
}

/// Errors that can occur while parsing a storage rule file.
///
/// Every variant identifies the offending rule by section name and the
/// line number where the problem was detected, so a misconfigured
/// schemas file can be fixed without guesswork.
#[derive(Error, Debug)]
pub enum RuleParseError {
    /// A line was neither a section header, a `key = value` pair, a
    /// comment, nor blank.
    #[error("line {line}: malformed line '{text}'")]
    MalformedLine {
        /// 1-based line number in the rule file.
        line: usize,
        /// The offending line, trimmed.
        text: String,
    },

    /// A `key = value` pair appeared before any `[section]` header.
    #[error("line {line}: key '{key}' appears outside of any section")]
    KeyOutsideSection {
        /// 1-based line number in the rule file.
        line: usize,
        /// The key that had no section to belong to.
        key: String,
    },

    /// A section did not define the mandatory `pattern` key.
    #[error("[{section}] (line {line}): missing 'pattern' key")]
    MissingPattern {
        /// Name of the offending section.
        section: String,
        /// Line number of the section header.
        line: usize,
    },

    /// The `pattern` value failed to compile.
    #[error("[{section}] (line {line}): {source}")]
    InvalidPattern {
        /// Name of the offending section.
        section: String,
        /// Line number of the `pattern` entry.
        line: usize,
        /// The underlying pattern compilation error.
        #[source]
        source: PatternError,
    },

    /// A schema section did not define the mandatory `retentions` key.
    #[error("[{section}] (line {line}): missing 'retentions' key")]
    MissingRetentions {
        /// Name of the offending section.
        section: String,
        /// Line number of the section header.
        line: usize,
    },

    /// The `retentions` value was malformed or violated tier ordering.
    #[error("[{section}] (line {line}): invalid retentions: {source}")]
    InvalidRetentions {
        /// Name of the offending section.
        section: String,
        /// Line number of the `retentions` entry.
        line: usize,
        /// The underlying retention list error.
        #[source]
        source: RetentionParseError,
    },

    /// The `aggregationMethod` value named no known method.
    #[error("[{section}] (line {line}): unknown aggregation method '{method}'")]
    UnknownAggregationMethod {
        /// Name of the offending section.
        section: String,
        /// Line number of the `aggregationMethod` entry.
        line: usize,
        /// The unrecognized method name.
        method: String,
    },

    /// The `xFilesFactor` value was not a number.
    #[error("[{section}] (line {line}): xFilesFactor '{value}' is not a number")]
    InvalidXFilesFactor {
        /// Name of the offending section.
        section: String,
        /// Line number of the `xFilesFactor` entry.
        line: usize,
        /// The unparsable value.
        value: String,
    },

    /// The `xFilesFactor` value was outside the closed range [0, 1].
    #[error("[{section}] (line {line}): xFilesFactor {value} out of range [0, 1]")]
    XFilesFactorOutOfRange {
        /// Name of the offending section.
        section: String,
        /// Line number of the `xFilesFactor` entry.
        line: usize,
        /// The out-of-range value.
        value: f64,
    },
}

/// Errors that can occur while compiling a rule pattern.
#[derive(Error, Debug)]
pub enum PatternError {
    /// The pattern was detected as a glob but is not valid glob syntax.
    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob {
        /// The pattern text as written in the rule file.
        pattern: String,
        /// The underlying glob compilation error.
        #[source]
        source: glob::PatternError,
    },

    /// The pattern was compiled as a regex and failed.
    #[error("invalid regex pattern '{pattern}': {source}")]
    Regex {
        /// The pattern text as written in the rule file.
        pattern: String,
        /// The underlying regex compilation error.
        #[source]
        source: Box<regex::Error>,
    },
}

/// Errors for a single `retentions` list.
///
/// These carry no file position; [`RuleParseError::InvalidRetentions`]
/// wraps them with section and line context at load time.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RetentionParseError {
    /// The retentions list was empty.
    #[error("at least one interval:duration tier is required")]
    Empty,

    /// A tier was not an `interval:duration` pair.
    #[error("malformed tier '{pair}': expected interval:duration")]
    MalformedPair {
        /// The offending tier text.
        pair: String,
    },

    /// An interval or duration value failed to parse.
    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration {
        /// The unparsable value.
        value: String,
        /// Why the value could not be parsed.
        reason: String,
    },

    /// A tier had a zero interval or zero duration.
    #[error("tier '{pair}' has a zero interval or duration")]
    ZeroTier {
        /// The offending tier text.
        pair: String,
    },

    /// Tier intervals did not strictly increase.
    #[error(
        "tier intervals must strictly increase: {previous_secs}s followed by {next_secs}s"
    )]
    IntervalsNotIncreasing {
        /// Interval of the earlier tier, in seconds.
        previous_secs: u64,
        /// Interval of the later tier, in seconds.
        next_secs: u64,
    },

    /// Tier retention coverage decreased.
    #[error(
        "tier retention must not decrease: {previous_secs}s followed by {next_secs}s"
    )]
    CoverageDecreasing {
        /// Retention of the earlier tier, in seconds.
        previous_secs: u64,
        /// Retention of the later tier, in seconds.
        next_secs: u64,
    },
}

/// Errors that can occur while reading a rule file from disk.
///
/// Fatal only for the mandatory schemas file; an unset aggregation file
/// path never reaches the filesystem (a synthetic default rule set is
/// used instead).
#[derive(Error, Debug)]
pub enum FileAccessError {
    /// The rule file was missing or unreadable.
    #[error("failed to read rule file '{}': {source}", path.display())]
    Read {
        /// The file path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for `Result<T, ConfigError>`.
pub type Result<T> = std::result::Result<T, ConfigError>;

//! Metric-name pattern matching for storage rules.
//!
//! Every rule in a schemas or aggregation file carries a pattern that is
//! tested against incoming metric names (`carbon.agents.web1.cpu.user`
//! and the like). Patterns come in three flavors, picked once when the
//! rule file is compiled:
//!
//! - **match-all** for `.*`, `*`, or an empty pattern — the catch-all
//!   used by default rules;
//! - **glob** for simple wildcard patterns (`carbon.agents.*`), matched
//!   against the whole name with literal dots;
//! - **regex** for everything else (`\.min$`, `^servers\.(db|web)`),
//!   matched unanchored, the way graphite-style daemons treat rule
//!   patterns.
//!
//! Variant selection is a load-time decision; resolution never inspects
//! the pattern text again.

use crate::error::PatternError;

/// Characters that force a pattern to be compiled as a regex.
///
/// Anything outside this set (plus alphanumerics, `_`, `-`, `.`, `*`,
/// `?`) is regex territory: anchors, escapes, alternation, grouping,
/// repetition counts, and character classes.
const REGEX_METACHARS: &[char] = &['\\', '^', '$', '(', ')', '|', '+', '{', '}', '[', ']'];

/// A compiled metric-name pattern.
///
/// Immutable once compiled. Matching is a pure query and the type is
/// `Send + Sync`, so rule sets holding patterns can be shared freely
/// across reader threads after startup.
#[derive(Debug, Clone)]
pub enum MetricPattern {
    /// Matches every metric name. Used for `.*`, `*`, and empty patterns.
    All,

    /// A glob pattern matched against the full metric name.
    ///
    /// `*` and `?` are wildcards; `.` is a literal separator.
    Glob(glob::Pattern),

    /// A regex searched anywhere in the metric name (unanchored).
    Regex(regex::Regex),
}

impl MetricPattern {
    /// Compiles pattern text from a rule file into a matcher.
    ///
    /// The variant is chosen by inspecting the text: catch-alls become
    /// [`MetricPattern::All`], pure wildcard patterns become
    /// [`MetricPattern::Glob`], and anything containing regex
    /// metacharacters becomes [`MetricPattern::Regex`].
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the glob or regex fails to compile.
    pub fn compile(text: &str) -> Result<Self, PatternError> {
        let text = text.trim();

        if text.is_empty() || text == ".*" || text == "*" {
            return Ok(Self::All);
        }

        if is_glob(text) {
            let pattern = glob::Pattern::new(text).map_err(|e| PatternError::Glob {
                pattern: text.to_string(),
                source: e,
            })?;
            return Ok(Self::Glob(pattern));
        }

        let regex = regex::Regex::new(text).map_err(|e| PatternError::Regex {
            pattern: text.to_string(),
            source: Box::new(e),
        })?;
        Ok(Self::Regex(regex))
    }

    /// Tests a metric name against this pattern.
    ///
    /// Glob patterns must cover the whole name; regex patterns match if
    /// they are found anywhere in it.
    pub fn matches(&self, metric: &str) -> bool {
        match self {
            Self::All => true,
            Self::Glob(pattern) => pattern.matches(metric),
            Self::Regex(regex) => regex.is_match(metric),
        }
    }

    /// Returns `true` for the catch-all variant.
    pub fn is_match_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// Decides whether pattern text is a pure glob.
///
/// A glob must contain at least one wildcard (`*` or `?`) and nothing a
/// regex engine would interpret specially beyond those wildcards.
fn is_glob(text: &str) -> bool {
    let has_wildcard = text.contains('*') || text.contains('?');
    has_wildcard && !text.contains(REGEX_METACHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_all_spellings() {
        for text in [".*", "*", "", "  .*  "] {
            let pattern = MetricPattern::compile(text).unwrap();
            assert!(pattern.is_match_all(), "'{text}' should be match-all");
            assert!(pattern.matches("any.metric.name"));
            assert!(pattern.matches(""));
        }
    }

    #[test]
    fn test_glob_selection_and_matching() {
        let pattern = MetricPattern::compile("carbon.agents.*").unwrap();
        assert!(matches!(pattern, MetricPattern::Glob(_)));

        assert!(pattern.matches("carbon.agents.web1.cpu"));
        assert!(!pattern.matches("carbon.relays.web1.cpu"));
        // Dots are literal in globs: no partial-prefix surprises.
        assert!(!pattern.matches("carbonXagents.web1"));
    }

    #[test]
    fn test_glob_question_mark() {
        let pattern = MetricPattern::compile("servers.web?.load").unwrap();
        assert!(matches!(pattern, MetricPattern::Glob(_)));
        assert!(pattern.matches("servers.web1.load"));
        assert!(!pattern.matches("servers.web12.load"));
    }

    #[test]
    fn test_regex_selection_and_unanchored_matching() {
        let pattern = MetricPattern::compile(r"\.min$").unwrap();
        assert!(matches!(pattern, MetricPattern::Regex(_)));
        assert!(pattern.matches("stats.timers.req.min"));
        assert!(!pattern.matches("stats.timers.req.max"));

        // A plain literal has no wildcards, so it is a regex searched
        // anywhere in the name.
        let literal = MetricPattern::compile("foo").unwrap();
        assert!(matches!(literal, MetricPattern::Regex(_)));
        assert!(literal.matches("foo"));
        assert!(literal.matches("prefix.foo.suffix"));
        assert!(!literal.matches("bar"));
    }

    #[test]
    fn test_regex_alternation() {
        let pattern = MetricPattern::compile(r"^servers\.(db|web)").unwrap();
        assert!(pattern.matches("servers.db01.disk"));
        assert!(pattern.matches("servers.web01.disk"));
        assert!(!pattern.matches("servers.cache01.disk"));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = MetricPattern::compile(r"(unclosed").unwrap_err();
        assert!(matches!(err, PatternError::Regex { .. }));
    }
}

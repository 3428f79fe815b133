//! Ordered rule sets and first-match policy resolution.
//!
//! A rule set is the heart of the configuration subsystem: an ordered
//! list of (pattern, policy) rules plus a default policy that answers
//! when nothing matches. Resolution walks the rules in the exact order
//! they appeared in the source file and returns the policy of the
//! *first* match — pattern specificity never matters, position does.
//! Because the default always answers, `resolve` is a total function.
//!
//! Rule sets are built once at startup and never mutated afterwards;
//! they are `Send + Sync` and shared without locking by every ingestion
//! and storage worker for the life of the process.

use crate::aggregation::AggregationPolicy;
use crate::pattern::MetricPattern;
use crate::retention::RetentionPolicy;

/// A single (pattern, policy) binding from a rule file.
///
/// Immutable once built; owned exclusively by its [`RuleSet`].
#[derive(Debug, Clone)]
pub struct Rule<P> {
    name: String,
    pattern: MetricPattern,
    pattern_text: String,
    policy: P,
}

impl<P> Rule<P> {
    /// Creates a rule from its section name, compiled pattern, original
    /// pattern text, and policy payload.
    pub fn new(
        name: impl Into<String>,
        pattern: MetricPattern,
        pattern_text: impl Into<String>,
        policy: P,
    ) -> Self {
        Self {
            name: name.into(),
            pattern,
            pattern_text: pattern_text.into(),
            policy,
        }
    }

    /// Tests a metric name against this rule's pattern.
    pub fn matches(&self, metric: &str) -> bool {
        self.pattern.matches(metric)
    }

    /// The section name this rule was declared under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pattern text as written in the rule file.
    pub fn pattern_text(&self) -> &str {
        &self.pattern_text
    }

    /// The policy payload this rule carries.
    pub fn policy(&self) -> &P {
        &self.policy
    }
}

/// An ordered collection of rules plus a mandatory default policy.
///
/// Duplicate patterns are permitted: both rules remain in the set, and
/// the earlier one shadows the later one forever. That is a deliberate
/// non-error — dead rules in a schemas file are the operator's business.
#[derive(Debug, Clone)]
pub struct RuleSet<P> {
    rules: Vec<Rule<P>>,
    default_policy: P,
}

impl<P> RuleSet<P> {
    /// Creates a rule set from rules in source order and the default
    /// policy that backs them.
    pub fn new(rules: Vec<Rule<P>>, default_policy: P) -> Self {
        Self {
            rules,
            default_policy,
        }
    }

    /// Resolves the policy for a metric name.
    ///
    /// Returns the policy of the first rule (in source order) whose
    /// pattern matches, or the default policy if none does. Never fails
    /// and has no side effects; repeated calls return the same answer.
    pub fn resolve(&self, metric: &str) -> &P {
        self.resolve_rule(metric)
            .map_or(&self.default_policy, Rule::policy)
    }

    /// Like [`RuleSet::resolve`], but exposes *which* explicit rule
    /// matched. `None` means the default policy applies.
    pub fn resolve_rule(&self, metric: &str) -> Option<&Rule<P>> {
        self.rules.iter().find(|rule| rule.matches(metric))
    }

    /// The explicit rules of this set, in source order.
    pub fn rules(&self) -> &[Rule<P>] {
        &self.rules
    }

    /// The policy used when no explicit rule matches.
    pub fn default_policy(&self) -> &P {
        &self.default_policy
    }

    /// Number of explicit rules (the default is not counted).
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// `true` if the set holds no explicit rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Read façade over the schema rule table.
///
/// This is the sole read path storage and cache components get into the
/// retention rules. It is called once per new metric series, when the
/// storage layer first learns a name; callers cache the result for the
/// series' lifetime instead of re-resolving on every data point.
#[derive(Debug, Clone, Copy)]
pub struct RetentionResolver<'a> {
    rules: &'a RuleSet<RetentionPolicy>,
}

impl<'a> RetentionResolver<'a> {
    /// Wraps a loaded schema rule set.
    pub fn new(rules: &'a RuleSet<RetentionPolicy>) -> Self {
        Self { rules }
    }

    /// Returns the retention policy for a metric name. Total: every
    /// name resolves to exactly one policy.
    pub fn resolve(&self, metric: &str) -> &'a RetentionPolicy {
        self.rules.resolve(metric)
    }
}

/// Read façade over the aggregation rule table.
#[derive(Debug, Clone, Copy)]
pub struct AggregationResolver<'a> {
    rules: &'a RuleSet<AggregationPolicy>,
}

impl<'a> AggregationResolver<'a> {
    /// Wraps a loaded aggregation rule set.
    pub fn new(rules: &'a RuleSet<AggregationPolicy>) -> Self {
        Self { rules }
    }

    /// Returns the aggregation policy for a metric name. Total: every
    /// name resolves to exactly one policy.
    pub fn resolve(&self, metric: &str) -> &'a AggregationPolicy {
        self.rules.resolve(metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::AggregationMethod;

    fn rule(name: &str, pattern: &str, policy: AggregationPolicy) -> Rule<AggregationPolicy> {
        Rule::new(
            name,
            MetricPattern::compile(pattern).unwrap(),
            pattern,
            policy,
        )
    }

    fn policy(method: AggregationMethod) -> AggregationPolicy {
        AggregationPolicy {
            method,
            x_files_factor: 0.5,
        }
    }

    #[test]
    fn test_first_match_wins_over_specificity() {
        // The broad rule comes first and shadows the more specific one.
        let set = RuleSet::new(
            vec![
                rule("broad", r"^stats\.", policy(AggregationMethod::Sum)),
                rule("specific", r"^stats\.timers\.req\.min$", policy(AggregationMethod::Min)),
            ],
            AggregationPolicy::default(),
        );

        let resolved = set.resolve("stats.timers.req.min");
        assert_eq!(resolved.method, AggregationMethod::Sum);
        assert_eq!(set.resolve_rule("stats.timers.req.min").unwrap().name(), "broad");
    }

    #[test]
    fn test_default_policy_backs_misses() {
        let set = RuleSet::new(
            vec![rule("counters", r"\.count$", policy(AggregationMethod::Sum))],
            AggregationPolicy::default(),
        );

        assert_eq!(set.resolve("req.count").method, AggregationMethod::Sum);

        let fallback = set.resolve("cpu.user");
        assert_eq!(fallback.method, AggregationMethod::Average);
        assert!(set.resolve_rule("cpu.user").is_none());
    }

    #[test]
    fn test_empty_set_is_still_total() {
        let set: RuleSet<AggregationPolicy> =
            RuleSet::new(vec![], AggregationPolicy::default());
        assert!(set.is_empty());
        assert_eq!(set.resolve("anything.at.all").method, AggregationMethod::Average);
    }

    #[test]
    fn test_duplicate_patterns_earlier_shadows_later() {
        let set = RuleSet::new(
            vec![
                rule("a", "foo", policy(AggregationMethod::Sum)),
                rule("b", "foo", policy(AggregationMethod::Max)),
            ],
            AggregationPolicy::default(),
        );

        assert_eq!(set.resolve("foo").method, AggregationMethod::Sum);
        // Both rules remain in the set; shadowing is not an error.
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let set = RuleSet::new(
            vec![rule("minimums", r"\.min$", policy(AggregationMethod::Min))],
            AggregationPolicy::default(),
        );

        for _ in 0..3 {
            assert_eq!(set.resolve("req.min").method, AggregationMethod::Min);
        }
    }
}

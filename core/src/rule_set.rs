//! `WatchRuleSet`: ordered rules with first-match-wins semantics
//!
//! The set is a sequence, not a mathematical set: insertion order decides
//! which rule answers for a URL. The only deduplication happens at load time,
//! keeps the first occurrence, and never changes a result.

use crate::trace::{EvalStep, EvalTrace};
use crate::{
    decompile, PatternComparator, PatternError, PatternRelation, RuleDescriptor, WatchRule,
    MAX_RULES,
};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Ordered, immutable list of [`WatchRule`]s.
///
/// # INV: First-match-wins
///
/// Rules are evaluated in order. The first rule whose pattern accepts the
/// input decides: `true` for an include rule, `false` for an exclude rule.
/// Later rules are never consulted, even when they are more specific.
///
/// # Example
///
/// ```
/// use urlwatch::prelude::*;
///
/// let rules = WatchRuleSet::from_descriptors(vec![
///     RuleDescriptor::parse("https://x/*"),
///     RuleDescriptor::parse("!https://x/a"),
/// ])
/// .unwrap();
///
/// // the broad include comes first and wins
/// assert!(rules.matches("https://x/a"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct WatchRuleSet {
    rules: Vec<WatchRule>,
    /// Wildcard form of each rule, decompiled once at construction.
    wildcard_forms: Vec<Option<String>>,
}

/// A rule that can never decide because an earlier rule covers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowedRule {
    /// Position of the unreachable rule.
    pub index: usize,
    /// Position of the earlier rule that covers it.
    pub by: usize,
    /// Relation of the earlier rule to the shadowed one (`Equal` or `Superset`).
    pub relation: PatternRelation,
}

impl WatchRuleSet {
    /// An empty rule set. Matches nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from already compiled rules, keeping their order exactly.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::TooManyRules`] if there are more than [`MAX_RULES`].
    pub fn from_rules(rules: Vec<WatchRule>) -> Result<Self, PatternError> {
        if rules.len() > MAX_RULES {
            return Err(PatternError::TooManyRules {
                count: rules.len(),
                max: MAX_RULES,
            });
        }

        let wildcard_forms = rules.iter().map(|r| decompile(r.compiled())).collect();
        Ok(Self {
            rules,
            wildcard_forms,
        })
    }

    /// Compile descriptors in order.
    ///
    /// Descriptors repeating an earlier `(pattern, kind)` pair are dropped:
    /// the earlier copy always answers first, so the later one is dead.
    ///
    /// # Errors
    ///
    /// Fails on the first descriptor that does not compile, naming its index;
    /// no partial set is ever returned.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = RuleDescriptor>,
    ) -> Result<Self, PatternError> {
        let mut seen = HashSet::new();
        let mut rules = Vec::new();
        let mut duplicates = 0usize;

        for (index, descriptor) in descriptors.into_iter().enumerate() {
            if !seen.insert((descriptor.pattern.clone(), descriptor.kind)) {
                duplicates += 1;
                continue;
            }
            let rule = descriptor.compile().map_err(|e| PatternError::Rule {
                index,
                source: Box::new(e),
            })?;
            rules.push(rule);
        }

        if duplicates > 0 {
            debug!(duplicates, "dropped duplicate watch rules");
        }

        let set = Self::from_rules(rules)?;
        debug!(rules = set.len(), "watch rule set compiled");
        Ok(set)
    }

    /// Is `url` watched?
    ///
    /// Never fails: no matching rule (including an empty set) is `false`.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.rules
            .iter()
            .find(|rule| rule.accepts(url))
            .is_some_and(|rule| !rule.exclude())
    }

    /// Like [`matches`](Self::matches), recording every rule consulted.
    #[must_use]
    pub fn evaluate_with_trace(&self, url: &str) -> EvalTrace {
        let mut steps = Vec::new();
        for (index, rule) in self.rules.iter().enumerate() {
            let matched = rule.accepts(url);
            steps.push(EvalStep {
                index,
                rule: rule.to_string(),
                matched,
            });
            if matched {
                return EvalTrace {
                    input: url.to_owned(),
                    steps,
                    decided_by: Some(index),
                    result: !rule.exclude(),
                };
            }
        }

        EvalTrace {
            input: url.to_owned(),
            steps,
            decided_by: None,
            result: false,
        }
    }

    /// Is any URL the wildcard `candidate` describes watched?
    ///
    /// Each rule, in order, is related to `candidate`; the first rule whose
    /// relation is anything but `Disjoint` decides, exactly like
    /// [`matches`](Self::matches) does for a concrete URL.
    #[must_use]
    pub fn matches_pattern(&self, candidate: &str, comparator: &PatternComparator) -> bool {
        (0..self.rules.len())
            .find(|&i| !self.relation_to(i, candidate, comparator).is_disjoint())
            .is_some_and(|i| !self.rules[i].exclude())
    }

    /// Relation of rule `index` to a wildcard `candidate`.
    ///
    /// Rules that decompile to wildcard form go through the comparator. A
    /// regex rule that does not is probed with the candidate's shortest
    /// member: a hit proves overlap, a miss is reported as `Disjoint`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[must_use]
    pub fn relation_to(
        &self,
        index: usize,
        candidate: &str,
        comparator: &PatternComparator,
    ) -> PatternRelation {
        match &self.wildcard_forms[index] {
            Some(form) => comparator.compare(form, candidate),
            None => {
                let probe = comparator.automaton(candidate).shortest_member();
                if self.rules[index].accepts(&probe) {
                    PatternRelation::Overlapping
                } else {
                    PatternRelation::Disjoint
                }
            }
        }
    }

    /// Rules that can never decide because an earlier rule's language
    /// equals or contains theirs.
    ///
    /// Only rules with a wildcard form take part.
    #[must_use]
    pub fn shadowed_rules(&self, comparator: &PatternComparator) -> Vec<ShadowedRule> {
        let mut shadowed = Vec::new();

        for (index, form) in self.wildcard_forms.iter().enumerate() {
            let Some(form) = form else { continue };

            let cover = self.wildcard_forms[..index]
                .iter()
                .enumerate()
                .filter_map(|(by, earlier)| earlier.as_deref().map(|e| (by, e)))
                .map(|(by, earlier)| (by, comparator.compare(earlier, form)))
                .find(|(_, rel)| matches!(rel, PatternRelation::Equal | PatternRelation::Superset));

            if let Some((by, relation)) = cover {
                warn!(
                    rule = %self.rules[index],
                    shadowed_by = %self.rules[by],
                    "watch rule can never match"
                );
                shadowed.push(ShadowedRule {
                    index,
                    by,
                    relation,
                });
            }
        }

        shadowed
    }

    /// The rules, in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &WatchRule> {
        self.rules.iter()
    }

    /// Rule at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&WatchRule> {
        self.rules.get(index)
    }

    /// The wildcard form of rule `index`, if it has one.
    #[must_use]
    pub fn wildcard_form(&self, index: usize) -> Option<&str> {
        self.wildcard_forms.get(index)?.as_deref()
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a WatchRuleSet {
    type Item = &'a WatchRule;
    type IntoIter = std::slice::Iter<'a, WatchRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RuleKind;

    fn set(rules: &[&str]) -> WatchRuleSet {
        WatchRuleSet::from_descriptors(rules.iter().map(|r| RuleDescriptor::parse(r))).unwrap()
    }

    #[test]
    fn empty_set_matches_nothing() {
        let rules = WatchRuleSet::empty();
        assert!(!rules.matches("https://x/a"));
        assert!(!rules.matches(""));
        assert!(!rules.matches_pattern("*", &PatternComparator::new()));
    }

    #[test]
    fn order_decides() {
        let include_first = set(&["https://x/*", "!https://x/a"]);
        assert!(include_first.matches("https://x/a"));

        let exclude_first = set(&["!https://x/a", "https://x/*"]);
        assert!(!exclude_first.matches("https://x/a"));
        assert!(exclude_first.matches("https://x/b"));
    }

    #[test]
    fn no_match_is_false() {
        let rules = set(&["https://x/*"]);
        assert!(!rules.matches("https://y/a"));
    }

    #[test]
    fn regex_rules_take_part_in_order() {
        let rules = WatchRuleSet::from_descriptors(vec![
            RuleDescriptor::regex(r"^https://x/\d+$").excluded(),
            RuleDescriptor::wildcard("https://x/*"),
        ])
        .unwrap();
        assert!(!rules.matches("https://x/42"));
        assert!(rules.matches("https://x/abc"));
    }

    #[test]
    fn duplicates_dropped_keeping_first() {
        let rules = set(&["https://x/*", "!https://x/*", "https://y/*", "https://x/*"]);
        assert_eq!(rules.len(), 2);
        assert!(rules.matches("https://x/a"));
        assert_eq!(rules.get(1).unwrap().source_pattern(), "https://y/*");
    }

    #[test]
    fn same_pattern_different_kind_is_not_a_duplicate() {
        let rules = WatchRuleSet::from_descriptors(vec![
            RuleDescriptor::wildcard("a.c"),
            RuleDescriptor::regex("a.c"),
        ])
        .unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.get(1).unwrap().kind(), RuleKind::Regex);
    }

    #[test]
    fn construction_fails_on_bad_rule_with_index() {
        let err = WatchRuleSet::from_descriptors(vec![
            RuleDescriptor::wildcard("https://x/*"),
            RuleDescriptor::regex("(bad"),
        ])
        .unwrap_err();
        assert!(matches!(err, PatternError::Rule { index: 1, .. }));
        assert!(err.to_string().starts_with("rule #1: invalid pattern \"(bad\""));
    }

    #[test]
    fn too_many_rules() {
        let descriptors = (0..=MAX_RULES).map(|i| RuleDescriptor::wildcard(format!("https://x/{i}")));
        assert!(matches!(
            WatchRuleSet::from_descriptors(descriptors),
            Err(PatternError::TooManyRules { .. })
        ));
    }

    #[test]
    fn matches_pattern_first_non_disjoint_rule_decides() {
        let cmp = PatternComparator::new();
        let rules = set(&["!https://x/private/*", "https://x/*"]);

        // overlaps the exclude rule first
        assert!(!rules.matches_pattern("https://x/*", &cmp));
        assert!(!rules.matches_pattern("https://x/private/keys/*", &cmp));
        // disjoint from the exclude rule, subset of the include rule
        assert!(rules.matches_pattern("https://x/public/*", &cmp));
        // disjoint from everything
        assert!(!rules.matches_pattern("https://y/*", &cmp));
    }

    #[test]
    fn matches_pattern_with_regex_rules() {
        let cmp = PatternComparator::new();
        let rules = WatchRuleSet::from_descriptors(vec![
            // wildcard-shaped regex decompiles and is compared exactly
            RuleDescriptor::regex(r"(?s)^https://x\.com/.*$"),
            // anything else is probed
            RuleDescriptor::regex(r"^https://y\.com/v\d/.*$"),
        ])
        .unwrap();

        assert_eq!(rules.wildcard_form(0), Some("https://x.com/*"));
        assert_eq!(rules.wildcard_form(1), None);

        assert!(rules.matches_pattern("https://x.com/a/*", &cmp));
        assert!(rules.matches_pattern("https://y.com/v1/*", &cmp));
        assert!(!rules.matches_pattern("https://y.com/beta/*", &cmp));
        assert_eq!(
            rules.relation_to(1, "https://y.com/v2/users*", &cmp),
            PatternRelation::Overlapping
        );
    }

    #[test]
    fn regex_without_dot_all_agrees_with_matches() {
        let cmp = PatternComparator::new();
        let rules = WatchRuleSet::from_descriptors(vec![RuleDescriptor::regex(r"^a.*b$")]).unwrap();

        assert_eq!(rules.wildcard_form(0), None);
        assert!(!rules.matches("a\nb"));
        assert!(!rules.matches_pattern("a\n*b", &cmp));
        assert!(rules.matches("axb"));
        assert!(rules.matches_pattern("a*b", &cmp));
    }

    #[test]
    fn trace_agrees_with_matches() {
        let rules = set(&["https://a/*", "!https://x/a", "https://x/*"]);
        for url in ["https://x/a", "https://x/b", "https://a/", "https://z/"] {
            let trace = rules.evaluate_with_trace(url);
            assert_eq!(trace.result, rules.matches(url), "{url}");
        }

        let trace = rules.evaluate_with_trace("https://x/a");
        assert_eq!(trace.decided_by, Some(1));
        assert_eq!(trace.steps.len(), 2);
        assert_eq!(trace.steps[1].rule, "!https://x/a");

        let trace = rules.evaluate_with_trace("https://z/");
        assert_eq!(trace.decided_by, None);
        assert_eq!(trace.steps.len(), 3);
    }

    #[test]
    fn shadowed_rules_found() {
        let cmp = PatternComparator::new();
        let rules = set(&["https://x/*", "!https://x/a", "https://y/a*", "https://y/a/b*", "https://z/*"]);
        let shadowed = rules.shadowed_rules(&cmp);
        assert_eq!(
            shadowed,
            vec![
                ShadowedRule {
                    index: 1,
                    by: 0,
                    relation: PatternRelation::Superset
                },
                ShadowedRule {
                    index: 3,
                    by: 2,
                    relation: PatternRelation::Superset
                },
            ]
        );
    }

    #[test]
    fn equal_languages_shadow() {
        let cmp = PatternComparator::new();
        let rules = set(&["https://x/*", "!https://x/**"]);
        assert_eq!(
            rules.shadowed_rules(&cmp),
            vec![ShadowedRule {
                index: 1,
                by: 0,
                relation: PatternRelation::Equal
            }]
        );
    }

    #[test]
    fn rule_set_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WatchRuleSet>();
    }
}

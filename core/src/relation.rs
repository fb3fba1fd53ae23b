//! `PatternComparator`: how do two wildcard patterns' languages relate?
//!
//! The general algorithm builds a [`PatternAutomaton`] per pattern, checks the
//! product for a jointly accepting state (`Disjoint` if none), then tests
//! containment both ways.
//!
//! Patterns produced by the generalizer are almost always `prefix*`. Two such
//! patterns are related purely by their prefixes, so that case skips the
//! automata. Debug builds cross-check the fast path against the general one.

use crate::{PatternAutomaton, MAX_RULES};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Room for every rule of a full rule set plus as many candidate patterns.
/// Past this, one entry is evicted per new automaton.
const MAX_CACHED_AUTOMATA: usize = 2 * MAX_RULES;

/// Relationship between the match-sets of two patterns A and B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PatternRelation {
    /// Same language.
    Equal,
    /// A ⊂ B.
    Subset,
    /// A ⊃ B.
    Superset,
    /// Non-empty intersection, neither contains the other.
    Overlapping,
    /// Empty intersection.
    Disjoint,
}

impl PatternRelation {
    /// The relation of (B, A) given the relation of (A, B).
    #[must_use]
    pub fn inverse(self) -> Self {
        match self {
            Self::Subset => Self::Superset,
            Self::Superset => Self::Subset,
            other => other,
        }
    }

    /// Whether the two languages share no string.
    #[must_use]
    pub fn is_disjoint(self) -> bool {
        self == Self::Disjoint
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Subset => "subset",
            Self::Superset => "superset",
            Self::Overlapping => "overlapping",
            Self::Disjoint => "disjoint",
        }
    }

    fn from_containment(a_in_b: bool, b_in_a: bool) -> Self {
        match (a_in_b, b_in_a) {
            (true, true) => Self::Equal,
            (true, false) => Self::Subset,
            (false, true) => Self::Superset,
            (false, false) => Self::Overlapping,
        }
    }
}

impl fmt::Display for PatternRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compares wildcard patterns, caching one automaton per distinct pattern.
///
/// Safe to share across threads; the cache is a concurrent map.
///
/// # Example
///
/// ```
/// use urlwatch::{PatternComparator, PatternRelation};
///
/// let cmp = PatternComparator::new();
/// assert_eq!(cmp.compare("https://x/a*", "https://x/*"), PatternRelation::Subset);
/// assert_eq!(cmp.compare("https://x/a*", "https://x/b*"), PatternRelation::Disjoint);
/// assert_eq!(cmp.compare("https://*/a", "https://x/*"), PatternRelation::Overlapping);
/// ```
#[derive(Debug, Default)]
pub struct PatternComparator {
    cache: DashMap<String, Arc<PatternAutomaton>>,
}

impl PatternComparator {
    /// Create a comparator with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify the relation of `a` to `b`.
    #[must_use]
    pub fn compare(&self, a: &str, b: &str) -> PatternRelation {
        if a == b {
            return PatternRelation::Equal;
        }

        if let Some(fast) = compare_trailing_wildcards(a, b) {
            debug_assert_eq!(
                fast,
                self.compare_automata(a, b),
                "prefix fast path disagrees with automata for {a:?} vs {b:?}"
            );
            return fast;
        }

        self.compare_automata(a, b)
    }

    /// Classify using the automaton algorithm only, never the fast path.
    #[must_use]
    pub fn compare_automata(&self, a: &str, b: &str) -> PatternRelation {
        let (a, b) = (self.automaton(a), self.automaton(b));

        if !a.intersects(&b) {
            return PatternRelation::Disjoint;
        }

        PatternRelation::from_containment(a.is_subset_of(&b), b.is_subset_of(&a))
    }

    /// The cached automaton for `pattern`, built on first use.
    #[must_use]
    pub fn automaton(&self, pattern: &str) -> Arc<PatternAutomaton> {
        if let Some(hit) = self.cache.get(pattern) {
            return hit.value().clone();
        }

        if self.cache.len() >= MAX_CACHED_AUTOMATA {
            self.evict_one();
        }

        debug!(pattern, "building pattern automaton");
        let built = Arc::new(PatternAutomaton::new(pattern));
        self.cache
            .entry(pattern.to_owned())
            .or_insert(built)
            .value()
            .clone()
    }

    fn evict_one(&self) {
        let victim = self.cache.iter().next().map(|entry| entry.key().clone());
        if let Some(victim) = victim {
            debug!(pattern = %victim, "automaton cache full, evicting");
            self.cache.remove(&victim);
        }
    }

    /// Number of cached automata.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

/// Fast path for two `prefix*` patterns.
///
/// Returns `None` unless both patterns have exactly one wildcard, at the end.
#[must_use]
pub fn compare_trailing_wildcards(a: &str, b: &str) -> Option<PatternRelation> {
    let pa = trailing_wildcard_prefix(a)?;
    let pb = trailing_wildcard_prefix(b)?;

    Some(if pa == pb {
        PatternRelation::Equal
    } else if pa.starts_with(pb) {
        PatternRelation::Subset
    } else if pb.starts_with(pa) {
        PatternRelation::Superset
    } else {
        PatternRelation::Disjoint
    })
}

fn trailing_wildcard_prefix(p: &str) -> Option<&str> {
    let prefix = p.strip_suffix(crate::WILDCARD)?;
    (!prefix.contains(crate::WILDCARD)).then_some(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use PatternRelation::*;

    const GRID: &[&str] = &[
        "",
        "*",
        "**",
        "a",
        "a*",
        "*a",
        "*a*",
        "ab",
        "ab*",
        "a*b",
        "a*b*",
        "b*",
        "*b",
        "ba*",
        "https://x/*",
        "https://x/a*",
        "https://x/a/*",
        "https://x/b*",
        "https://*/a",
        "https://*/*",
        "https://x/a/1",
    ];

    #[test]
    fn documented_cases() {
        let cmp = PatternComparator::new();
        assert_eq!(cmp.compare("https://x/a*", "https://x/b*"), Disjoint);
        assert_eq!(cmp.compare("https://x/a*", "https://x/*"), Subset);
        assert_eq!(cmp.compare("https://x/*", "https://x/a*"), Superset);
        assert_eq!(cmp.compare("https://x/*", "https://x/*"), Equal);
    }

    #[test]
    fn general_cases() {
        let cmp = PatternComparator::new();
        assert_eq!(cmp.compare("*", "**"), Equal);
        assert_eq!(cmp.compare("a*b*c", "a*c"), Subset);
        assert_eq!(cmp.compare("*a", "a*"), Overlapping);
        assert_eq!(cmp.compare("*a", "*b"), Disjoint);
        assert_eq!(cmp.compare("https://x/a/1", "https://x/a/*"), Subset);
        assert_eq!(cmp.compare("https://x/a/1", "https://x/a/2"), Disjoint);
        assert_eq!(cmp.compare("https://*.x.com/*", "https://api.x.com/*"), Superset);
        assert_eq!(cmp.compare("https://*/v1/*", "https://x/*/users"), Overlapping);
    }

    #[test]
    fn relation_duality() {
        let cmp = PatternComparator::new();
        for a in GRID {
            for b in GRID {
                let ab = cmp.compare(a, b);
                let ba = cmp.compare(b, a);
                assert_eq!(ab, ba.inverse(), "compare({a:?}, {b:?}) = {ab}, reverse = {ba}");
            }
        }
    }

    #[test]
    fn fast_path_agrees_with_automata() {
        let cmp = PatternComparator::new();
        let prefixes = ["", "h", "https://", "https://x/", "https://x/a", "https://x/ab", "https://y/"];
        for pa in prefixes {
            for pb in prefixes {
                let (a, b) = (format!("{pa}*"), format!("{pb}*"));
                let fast = compare_trailing_wildcards(&a, &b).unwrap();
                assert_eq!(fast, cmp.compare_automata(&a, &b), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn fast_path_only_for_single_trailing_wildcard() {
        assert!(compare_trailing_wildcards("a*", "b*").is_some());
        assert!(compare_trailing_wildcards("a", "b*").is_none());
        assert!(compare_trailing_wildcards("*a*", "b*").is_none());
        assert!(compare_trailing_wildcards("a**", "a*").is_none());
    }

    #[test]
    fn automata_are_cached_per_pattern() {
        let cmp = PatternComparator::new();
        let _ = cmp.compare("https://*/a", "https://x/*");
        let _ = cmp.compare("https://*/a", "https://y/*");
        assert_eq!(cmp.cached(), 3);
        assert!(Arc::ptr_eq(&cmp.automaton("https://*/a"), &cmp.automaton("https://*/a")));
    }

    #[test]
    fn full_cache_evicts_single_entries() {
        let cmp = PatternComparator::new();
        for i in 0..=MAX_CACHED_AUTOMATA {
            let _ = cmp.automaton(&format!("https://h{i}/*"));
        }
        assert_eq!(cmp.cached(), MAX_CACHED_AUTOMATA);

        let last = format!("https://h{MAX_CACHED_AUTOMATA}/*");
        let held = cmp.automaton(&last);
        assert!(Arc::ptr_eq(&held, &cmp.automaton(&last)));
        assert_eq!(cmp.cached(), MAX_CACHED_AUTOMATA);
    }

    #[test]
    fn comparator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PatternComparator>();
    }
}

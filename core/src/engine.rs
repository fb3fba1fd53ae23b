//! `Engine`: the operations the proxy and its tooling call
//!
//! Owns the published rule set, one comparator (and so one automaton cache),
//! the sanitizer and the generalizer. Every method takes `&self`; share an
//! `Engine` across worker threads behind an `Arc`.

use crate::trace::EvalTrace;
use crate::{
    ApiPathSanitizer, Generalization, InputError, PatternComparator, PatternError, PatternRelation,
    RuleDescriptor, SanitizerConfig, ShadowedRule, UrlSetGeneralizer, WatchRuleHandle, WatchRuleSet,
};
use std::sync::Arc;
use tracing::debug;

#[cfg(feature = "serde")]
use crate::EngineConfig;

/// URL watch engine.
///
/// # Example
///
/// ```
/// use urlwatch::prelude::*;
///
/// let engine = Engine::with_rules(vec![
///     RuleDescriptor::parse("!https://graph.microsoft.com/beta/*"),
///     RuleDescriptor::parse("https://graph.microsoft.com/*"),
/// ])
/// .unwrap();
///
/// assert!(engine.matches("https://graph.microsoft.com/v1.0/me"));
/// assert!(!engine.matches("https://graph.microsoft.com/beta/me"));
/// assert!(!engine.matches_pattern("https://graph.microsoft.com/beta/users/*"));
/// ```
#[derive(Debug)]
pub struct Engine {
    rules: WatchRuleHandle,
    comparator: PatternComparator,
    sanitizer: ApiPathSanitizer,
    generalizer: UrlSetGeneralizer,
}

impl Engine {
    /// Assemble an engine from parts.
    #[must_use]
    pub fn new(rules: WatchRuleSet, sanitizer: ApiPathSanitizer) -> Self {
        let engine = Self {
            rules: WatchRuleHandle::new(rules),
            comparator: PatternComparator::new(),
            sanitizer,
            generalizer: UrlSetGeneralizer::new(),
        };
        engine.report_loaded();
        engine
    }

    /// Compile `descriptors` and use the default sanitizer settings.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] if any descriptor fails to compile.
    pub fn with_rules(
        descriptors: impl IntoIterator<Item = RuleDescriptor>,
    ) -> Result<Self, PatternError> {
        let rules = WatchRuleSet::from_descriptors(descriptors)?;
        let sanitizer = ApiPathSanitizer::new(SanitizerConfig::default())?;
        Ok(Self::new(rules, sanitizer))
    }

    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] if a rule fails to compile or the sanitizer
    /// settings are invalid.
    #[cfg(feature = "serde")]
    pub fn from_config(config: &EngineConfig) -> Result<Self, PatternError> {
        let rules = config.rule_set()?;
        let sanitizer = ApiPathSanitizer::new(config.sanitizer.clone())?;
        Ok(Self::new(rules, sanitizer))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Watch rules
    // ═══════════════════════════════════════════════════════════════════════════

    /// Is `url` watched by the current rule set?
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.rules.matches(url)
    }

    /// [`matches`](Self::matches) with the per-rule record.
    #[must_use]
    pub fn evaluate_with_trace(&self, url: &str) -> EvalTrace {
        self.rules.snapshot().evaluate_with_trace(url)
    }

    /// Would a rule with this wildcard pattern be (partly) watched already?
    #[must_use]
    pub fn matches_pattern(&self, candidate: &str) -> bool {
        self.rules.snapshot().matches_pattern(candidate, &self.comparator)
    }

    /// Current rules that can never decide.
    ///
    /// Compares every rule with every earlier one, so it is never run on
    /// load; call it from tooling that reports on a configuration.
    #[must_use]
    pub fn shadowed_rules(&self) -> Vec<ShadowedRule> {
        self.rules.snapshot().shadowed_rules(&self.comparator)
    }

    /// The current rule set.
    #[must_use]
    pub fn rules(&self) -> Arc<WatchRuleSet> {
        self.rules.snapshot()
    }

    /// Publish a new rule set, returning the previous one.
    pub fn replace_rules(&self, rules: WatchRuleSet) -> Arc<WatchRuleSet> {
        let previous = self.rules.publish(rules);
        self.report_loaded();
        previous
    }

    /// Compile `descriptors` and publish them.
    ///
    /// # Errors
    ///
    /// Returns the compile error; the current set stays published.
    pub fn reload_rules(
        &self,
        descriptors: impl IntoIterator<Item = RuleDescriptor>,
    ) -> Result<Arc<WatchRuleSet>, PatternError> {
        let rules = WatchRuleSet::from_descriptors(descriptors)?;
        Ok(self.replace_rules(rules))
    }

    /// Publish the rules of a new configuration.
    ///
    /// Sanitizer settings are fixed when the engine is built and are not
    /// reloaded.
    ///
    /// # Errors
    ///
    /// Returns the compile error; the current set stays published.
    #[cfg(feature = "serde")]
    pub fn reload(&self, config: &EngineConfig) -> Result<Arc<WatchRuleSet>, PatternError> {
        let rules = config.rule_set()?;
        Ok(self.replace_rules(rules))
    }

    fn report_loaded(&self) {
        debug!(rules = self.rules.snapshot().len(), "watch rules loaded");
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Patterns
    // ═══════════════════════════════════════════════════════════════════════════

    /// Relation of wildcard pattern `a` to `b`.
    #[must_use]
    pub fn compare(&self, a: &str, b: &str) -> PatternRelation {
        self.comparator.compare(a, b)
    }

    /// The shared comparator.
    #[must_use]
    pub fn comparator(&self) -> &PatternComparator {
        &self.comparator
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Reporting
    // ═══════════════════════════════════════════════════════════════════════════

    /// Identifier-free template of `url`.
    ///
    /// # Errors
    ///
    /// Returns an [`InputError`] for a malformed URL.
    pub fn sanitize(&self, url: &str) -> Result<String, InputError> {
        self.sanitizer.sanitize(url)
    }

    /// Covering wildcard patterns for `urls`, as given.
    pub fn generalize<I, S>(&self, urls: I) -> Generalization
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.generalizer.generalize(urls)
    }

    /// Covering wildcard patterns for the sanitized forms of `urls`.
    pub fn generalize_sanitized<I, S>(&self, urls: I) -> Generalization
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.generalizer.generalize_sanitized(urls, &self.sanitizer)
    }

    /// The sanitizer.
    #[must_use]
    pub fn sanitizer(&self) -> &ApiPathSanitizer {
        &self.sanitizer
    }
}

//! Config types for engine construction.
//!
//! These types mirror the runtime types but are serde-deserializable, so an
//! [`Engine`](crate::Engine) can be built straight from a JSON/YAML document.
//!
//! # Relationship to runtime types
//!
//! | Config type | Runtime type | Built by |
//! |-------------|-------------|----------|
//! | [`EngineConfig`] | [`Engine`](crate::Engine) | `Engine::from_config()` |
//! | `urls_to_watch` | [`WatchRuleSet`] | [`EngineConfig::rule_set()`] |
//! | [`SanitizerConfig`] | [`ApiPathSanitizer`](crate::ApiPathSanitizer) | `ApiPathSanitizer::new()` |
//!
//! ```yaml
//! urlsToWatch:
//!   - "!https://graph.microsoft.com/beta/*"
//!   - "https://graph.microsoft.com/*"
//!   - pattern: "^https://api\\.contoso\\.com/v\\d+/.*$"
//!     kind: regex
//! sanitizer:
//!   unknownRef: unknown
//! ```

use crate::{PatternError, RuleDescriptor, SanitizerConfig, WatchRuleSet};
use serde::{Deserialize, Serialize};

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Watch rules in evaluation order (first-match-wins).
    pub urls_to_watch: Vec<RuleDescriptor>,

    /// Sanitizer settings.
    #[serde(default)]
    pub sanitizer: SanitizerConfig,
}

impl EngineConfig {
    /// Compile `urls_to_watch` into a rule set.
    ///
    /// # Errors
    ///
    /// Returns the first [`PatternError`] encountered.
    pub fn rule_set(&self) -> Result<WatchRuleSet, PatternError> {
        WatchRuleSet::from_descriptors(self.urls_to_watch.iter().cloned())
    }
}

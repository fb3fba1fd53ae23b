//! urlwatch - URL watch rules and pattern generalization for intercepting proxies
//!
//! The engine decides whether an intercepted request URL is subject to
//! interception, reasons about how two wildcard rules relate, and reduces a
//! recorded traffic sample into a small set of identifier-free route patterns.
//!
//! # Architecture
//!
//! - [`CompiledPattern`]: Wildcard or regex pattern compiled to an anchored matcher
//! - [`WatchRule`]: Compiled pattern + include/exclude flag
//! - [`WatchRuleSet`]: Ordered rules with first-match-wins semantics
//! - [`WatchRuleHandle`]: Atomic publish point for concurrent readers
//! - [`PatternComparator`]: Equal/Subset/Superset/Overlapping/Disjoint via automata
//! - [`ApiPathSanitizer`]: Strips identifiers out of API paths
//! - [`UrlSetGeneralizer`]: Reduces concrete URLs to covering wildcard patterns
//! - [`Engine`]: Facade wiring all of the above together
//!
//! # Key Invariants
//!
//! 1. **Order is semantics**: rules are evaluated in caller-supplied order and
//!    the first rule that accepts a URL decides. Nothing reorders a rule set.
//!
//! 2. **Compile once**: a [`WatchRule`] owns its compiled matcher; there is no
//!    separate mutation path, and reconfiguration replaces the whole set.
//!
//! 3. **Matching is total**: [`WatchRuleSet::matches`], [`WatchRuleSet::matches_pattern`]
//!    and [`PatternComparator::compare`] never fail. Bad patterns are rejected at
//!    construction with a [`PatternError`].
//!
//! # Example
//!
//! ```
//! use urlwatch::prelude::*;
//!
//! let rules = WatchRuleSet::from_descriptors(vec![
//!     RuleDescriptor::parse("!https://graph.microsoft.com/v1.0/me/*"),
//!     RuleDescriptor::parse("https://graph.microsoft.com/v1.0/*"),
//! ])
//! .unwrap();
//!
//! assert!(rules.matches("https://graph.microsoft.com/v1.0/users"));
//! assert!(!rules.matches("https://graph.microsoft.com/v1.0/me/events"));
//! assert!(!rules.matches("https://example.com/"));
//! ```

// ═══════════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════════

mod automaton;
mod engine;
mod generalize;
mod handle;
mod relation;
mod rule_set;
mod sanitize;
mod trace;
mod watch_rule;
mod wildcard;

#[cfg(feature = "serde")]
mod config;

// ═══════════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════════

// Pattern compiler
pub use wildcard::{compile_regex, compile_wildcard, decompile, CompiledPattern};

// Rules
pub use handle::WatchRuleHandle;
pub use rule_set::{ShadowedRule, WatchRuleSet};
pub use watch_rule::{RuleDescriptor, RuleKind, WatchRule};

// Relations
pub use automaton::PatternAutomaton;
pub use relation::{PatternComparator, PatternRelation};

// Sanitizer + generalizer
pub use generalize::{GeneralizedPattern, Generalization, SkippedUrl, UrlSetGeneralizer};
pub use sanitize::{ApiPathSanitizer, PathSegmentClass, SanitizerConfig};

// Facade
pub use engine::Engine;

// Config (feature-gated)
#[cfg(feature = "serde")]
pub use config::EngineConfig;

// Trace types
pub use trace::{EvalStep, EvalTrace};

// ═══════════════════════════════════════════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════════════════════════════════════════

/// Prelude module for convenient imports.
///
/// ```
/// use urlwatch::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Compiler
        compile_regex,
        compile_wildcard,
        decompile,
        // Sanitizer + generalizer
        ApiPathSanitizer,
        CompiledPattern,
        // Facade
        Engine,
        // Trace types
        EvalStep,
        EvalTrace,
        Generalization,
        // Errors
        InputError,
        PathSegmentClass,
        // Relations
        PatternComparator,
        PatternError,
        PatternRelation,
        // Rules
        RuleDescriptor,
        RuleKind,
        UrlSetGeneralizer,
        WatchRule,
        WatchRuleHandle,
        WatchRuleSet,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum length for wildcard patterns.
pub const MAX_PATTERN_LENGTH: usize = 8192;

/// Maximum length for regex-kind patterns.
///
/// Regex compilation is expensive even with the linear-time Rust `regex` crate,
/// so raw regex rules get a shorter limit than [`MAX_PATTERN_LENGTH`].
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4096;

/// Maximum number of rules in a single [`WatchRuleSet`].
///
/// Every intercepted request walks the rule list, so the list length bounds
/// per-request latency.
pub const MAX_RULES: usize = 4096;

/// The wildcard character: matches any sequence of characters, including none.
pub const WILDCARD: char = '*';

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors from pattern compilation and rule-set construction.
///
/// These are configuration-time errors: a rule set that fails to build is
/// never published. Fix the configuration and load again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    /// A regex or wildcard pattern could not be compiled.
    #[error("invalid pattern \"{pattern}\": {reason}")]
    InvalidPattern {
        /// The pattern that failed to compile.
        pattern: String,
        /// The underlying error message.
        reason: String,
    },
    /// A pattern exceeds the maximum allowed length.
    #[error("pattern \"{pattern}\" has length {len}, but maximum allowed is {max}")]
    PatternTooLong {
        /// The offending pattern, truncated for display.
        pattern: String,
        /// Actual length of the pattern.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },
    /// Too many rules in a single rule set.
    #[error("rule set has {count} rules, but maximum allowed is {max}")]
    TooManyRules {
        /// Actual count of rules.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },
    /// A rule at a known position in the configuration failed to compile.
    #[error("rule #{index}: {source}")]
    Rule {
        /// Zero-based index of the descriptor in the configuration.
        index: usize,
        /// The compile failure.
        source: Box<PatternError>,
    },
}

/// Errors from per-URL operations (sanitize, generalize).
///
/// Scoped to a single URL: batch operations record these and move on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// The input is not a parseable absolute URL.
    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl {
        /// The rejected input.
        url: String,
        /// The underlying parse error.
        reason: String,
    },
    /// The URL is absolute but has no host (e.g. `mailto:`).
    #[error("URL \"{url}\" has no host")]
    NotHierarchical {
        /// The rejected input.
        url: String,
    },
    /// Percent-decoding produced bytes that are not valid UTF-8.
    #[error("URL \"{url}\" does not percent-decode to valid UTF-8")]
    InvalidEncoding {
        /// The rejected input.
        url: String,
    },
}

impl InputError {
    /// The URL this error is about.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::InvalidUrl { url, .. }
            | Self::NotHierarchical { url }
            | Self::InvalidEncoding { url } => url,
        }
    }
}

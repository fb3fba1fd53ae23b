//! `WatchRule`: a compiled pattern plus an include/exclude flag
//!
//! [`RuleDescriptor`] is what configuration says; [`WatchRule`] is what the
//! matcher evaluates. The descriptor compiles into the rule exactly once.

use crate::{compile_regex, compile_wildcard, CompiledPattern, PatternError};
use std::fmt;

/// Prefix marking an exclude rule in the short string notation.
pub(crate) const EXCLUDE_PREFIX: char = '!';

/// How a rule's pattern is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RuleKind {
    /// `*` is the only special character.
    #[default]
    Wildcard,
    /// Full regular expression, used verbatim.
    Regex,
}

impl RuleKind {
    /// Lowercase name, as written in configuration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wildcard => "wildcard",
            Self::Regex => "regex",
        }
    }
}

/// A rule as it appears in configuration, before compilation.
///
/// # Example
///
/// ```
/// use urlwatch::{RuleDescriptor, RuleKind};
///
/// let d = RuleDescriptor::parse("!https://graph.microsoft.com/beta/*");
/// assert!(d.exclude);
/// assert_eq!(d.pattern, "https://graph.microsoft.com/beta/*");
/// assert_eq!(d.kind, RuleKind::Wildcard);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDescriptor {
    /// The pattern text.
    pub pattern: String,
    /// Wildcard or regex.
    pub kind: RuleKind,
    /// When the rule decides, the URL is NOT watched.
    pub exclude: bool,
}

impl RuleDescriptor {
    /// An include wildcard rule.
    pub fn wildcard(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            kind: RuleKind::Wildcard,
            exclude: false,
        }
    }

    /// An include regex rule.
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            kind: RuleKind::Regex,
            exclude: false,
        }
    }

    /// Mark this rule as an exclude rule (builder pattern).
    #[must_use]
    pub fn excluded(mut self) -> Self {
        self.exclude = true;
        self
    }

    /// Parse the short string notation: a wildcard pattern, optionally
    /// prefixed with `!` to exclude.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix(EXCLUDE_PREFIX) {
            Some(rest) => Self::wildcard(rest).excluded(),
            None => Self::wildcard(s),
        }
    }

    /// Compile into a [`WatchRule`].
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] if the pattern does not compile.
    pub fn compile(&self) -> Result<WatchRule, PatternError> {
        WatchRule::new(&self.pattern, self.kind, self.exclude)
    }
}

impl fmt::Display for RuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exclude {
            write!(f, "{EXCLUDE_PREFIX}")?;
        }
        match self.kind {
            RuleKind::Wildcard => write!(f, "{}", self.pattern),
            RuleKind::Regex => write!(f, "regex({})", self.pattern),
        }
    }
}

/// A compiled watch rule.
///
/// Immutable: the compiled matcher is derived from the source pattern and
/// kind at construction and the fields are private.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRule {
    compiled: CompiledPattern,
    exclude: bool,
}

impl WatchRule {
    /// Compile a new rule.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] if the pattern does not compile.
    pub fn new(pattern: &str, kind: RuleKind, exclude: bool) -> Result<Self, PatternError> {
        let compiled = match kind {
            RuleKind::Wildcard => compile_wildcard(pattern)?,
            RuleKind::Regex => compile_regex(pattern)?,
        };
        Ok(Self { compiled, exclude })
    }

    /// Whether the compiled pattern accepts `url`.
    #[inline]
    #[must_use]
    pub fn accepts(&self, url: &str) -> bool {
        self.compiled.is_match(url)
    }

    /// The source pattern.
    #[must_use]
    pub fn source_pattern(&self) -> &str {
        self.compiled.source()
    }

    /// Wildcard or regex.
    #[must_use]
    pub fn kind(&self) -> RuleKind {
        self.compiled.kind()
    }

    /// Whether this rule excludes what it accepts.
    #[must_use]
    pub fn exclude(&self) -> bool {
        self.exclude
    }

    /// The compiled matcher.
    #[must_use]
    pub fn compiled(&self) -> &CompiledPattern {
        &self.compiled
    }

    /// The descriptor this rule was compiled from.
    #[must_use]
    pub fn descriptor(&self) -> RuleDescriptor {
        RuleDescriptor {
            pattern: self.source_pattern().to_owned(),
            kind: self.kind(),
            exclude: self.exclude,
        }
    }
}

impl fmt::Display for WatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.descriptor().fmt(f)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Deserialize (feature = "serde")
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "serde")]
mod de {
    use super::{RuleDescriptor, RuleKind};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Either `"!https://x/*"` or `{ pattern, kind, exclude }`.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RuleDescriptorRepr {
        Short(String),
        Full {
            pattern: String,
            #[serde(default)]
            kind: RuleKind,
            #[serde(default)]
            exclude: bool,
        },
    }

    impl<'de> Deserialize<'de> for RuleDescriptor {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            Ok(match RuleDescriptorRepr::deserialize(deserializer)? {
                RuleDescriptorRepr::Short(s) => RuleDescriptor::parse(&s),
                RuleDescriptorRepr::Full {
                    pattern,
                    kind,
                    exclude,
                } => RuleDescriptor {
                    pattern,
                    kind,
                    exclude,
                },
            })
        }
    }

    #[derive(Serialize)]
    struct FullRef<'a> {
        pattern: &'a str,
        kind: RuleKind,
        exclude: bool,
    }

    impl Serialize for RuleDescriptor {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            FullRef {
                pattern: &self.pattern,
                kind: self.kind,
                exclude: self.exclude,
            }
            .serialize(serializer)
        }
    }
}

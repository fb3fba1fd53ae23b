//! Pattern compiler: wildcard and regex patterns to anchored matchers
//!
//! A wildcard pattern is a run of literals separated by `*`. Compilation
//! escapes every literal run with [`regex::escape`], turns each `*` into the
//! any-sequence construct `(?s:.*)`, and anchors the result with `^…$` so the
//! whole candidate must match.
//!
//! [`decompile`] reads that regex form back into wildcard form. The round trip
//! `decompile(&compile_wildcard(p)?) == Some(p)` holds for every pattern built
//! from literals and `*`.

use crate::{PatternError, RuleKind, MAX_PATTERN_LENGTH, MAX_REGEX_PATTERN_LENGTH, WILDCARD};
use std::fmt;

/// The regex construct a `*` compiles to.
const ANY_SEQUENCE: &str = "(?s:.*)";

/// `.*` only means "anything" under the dot-all flag; without it `.` stops
/// at `\n` and the rule is narrower than the wildcard `*`.
const ANY_SEQUENCE_SHORT: &str = ".*";

/// Leading dot-all flag of a hand-written regex rule.
const DOT_ALL: &str = "(?s)";

/// A pattern compiled to an anchored [`regex::Regex`].
///
/// Immutable once built: the compiled form is derived from `source` and
/// `kind` and there is no way to change one without the other.
///
/// # Example
///
/// ```
/// use urlwatch::compile_wildcard;
///
/// let p = compile_wildcard("https://api.contoso.com/v1/*").unwrap();
/// assert!(p.is_match("https://api.contoso.com/v1/orders/42"));
/// assert!(p.is_match("https://api.contoso.com/v1/"));
/// assert!(!p.is_match("https://api.contoso.com/v2/orders"));
/// // anchored: no substring matches
/// assert!(!p.is_match("http://proxy/?u=https://api.contoso.com/v1/"));
/// ```
#[derive(Clone)]
pub struct CompiledPattern {
    kind: RuleKind,
    source: String,
    regex: regex::Regex,
}

impl CompiledPattern {
    /// Check whether the whole `candidate` is accepted.
    #[inline]
    #[must_use]
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// The pattern as the user wrote it.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether this came from a wildcard or a raw regex.
    #[must_use]
    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// The regex string actually compiled.
    #[must_use]
    pub fn as_regex_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.source == other.source
    }
}

impl Eq for CompiledPattern {}

/// Compile a wildcard pattern.
///
/// Every character except `*` is matched literally; `*` matches any sequence,
/// including the empty one and sequences containing `/`.
///
/// # Errors
///
/// Returns [`PatternError::PatternTooLong`] if the pattern exceeds
/// [`MAX_PATTERN_LENGTH`], or [`PatternError::InvalidPattern`] if the escaped
/// form does not compile (e.g. it exceeds the regex size limit).
pub fn compile_wildcard(pattern: &str) -> Result<CompiledPattern, PatternError> {
    check_length(pattern, MAX_PATTERN_LENGTH)?;

    let mut re = String::with_capacity(pattern.len() * 2 + 2);
    re.push('^');
    for (i, run) in pattern.split(WILDCARD).enumerate() {
        if i > 0 {
            re.push_str(ANY_SEQUENCE);
        }
        re.push_str(&regex::escape(run));
    }
    re.push('$');

    let regex = regex::Regex::new(&re).map_err(|e| PatternError::InvalidPattern {
        pattern: pattern.to_owned(),
        reason: e.to_string(),
    })?;

    Ok(CompiledPattern {
        kind: RuleKind::Wildcard,
        source: pattern.to_owned(),
        regex,
    })
}

/// Compile a regex pattern verbatim.
///
/// The pattern is not anchored for you: `^` and `$` are the caller's choice.
///
/// # Errors
///
/// Returns [`PatternError::PatternTooLong`] if the pattern exceeds
/// [`MAX_REGEX_PATTERN_LENGTH`], or [`PatternError::InvalidPattern`] on
/// invalid regex syntax.
pub fn compile_regex(pattern: &str) -> Result<CompiledPattern, PatternError> {
    check_length(pattern, MAX_REGEX_PATTERN_LENGTH)?;

    let regex = regex::Regex::new(pattern).map_err(|e| PatternError::InvalidPattern {
        pattern: pattern.to_owned(),
        reason: e.to_string(),
    })?;

    Ok(CompiledPattern {
        kind: RuleKind::Regex,
        source: pattern.to_owned(),
        regex,
    })
}

/// Turn a compiled pattern back into wildcard form.
///
/// Works on the compiled regex text, not on the remembered source: anchors
/// are stripped, escaped literals are unescaped and every any-sequence
/// construct becomes `*`. Regex-kind patterns decompile too when they are
/// written in that anchored literal/any-sequence shape.
///
/// Returns `None` when the regex uses anything else (classes, alternation,
/// quantifiers, an escaped `*`, or missing anchors), since no wildcard
/// pattern has the same language.
///
/// # Example
///
/// ```
/// use urlwatch::{compile_regex, compile_wildcard, decompile};
///
/// let p = compile_wildcard("https://x.com/a.b/*").unwrap();
/// assert_eq!(decompile(&p).as_deref(), Some("https://x.com/a.b/*"));
///
/// let r = compile_regex(r"(?s)^https://x\.com/.*$").unwrap();
/// assert_eq!(decompile(&r).as_deref(), Some("https://x.com/*"));
///
/// // `.` does not match `\n` without the dot-all flag
/// let r = compile_regex(r"^https://x\.com/.*$").unwrap();
/// assert_eq!(decompile(&r), None);
///
/// let r = compile_regex(r"^https://x\.com/\d+$").unwrap();
/// assert_eq!(decompile(&r), None);
/// ```
#[must_use]
pub fn decompile(pattern: &CompiledPattern) -> Option<String> {
    decompile_regex_str(pattern.as_regex_str())
}

fn decompile_regex_str(re: &str) -> Option<String> {
    let (dot_all, re) = match re.strip_prefix(DOT_ALL) {
        Some(rest) => (true, rest),
        None => (false, re),
    };
    let body = re.strip_prefix('^')?.strip_suffix('$')?;
    let (dot_all, body) = match body.strip_prefix(DOT_ALL) {
        Some(rest) => (true, rest),
        None => (dot_all, body),
    };
    // "\$" at the end is an escaped literal, not an anchor
    if ends_with_unescaped_backslash(body) {
        return None;
    }

    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix(ANY_SEQUENCE) {
            out.push(WILDCARD);
            rest = after;
        } else if let Some(after) = rest.strip_prefix(ANY_SEQUENCE_SHORT).filter(|_| dot_all) {
            out.push(WILDCARD);
            rest = after;
        } else {
            let mut chars = rest.chars();
            let c = chars.next()?;
            if c == '\\' {
                let escaped = chars.next()?;
                // `\*` is a literal star; wildcard form cannot express it
                if escaped == WILDCARD || !regex_syntax_is_meta(escaped) {
                    return None;
                }
                out.push(escaped);
            } else if regex_syntax_is_meta(c) && !is_inert_meta(c) {
                return None;
            } else {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }

    Some(out)
}

/// Characters [`regex::escape`] escapes.
fn regex_syntax_is_meta(c: char) -> bool {
    matches!(
        c,
        '\\' | '.'
            | '+'
            | '*'
            | '?'
            | '('
            | ')'
            | '|'
            | '['
            | ']'
            | '{'
            | '}'
            | '^'
            | '$'
            | '#'
            | '&'
            | '-'
            | '~'
    )
}

/// Escaped by [`regex::escape`] but literal when written bare outside a class.
fn is_inert_meta(c: char) -> bool {
    matches!(c, '#' | '&' | '-' | '~')
}

fn ends_with_unescaped_backslash(s: &str) -> bool {
    s.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

fn check_length(pattern: &str, max: usize) -> Result<(), PatternError> {
    if pattern.len() > max {
        return Err(PatternError::PatternTooLong {
            pattern: pattern.chars().take(64).collect(),
            len: pattern.len(),
            max,
        });
    }
    Ok(())
}

//! `ApiPathSanitizer`: rewrite API URLs into identifier-free templates
//!
//! The path is percent-decoded, split into a version segment and the rest,
//! and every remaining segment is classified by the first rule in a fixed,
//! ordered table. Identifier segments become `{<ref>-id}`, function-call
//! arguments become `<value>`, colon item paths collapse to `<prefix>:<value>`,
//! and everything else passes through.
//!
//! # INV: Idempotence
//!
//! `sanitize(sanitize(u)?) == sanitize(u)` for every accepted URL. Everything
//! the sanitizer emits is itself classified as "unchanged" on the next pass,
//! and characters that would re-parse differently (`?`, `#`, `\`) are escaped
//! back after decoding.

use crate::{InputError, PatternError};
use regex::Regex;
use std::borrow::Cow;
use std::fmt::{self, Write as _};
use url::Url;

/// Replaces function-call argument values and collapsed item paths.
const VALUE: &str = "<value>";

/// Replaces a function-call argument key that is not purely alphabetic.
const KEY: &str = "<key>";

/// Separates an item-path prefix from the path it navigates to.
const ITEM_PATH_DELIMITER: char = ':';

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Values the sanitizer is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct SanitizerConfig {
    /// Segments passed through verbatim as API control segments.
    pub control_tokens: Vec<String>,
    /// The `<ref>` used in `{<ref>-id}` when no entity name precedes an identifier.
    pub unknown_ref: String,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            control_tokens: ["$value", "$count", "$ref", "$batch"]
                .into_iter()
                .map(String::from)
                .collect(),
            unknown_ref: "unknown".into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Classification
// ═══════════════════════════════════════════════════════════════════════════════

/// What a single path segment is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PathSegmentClass {
    /// `<prefix>:<value>`, the output of item-path collapsing.
    AlreadySanitized,
    /// Resource type or navigation property, including namespace-qualified
    /// type names such as `microsoft.graph.user`.
    EntityName,
    /// `<name>_v2` alias.
    DeprecatedEntity,
    /// One of the configured control tokens (`$value`, `$count`, ...).
    ControlSegment,
    /// `{...}`, already generalized.
    Placeholder,
    /// `name(args)`.
    FunctionCall,
    /// Anything else: a volatile value that gets replaced.
    Identifier,
}

impl PathSegmentClass {
    /// Whether a following identifier is named after this segment.
    #[must_use]
    pub fn names_identifiers(self) -> bool {
        matches!(self, Self::EntityName | Self::DeprecatedEntity)
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlreadySanitized => "already_sanitized",
            Self::EntityName => "entity_name",
            Self::DeprecatedEntity => "deprecated_entity",
            Self::ControlSegment => "control_segment",
            Self::Placeholder => "placeholder",
            Self::FunctionCall => "function_call",
            Self::Identifier => "identifier",
        }
    }
}

impl fmt::Display for PathSegmentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a classifier rule recognizes its segments.
#[derive(Debug, Clone)]
enum SegmentTest {
    Grammar(Regex),
    ControlToken,
}

/// One row of the classifier table.
#[derive(Debug, Clone)]
struct SegmentRule {
    class: PathSegmentClass,
    test: SegmentTest,
}

/// The classifier table, in precedence order. First match wins; a segment
/// no rule claims is an [`PathSegmentClass::Identifier`].
const SEGMENT_GRAMMAR: &[(PathSegmentClass, Option<&str>)] = &[
    (PathSegmentClass::AlreadySanitized, Some(r"^[A-Za-z]+:<value>$")),
    (PathSegmentClass::EntityName, Some(r"^[A-Za-z2]+$")),
    (PathSegmentClass::DeprecatedEntity, Some(r"^[A-Za-z]+_v2$")),
    (PathSegmentClass::ControlSegment, None),
    (
        PathSegmentClass::EntityName,
        Some(r"^[A-Za-z][A-Za-z0-9]*(?:\.[A-Za-z][A-Za-z0-9]*)+$"),
    ),
    (PathSegmentClass::Placeholder, Some(r"^\{[^{}]*\}$")),
    (
        PathSegmentClass::FunctionCall,
        Some(r"^[A-Za-z_][A-Za-z0-9_.]*\(.*\)$"),
    ),
];

// ═══════════════════════════════════════════════════════════════════════════════
// Sanitizer
// ═══════════════════════════════════════════════════════════════════════════════

/// Normalizes API URLs into identifier-free templates.
///
/// All grammar regexes are compiled once, in [`new`](Self::new).
///
/// # Example
///
/// ```
/// use urlwatch::{ApiPathSanitizer, SanitizerConfig};
///
/// let s = ApiPathSanitizer::new(SanitizerConfig::default()).unwrap();
/// assert_eq!(
///     s.sanitize("https://graph.microsoft.com/v1.0/users/11111111-1111-1111-1111-111111111111").unwrap(),
///     "https://graph.microsoft.com/v1.0/{users-id}"
/// );
/// assert_eq!(
///     s.sanitize("https://graph.microsoft.com/v1.0/me/events/delta(token='abc')").unwrap(),
///     "https://graph.microsoft.com/v1.0/me/events/delta(token=<value>)"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ApiPathSanitizer {
    rules: Vec<SegmentRule>,
    function_call: Regex,
    config: SanitizerConfig,
}

impl ApiPathSanitizer {
    /// Build a sanitizer.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidPattern`] if `unknown_ref` would not
    /// produce a placeholder the sanitizer itself passes through (it must be
    /// non-empty and free of `{`, `}` and `/`).
    pub fn new(config: SanitizerConfig) -> Result<Self, PatternError> {
        if config.unknown_ref.is_empty() || config.unknown_ref.contains(['{', '}', '/']) {
            return Err(PatternError::InvalidPattern {
                pattern: config.unknown_ref,
                reason: "unknown reference must be non-empty and contain no '{', '}' or '/'".into(),
            });
        }

        let rules = SEGMENT_GRAMMAR
            .iter()
            .map(|&(class, grammar)| {
                let test = match grammar {
                    Some(g) => SegmentTest::Grammar(compile_grammar(g)?),
                    None => SegmentTest::ControlToken,
                };
                Ok(SegmentRule { class, test })
            })
            .collect::<Result<Vec<_>, PatternError>>()?;

        Ok(Self {
            rules,
            function_call: compile_grammar(r"^([A-Za-z_][A-Za-z0-9_.]*)\((.*)\)$")?,
            config,
        })
    }

    /// The configuration this sanitizer was built from.
    #[must_use]
    pub fn config(&self) -> &SanitizerConfig {
        &self.config
    }

    /// Classify one decoded, non-empty path segment on its own.
    #[must_use]
    pub fn classify(&self, segment: &str) -> PathSegmentClass {
        self.rules
            .iter()
            .find(|rule| match &rule.test {
                SegmentTest::Grammar(re) => re.is_match(segment),
                SegmentTest::ControlToken => self.config.control_tokens.iter().any(|t| t == segment),
            })
            .map_or(PathSegmentClass::Identifier, |rule| rule.class)
    }

    /// Sanitize one absolute URL.
    ///
    /// The fragment is dropped; the query is decoded but otherwise kept.
    ///
    /// # Errors
    ///
    /// Returns an [`InputError`] if `url` does not parse as an absolute URL,
    /// has no host, or does not percent-decode to UTF-8.
    pub fn sanitize(&self, url: &str) -> Result<String, InputError> {
        let parsed = Url::parse(url).map_err(|e| InputError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
        let host = parsed.host_str().ok_or_else(|| InputError::NotHierarchical {
            url: url.to_owned(),
        })?;

        let path = decode_fully(parsed.path()).ok_or_else(|| InputError::InvalidEncoding {
            url: url.to_owned(),
        })?;
        let query = match parsed.query().filter(|q| !q.is_empty()) {
            Some(q) => {
                let decoded = decode_fully(q).ok_or_else(|| InputError::InvalidEncoding {
                    url: url.to_owned(),
                })?;
                Some(normalize_query(&decoded))
            }
            None => None,
        };

        let mut out = format!("{}://{host}", parsed.scheme());
        if let Some(port) = parsed.port() {
            out.push_str(&format!(":{port}"));
        }

        let mut segments = path.strip_prefix('/').unwrap_or(&path).split('/');
        let version = segments.next().unwrap_or_default();
        let rest: Vec<&str> = segments.collect();

        out.push('/');
        out.push_str(&escape_version(version));
        for segment in self.sanitize_segments(&rest) {
            out.push('/');
            out.push_str(&escape_segment(&segment));
        }

        if let Some(query) = query {
            out.push('?');
            out.push_str(&query);
        }
        escape_trailing_spaces(&mut out);

        Ok(out)
    }

    /// Sanitize the segments after the version segment.
    fn sanitize_segments(&self, segments: &[&str]) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(segments.len());
        let mut prev: Option<(Cow<'_, str>, PathSegmentClass)> = None;

        for segment in collapse_item_paths(segments) {
            if segment.is_empty() {
                out.push(String::new());
                prev = None;
                continue;
            }

            let class = self.classify(&segment);
            match class {
                PathSegmentClass::FunctionCall => out.push(self.rewrite_function_call(&segment)),
                PathSegmentClass::Identifier => match &prev {
                    // the entity segment is folded into the identifier
                    Some((name, prev_class)) if prev_class.names_identifiers() => {
                        out.pop();
                        out.push(format!("{{{name}-id}}"));
                    }
                    _ => out.push(format!("{{{}-id}}", self.config.unknown_ref)),
                },
                _ => out.push(segment.to_string()),
            }
            prev = Some((segment, class));
        }

        out
    }

    /// `name(k=v, x)` to `name(k=<value>,<value>)`.
    fn rewrite_function_call(&self, segment: &str) -> String {
        let Some(caps) = self.function_call.captures(segment) else {
            return segment.to_owned();
        };
        let name = caps.get(1).map_or("", |m| m.as_str());
        let args = caps.get(2).map_or("", |m| m.as_str());

        let args: Vec<Cow<'_, str>> = args
            .split(',')
            .map(|arg| {
                if arg.is_empty() {
                    return Cow::Borrowed("");
                }
                match arg.split_once('=') {
                    Some((key, _)) => {
                        let key = key.trim();
                        if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphabetic()) {
                            Cow::Owned(format!("{key}={VALUE}"))
                        } else {
                            Cow::Owned(format!("{KEY}={VALUE}"))
                        }
                    }
                    None => Cow::Borrowed(VALUE),
                }
            })
            .collect();

        format!("{name}({})", args.join(","))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

fn compile_grammar(pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(pattern).map_err(|e| PatternError::InvalidPattern {
        pattern: pattern.to_owned(),
        reason: e.to_string(),
    })
}

/// Percent-decode until nothing changes. `None` on invalid UTF-8.
fn decode_fully(input: &str) -> Option<String> {
    let mut current = input.to_owned();
    loop {
        let decoded = urlencoding::decode(&current).ok()?;
        if decoded == current {
            return Some(current);
        }
        current = decoded.into_owned();
    }
}

/// Form-encoding `+` is a space; `#` must stay inside the query.
fn normalize_query(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.chars() {
        match c {
            '+' => out.push(' '),
            '#' => push_escaped(&mut out, c),
            c if c.is_ascii_control() => push_escaped(&mut out, c),
            c => out.push(c),
        }
    }
    out
}

/// Characters that would end or reshape the path on re-parse. The URL
/// parser silently drops tab, CR and LF, so control characters are escaped.
fn needs_escape(c: char) -> bool {
    matches!(c, '?' | '#' | '\\') || c.is_ascii_control()
}

fn push_escaped(out: &mut String, c: char) {
    let _ = write!(out, "%{:02X}", u32::from(c));
}

fn escape_segment(segment: &str) -> Cow<'_, str> {
    if !segment.contains(needs_escape) {
        return Cow::Borrowed(segment);
    }
    let mut out = String::with_capacity(segment.len() + 4);
    for c in segment.chars() {
        if needs_escape(c) {
            push_escaped(&mut out, c);
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// The version segment is written as is, so a decoded `.` or `..` would be
/// removed as a dot-segment on re-parse. `%2E` is a dot-segment too; the
/// double-encoded form decodes back to the same dots.
fn escape_version(version: &str) -> Cow<'_, str> {
    if matches!(version, "." | "..") {
        return Cow::Owned(version.replace('.', "%252E"));
    }
    escape_segment(version)
}

/// The URL parser trims trailing spaces from its input.
fn escape_trailing_spaces(out: &mut String) {
    let kept = out.trim_end_matches(' ').len();
    let trailing = out.len() - kept;
    if trailing > 0 {
        out.truncate(kept);
        out.push_str(&"%20".repeat(trailing));
    }
}

/// The alphabetic prefix of a segment that opens a colon item path, unless
/// the segment is already collapsed.
fn item_path_prefix(segment: &str) -> Option<&str> {
    let (prefix, rest) = segment.split_once(ITEM_PATH_DELIMITER)?;
    let opens = !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_alphabetic());
    (opens && rest != VALUE).then_some(prefix)
}

/// Collapse `prefix:/any/path:` spans (or `prefix:/any/path` up to the end)
/// into a single `prefix:<value>` segment.
fn collapse_item_paths<'a>(segments: &[&'a str]) -> Vec<Cow<'a, str>> {
    let mut out = Vec::with_capacity(segments.len());
    let mut i = 0;

    while i < segments.len() {
        let segment = segments[i];
        let Some(prefix) = item_path_prefix(segment) else {
            out.push(Cow::Borrowed(segment));
            i += 1;
            continue;
        };

        let rest = &segment[prefix.len() + 1..];
        let last = if !rest.is_empty() && rest.ends_with(ITEM_PATH_DELIMITER) {
            i
        } else {
            segments[i + 1..]
                .iter()
                .position(|s| s.ends_with(ITEM_PATH_DELIMITER))
                .map_or(segments.len() - 1, |p| i + 1 + p)
        };

        out.push(Cow::Owned(format!("{prefix}{ITEM_PATH_DELIMITER}{VALUE}")));
        i = last + 1;
    }

    out
}

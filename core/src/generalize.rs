//! `UrlSetGeneralizer`: reduce recorded URLs to covering wildcard patterns
//!
//! URLs are grouped by origin (`scheme://host[:port]`). A group with a single
//! URL keeps its path up to the last `/`; a larger group keeps the longest
//! common path prefix, cut back to a segment boundary. Either way the result
//! ends in `*`, so every URL of the group matches the emitted pattern.
//!
//! A URL that already contains `*` is taken as a pattern and passed through
//! untouched. A URL that does not parse is skipped and reported; it never
//! aborts the batch.

use crate::{ApiPathSanitizer, InputError, WILDCARD};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};
use url::Url;

/// A pattern derived from one group of concrete URLs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeneralizedPattern {
    /// URL scheme, e.g. `https`.
    pub scheme: String,
    /// Host, with `:port` when the port is not the scheme default.
    pub host: String,
    /// Path template, always ending in `*`.
    pub path_template: String,
}

impl fmt::Display for GeneralizedPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.host, self.path_template)
    }
}

/// An input that could not be generalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUrl {
    /// Position in the input batch.
    pub index: usize,
    /// The input as given.
    pub url: String,
    /// Why it was skipped.
    pub error: InputError,
}

/// Result of one generalization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generalization {
    /// Covering patterns, sorted and free of duplicates.
    pub patterns: Vec<String>,
    /// Inputs that were left out, in input order.
    pub skipped: Vec<SkippedUrl>,
}

impl Generalization {
    /// Whether every input contributed to the patterns.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Derives wildcard watch rules from recorded traffic.
///
/// # Example
///
/// ```
/// use urlwatch::UrlSetGeneralizer;
///
/// let g = UrlSetGeneralizer::new();
/// assert_eq!(g.generalize(["https://x/a/1"]).patterns, ["https://x/a/*"]);
/// assert_eq!(g.generalize(["https://x/a/1", "https://x/a/2"]).patterns, ["https://x/a/*"]);
/// assert_eq!(g.generalize(["https://x/a/1", "https://x/b/1"]).patterns, ["https://x/*"]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlSetGeneralizer;

/// Origin key: scheme and host (with port).
type Origin = (String, String);

impl UrlSetGeneralizer {
    /// Create a generalizer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Generalize `urls` as given.
    pub fn generalize<I, S>(&self, urls: I) -> Generalization
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.generalize_with(urls, |url| Ok(url.to_owned()))
    }

    /// Sanitize each concrete URL first, then generalize.
    ///
    /// Sanitizer failures are reported as skipped entries, like parse failures.
    pub fn generalize_sanitized<I, S>(&self, urls: I, sanitizer: &ApiPathSanitizer) -> Generalization
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.generalize_with(urls, |url| sanitizer.sanitize(url))
    }

    fn generalize_with<I, S, F>(&self, urls: I, mut prepare: F) -> Generalization
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&str) -> Result<String, InputError>,
    {
        let mut literal: BTreeSet<String> = BTreeSet::new();
        let mut groups: BTreeMap<Origin, Vec<String>> = BTreeMap::new();
        let mut skipped = Vec::new();

        for (index, url) in urls.into_iter().enumerate() {
            let url = url.as_ref();

            // already a pattern: its own group
            if url.contains(WILDCARD) {
                literal.insert(url.to_owned());
                continue;
            }

            match prepare(url).and_then(|prepared| split_origin(&prepared)) {
                Ok((origin, path)) => groups.entry(origin).or_default().push(path),
                Err(error) => {
                    warn!(index, url, %error, "skipping URL");
                    skipped.push(SkippedUrl {
                        index,
                        url: url.to_owned(),
                        error,
                    });
                }
            }
        }

        let generalized = groups.into_iter().map(|((scheme, host), paths)| GeneralizedPattern {
            scheme,
            host,
            path_template: path_template(&paths),
        });

        let patterns: BTreeSet<String> = literal
            .into_iter()
            .chain(generalized.map(|p| p.to_string()))
            .collect();

        debug!(
            patterns = patterns.len(),
            skipped = skipped.len(),
            "generalized URL set"
        );

        Generalization {
            patterns: patterns.into_iter().collect(),
            skipped,
        }
    }
}

/// Split an absolute URL into its normalized origin and its path as written.
fn split_origin(url: &str) -> Result<(Origin, String), InputError> {
    let parsed = Url::parse(url).map_err(|e| InputError::InvalidUrl {
        url: url.to_owned(),
        reason: e.to_string(),
    })?;
    let host = parsed.host_str().ok_or_else(|| InputError::NotHierarchical {
        url: url.to_owned(),
    })?;

    let host = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    };

    Ok(((parsed.scheme().to_owned(), host), raw_path(url).to_owned()))
}

/// The path exactly as it appears in `url`, without query or fragment.
fn raw_path(url: &str) -> &str {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let start = after_scheme.find(['/', '?', '#']).unwrap_or(after_scheme.len());
    let tail = &after_scheme[start..];
    let end = tail.find(['?', '#']).unwrap_or(tail.len());
    &tail[..end]
}

/// Common path prefix of a group, cut back to its last `/`, plus `*`.
///
/// For a single path this drops the final segment.
fn path_template(paths: &[String]) -> String {
    let mut prefix: &str = paths.first().map_or("", String::as_str);
    for path in paths.iter().skip(1) {
        prefix = common_prefix(prefix, path);
    }

    let cut = prefix.rfind('/').map_or(0, |i| i + 1);
    let mut template = prefix[..cut].to_owned();
    if !template.starts_with('/') {
        template.insert(0, '/');
    }
    template.push(WILDCARD);
    template
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars())
        .find(|((_, x), y)| x != y)
        .map_or_else(|| a.len().min(b.len()), |((i, _), _)| i);
    &a[..len]
}

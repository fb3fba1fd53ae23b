//! Conformance tests that run the YAML fixtures in `tests/fixtures`
//!
//! Each file holds one or more `---`-separated fixtures. The `kind` field
//! selects the operation under test.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use urlwatch::prelude::*;
use urlwatch::SanitizerConfig;

// ═══════════════════════════════════════════════════════════════════════════════
// Fixture types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Fixture {
    Match(RuleFixture),
    MatchPattern(RuleFixture),
    Compare(CasesFixture<CompareCase>),
    Sanitize(CasesFixture<SanitizeCase>),
    Generalize(CasesFixture<GeneralizeCase>),
}

#[derive(Debug, Deserialize)]
struct RuleFixture {
    name: String,
    #[serde(default)]
    #[allow(dead_code)]
    description: String,
    rules: Vec<RuleDescriptor>,
    cases: Vec<MatchCase>,
}

#[derive(Debug, Deserialize)]
struct CasesFixture<C> {
    name: String,
    #[serde(default)]
    #[allow(dead_code)]
    description: String,
    cases: Vec<C>,
}

#[derive(Debug, Deserialize)]
struct MatchCase {
    url: String,
    expect: bool,
}

#[derive(Debug, Deserialize)]
struct CompareCase {
    a: String,
    b: String,
    expect: String,
}

#[derive(Debug, Deserialize)]
struct SanitizeCase {
    url: String,
    #[serde(default)]
    expect: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeneralizeCase {
    urls: Vec<String>,
    expect: Vec<String>,
    #[serde(default)]
    skipped: Vec<usize>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Runner
// ═══════════════════════════════════════════════════════════════════════════════

impl Fixture {
    fn name(&self) -> &str {
        match self {
            Self::Match(f) | Self::MatchPattern(f) => &f.name,
            Self::Compare(f) => &f.name,
            Self::Sanitize(f) => &f.name,
            Self::Generalize(f) => &f.name,
        }
    }

    fn run(&self) {
        match self {
            Self::Match(f) => {
                let rules = rule_set(f);
                for case in &f.cases {
                    assert_eq!(
                        rules.matches(&case.url),
                        case.expect,
                        "[{}] matches({:?})",
                        f.name,
                        case.url
                    );
                    assert_eq!(rules.evaluate_with_trace(&case.url).result, case.expect);
                }
            }
            Self::MatchPattern(f) => {
                let rules = rule_set(f);
                let cmp = PatternComparator::new();
                for case in &f.cases {
                    assert_eq!(
                        rules.matches_pattern(&case.url, &cmp),
                        case.expect,
                        "[{}] matches_pattern({:?})",
                        f.name,
                        case.url
                    );
                }
            }
            Self::Compare(f) => {
                let cmp = PatternComparator::new();
                for case in &f.cases {
                    let forward = cmp.compare(&case.a, &case.b);
                    assert_eq!(
                        forward.as_str(),
                        case.expect,
                        "[{}] compare({:?}, {:?})",
                        f.name,
                        case.a,
                        case.b
                    );
                    assert_eq!(cmp.compare(&case.b, &case.a), forward.inverse());
                }
            }
            Self::Sanitize(f) => {
                let sanitizer = ApiPathSanitizer::new(SanitizerConfig::default()).unwrap();
                for case in &f.cases {
                    match (&case.expect, &case.error, sanitizer.sanitize(&case.url)) {
                        (Some(expect), None, Ok(actual)) => {
                            assert_eq!(&actual, expect, "[{}] sanitize({:?})", f.name, case.url);
                            assert_eq!(sanitizer.sanitize(&actual).as_ref(), Ok(&actual), "not idempotent");
                        }
                        (None, Some(error), Err(actual)) => {
                            assert_eq!(error_kind(&actual), error.as_str(), "[{}] sanitize({:?})", f.name, case.url);
                        }
                        (expect, error, actual) => panic!(
                            "[{}] sanitize({:?}): expected {expect:?}/{error:?}, got {actual:?}",
                            f.name, case.url
                        ),
                    }
                }
            }
            Self::Generalize(f) => {
                let generalizer = UrlSetGeneralizer::new();
                for case in &f.cases {
                    let result = generalizer.generalize(&case.urls);
                    assert_eq!(result.patterns, case.expect, "[{}] generalize({:?})", f.name, case.urls);
                    let skipped: Vec<usize> = result.skipped.iter().map(|s| s.index).collect();
                    assert_eq!(skipped, case.skipped, "[{}] skipped", f.name);
                }
            }
        }
    }
}

fn rule_set(f: &RuleFixture) -> WatchRuleSet {
    WatchRuleSet::from_descriptors(f.rules.iter().cloned())
        .unwrap_or_else(|e| panic!("[{}] rules failed to compile: {e}", f.name))
}

fn error_kind(e: &InputError) -> &'static str {
    match e {
        InputError::InvalidUrl { .. } => "invalid_url",
        InputError::NotHierarchical { .. } => "not_hierarchical",
        InputError::InvalidEncoding { .. } => "invalid_encoding",
    }
}

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn load(path: &Path) -> Vec<Fixture> {
    let yaml = fs::read_to_string(path).expect("read yaml");
    serde_yaml::Deserializer::from_str(&yaml)
        .map(|doc| {
            Fixture::deserialize(doc).unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()))
        })
        .collect()
}

fn run_file(name: &str) -> usize {
    let fixtures = load(&fixtures_dir().join(name));
    assert!(!fixtures.is_empty(), "{name} has no fixtures");
    for fixture in &fixtures {
        println!("  Running: {}", fixture.name());
        fixture.run();
    }
    fixtures.len()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn match_fixtures() {
    run_file("match.yaml");
}

#[test]
fn compare_fixtures() {
    run_file("compare.yaml");
}

#[test]
fn sanitize_fixtures() {
    run_file("sanitize.yaml");
}

#[test]
fn generalize_fixtures() {
    run_file("generalize.yaml");
}

#[test]
fn every_fixture_file_is_run() {
    let mut files: Vec<String> = fs::read_dir(fixtures_dir())
        .expect("read dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".yaml"))
        .collect();
    files.sort();
    assert_eq!(files, ["compare.yaml", "generalize.yaml", "match.yaml", "sanitize.yaml"]);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cross-component properties
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn generalized_patterns_cover_their_inputs_and_relate_to_rules() {
    let urls = [
        "https://graph.microsoft.com/v1.0/users/1/messages",
        "https://graph.microsoft.com/v1.0/users/2/events",
        "https://graph.microsoft.com/v1.0/me",
        "https://contoso.sharepoint.com/sites/a/lists",
    ];
    let engine = Engine::with_rules(vec![
        RuleDescriptor::parse("!https://graph.microsoft.com/v1.0/me/*"),
        RuleDescriptor::parse("https://graph.microsoft.com/*"),
    ])
    .unwrap();

    let result = engine.generalize(urls);
    assert_eq!(
        result.patterns,
        ["https://contoso.sharepoint.com/sites/a/*", "https://graph.microsoft.com/v1.0/*"]
    );

    for url in urls {
        assert!(
            result
                .patterns
                .iter()
                .any(|p| compile_wildcard(p).unwrap().is_match(url)),
            "{url} not covered"
        );
    }

    // the graph pattern overlaps the exclude rule first
    assert!(!engine.matches_pattern("https://graph.microsoft.com/v1.0/*"));
    assert!(!engine.matches_pattern("https://contoso.sharepoint.com/sites/a/*"));
}

#[test]
fn decompiled_rules_compare_equal_to_their_source() {
    let cmp = PatternComparator::new();
    for p in ["https://x/*", "https://*.x.com/a/*/b", "a*b*c", ""] {
        let compiled = compile_wildcard(p).unwrap();
        let back = decompile(&compiled).unwrap();
        assert_eq!(cmp.compare(&back, p), PatternRelation::Equal);
    }
}

//! urlwatch CLI: driving adapter for the urlwatch engine.
//!
//! Subcommands:
//! - `match <config> <url>... [--trace]`: is each URL watched?
//! - `check <config>`: validate config and report shadowed rules
//! - `compare <a> <b>`: relation between two wildcard patterns
//! - `conflicts <config> <pattern>`: does a candidate rule overlap the set?
//! - `sanitize <url>...`: identifier-free templates
//! - `generalize [--sanitize] <file|->`: covering patterns for recorded URLs

use std::io::{self, Read};
use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use urlwatch::{Engine, EngineConfig, RuleDescriptor};

#[derive(Parser, Debug)]
#[command(name = "urlwatch", version, about = "URL watch rules for intercepting proxies")]
struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate URLs against the configured watch rules
    Match {
        /// Config file (YAML, or JSON by extension)
        config: String,
        /// URLs to evaluate
        #[arg(required = true)]
        urls: Vec<String>,
        /// Show every rule consulted
        #[arg(long)]
        trace: bool,
    },
    /// Validate a config and list rules that can never match
    Check {
        /// Config file (YAML, or JSON by extension)
        config: String,
    },
    /// Relation between two wildcard patterns
    Compare {
        /// Pattern A
        a: String,
        /// Pattern B
        b: String,
    },
    /// Check a candidate wildcard rule against the configured rules
    Conflicts {
        /// Config file (YAML, or JSON by extension)
        config: String,
        /// Candidate wildcard pattern
        pattern: String,
    },
    /// Strip identifiers out of API URLs
    Sanitize {
        /// URLs to sanitize
        #[arg(required = true)]
        urls: Vec<String>,
        /// Config file providing sanitizer settings
        #[arg(long)]
        config: Option<String>,
    },
    /// Reduce recorded URLs (one per line) to covering wildcard patterns
    Generalize {
        /// File with one URL per line, or `-` for stdin
        input: String,
        /// Sanitize each URL before generalizing
        #[arg(long)]
        sanitize: bool,
        /// Config file providing sanitizer settings
        #[arg(long)]
        config: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("error: {e}");
        process::exit(1);
    }

    let result = match cli.command {
        Command::Match { config, urls, trace } => cmd_match(&config, &urls, trace),
        Command::Check { config } => cmd_check(&config),
        Command::Compare { a, b } => cmd_compare(&a, &b),
        Command::Conflicts { config, pattern } => cmd_conflicts(&config, &pattern),
        Command::Sanitize { urls, config } => cmd_sanitize(&urls, config.as_deref()),
        Command::Generalize {
            input,
            sanitize,
            config,
        } => cmd_generalize(&input, sanitize, config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_match(config_path: &str, urls: &[String], trace: bool) -> Result<(), String> {
    let engine = load_engine(config_path)?;

    for url in urls {
        if trace {
            println!("{}", engine.evaluate_with_trace(url));
        } else {
            println!("{}\t{url}", engine.matches(url));
        }
    }

    Ok(())
}

fn cmd_check(config_path: &str) -> Result<(), String> {
    let engine = load_engine(config_path)?;
    let rules = engine.rules();

    println!("Config valid ({} rules)", rules.len());
    for shadowed in engine.shadowed_rules() {
        let rule = rules.get(shadowed.index).map(ToString::to_string).unwrap_or_default();
        let by = rules.get(shadowed.by).map(ToString::to_string).unwrap_or_default();
        println!(
            "  rule #{} \"{rule}\" never matches: rule #{} \"{by}\" is {}",
            shadowed.index, shadowed.by, shadowed.relation
        );
    }

    Ok(())
}

fn cmd_compare(a: &str, b: &str) -> Result<(), String> {
    let engine = Engine::with_rules(Vec::new()).map_err(|e| e.to_string())?;
    println!("{}", engine.compare(a, b));
    Ok(())
}

fn cmd_conflicts(config_path: &str, pattern: &str) -> Result<(), String> {
    let engine = load_engine(config_path)?;
    let rules = engine.rules();

    for (index, rule) in rules.iter().enumerate() {
        let relation = rules.relation_to(index, pattern, engine.comparator());
        if !relation.is_disjoint() {
            println!("  rule #{index} \"{rule}\": {relation}");
        }
    }
    println!("{}", engine.matches_pattern(pattern));

    Ok(())
}

fn cmd_sanitize(urls: &[String], config_path: Option<&str>) -> Result<(), String> {
    let engine = reporting_engine(config_path)?;
    let mut failed = 0usize;

    for url in urls {
        match engine.sanitize(url) {
            Ok(sanitized) => println!("{sanitized}"),
            Err(e) => {
                eprintln!("error: {e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(format!("{failed} of {} URLs could not be sanitized", urls.len()));
    }
    Ok(())
}

fn cmd_generalize(input: &str, sanitize: bool, config_path: Option<&str>) -> Result<(), String> {
    let engine = reporting_engine(config_path)?;
    let urls = read_urls(&read_input(input)?);

    let result = if sanitize {
        engine.generalize_sanitized(&urls)
    } else {
        engine.generalize(&urls)
    };

    for pattern in &result.patterns {
        println!("{pattern}");
    }
    if !result.is_complete() {
        eprintln!("skipped {} of {} URLs", result.skipped.len(), urls.len());
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Engine assembly (composition root)
// ═══════════════════════════════════════════════════════════════════════════════

fn load_engine(path: &str) -> Result<Engine, String> {
    let config = load_config(path)?;
    Engine::from_config(&config).map_err(|e| format!("config invalid: {e}"))
}

/// Engine for the commands that only need the sanitizer settings.
fn reporting_engine(config_path: Option<&str>) -> Result<Engine, String> {
    match config_path {
        Some(path) => load_engine(path),
        None => Engine::with_rules(Vec::<RuleDescriptor>::new()).map_err(|e| e.to_string()),
    }
}

fn init_logging(verbose: bool) -> Result<(), String> {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "urlwatch=debug" } else { "urlwatch=info" };
    let filter = match std::env::var("RUST_LOG") {
        Ok(env) => EnvFilter::try_new(&env).map_err(|e| format!("invalid RUST_LOG \"{env}\": {e}"))?,
        Err(_) => EnvFilter::new(default),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| format!("failed to initialize logging: {e}"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Input loading
// ═══════════════════════════════════════════════════════════════════════════════

fn load_config(path: &str) -> Result<EngineConfig, String> {
    let content =
        std::fs::read_to_string(path).map_err(|e| format!("failed to read \"{path}\": {e}"))?;
    parse_config(&content, is_json(path))
}

fn is_json(path: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn parse_config(content: &str, json: bool) -> Result<EngineConfig, String> {
    if json {
        serde_json::from_str(content).map_err(|e| format!("JSON parse error: {e}"))
    } else {
        // Default to YAML (handles .yaml and .yml)
        serde_yaml::from_str(content).map_err(|e| format!("YAML parse error: {e}"))
    }
}

fn read_input(input: &str) -> Result<String, String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("failed to read stdin: {e}"))?;
        Ok(buf)
    } else {
        std::fs::read_to_string(input).map_err(|e| format!("failed to read \"{input}\": {e}"))
    }
}

/// One URL per line; blank lines and `#` comments are ignored.
fn read_urls(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const YAML: &str = r#"
urlsToWatch:
  - "!https://graph.microsoft.com/v1.0/me/*"
  - "https://graph.microsoft.com/v1.0/*"
  - "https://graph.microsoft.com/v1.0/users/*"
  - pattern: '^https://api\.contoso\.com/v\d+/.*$'
    kind: regex
"#;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_subcommands() {
        let cli = Cli::try_parse_from(["urlwatch", "match", "rules.yaml", "https://x/a", "--trace"]).unwrap();
        assert!(matches!(cli.command, Command::Match { trace: true, ref urls, .. } if urls.len() == 1));

        let cli = Cli::try_parse_from(["urlwatch", "-v", "generalize", "--sanitize", "-"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Generalize { sanitize: true, ref input, .. } if input == "-"));

        assert!(Cli::try_parse_from(["urlwatch", "sanitize"]).is_err());
    }

    #[test]
    fn parse_yaml_config() {
        let config = parse_config(YAML, false).unwrap();
        assert_eq!(config.urls_to_watch.len(), 4);

        let engine = Engine::from_config(&config).unwrap();
        assert!(!engine.matches("https://graph.microsoft.com/v1.0/me/events"));
        assert!(engine.matches("https://graph.microsoft.com/v1.0/users"));
        assert!(engine.matches("https://api.contoso.com/v3/orders"));

        let shadowed = engine.shadowed_rules();
        assert_eq!(shadowed.len(), 1);
        assert_eq!((shadowed[0].index, shadowed[0].by), (2, 1));
    }

    #[test]
    fn parse_json_config() {
        let config = parse_config(r#"{ "urlsToWatch": ["https://x/*"] }"#, true).unwrap();
        assert_eq!(config.urls_to_watch, vec![RuleDescriptor::parse("https://x/*")]);
    }

    #[test]
    fn parse_errors_are_reported() {
        assert!(parse_config("urlsToWatch: [", false).unwrap_err().starts_with("YAML parse error"));
        assert!(parse_config("{", true).unwrap_err().starts_with("JSON parse error"));
    }

    #[test]
    fn json_detected_by_extension() {
        assert!(is_json("rules.json"));
        assert!(is_json("rules.JSON"));
        assert!(!is_json("rules.yaml"));
        assert!(!is_json("rules"));
    }

    #[test]
    fn load_config_from_file() {
        let path = std::env::temp_dir().join(format!("urlwatch-cli-{}.yaml", process::id()));
        std::fs::write(&path, YAML).unwrap();
        let config = load_config(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.unwrap().urls_to_watch.len(), 4);

        assert!(load_config("/nonexistent/urlwatch.yaml").unwrap_err().starts_with("failed to read"));
    }

    #[test]
    fn url_list_ignores_blanks_and_comments() {
        let urls = read_urls("# recorded session\nhttps://x/a/1\n\n  https://x/a/2  \n#https://x/b\n");
        assert_eq!(urls, ["https://x/a/1", "https://x/a/2"]);
    }
}

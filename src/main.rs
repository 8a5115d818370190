//! Livecheck CLI - check HTML, CSS and JavaScript files from a terminal
//!
//! Usage:
//!   livecheck index.html styles/*.css      # Check files
//!   cat app.js | livecheck -l script -     # Check stdin
//!   livecheck --fix --write app.js         # Apply suggested fixes in place

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use glob::glob;
use livecheck::lsp::{file_uri, to_publish_diagnostics, PublishDiagnosticsParams};
use livecheck::{
    apply_fixes, CheckOptions, Engine, JsonFormatter, Language, OutputFormatter, Report,
    SeverityLevel, TextFormatter,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(
    name = "livecheck",
    version,
    about = "Live diagnostics for HTML, CSS and JavaScript",
    long_about = "Structural, style and scope checks for HTML, CSS/Sass/Less and JavaScript."
)]
struct Cli {
    /// Files or glob patterns to check (`-` reads stdin)
    #[arg(required = true)]
    files: Vec<String>,

    /// Language of every input (markup, style, script); detected when omitted
    #[arg(short, long)]
    language: Option<Language>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: Format,

    /// Drop diagnostics whose message contains this text (repeatable)
    #[arg(long)]
    ignore: Vec<String>,

    /// Lowest severity to report (error, warning, suggestion, all)
    #[arg(long)]
    severity: Option<SeverityLevel>,

    /// Report at most this many diagnostics per file
    #[arg(long)]
    max_errors: Option<usize>,

    /// Stop analysis after this many milliseconds and report what was found
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Inputs are fragments: skip whole-document checks
    #[arg(long)]
    allow_partial: bool,

    /// Disable specific rules (comma-separated)
    #[arg(long, value_delimiter = ',')]
    disable: Option<Vec<String>>,

    /// Skip the text-level script checks
    #[arg(long)]
    no_heuristics: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Apply suggested fixes and print the result (use with --write to apply)
    #[arg(long)]
    fix: bool,

    /// Write fixes to files (requires --fix)
    #[arg(long, requires = "fix")]
    write: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
    Lsp,
}

/// Where a document comes from
enum Input {
    Stdin,
    File(PathBuf),
}

impl Input {
    fn name(&self) -> String {
        match self {
            Input::Stdin => "<stdin>".to_string(),
            Input::File(path) => path.display().to_string(),
        }
    }

    fn uri(&self) -> String {
        match self {
            Input::Stdin => "untitled:stdin".to_string(),
            Input::File(path) => file_uri(path),
        }
    }

    fn read(&self) -> Result<String> {
        match self {
            Input::Stdin => {
                let mut source = String::new();
                std::io::stdin()
                    .read_to_string(&mut source)
                    .context("Failed to read stdin")?;
                Ok(source)
            }
            Input::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn path(&self) -> Option<&Path> {
        match self {
            Input::Stdin => None,
            Input::File(path) => Some(path),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    // Handle --no-color
    if cli.no_color {
        colored::control::set_override(false);
    }

    let options = build_options(&cli)?;
    let inputs = collect_inputs(&cli.files)?;
    if inputs.is_empty() {
        bail!("No files found to check");
    }

    let engine = Engine::default();
    let start = Instant::now();
    let mut report = Report::default();
    let mut published: Vec<PublishDiagnosticsParams> = Vec::new();
    let mut fixed_on_stdout = false;

    for input in &inputs {
        let source = input.read()?;

        let Some(language) = resolve_language(cli.language, input, &source) else {
            eprintln!(
                "{}: Skipping {}: cannot tell its language (use --language)",
                "warning".yellow().bold(),
                input.name()
            );
            continue;
        };

        let result = engine.check_async(&source, language, &options).await;

        if cli.fix {
            let outcome = apply_fixes(&source, &result.errors);
            log::info!(
                "{}: {} fixes applied, {} skipped",
                input.name(),
                outcome.applied,
                outcome.skipped
            );
            match input.path() {
                Some(path) if cli.write => {
                    if outcome.changed() {
                        std::fs::write(path, &outcome.output)
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                    }
                }
                _ => {
                    print!("{}", outcome.output);
                    fixed_on_stdout = true;
                }
            }
        }

        if cli.format == Format::Lsp {
            published.push(to_publish_diagnostics(&input.uri(), &result, &source, None));
        }
        report.push(input.name(), language, result);
    }

    report.duration = start.elapsed();

    let output = match cli.format {
        Format::Text => {
            let formatter = if cli.no_color {
                TextFormatter::new().without_color()
            } else {
                TextFormatter::new()
            };
            formatter.format(&report)
        }
        Format::Json => JsonFormatter::new().pretty().format(&report),
        Format::Lsp => serde_json::to_string_pretty(&published)?,
    };

    // Fixed text owns stdout whenever any of it was printed there
    if fixed_on_stdout {
        eprint!("{}", output);
    } else {
        print!("{}", output);
    }

    std::process::exit(report.exit_code());
}

/// Configuration file (explicit or discovered) with CLI flags merged on top
fn build_options(cli: &Cli) -> Result<CheckOptions> {
    let mut options = match &cli.config {
        Some(path) => CheckOptions::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CheckOptions::load_default().unwrap_or_else(|e| {
            log::warn!("Ignoring configuration file: {}", e);
            CheckOptions::default()
        }),
    };

    if cli.max_errors == Some(0) {
        bail!("--max-errors must be at least 1");
    }

    let mut overrides = CheckOptions::new()
        .with_ignore_patterns(cli.ignore.iter().cloned())
        .with_allow_partial(cli.allow_partial);
    overrides.max_errors = cli.max_errors;
    overrides.timeout_ms = cli.timeout_ms;
    if let Some(level) = cli.severity {
        overrides.severity_level = level;
    }
    if let Some(rules) = &cli.disable {
        overrides.rules.disabled = rules.clone();
    }
    overrides.script.heuristics = !cli.no_heuristics;

    options.merge(overrides);
    if cli.severity == Some(SeverityLevel::All) {
        options.severity_level = SeverityLevel::All;
    }

    log::debug!("Effective options: {:?}", options);
    Ok(options)
}

/// Expand glob patterns; `-` stands for stdin
fn collect_inputs(patterns: &[String]) -> Result<Vec<Input>> {
    let mut inputs = Vec::new();
    let mut stdin_taken = false;

    for pattern in patterns {
        if pattern == "-" {
            if !stdin_taken {
                inputs.push(Input::Stdin);
                stdin_taken = true;
            }
            continue;
        }

        let paths = glob(pattern).with_context(|| format!("Invalid pattern '{}'", pattern))?;
        let before = inputs.len();
        for entry in paths.flatten() {
            if entry.is_file() {
                inputs.push(Input::File(entry));
            }
        }
        if inputs.len() == before {
            log::warn!("No files match '{}'", pattern);
        }
    }

    Ok(inputs)
}

/// `--language`, else the file extension, else a look at the text
fn resolve_language(flag: Option<Language>, input: &Input, source: &str) -> Option<Language> {
    flag.or_else(|| input.path().and_then(Language::from_path))
        .or_else(|| Language::sniff(source))
}

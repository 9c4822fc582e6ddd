//! Hawthorne Guard CLI - Command-line interface for marker validation
//!
//! CDD Principle: Application Layer - CLI coordinates user interactions with domain services
//! - Translates user commands to validation rounds over source files
//! - Handles external concerns like file watching, process exit codes and terminal output

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use hawthorne_guard::config::DEFAULT_CONFIG_FILES;
use hawthorne_guard::paths::PathFilter;
use hawthorne_guard::{
    AnalysisOptions, DiagnosticKind, HawthorneConfig, HawthorneResult, HawthorneValidator,
    MarkerCatalog, MarkerKind, OutputFormat, ReportFormatter, ReportOptions, Severity,
};
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tokio::sync::mpsc;

/// Hawthorne Guard - Structural validation of persistence markers
#[derive(Parser)]
#[command(name = "hawthorne-guard")]
#[command(version)]
#[command(about = "Checks that Hawthorne record markers are combined correctly on Rust types")]
#[command(
    long_about = "Hawthorne Guard reads Rust sources, finds the types and fields carrying Hawthorne markers and reports every combination the record store cannot accept. Designed for pre-commit hooks and CI pipelines."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log output format
    #[arg(long, value_enum, global = true, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Check files for marker violations
    Check(CheckArgs),

    /// Watch for file changes and re-validate changed sources
    Watch {
        /// Path to watch (defaults to current directory)
        path: Option<PathBuf>,

        /// Debounce delay in milliseconds
        #[arg(long, default_value = "500")]
        delay: u64,
    },

    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },

    /// Explain what a diagnostic code means
    Explain {
        /// Diagnostic code, e.g. ENTITY_COLLECTION_HAS_NO_ID
        code: String,
    },

    /// List the validation rules
    Rules,

    /// Show the marker names in effect
    Markers,
}

#[derive(Args, Default)]
struct CheckArgs {
    /// Paths to analyze (files or directories)
    paths: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    format: OutputFormatArg,

    /// Minimum severity level to report
    #[arg(short, long, value_enum)]
    severity: Option<SeverityArg>,

    /// Maximum number of diagnostics to report
    #[arg(long)]
    max_diagnostics: Option<usize>,

    /// Additional exclude patterns
    #[arg(long, action = clap::ArgAction::Append)]
    exclude: Vec<String>,

    /// Ignore .hawthorneignore files
    #[arg(long)]
    no_ignore: bool,

    /// Disable parallel processing
    #[arg(long)]
    no_parallel: bool,

    /// Fail on first unreadable file
    #[arg(long)]
    fail_fast: bool,

    /// Also validate types declared in test code
    #[arg(long)]
    include_tests: bool,
}

#[derive(Copy, Clone, Default, ValueEnum, PartialEq)]
enum OutputFormatArg {
    #[default]
    Human,
    Json,
    Junit,
    Sarif,
    Github,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Junit => OutputFormat::Junit,
            OutputFormatArg::Sarif => OutputFormat::Sarif,
            OutputFormatArg::Github => OutputFormat::GitHub,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum SeverityArg {
    Info,
    Warning,
    Error,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Info => Severity::Info,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Error => Severity::Error,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_format);

    match run_command(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

async fn run_command(cli: Cli) -> anyhow::Result<i32> {
    let use_colors = !cli.no_color;
    match cli.command {
        Commands::Check(args) => Ok(run_check(cli.config.as_deref(), args, use_colors)?),
        Commands::Watch { path, delay } => {
            run_watch(cli.config, path, delay, use_colors).await
        }
        Commands::ValidateConfig { config_file } => {
            Ok(run_validate_config(config_file.or(cli.config)))
        }
        Commands::Explain { code } => Ok(run_explain(&code)),
        Commands::Rules => Ok(run_list_rules()),
        Commands::Markers => Ok(run_markers(cli.config.as_deref())?),
    }
}

/// Explicit file, else the first default file in the working directory, else defaults
fn load_config(config_path: Option<&Path>) -> HawthorneResult<HawthorneConfig> {
    match config_path {
        Some(path) => HawthorneConfig::load_from_file(path),
        None => HawthorneConfig::discover_in("."),
    }
}

fn run_check(config_path: Option<&Path>, args: CheckArgs, use_colors: bool) -> HawthorneResult<i32> {
    let mut config = load_config(config_path)?;
    if args.include_tests {
        config.analysis.include_tests = true;
    }

    let validator = HawthorneValidator::new_with_config(config)?.with_report_formatter(
        ReportFormatter::new(ReportOptions {
            use_colors,
            max_diagnostics: args.max_diagnostics,
            min_severity: args.severity.map(Severity::from),
            ..Default::default()
        }),
    );

    // Use current directory if no paths specified
    let paths = if args.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.paths
    };

    let options = AnalysisOptions {
        parallel: !args.no_parallel,
        fail_fast: args.fail_fast,
        exclude_patterns: args.exclude,
        ignore_ignore_files: args.no_ignore,
        ..Default::default()
    };

    let report = validator.validate_paths(&paths, &options)?;

    validator.write_report(&report, args.format.into(), io::stdout().lock())?;

    if report.has_errors() {
        Ok(1)
    } else {
        Ok(0)
    }
}

async fn run_watch(
    config_path: Option<PathBuf>,
    path: Option<PathBuf>,
    delay_ms: u64,
    use_colors: bool,
) -> anyhow::Result<i32> {
    use notify::{Event, RecursiveMode, Watcher};

    let requested = path.unwrap_or_else(|| PathBuf::from("."));
    // notify reports absolute paths; the filter needs them under the same root
    let watch_path = std::fs::canonicalize(&requested)
        .with_context(|| format!("Failed to resolve watch path '{}'", requested.display()))?;
    let debounce = Duration::from_millis(delay_ms);

    println!("🔍 Starting Hawthorne Guard watch mode...");
    println!("📂 Watching: {}", watch_path.display());
    println!("⏱️  Debounce delay: {delay_ms}ms");
    println!("Press Ctrl+C to stop watching\n");

    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if tx.send(event).is_err() {
                tracing::debug!("Watch channel closed, dropping event");
            }
        }
        Err(e) => tracing::warn!("Watch error: {}", e),
    })
    .context("Failed to create file watcher")?;

    watcher
        .watch(&watch_path, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch path '{}'", watch_path.display()))?;

    let mut session = WatchSession::start(config_path.as_deref(), watch_path, use_colors)
        .context("Failed to load configuration for watch mode")?;

    println!("🚀 Running initial analysis...");
    session.run_full_round();

    while let Some(first) = rx.recv().await {
        let mut batch = WatchBatch::default();
        batch.absorb(&first);

        // Collect everything that arrives within the debounce window
        loop {
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(Some(event)) => batch.absorb(&event),
                Ok(None) | Err(_) => break,
            }
        }

        if batch.is_empty() {
            continue;
        }

        print!("\x1B[2J\x1B[H");
        io::stdout().flush()?;

        if batch.config_changed {
            println!("🔄 Configuration changed, reloading...");
            session.reload(config_path.as_deref());
            session.run_full_round();
        } else {
            println!("📝 {} changed file(s), re-validating...", batch.sources.len());
            let files: Vec<PathBuf> = batch.sources.into_iter().filter(|p| p.is_file()).collect();
            session.run_round(&files);
        }
    }

    tracing::warn!("File watcher disconnected");
    Ok(0)
}

/// Validator plus source filter for the lifetime of a watch command
struct WatchSession {
    validator: HawthorneValidator,
    filter: PathFilter,
    /// Canonical watched directory; filter patterns are relative to it
    root: PathBuf,
    use_colors: bool,
}

impl WatchSession {
    fn start(
        config_path: Option<&Path>,
        root: PathBuf,
        use_colors: bool,
    ) -> HawthorneResult<Self> {
        let config = load_config(config_path)?;
        Self::from_config(config, root, use_colors)
    }

    fn from_config(
        config: HawthorneConfig,
        root: PathBuf,
        use_colors: bool,
    ) -> HawthorneResult<Self> {
        let filter = PathFilter::from_config(&config.paths)?;
        let validator = HawthorneValidator::new_with_config(config)?.with_report_formatter(
            ReportFormatter::new(ReportOptions {
                use_colors,
                ..Default::default()
            }),
        );
        Ok(Self {
            validator,
            filter,
            root,
            use_colors,
        })
    }

    /// Keep the previous configuration when the new one does not load
    fn reload(&mut self, config_path: Option<&Path>) {
        match Self::start(config_path, self.root.clone(), self.use_colors) {
            Ok(session) => {
                *self = session;
                println!("✅ Configuration reloaded");
            }
            Err(e) => {
                eprintln!("⚠️  Failed to reload configuration: {e}");
                eprintln!("   Keeping the previous configuration...");
            }
        }
    }

    fn run_full_round(&self) {
        self.run_round(&[self.root.clone()]);
    }

    /// One validation round; failures are printed, never fatal
    fn run_round(&self, paths: &[PathBuf]) {
        let paths = match self.filter.filter_paths(&self.root, paths) {
            Ok(paths) => paths,
            Err(e) => {
                eprintln!("❌ Path filtering failed: {e}");
                return;
            }
        };
        if paths.is_empty() {
            println!("⌚ Nothing to validate. Watching for changes...\n");
            return;
        }

        let report = self
            .validator
            .validate_paths(&paths, &AnalysisOptions::default())
            .and_then(|report| {
                self.validator
                    .format_report(&report, OutputFormat::Human)
                    .map(|formatted| (report, formatted))
            });

        match report {
            Ok((_, formatted)) => {
                println!("{formatted}");
                println!("⌚ Watching for changes... (Press Ctrl+C to stop)\n");
            }
            Err(e) => eprintln!("❌ Analysis error: {e}"),
        }
    }
}

/// Paths touched by the events of one debounce window
#[derive(Debug, Default)]
struct WatchBatch {
    sources: BTreeSet<PathBuf>,
    config_changed: bool,
}

impl WatchBatch {
    fn absorb(&mut self, event: &notify::Event) {
        if !is_content_change(event) {
            return;
        }
        for path in &event.paths {
            if is_config_file(path) {
                self.config_changed = true;
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                self.sources.insert(path.clone());
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.sources.is_empty() && !self.config_changed
    }
}

fn is_content_change(event: &notify::Event) -> bool {
    use notify::EventKind;
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

fn is_config_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| DEFAULT_CONFIG_FILES.contains(&name))
        .unwrap_or(false)
}

fn run_validate_config(config_path: Option<PathBuf>) -> i32 {
    let config_path = config_path.unwrap_or_else(|| {
        DEFAULT_CONFIG_FILES
            .into_iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.is_file())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]))
    });

    println!("Validating configuration: {}", config_path.display());

    match HawthorneConfig::load_from_file(&config_path) {
        Ok(config) => {
            println!("✅ Configuration is valid");
            println!("📊 Configuration summary:");
            for kind in MarkerKind::ALL {
                println!("  {:<18} {}", kind.as_str(), config.markers.name_for(kind));
            }
            println!("  Path patterns: {}", config.paths.patterns.len());
            println!("  Include tests: {}", config.analysis.include_tests);
            println!("  Fingerprint: {}", config.fingerprint());
            0
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed: {e}");
            1
        }
    }
}

fn run_explain(code: &str) -> i32 {
    let Some(kind) = DiagnosticKind::from_code(code) else {
        eprintln!("❌ Diagnostic code '{code}' not found");
        println!();
        println!("Available codes:");
        for kind in DiagnosticKind::ALL {
            println!("  - {}", kind.code());
        }
        return 1;
    };

    let applies_to = match kind {
        DiagnosticKind::ClassAnnotationDuplicate | DiagnosticKind::EntityCollectionHasNoId => {
            "type"
        }
        DiagnosticKind::IdHasNoEntityCollection
        | DiagnosticKind::BinaryDataHasNoClassAnnotation => "field",
    };

    println!("📖 Code: {}", kind.code());
    println!("⚠️ Severity: {}", kind.severity().as_str());
    println!("🎯 Reported on: {applies_to}");
    println!();
    println!("📝 Message:");
    println!("   {}", kind.message());
    println!();
    println!("💡 Fix:");
    println!("   {}", kind.suggestion());
    0
}

fn run_list_rules() -> i32 {
    println!("📋 Validation Rules\n");
    for kind in DiagnosticKind::ALL {
        println!("  🔍 {} [{}]", kind.code(), kind.severity().as_str());
        println!("     {}", kind.message());
    }
    0
}

fn run_markers(config_path: Option<&Path>) -> HawthorneResult<i32> {
    let config = load_config(config_path)?;
    let catalog = MarkerCatalog::resolve(&config.markers);

    println!("🏷️  Markers in effect\n");
    for kind in MarkerKind::ALL {
        match catalog.qualified_name(kind) {
            Some(name) => println!("  ✅ {:<18} #[{}]", kind.as_str(), name),
            None => println!("  ❌ {:<18} (unresolved, never matches)", kind.as_str()),
        }
    }

    Ok(if catalog.unresolved().is_empty() { 0 } else { 1 })
}

fn init_logging(verbose: bool, format: LogFormat) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

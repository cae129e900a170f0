// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use screenlate::app_config::{self, Config, DisplayMode};
use screenlate::ocr::replay::ReplaySource;
use screenlate::overlay::{OverlayEvent, OverlayRenderer};
use screenlate::translation::{MockBackend, TranslationBackend};
use screenlate::{CaptureLoop, Engine};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// Scripted backend used for the replay
#[derive(Debug, Clone, ValueEnum)]
enum CliBackend {
    Working,
    Partial,
    Failing,
    Slow,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recorded OCR trace through the engine
    Replay(ReplayArgs),

    /// Generate shell completions for screenlate
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct ReplayArgs {
    /// JSON trace: an array of frames, each with a list of fragments
    #[arg(value_name = "TRACE_PATH")]
    trace_path: PathBuf,

    /// OCR provider id the fragments are attributed to
    #[arg(short, long, default_value = "replay")]
    provider: String,

    /// Scripted translation backend
    #[arg(short, long, value_enum, default_value = "working")]
    backend: CliBackend,

    /// Source language code (e.g., 'ja', 'en')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Show source text instead of translations
    #[arg(long)]
    show_source: bool,

    /// Extra empty cycles after the trace so pending blocks can settle
    #[arg(long, default_value_t = 40)]
    drain_cycles: u64,

    /// Print overlay events as JSON lines
    #[arg(long)]
    json: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", env = "SCREENLATE_CONFIG")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// Screenlate - stabilize on-screen text for translation overlays
#[derive(Parser, Debug)]
#[command(name = "screenlate")]
#[command(version = "0.1.0")]
#[command(about = "Stabilize OCR output into translated overlay blocks")]
#[command(long_about = "Screenlate glues raw OCR fragments into text blocks, waits for them to settle,
translates them in batches and drives overlay slots.

EXAMPLES:
    screenlate replay trace.json                    # Replay with the default config
    screenlate replay -s ja -t en trace.json        # Override the language pair
    screenlate replay --backend failing trace.json  # Exercise retry and age-out
    screenlate replay --json trace.json | jq .      # Machine-readable overlay events
    screenlate completions bash > screenlate.bash   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the config file doesn't
    exist, a default one will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger::new(level)))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Prints overlay events to stdout
#[derive(Debug)]
struct PrintRenderer {
    json: bool,
}

impl OverlayRenderer for PrintRenderer {
    fn handle(&self, event: &OverlayEvent) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize overlay event: {}", e),
            }
            return;
        }
        match event {
            OverlayEvent::Created { id, rect, text } => {
                println!("+ {} at ({:.0}, {:.0}) {:.0}x{:.0}: {}", id, rect.x, rect.y, rect.width, rect.height, text)
            }
            OverlayEvent::Updated { id, rect, text } => {
                println!("~ {} at ({:.0}, {:.0}) {:.0}x{:.0}: {}", id, rect.x, rect.y, rect.width, rect.height, text)
            }
            OverlayEvent::Cleared { id } => println!("- {}", id),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Level is adjusted once the config is loaded
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();
    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "screenlate", &mut std::io::stdout());
            Ok(())
        }
        Commands::Replay(args) => run_replay(args).await,
    }
}

fn load_config(options: &ReplayArgs) -> Result<Config> {
    let mut config = Config::load_or_default(&options.config_path)
        .with_context(|| format!("Failed to load config file: {}", options.config_path.display()))?;

    if let Some(source_lang) = &options.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }
    if options.show_source {
        config.overlay.display_mode = DisplayMode::Source;
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn make_backend(kind: &CliBackend) -> Arc<dyn TranslationBackend> {
    match kind {
        CliBackend::Working => Arc::new(MockBackend::working()),
        CliBackend::Partial => Arc::new(MockBackend::partial()),
        CliBackend::Failing => Arc::new(MockBackend::failing()),
        CliBackend::Slow => Arc::new(MockBackend::slow(500)),
    }
}

async fn run_replay(options: ReplayArgs) -> Result<()> {
    let config = load_config(&options)?;
    log::set_max_level(config.log_level.to_level_filter());

    let replay = Arc::new(load_trace(&options.provider, &options.trace_path)?);
    let frames = replay.remaining() as u64;
    info!("Replaying {} frame(s) from {}", frames, options.trace_path.display());

    let engine = Arc::new(Engine::new(
        config,
        make_backend(&options.backend),
        Arc::new(PrintRenderer { json: options.json }),
    ));

    let capture = CaptureLoop::new(engine.clone(), replay.clone(), replay)
        .with_max_cycles(frames + options.drain_cycles);
    let token = capture.cancellation_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let summary = capture.run().await;
    ctrl_c.abort();

    let stats = engine.stats();
    info!(
        "Done: {} cycle(s), {} block(s) stabilized ({} forced), {} translation(s) applied, {} failed, {} cache hit(s)",
        summary.cycles,
        stats.blocks_stabilized,
        stats.forced_stabilizations,
        stats.translations_applied,
        stats.translations_failed,
        stats.cache_hits
    );
    if summary.capture_failures + summary.capture_timeouts > 0 {
        warn!(
            "{} capture failure(s), {} timeout(s)",
            summary.capture_failures, summary.capture_timeouts
        );
    }
    Ok(())
}

fn load_trace(provider: &str, path: &Path) -> Result<ReplaySource> {
    ReplaySource::from_file(provider, path)
        .with_context(|| format!("Failed to read trace file: {}", path.display()))
}

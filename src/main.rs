// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow, Context};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use capfetch::app_config::{self, Config};
use capfetch::app_controller::Controller;

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

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download and convert captions below a catalog node (default command)
    #[command(alias = "get")]
    Fetch {
        /// Catalog URL or bare node identifier
        #[arg(value_name = "INPUT")]
        input: String,

        #[command(flatten)]
        options: FetchOptions,
    },

    /// Generate shell completions for capfetch
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone)]
struct FetchOptions {
    /// Only fetch these caption languages (e.g. 'sv,da'); default is all
    #[arg(long, value_delimiter = ',')]
    languages: Vec<String>,

    /// Directory the artifacts are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Do not keep the raw caption markup
    #[arg(long)]
    no_raw: bool,

    /// Do not write converted .srt files
    #[arg(long)]
    no_srt: bool,

    /// Account name; enables authentication
    #[arg(short, long, env = "CAPFETCH_USERNAME")]
    username: Option<String>,

    /// Account password
    #[arg(short, long, env = "CAPFETCH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Only list the caption assets that would be fetched
    #[arg(long)]
    list: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// capfetch - caption retrieval for clearleap catalogs
///
/// Walks a show, season, episode or movie in the catalog, downloads its
/// caption tracks and converts them to SubRip.
#[derive(Parser, Debug)]
#[command(name = "capfetch")]
#[command(version)]
#[command(about = "Download and convert catalog caption tracks")]
#[command(long_about = "capfetch walks a catalog node (show, season, episode or movie), downloads every caption track below it and converts each one to SubRip.

EXAMPLES:
    capfetch https://host/series/foo/3bc87b76            # Fetch everything below a show
    capfetch --languages sv,da 3bc87b76                  # Only Swedish and Danish captions
    capfetch --list 3bc87b76                             # List caption assets without downloading
    capfetch -u me@example.com -p secret 3bc87b76        # Log in before browsing
    capfetch --log-level debug -o subs/ 3bc87b76         # Write to subs/ with debug logging
    capfetch completions bash > capfetch.bash            # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Catalog URL or bare node identifier
    #[arg(value_name = "INPUT")]
    input: Option<String>,

    #[command(flatten)]
    options: FetchOptions,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        // Filtering is left to `set_max_level` so the level can change later
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI colour for log level
    fn get_color_for_level(level: Level) -> &'static str {
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
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    // Parse command line arguments using clap
    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "capfetch", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Fetch { input, options }) => run_fetch(input, options).await,
        None => {
            let input = cli.input.ok_or_else(|| {
                anyhow!("INPUT is required when no subcommand is specified")
            })?;
            run_fetch(input, cli.options).await
        }
    }
}

/// Apply command line overrides on top of the loaded configuration
fn apply_overrides(config: &mut Config, options: &FetchOptions) {
    if !options.languages.is_empty() {
        config.output.languages = options.languages.clone();
    }
    if let Some(dir) = &options.output_dir {
        config.output.directory = dir.clone();
    }
    if options.force_overwrite {
        config.output.force_overwrite = true;
    }
    if options.no_raw {
        config.output.write_raw = false;
    }
    if options.no_srt {
        config.output.write_srt = false;
    }
    if let Some(username) = &options.username {
        config.auth.username = username.clone();
        config.auth.enabled = true;
    }
    if let Some(password) = &options.password {
        config.auth.password = password.clone();
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }
}

async fn run_fetch(input: String, options: FetchOptions) -> Result<()> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &options.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    // Load or create configuration
    let mut config = Config::load_or_create(Path::new(&options.config_path))?;
    apply_overrides(&mut config, &options);

    // Validate the configuration after loading and overriding
    config.validate()
        .context("Configuration validation failed")?;

    if options.log_level.is_none() {
        log::set_max_level(config.log_level.to_level_filter());
    }

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after in-flight requests");
            signal_token.cancel();
        }
    });

    let controller = Controller::with_config(config)?;

    if options.list {
        let targets = controller.list(&input, &cancel).await?;
        for target in &targets {
            println!("{}", target.listing());
        }
        info!("{} caption assets", targets.len());
        return Ok(());
    }

    match controller.run(&input, &cancel).await {
        Ok(summary) => {
            if summary.failed > 0 || summary.subtree_failures > 0 {
                warn!(
                    "{} captions and {} catalog subtrees could not be processed",
                    summary.failed, summary.subtree_failures
                );
            }
            Ok(())
        }
        Err(e) => {
            error!("Could not resolve '{}': {:#}", input, e);
            Err(e)
        }
    }
}

mod config;
mod runner;
mod version;
mod web;

use crate::config::{BuildConfig, DEFAULT_CONFIG_FILE};
use crate::runner::SystemRunner;
use crate::web::{TriggerPolicy, WebBuild, WebBuildError, WebBuildOutcome};
use anyhow::Context;
use clap::{Parser, Subcommand};
use crate::runner::CommandRunner;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pre-build helpers for the MiLight hub firmware
#[derive(Debug, Parser)]
#[command(name = "hub-build", version)]
struct Cli {
    /// Config file (defaults to hub-build.json in the current directory)
    #[arg(long, env = "HUB_BUILD_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Install web UI dependencies and build the bundle
    Web {
        /// Requested build target (repeatable); also read from HUB_BUILD_TARGETS
        #[arg(short, long = "target", value_name = "TARGET")]
        targets: Vec<String>,

        /// Build regardless of the requested targets
        #[arg(long)]
        always: bool,
    },

    /// Print the version build flag followed by any extra arguments
    ///
    /// Everything after `version` is taken from argv untouched, see `parse_cli`.
    #[command(disable_help_flag = true)]
    Version {
        /// Passed through verbatim
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
        extra: Vec<String>,
    },

    /// Show the effective configuration
    Config {
        /// Write it to this file instead of stdout
        #[arg(long, value_name = "PATH")]
        write: Option<PathBuf>,
    },
}

/// Default filter; the target is the binary's crate name
const DEFAULT_LOG_FILTER: &str = "hub_build=info";

fn main() -> ExitCode {
    // Logs go to stderr; stdout is reserved for the version flag line
    let stderr_is_terminal = std::io::stderr().is_terminal();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(use_ansi(stderr_is_terminal, std::env::var_os("NO_COLOR").is_some())),
        )
        .init();

    let cli = parse_cli(std::env::args().collect()).unwrap_or_else(|e| e.exit());

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Colour only when a person is watching; build logs get plain text
fn use_ansi(is_terminal: bool, no_color: bool) -> bool {
    is_terminal && !no_color
}

/// Parse argv, except that everything after the `version` subcommand is
/// passed through verbatim, `--` included.
fn parse_cli(argv: Vec<String>) -> Result<Cli, clap::Error> {
    let Some(split) = version_position(&argv) else {
        return Cli::try_parse_from(argv);
    };

    let mut head = argv;
    let extra = head.split_off(split + 1);
    let mut cli = Cli::try_parse_from(head)?;
    if let Command::Version { extra: parsed } = &mut cli.command {
        *parsed = extra;
    }
    Ok(cli)
}

/// Index of the `version` subcommand, skipping the global options before it
fn version_position(argv: &[String]) -> Option<usize> {
    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "version" => return Some(i),
            "--config" => i += 2,
            arg if arg.starts_with("--config=") => i += 1,
            _ => return None,
        }
    }
    None
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let root = config::project_root(&config_path, &cwd);
    let config = BuildConfig::load(&config_path);

    match cli.command {
        Command::Web { targets, always } => {
            let targets = with_env_targets(targets);
            let status = run_web(
                &config,
                &root,
                &targets,
                always,
                &SystemRunner,
                &mut std::io::stderr(),
            );
            Ok(ExitCode::from(status))
        }
        Command::Version { extra } => {
            let resolved =
                version::resolve_version(&SystemRunner, &config.git, &root, &config.version_fallback);
            tracing::info!("Version {} ({})", resolved.value, resolved.source);
            println!(
                "{}",
                version::format_flag(&config.version_define, &resolved.value, &extra)
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { write: Some(path) } => {
            config
                .save(&path)
                .with_context(|| format!("Failed to write config to {}", path.display()))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { write: None } => {
            let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
            println!("{}", json);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run the web step and report a failure on `diagnostics`; returns the
/// process exit status.
fn run_web<R, W>(
    config: &BuildConfig,
    root: &Path,
    targets: &[String],
    always: bool,
    runner: &R,
    diagnostics: &mut W,
) -> u8
where
    R: CommandRunner + ?Sized,
    W: Write,
{
    let mut step = WebBuild::from_config(config, root);
    if always {
        step.trigger = TriggerPolicy::Always;
    }

    match step.run(runner, targets) {
        Ok(WebBuildOutcome::Skipped) => 0,
        Ok(WebBuildOutcome::Built { steps }) => {
            tracing::info!("Web bundle built ({} steps)", steps.len());
            0
        }
        Err(e) => {
            match e.step() {
                Some(step) => tracing::error!("Web build failed at {}: {}", step, e),
                None => tracing::error!("Web build failed: {}", e),
            }
            report_web_failure(&e, diagnostics);
            1
        }
    }
}

fn report_web_failure<W: Write>(err: &WebBuildError, diagnostics: &mut W) {
    // Nothing sensible left to do if stderr itself is gone
    let _ = writeln!(diagnostics, "Error during npm build process.");
    let _ = writeln!(diagnostics, "{}", err);
}

fn with_env_targets(mut targets: Vec<String>) -> Vec<String> {
    if let Ok(env_targets) = std::env::var("HUB_BUILD_TARGETS") {
        targets.extend(split_targets(&env_targets));
    }
    targets
}

/// Targets from an environment variable, separated by commas or whitespace
fn split_targets(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

mod cli;
mod error_fmt;
mod plot;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use crate::cli::{Cli, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = color_eyre::install() {
        eprintln!("warning: color-eyre not installed: {e}");
    }

    if let Err(err) = run(cli) {
        let json_mode = JSON_MODE.get().copied().unwrap_or(false);
        tracing::error!(error = %format!("{err:#}"), "command failed");
        if json_mode {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = ?cli.config, "config loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        }) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    #[cfg(feature = "hardware")]
    let port = cli.port.as_deref();
    #[cfg(not(feature = "hardware"))]
    let port = None;

    plot::dispatch(&cli.cmd, &cfg, port, cli.json, &shutdown)
}

fn load_config(path: Option<&std::path::Path>) -> Result<plotter_config::Config> {
    let Some(path) = path else {
        return Ok(plotter_config::Config::default());
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let cfg = plotter_config::load_toml(&text)
        .wrap_err_with(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;
    Ok(cfg)
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console logs go to stderr so stdout stays clean for results and JSON.
fn init_tracing(json: bool, level: &str, logging: &plotter_config::Logging) -> Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let console: BoxedLayer = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };
    layers.push(console);

    if let Some(file) = logging.file.as_deref() {
        let path = std::path::Path::new(file);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
        let appender = match logging.rotation.as_deref().unwrap_or("never") {
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))
            .wrap_err("invalid logging.level")?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("initializing logging")?;
    Ok(())
}

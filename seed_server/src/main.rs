use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use seed_server::openvpn::{ArtifactWriter, OutputLayout, SeedServerValues, layout_in};
use shared_utils::config::Config;
use shared_utils::logging::{LogOptions, init_logging, parse_level};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogLevelArg {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevelArg> for tracing::Level {
    fn from(level: LogLevelArg) -> Self {
        match level {
            LogLevelArg::Trace => tracing::Level::TRACE,
            LogLevelArg::Debug => tracing::Level::DEBUG,
            LogLevelArg::Info => tracing::Level::INFO,
            LogLevelArg::Warn => tracing::Level::WARN,
            LogLevelArg::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, after_help = "Examples:\n  seed-server --config /etc/seed-server/config.toml write\n  seed-server render\n  SEED_SERVER_HA_ENABLED=true SEED_SERVER_HA_VPN_CLIENTS=2 seed-server addresses")]
struct Args {
    /// Configuration file (default: user config dir, then environment only)
    #[arg(short, long, env = "SEED_SERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (overrides the configuration file)
    #[arg(short, long, value_enum, ignore_case = true)]
    log_level: Option<LogLevelArg>,

    /// Emit JSON logs
    #[arg(long, env = "SEED_SERVER_JSON_LOGS")]
    json_logs: bool,

    /// Write all artifacts below this directory instead of the configured paths
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Generate and write the server and client configuration files
    #[default]
    Write,
    /// Print the generated artifacts without writing them
    Render,
    /// Print the addresses assigned to the HA shoot clients
    Addresses,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => {
            let default_path = Config::default_path();
            if default_path.exists() {
                Config::load(&default_path).with_context(|| {
                    format!("loading configuration from {}", default_path.display())
                })
            } else {
                Config::from_env().context("building configuration from environment")
            }
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;

    let level = args
        .log_level
        .map(tracing::Level::from)
        .unwrap_or_else(|| parse_level(&config.log_level));
    let _guard = init_logging(LogOptions {
        level,
        json_format: args.json_logs,
        ..Default::default()
    });
    debug!(?config, "configuration loaded");

    let values = SeedServerValues::from_config(&config)?;
    let layout = match &args.output_dir {
        Some(dir) => layout_in(dir),
        None => OutputLayout::from(&config.output),
    };
    let writer = ArtifactWriter::new(layout);

    match args.command.unwrap_or_default() {
        Command::Write => {
            let report = writer
                .write_server_config_files(&values)
                .context("generating tunnel configuration")?;
            for (kind, path) in &report.written {
                info!(artifact = %kind, path = %path.display(), "artifact written");
            }
        }
        Command::Render => {
            let artifacts = writer
                .render_all(&values)
                .context("rendering tunnel configuration")?;
            let mut stdout = std::io::stdout().lock();
            for artifact in artifacts {
                writeln!(stdout, "# {} ({})", artifact.kind, artifact.path.display())?;
                stdout.write_all(&artifact.content)?;
                writeln!(stdout)?;
            }
        }
        Command::Addresses => {
            if !values.is_ha {
                println!(
                    "HA is disabled, shoot clients are addressed from {}",
                    values.openvpn_network_pool
                );
                return Ok(());
            }
            println!("slot {} of {}:", values.vpn_index, values.openvpn_network);
            for (index, address) in values.ha_client_addresses() {
                let address = address
                    .with_context(|| format!("assigning address to HA shoot client {index}"))?;
                let path = writer.layout().ha_client_config_path(index);
                println!("  {}\t{}", path.display(), address);
            }
        }
    }

    Ok(())
}

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use cert_checks::collect_metrics;
use cert_checks::config::{Config, ConfigError, DEFAULT_CONFIG_FILE};

/// Monitoring check states, as understood by Sensu and Nagios style agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckState {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl From<CheckState> for ExitCode {
    fn from(state: CheckState) -> Self {
        ExitCode::from(state as u8)
    }
}

#[derive(Parser, Debug)]
#[command(name = "cert-checks", version, author, about = "Inspects certificate data")]
struct Cli {
    /// URL to certificate. Supports https, tcp, and file schemes
    #[arg(short = 'c', long, env = "CHECK_CERT")]
    cert: Option<String>,

    /// Optional TLS servername extension argument
    #[arg(short = 's', long, env = "CHECK_SERVER_NAME")]
    servername: Option<String>,

    /// Optional Influx format output. `--influx=false` turns off a config file's `influx = true`
    #[arg(
        short = 'i',
        long,
        env = "INFLUX_FORMAT",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    influx: Option<bool>,

    /// Overall timeout in seconds (0 disables it)
    #[arg(short = 't', long, env = "CHECK_TIMEOUT")]
    timeout: Option<u64>,

    /// Path to a TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long)]
    generate_config: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.generate_config {
        println!("{}", Config::example_toml());
        return CheckState::Ok.into();
    }

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            println!("cert-checks failed to load configuration: {}", e);
            return CheckState::Unknown.into();
        }
    };
    tracing::debug!(?config, "resolved configuration");

    let cert = match config.require_cert() {
        Ok(cert) => cert,
        Err(e) => {
            println!("{}", e);
            return CheckState::Warning.into();
        }
    };

    execute_check(cert, &config).into()
}

fn resolve_config(cli: &Cli) -> Result<Config, ConfigError> {
    let file_config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Config::from_file(DEFAULT_CONFIG_FILE)?,
        None => Config::default(),
    };

    let cli_config = Config::from_cli_args(
        cli.cert.clone(),
        cli.servername.clone(),
        cli.influx,
        cli.timeout,
    );

    Ok(Config::defaults().merge_with(file_config).merge_with(cli_config))
}

fn execute_check(cert: &str, config: &Config) -> CheckState {
    let options = config.check_options();
    tracing::info!(location = cert, output = %options.output, "checking certificate");

    match collect_metrics(cert, &options, config.deadline()) {
        Ok(metrics) => {
            tracing::debug!(
                seconds_until_expires = metrics.seconds_until_expires,
                seconds_since_issued = metrics.seconds_since_issued,
                "certificate inspected"
            );
            println!("{}", metrics);
            CheckState::Ok
        }
        Err(e) => {
            tracing::warn!(kind = ?e.kind(), "certificate check failed");
            println!("cert-checks failed with error: {}", e);
            CheckState::Critical
        }
    }
}

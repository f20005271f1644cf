//! dkr - docker-compatible CLI on top of the Docker Engine API

mod passthrough;

use clap::Parser;
use dkr_config::GlobalConfig;
use dkr_core::{Command, Console, CoreError, Dispatcher, EXIT_FAILURE};
use std::ffi::OsString;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dkr")]
#[command(
    about = "Docker-compatible command line on top of the Docker Engine API",
    long_about = None,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// Log filter, e.g. `debug` or `dkr_core=trace`
    #[arg(long = "log-level", env = "DKR_LOG", default_value = "warn")]
    log_level: String,

    /// Docker command line: <command> <target> [args...] [--flag[=value]...]
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    argv: Vec<String>,
}

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.downcast_ref::<CoreError>()
                .map(CoreError::exit_code)
                .unwrap_or(EXIT_FAILURE)
        }
    };
    std::process::exit(code);
}

async fn run() -> anyhow::Result<i32> {
    let original: Vec<OsString> = std::env::args_os().skip(1).collect();
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Load global config
    let config = match GlobalConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("{}, using defaults", e);
            GlobalConfig::default()
        }
    };

    if let Some(code) = passthrough::delegate(&config.passthrough, &original)? {
        return Ok(code);
    }

    let command = Command::parse(cli.argv)?;

    let provider = dkr_provider::create_provider(&config)
        .await
        .map_err(CoreError::from)?;
    let dispatcher = Dispatcher::new(provider.as_ref(), &config, std::env::current_dir()?);

    let mut out = std::io::stdout();
    let mut err = std::io::stderr();
    let mut console = Console::new(&mut out, &mut err);

    Ok(dispatcher.dispatch(&command, &mut console).await?)
}

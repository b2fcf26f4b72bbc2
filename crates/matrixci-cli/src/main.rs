//! matrixci CLI entrypoint.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod handlers;
mod render;

use commands::{Commands, ConfigCommands};
use config::CliConfig;

#[derive(Parser)]
#[command(name = "matrixci")]
#[command(author, version, about = "Matrix CI job orchestrator", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "warn,matrixci::output=info",
        1 => "info,matrixci=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.with_target(verbose > 0).init();
    }
}

async fn dispatch(command: Commands) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match command {
        Commands::Init { path, force } => handlers::init(&path, force)?,
        Commands::Validate { path } => handlers::validate(&path)?,
        Commands::Schema => handlers::schema()?,
        Commands::Run(args) => {
            let config = CliConfig::load()?;
            return handlers::run(&config, args).await;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => handlers::show_config(&CliConfig::load()?)?,
            ConfigCommands::Set { key, value } => handlers::set_config(&key, &value)?,
        },
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match dispatch(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", console::style("error:").red().bold(), e);
            ExitCode::from(2)
        }
    }
}

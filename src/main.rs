use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use econmap::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for econmap::AppCommand {
    fn from(cmd: Commands) -> econmap::AppCommand {
        match cmd {
            Commands::Serve => econmap::AppCommand::Serve,
            Commands::Lookup { country } => econmap::AppCommand::Lookup { country },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Start the HTTP server
    Serve,
    /// Print the aggregated data for one country
    Lookup {
        /// Country code, e.g. FRA
        country: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(cli.config_path.as_deref()),
        Some(cmd) => econmap::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup(config_path: Option<&str>) -> anyhow::Result<()> {
    use anyhow::Context;

    let path = match config_path {
        Some(path) => std::path::PathBuf::from(path),
        None => econmap::config::AppConfig::default_config_path()?,
    };

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }


    std::fs::write(&path, econmap::config::DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}

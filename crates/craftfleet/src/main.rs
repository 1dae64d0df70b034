mod commands;
mod manifest;
mod progress;

use clap::{Parser, Subcommand};
use colored::Colorize;
use craftfleet_cloud::CancellationToken;
use craftfleet_config::Settings;
use manifest::Manifest;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "craftfleet")]
#[command(about = "Minecraft servers on any cloud, one command away", long_about = None)]
struct Cli {
    /// Path to the server manifest (default: $CRAFTFLEET_MANIFEST, then ./craftfleet.yaml)
    #[arg(short, long, global = true)]
    manifest: Option<PathBuf>,

    /// Server name from the manifest (optional when only one is declared)
    #[arg(short, long, global = true, env = "CRAFTFLEET_SERVER")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a server and wait until players can connect
    Create,
    /// Tear down a server and everything created for it
    Delete {
        /// Server identifier printed by create (e.g. 113000000001 or i-0abc#sir-123)
        id: String,
    },
    /// Re-run the edition's install script on a running server
    Update {
        id: String,
    },
    /// Show one server
    Get {
        id: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List CraftFleet servers in the server's provider and region
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage server plugins and mods
    #[command(subcommand)]
    Plugins(PluginCommands),
    /// Show version
    Version,
}

#[derive(Subcommand)]
enum PluginCommands {
    /// Copy a plugin/mod file to the server and restart it
    Upload {
        id: String,
        /// Local .jar file
        file: PathBuf,
        /// Remote directory (default: plugins/ or mods/ under the server dir)
        #[arg(short, long)]
        dest: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if matches!(cli.command, Commands::Version) {
        println!("craftfleet {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let manifest = Manifest::load(cli.manifest.as_deref())?;
    let spec = manifest.select(cli.server.as_deref())?;
    let settings = Settings::load()?;
    tracing::debug!(manifest = %manifest.path.display(), server = %spec.name, "loaded manifest");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "\nInterrupted, stopping after the current call...".yellow());
            on_interrupt.cancel();
        }
    });

    match &cli.command {
        Commands::Create => commands::create::handle(spec, &settings, &cancel).await,
        Commands::Delete { id } => commands::delete::handle(spec, &settings, &cancel, id).await,
        Commands::Update { id } => commands::update::handle(spec, &settings, &cancel, id).await,
        Commands::Get { id, json } => {
            commands::get::handle(spec, &settings, &cancel, id, *json).await
        }
        Commands::List { json } => commands::list::handle(spec, &settings, &cancel, *json).await,
        Commands::Plugins(PluginCommands::Upload { id, file, dest }) => {
            commands::plugin::handle(spec, &settings, &cancel, id, file, dest.as_deref()).await
        }
        Commands::Version => Ok(()),
    }
}

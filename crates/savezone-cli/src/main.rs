mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "savezone")]
#[command(about = "Back up local files to cloud storages")]
#[command(version)]
struct Cli {
    /// Path to the Savezone config directory (default: ~/.savezone)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Access token for the selected storage (or set SAVEZONE_TOKEN).
    /// Falls back to the token saved by `savezone auth`.
    #[arg(long, global = true, env = "SAVEZONE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration
    Init,

    /// Show current configuration and known storages
    Config,

    /// Authorize a storage and save its token
    Auth {
        /// Storage name
        #[arg(short, long)]
        storage: String,
        /// Authorized-user credentials JSON to import (Google Drive)
        #[arg(long)]
        credentials: Option<PathBuf>,
    },

    /// Archive a file or directory and upload it
    Backup {
        /// File or directory to back up
        resource: PathBuf,
        /// Storage name
        #[arg(short, long)]
        storage: String,
        /// Explicit remote folder; such backups are not restorable by id
        #[arg(short, long)]
        target: Option<String>,
        /// Replace an existing remote file
        #[arg(short, long)]
        overwrite: bool,
    },

    /// Download a backup and unpack it
    Restore {
        /// `<resource_id>[/<timestamp>]`, optionally prefixed by the base directory
        resource_id: String,
        /// Storage name
        #[arg(short, long)]
        storage: String,
        /// Directory to restore into
        #[arg(short, long)]
        target: Option<PathBuf>,
    },

    /// List backups and their versions
    Backups {
        /// Storage name
        #[arg(short, long)]
        storage: String,
    },

    /// Show storage quota
    Meta {
        /// Storage name
        #[arg(short, long)]
        storage: String,
    },

    /// List a remote folder
    List {
        /// Storage name
        #[arg(short, long)]
        storage: String,
        /// Remote folder (default: storage root)
        #[arg(default_value = "")]
        path: String,
    },
}

/// Read one line from stdin after printing `message`.
pub fn prompt(message: &str) -> anyhow::Result<String> {
    use std::io::{self, Write};
    print!("{message}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("savezone=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let base_dir = match cli.config_dir {
        Some(ref dir) => dir.clone(),
        None => savezone_core::config::SavezoneConfig::default_base_dir()?,
    };
    let token = cli.token.as_deref();

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Init => commands::init::run(&base_dir),
        Commands::Config => commands::config::run(&base_dir),
        Commands::Auth {
            ref storage,
            ref credentials,
        } => rt.block_on(commands::auth::run(
            storage,
            credentials.as_deref(),
            &base_dir,
        )),
        Commands::Backup {
            ref resource,
            ref storage,
            ref target,
            overwrite,
        } => rt.block_on(commands::backup::run(
            resource,
            storage,
            target.as_deref(),
            overwrite,
            token,
            &base_dir,
        )),
        Commands::Restore {
            ref resource_id,
            ref storage,
            ref target,
        } => rt.block_on(commands::restore::run(
            resource_id,
            storage,
            target.as_deref(),
            token,
            &base_dir,
        )),
        Commands::Backups { ref storage } => {
            rt.block_on(commands::backups::run(storage, token, &base_dir))
        }
        Commands::Meta { ref storage } => rt.block_on(commands::meta::run(storage, token, &base_dir)),
        Commands::List {
            ref storage,
            ref path,
        } => rt.block_on(commands::list::run(storage, path, token, &base_dir)),
    }
}

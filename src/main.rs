use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use s3filer::cli::commands;
use s3filer::s3::UploadMode;
use s3filer::{config, server, Core};

#[derive(Parser)]
#[command(name = "s3filer")]
#[command(version, about = "File manager for a single S3 bucket", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (environment variables are used when absent)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List files, grouped by top-level folder
    Ls {
        /// Folder to open (root when omitted)
        #[arg(long)]
        folder: Option<String>,

        /// Flat listing of every object
        #[arg(long, conflicts_with = "folder")]
        all: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Upload a local file
    Upload {
        /// Local file path
        path: PathBuf,

        /// Object key (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// What to do when the name is taken: increment, timestamp or replace
        #[arg(long)]
        mode: Option<UploadMode>,
    },

    /// Delete an object
    Rm {
        /// Object key
        key: String,
    },

    /// Rename an object (copy, then delete the original)
    Mv {
        /// Current key
        from: String,

        /// New key
        to: String,
    },

    /// Print a presigned download URL
    Url {
        /// Object key
        key: String,

        /// Lifetime in seconds (max 604800)
        #[arg(long)]
        expires: Option<u64>,
    },

    /// Run the HTTP API server
    Serve {
        /// Address to listen on (overrides the configured one)
        #[arg(long)]
        listen: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Choose runtime based on mode:
    // - CLI commands: current_thread for minimal overhead
    // - Server mode: multi_thread for concurrent request handling
    let is_server = matches!(cli.command, Commands::Serve { .. });

    let runtime = if is_server {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
    } else {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
    };

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Load configuration
    let config = config::load_config(cli.config.as_deref())?;

    // Initialize core
    let core = Core::new(config)?;

    match cli.command {
        Commands::Ls { folder, all, json } => {
            commands::cmd_ls(&core, folder.as_deref(), all, json).await?;
        }
        Commands::Upload { path, name, mode } => {
            commands::cmd_upload(&core, &path, name.as_deref(), mode).await?;
        }
        Commands::Rm { key } => {
            commands::cmd_rm(&core, &key).await?;
        }
        Commands::Mv { from, to } => {
            commands::cmd_mv(&core, &from, &to).await?;
        }
        Commands::Url { key, expires } => {
            commands::cmd_url(&core, &key, expires)?;
        }
        Commands::Serve { listen } => {
            let listen = listen.unwrap_or_else(|| core.config.server.listen.clone());
            server::run_server(&core, &listen).await?;
        }
    }

    Ok(())
}

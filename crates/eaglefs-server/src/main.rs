//! eaglefs binary
//!
//! Read-only virtual filesystem over a media library.
//!
//! ## Usage
//!
//! ```bash
//! eaglefs ls ~/Pictures/Photos.library /A_F1
//! eaglefs stat ~/Pictures/Photos.library /A_F1/photo_X1.png
//! eaglefs cat ~/Pictures/Photos.library /A_F1/photo_X1.png --offset 0 --length 50
//! eaglefs watch ~/Pictures/Photos.library
//!
//! # with --features fuse
//! eaglefs mount ~/Pictures/Photos.library /mnt/photos
//! ```

use std::io::{self, Write};
#[cfg(feature = "fuse")]
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use eaglefs_server::LibraryArgs;
use eaglefs_server::commands;
use eaglefs_server::constants::DEFAULT_LOG_FILTER;

/// Read-only virtual filesystem over a media library.
#[derive(Parser, Debug)]
#[command(name = "eaglefs")]
#[command(about = "Browse and mount a media library as a read-only filesystem")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a virtual folder
    Ls {
        #[command(flatten)]
        library: LibraryArgs,
        /// Virtual path
        #[arg(default_value = "/")]
        path: String,
    },
    /// Show attributes of a virtual path
    Stat {
        #[command(flatten)]
        library: LibraryArgs,
        /// Virtual path
        path: String,
    },
    /// Write a file's bytes to stdout
    Cat {
        #[command(flatten)]
        library: LibraryArgs,
        /// Virtual path
        path: String,
        /// Byte offset to start at
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Maximum number of bytes (default: to end of file)
        #[arg(long)]
        length: Option<u64>,
    },
    /// Load the library and log changes until Ctrl-C
    Watch {
        #[command(flatten)]
        library: LibraryArgs,
    },
    /// Mount the library until Ctrl-C
    #[cfg(feature = "fuse")]
    Mount {
        #[command(flatten)]
        library: LibraryArgs,
        /// Existing empty directory to mount on
        mountpoint: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<()> {
    let stdout = io::stdout();
    match command {
        Command::Ls { library, path } => {
            let library = library.open()?;
            commands::ls(&library, &path, &mut stdout.lock())?;
        }
        Command::Stat { library, path } => {
            let library = library.open()?;
            commands::stat(&library, &path, &mut stdout.lock())?;
        }
        Command::Cat {
            library,
            path,
            offset,
            length,
        } => {
            let library = library.open()?;
            let mut out = stdout.lock();
            commands::cat(&library, &path, offset, length, &mut out)?;
            out.flush()?;
        }
        Command::Watch { library } => {
            let library = library.open()?;
            commands::watch(&library).await?;
        }
        #[cfg(feature = "fuse")]
        Command::Mount {
            library,
            mountpoint,
        } => {
            let library = library.open()?;
            commands::mount(library, &mountpoint).await?;
        }
    }
    Ok(())
}

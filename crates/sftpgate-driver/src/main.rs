//! sftpgate diagnostic CLI.
//!
//! Loads one access from the configuration file and runs a single
//! filesystem operation through it.
//!
//! ```bash
//! sftpgate --access alice check
//! sftpgate --conf /etc/sftpgate.json --access alice ls /docs
//! sftpgate --access alice mkdir -p /incoming/2024
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use sftpgate_driver::config::DEFAULT_CONFIG_FILE;
use sftpgate_driver::gateway::{format_entry, mode_string, parse_mode};
use sftpgate_driver::{logging, Config, Gateway};

#[derive(Parser, Debug)]
#[command(name = "sftpgate")]
#[command(about = "Run filesystem operations through a configured sftpgate access")]
struct Args {
    /// Configuration file (created with a starter access when omitted and missing)
    #[arg(long)]
    conf: Option<PathBuf>,

    /// Access (user) to operate as
    #[arg(long)]
    access: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and summarize the root directory
    Check,
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Show attributes of a path
    Stat { path: String },
    /// Print a file to stdout
    Cat { path: String },
    /// Create a directory
    Mkdir {
        /// Create missing parents too
        #[arg(short = 'p')]
        parents: bool,
        path: String,
    },
    /// Remove a file or empty directory
    Rm {
        /// Remove directories and their contents
        #[arg(short = 'r')]
        recursive: bool,
        path: String,
    },
    /// Rename or move a path
    Mv { from: String, to: String },
    /// Change permission bits (octal)
    Chmod {
        #[arg(value_parser = parse_mode)]
        mode: u32,
        path: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(args.conf.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("sftpgate: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let _guard = match logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("sftpgate: cannot set up logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&config, &args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(conf: Option<&PathBuf>) -> Result<Config> {
    let path = match conf {
        Some(path) => path.clone(),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if Config::create_default(&path)? {
                eprintln!("sftpgate: no config file, created {}", path.display());
            }
            path
        }
    };
    Config::load(&path).with_context(|| format!("loading {}", path.display()))
}

async fn run(config: &Config, args: &Args) -> Result<()> {
    let access = config.access(&args.access)?;
    let gateway = Gateway::open(access)
        .await
        .with_context(|| format!("opening access {}", args.access))?;

    let mut stdout = std::io::stdout().lock();
    match &args.command {
        Command::Check => {
            writeln!(stdout, "{}", gateway.check().await?)?;
        }
        Command::Ls { path } => {
            for entry in gateway.list(path).await.with_context(|| format!("ls {path}"))? {
                writeln!(stdout, "{}", format_entry(&entry))?;
            }
        }
        Command::Stat { path } => {
            let attr = gateway.stat(path).await.with_context(|| format!("stat {path}"))?;
            writeln!(stdout, "{}  {}", mode_string(&attr), path)?;
            writeln!(stdout, "size: {}", attr.size)?;
            writeln!(stdout, "mtime: {:?}", attr.mtime)?;
            if let (Some(uid), Some(gid)) = (attr.uid, attr.gid) {
                writeln!(stdout, "owner: {uid}:{gid}")?;
            }
        }
        Command::Cat { path } => {
            let data = gateway.read(path).await.with_context(|| format!("cat {path}"))?;
            stdout.write_all(&data)?;
        }
        Command::Mkdir { parents, path } => {
            gateway
                .mkdir(path, *parents)
                .await
                .with_context(|| format!("mkdir {path}"))?;
        }
        Command::Rm { recursive, path } => {
            gateway
                .remove(path, *recursive)
                .await
                .with_context(|| format!("rm {path}"))?;
        }
        Command::Mv { from, to } => {
            gateway
                .rename(from, to)
                .await
                .with_context(|| format!("mv {from} {to}"))?;
        }
        Command::Chmod { mode, path } => {
            gateway
                .chmod(path, *mode)
                .await
                .with_context(|| format!("chmod {mode:o} {path}"))?;
        }
    }
    stdout.flush()?;
    Ok(())
}

use std::error::Error;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use dvc_box::config_loader::{load_remote_config, CONFIG_PATH};
use dvc_box::vfs::VfsBasicMeta;
use dvc_box::{BoxRemote, RemoteStorage};

#[derive(Parser)]
#[command(name = "dvc-box", about = "Inspect and modify a Box remote")]
struct Cli {
    /// Remote configuration file (json object with `url` and credential keys)
    #[arg(short, long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Overrides the `url` of the configuration file
    #[arg(long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a directory
    Ls {
        path: Option<String>,
        /// One json object per entry
        #[arg(long)]
        json: bool,
    },
    /// Upload a local file, creating parent directories
    Put { local: PathBuf, remote: String },
    /// Download a remote file
    Get { remote: String, local: PathBuf },
    /// Print a remote file to stdout
    Cat { remote: String },
    /// Create a directory and its parents
    Mkdir {
        path: String,
        #[arg(long)]
        exist_ok: bool,
    },
    /// Remove a file or directory
    Rm {
        path: String,
        #[arg(short, long)]
        recursive: bool,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_remote_config(&cli.config)?;
    if let Some(url) = cli.url {
        config.insert("url".to_owned(), Value::String(url));
    }
    let remote = BoxRemote::new(&config)?;
    let root = BoxRemote::strip_prefix(remote.url());

    match cli.command {
        Command::Ls { path, json } => {
            for entry in remote.list(path.as_deref().unwrap_or(&root))? {
                if json {
                    println!("{}", serde_json::to_string(&entry)?);
                    continue;
                }
                let modified = entry.last_modified()
                    .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                let marker = if entry.is_dir() { "/" } else { "" };
                println!("{:>12} {:>16} {}{}", entry.size(), modified, remote.unstrip_prefix(&entry.path), marker);
            }
        }
        Command::Put { local, remote: target } => {
            let mut source = File::open(&local)?;
            let copied = remote.upload_stream(&mut source, &target)?;
            println!("{} -> {} ({} bytes)", local.display(), target, copied);
        }
        Command::Get { remote: source, local } => {
            let mut reader = remote.open_read(&source)?;
            let mut file = File::create(&local)?;
            let copied = io::copy(&mut reader, &mut file)?;
            println!("{} -> {} ({} bytes)", source, local.display(), copied);
        }
        Command::Cat { remote: source } => {
            let mut reader = remote.open_read(&source)?;
            io::copy(&mut reader, &mut io::stdout().lock())?;
        }
        Command::Mkdir { path, exist_ok } => remote.make_directories(&path, exist_ok)?,
        Command::Rm { path, recursive } => remote.remove(&path, recursive)?,
    }
    Ok(())
}

//! Session replay entry point (native).

#[cfg(feature = "native")]
mod cli {
    use clap::{Parser, Subcommand};
    use inkmark_app::{Replay, Session};
    use inkmark_core::persistence::{encode_strokes, load_strokes};
    use inkmark_core::{AnnotatorConfig, FileStorage, KeyValueStorage, MemoryStorage, page_storage_key};
    use std::path::{Path, PathBuf};

    /// Replay and inspect recorded annotation sessions
    #[derive(Parser, Debug)]
    #[command(name = "inkmark-replay")]
    #[command(version)]
    pub struct Cli {
        /// Annotator configuration (JSON)
        #[arg(long, global = true)]
        config: Option<PathBuf>,

        /// Directory for stored annotations (defaults to the user data dir)
        #[arg(long, global = true)]
        store_dir: Option<PathBuf>,

        #[command(subcommand)]
        command: Commands,
    }

    #[derive(Subcommand, Debug)]
    enum Commands {
        /// Replay a session file through the engine
        Run {
            session: PathBuf,
            /// Keep annotations in memory instead of on disk
            #[arg(long)]
            dry_run: bool,
        },
        /// Print the stored annotations of a page
        Show { page: String },
        /// Delete the stored annotations of a page
        Clear { page: String },
    }

    fn load_config(path: Option<&Path>) -> Result<AnnotatorConfig, String> {
        let Some(path) = path else {
            return Ok(AnnotatorConfig::default());
        };
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        AnnotatorConfig::from_json(&json).map_err(|e| e.to_string())
    }

    fn open_storage(dir: Option<PathBuf>) -> Result<FileStorage, String> {
        let storage = match dir {
            Some(dir) => FileStorage::new(dir),
            None => FileStorage::default_location(),
        }
        .map_err(|e| e.to_string())?;
        log::info!("Using storage at {}", storage.base_path().display());
        Ok(storage)
    }

    pub fn run(cli: Cli) -> Result<(), String> {
        let config = load_config(cli.config.as_deref())?;

        match cli.command {
            Commands::Run { session, dry_run } => {
                let session = Session::from_file(&session).map_err(|e| e.to_string())?;
                let report = if dry_run {
                    Replay::run(&session, config, MemoryStorage::new())
                } else {
                    Replay::run(&session, config, open_storage(cli.store_dir)?)
                };
                let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
                println!("{}", json);
            }
            Commands::Show { page } => {
                let storage = open_storage(cli.store_dir)?;
                let key = page_storage_key(&config.storage_key_prefix, &page);
                let strokes = load_strokes(&storage, &key, &config.tools);
                let json = encode_strokes(&strokes).map_err(|e| e.to_string())?;
                println!("{}", json);
            }
            Commands::Clear { page } => {
                let storage = open_storage(cli.store_dir)?;
                let key = page_storage_key(&config.storage_key_prefix, &page);
                storage.remove(&key).map_err(|e| e.to_string())?;
                log::info!("Removed {}", key);
            }
        }
        Ok(())
    }
}

#[cfg(feature = "native")]
fn main() -> std::process::ExitCode {
    use clap::Parser;

    env_logger::init();
    log::info!("Starting inkmark-replay");

    match cli::run(cli::Cli::parse()) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

#[cfg(not(feature = "native"))]
fn main() {
    panic!("Native feature not enabled. Use `cargo run --features native`");
}

//! docket CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use docket::{
    commands::{
        cmd_approve, cmd_clear, cmd_export, cmd_ingest, cmd_init, cmd_list, cmd_process,
        cmd_recategorize, cmd_remove, cmd_show, cmd_status, open_scheduler, print_document,
        print_documents, print_export_stats, print_ingest_stats, print_init,
        print_process_stats, print_snippet_update, print_status,
    },
    config::Config,
    document::ProcessingStatus,
    error::{Error, Result},
    progress::LogWriterFactory,
};
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docket")]
#[command(version, about = "Extract and classify legal snippets from case files", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "DOCKET_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize docket configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Read files or directories into the document set
    Ingest {
        /// Files or directories to read
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Only store the documents; analyze them later with 'docket process'
        #[arg(long)]
        no_process: bool,
    },

    /// Analyze every pending document
    Process,

    /// Show system status
    Status,

    /// List documents
    List {
        /// Only show documents in this state (pending, processing, done, error)
        #[arg(long)]
        status: Option<ProcessingStatus>,
    },

    /// Show a document and its snippets
    Show {
        /// Document ID (use 'docket list' to find it)
        id: String,
    },

    /// Approve a snippet
    Approve {
        /// Snippet ID
        snippet_id: String,
    },

    /// Move a snippet to another category
    Recategorize {
        /// Snippet ID
        snippet_id: String,

        /// Category label, e.g. "Case Law Reference"
        category: String,
    },

    /// Remove a document and its snippets
    Remove {
        /// Document ID
        id: String,
    },

    /// Remove every document
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Write all documents and snippets to a JSON file
    Export {
        /// Output file
        output: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // Init and completions run without an existing config
    if let Commands::Init { force } = cli.command {
        return handle_init(cli.config.as_deref(), force, cli.json).await;
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "docket", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Ingest { paths, no_process } => {
            let stats = cmd_ingest(&config, &paths, !no_process).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_ingest_stats(&stats);
            }
        }

        Commands::Process => {
            let stats = cmd_process(&config).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_process_stats(&stats);
            }
        }

        Commands::Status => {
            let scheduler = open_scheduler(&config).await?;
            let status = cmd_status(&config, &scheduler);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::List { status } => {
            let scheduler = open_scheduler(&config).await?;
            let documents = cmd_list(&scheduler, status);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&documents)?);
            } else {
                print_documents(&documents);
            }
        }

        Commands::Show { id } => {
            let scheduler = open_scheduler(&config).await?;
            let document = cmd_show(&scheduler, &id)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&document)?);
            } else {
                print_document(&document);
            }
        }

        Commands::Approve { snippet_id } => {
            let scheduler = open_scheduler(&config).await?;
            let snippet = cmd_approve(&scheduler, &snippet_id).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&snippet)?);
            } else {
                print_snippet_update(&snippet);
            }
        }

        Commands::Recategorize {
            snippet_id,
            category,
        } => {
            let scheduler = open_scheduler(&config).await?;
            let snippet = cmd_recategorize(&scheduler, &snippet_id, &category).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&snippet)?);
            } else {
                print_snippet_update(&snippet);
            }
        }

        Commands::Remove { id } => {
            let scheduler = open_scheduler(&config).await?;
            cmd_remove(&scheduler, &id).await?;
            if cli.json {
                println!(r#"{{"status": "ok", "removed": {}}}"#, serde_json::to_string(&id)?);
            } else {
                println!("✓ Document '{}' removed", id);
            }
        }

        Commands::Clear { yes } => {
            if !yes {
                eprintln!("⚠️  This will delete ALL documents and snippets!");
                eprintln!("Run with --yes to confirm.");
                std::process::exit(1);
            }
            let scheduler = open_scheduler(&config).await?;
            let removed = cmd_clear(&scheduler).await?;
            if cli.json {
                println!(r#"{{"status": "ok", "removed": {}}}"#, removed);
            } else {
                println!("✓ Removed {} documents", removed);
            }
        }

        Commands::Export { output } => {
            let scheduler = open_scheduler(&config).await?;
            let stats = cmd_export(&scheduler, &output)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_export_stats(&stats);
            }
        }
    }

    Ok(())
}

async fn handle_init(path: Option<&Path>, force: bool, json: bool) -> Result<()> {
    // A .toml path names the config file itself, anything else its directory
    let base_dir = match path {
        Some(path) if path.extension().is_some_and(|e| e == "toml") => {
            Some(path.parent().map(PathBuf::from).unwrap_or_default())
        }
        Some(path) => Some(path.to_path_buf()),
        None => None,
    };

    let mut layout = Config::default();
    layout.init_paths(base_dir.clone());
    if layout.paths.config_file.exists() && !force {
        eprintln!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            layout.paths.config_file.display()
        );
        std::process::exit(1);
    }

    let info = cmd_init(base_dir, force).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_init(&info);
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        eprintln!("Config file not found: {}", config_path.display());
        return Err(Error::NotInitialized);
    }

    Config::load(&config_path)
}

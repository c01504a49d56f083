// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lockbox - a local, encrypted credential store.
//!
//! This is the binary entry point. Every command loads configuration, opens
//! the configured backend and, where records are touched, unlocks it with
//! the master password first.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lockbox_core::NodeId;

/// Lockbox - a local, encrypted credential store.
#[derive(Parser, Debug)]
#[command(name = "lockbox", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Set the master password on a new store.
    Init,
    /// Add a credential. The password is prompted for unless --generate is given.
    Add {
        #[arg(long, short)]
        username: String,
        #[arg(long, default_value = "")]
        url: String,
        #[arg(long, default_value = "")]
        notes: String,
        /// Tag label. Repeat for several tags.
        #[arg(long = "tag", short)]
        tags: Vec<String>,
        /// Generate the password instead of prompting for it.
        #[arg(long)]
        generate: bool,
    },
    /// Change fields of a stored credential. Fields not given are kept.
    Edit {
        id: i64,
        #[arg(long, short)]
        username: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Replace the tags. Repeat for several tags.
        #[arg(long = "tag", short)]
        tags: Vec<String>,
        /// Remove every tag.
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
        /// Prompt for a new password.
        #[arg(long, conflicts_with = "generate")]
        password: bool,
        /// Generate a new password.
        #[arg(long)]
        generate: bool,
    },
    /// List credential ids and usernames.
    List {
        /// Only credentials carrying this tag.
        #[arg(long)]
        tag: Option<String>,
    },
    /// Show credentials in full, password included.
    Show {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Remove credentials.
    Rm {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// List every tag in use.
    Tags,
    /// Change the master password and re-encrypt every credential.
    Passwd,
    /// Upgrade an older store to the current layout.
    Migrate,
    /// Print the program version and the store's schema version.
    Version,
    /// Print a random password without storing it.
    Generate {
        /// Length, overriding `[generator] length`.
        #[arg(long, short)]
        length: Option<usize>,
        /// Leave out punctuation symbols.
        #[arg(long)]
        no_symbols: bool,
        /// Also print a look-alike digit variant.
        #[arg(long)]
        leet: bool,
    },
}

/// `None` keeps the stored tags.
fn tag_change(tags: Vec<String>, clear: bool) -> Option<Vec<String>> {
    if clear {
        Some(Vec::new())
    } else if tags.is_empty() {
        None
    } else {
        Some(tags)
    }
}

fn node_ids(ids: &[i64]) -> Vec<NodeId> {
    ids.iter().copied().map(NodeId).collect()
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lockbox={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => lockbox_config::load_and_validate_path(path),
        None => lockbox_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            lockbox_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.general.log_level);

    let result = match cli.command {
        Commands::Init => commands::init(&config).await,
        Commands::Add {
            username,
            url,
            notes,
            tags,
            generate,
        } => {
            let entry = commands::Entry {
                username,
                url,
                notes,
                tags,
                generate,
            };
            commands::add(&config, entry).await
        }
        Commands::Edit {
            id,
            username,
            url,
            notes,
            tags,
            clear_tags,
            password,
            generate,
        } => {
            let changes = commands::Changes {
                username,
                url,
                notes,
                tags: tag_change(tags, clear_tags),
                prompt_password: password,
                generate,
            };
            commands::edit(&config, NodeId(id), changes).await
        }
        Commands::List { tag } => commands::list(&config, tag.as_deref()).await,
        Commands::Show { ids } => commands::show(&config, &node_ids(&ids)).await,
        Commands::Rm { ids } => commands::remove(&config, &node_ids(&ids)).await,
        Commands::Tags => commands::tags(&config).await,
        Commands::Passwd => commands::passwd(&config).await,
        Commands::Migrate => commands::migrate(&config).await,
        Commands::Version => commands::version(&config).await,
        Commands::Generate {
            length,
            no_symbols,
            leet,
        } => {
            commands::generate(&config, length, !no_symbols, leet);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("lockbox: {e}");
        std::process::exit(1);
    }
}

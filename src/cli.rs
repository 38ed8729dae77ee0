// src/cli.rs
//! CLI definitions for rdfbundle
//!
//! The command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rdfbundle")]
#[command(author = "rdfbundle Contributors")]
#[command(version)]
#[command(about = "Build, publish, fetch and install bundles of RDF graph data", long_about = None)]
pub struct Cli {
    /// Project directory holding config.toml and remotes/
    #[arg(short, long, global = true, default_value = rdfbundle::config::DEFAULT_PROJECT_DIR)]
    pub project_dir: PathBuf,

    /// Bundles directory (overrides config.toml and RDFBUNDLE_BUNDLES_DIR)
    #[arg(short, long, global = true)]
    pub bundles_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a bundle from a descriptor and an N-Quads dump
    Install {
        /// Descriptor YAML file
        descriptor: PathBuf,

        /// N-Quads file holding the source contexts
        #[arg(short, long)]
        source: PathBuf,

        /// Directory the descriptor's file selections are relative to
        #[arg(long, default_value = ".")]
        source_dir: PathBuf,

        /// Context holding the imports relation; enables the dependency check
        #[arg(long)]
        imports_context: Option<String>,

        /// Default context recorded in the manifest
        #[arg(long)]
        default_context: Option<String>,
    },

    /// Fetch a bundle from the project's remotes
    Fetch {
        bundle: String,

        /// Version to fetch (latest available if omitted)
        #[arg(short, long)]
        version: Option<u64>,
    },

    /// List the contexts in a bundle
    Contexts {
        bundle: String,

        #[arg(short, long)]
        version: Option<u64>,
    },

    /// List installed versions of a bundle
    Versions {
        bundle: String,

        /// Also ask every remote which versions it offers
        #[arg(short, long)]
        remote: bool,
    },

    /// Pack an installed bundle into a .tar.xz archive
    Pack {
        bundle: String,

        #[arg(short, long)]
        version: Option<u64>,

        /// Output archive path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check an installed bundle against its recorded hashes
    Verify {
        bundle: String,

        #[arg(short, long)]
        version: Option<u64>,
    },

    /// Add a remote (or a URL to an existing remote)
    RemoteAdd {
        /// Remote name
        name: String,

        /// Index URL (http://, https:// or file://)
        url: String,
    },

    /// List configured remotes
    RemoteList,
}

//! CLI argument parsing for docstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docstore")]
#[command(author, version, about = "Whole-document JSON store", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a document to stdout
    Get {
        /// Project key
        #[arg(required = true)]
        project: String,

        /// Path key within the project
        #[arg(required = true)]
        path: String,

        /// File key, e.g. tree.json
        #[arg(required = true)]
        file: String,
    },

    /// Write a document from a JSON file (or stdin with `-`)
    Put {
        /// Project key
        #[arg(required = true)]
        project: String,

        /// Path key within the project
        #[arg(required = true)]
        path: String,

        /// File key, e.g. tree.json
        #[arg(required = true)]
        file: String,

        /// JSON source file, or `-` for stdin
        #[arg(required = true)]
        source: String,
    },

    /// List documents under a project
    List {
        /// Project key
        #[arg(required = true)]
        project: String,
    },

    /// Delete a document
    Delete {
        /// Project key
        #[arg(required = true)]
        project: String,

        /// Path key within the project
        #[arg(required = true)]
        path: String,

        /// File key, e.g. tree.json
        #[arg(required = true)]
        file: String,
    },

    /// Show statistics for a project
    Stats {
        /// Project key
        #[arg(required = true)]
        project: String,
    },
}

//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// GoalTree - progressive hierarchical goal decomposition
#[derive(Parser)]
#[command(
    name = "gt",
    about = "Decompose goals into progressively finer actionable work",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Project key documents are stored under
    #[arg(short, long, global = true, default_value = "default")]
    pub project: String,

    /// Path key within the project (one goal per path)
    #[arg(short = 'P', long, global = true, default_value = "main")]
    pub path: String,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build a decomposition tree for a goal
    Build {
        /// The goal text
        goal: String,

        /// Target depth (1-6); default derived from the goal
        #[arg(short, long)]
        depth: Option<u8>,

        /// Abort on generation failures instead of falling back
        #[arg(long)]
        strict: bool,

        /// Rebuild even if a tree already exists
        #[arg(long)]
        force: bool,

        /// Caller context as inline JSON
        #[arg(long)]
        context: Option<String>,
    },

    /// Expand an existing tree to a deeper level
    Expand {
        /// Target depth (up to 6)
        depth: u8,
    },

    /// Record a task completion
    Complete {
        /// Task id from the tree
        task_id: u32,

        /// Self-rated quality 1-5
        #[arg(short, long, default_value = "3")]
        quality: u8,

        /// Self-rated difficulty 1-5
        #[arg(short, long, default_value = "3")]
        difficulty: u8,

        /// Actual minutes spent
        #[arg(short = 't', long, default_value = "30")]
        minutes: u32,

        /// Free-form reflections
        #[arg(short, long)]
        reflections: Option<String>,

        /// Breakthrough moments (repeatable)
        #[arg(long = "breakthrough")]
        breakthroughs: Vec<String>,

        /// Struggle areas (repeatable)
        #[arg(long = "struggle")]
        struggles: Vec<String>,

        /// Topics to explore next (repeatable)
        #[arg(long = "interest")]
        interests: Vec<String>,
    },

    /// Show the next-work pipeline
    Next {
        /// Current energy 1-5
        #[arg(short, long, default_value = "3")]
        energy: u8,

        /// Minutes available
        #[arg(short, long, default_value = "30")]
        time: u32,
    },

    /// Show the current tree
    Show,
}

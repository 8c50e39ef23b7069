//! ObjDB CLI
//!
//! Maintenance tools for ObjDB database files.
//!
//! # Commands
//!
//! - `inspect` - Display record counts and index trees
//! - `verify` - Check the structure of index trees
//! - `dump-tree` - Print the keys and objects of an index tree

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ObjDB command-line database tools.
#[derive(Parser)]
#[command(name = "objdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display record counts and index trees
    Inspect {
        /// List every index tree
        #[arg(short, long)]
        trees: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check the structure of index trees
    Verify {
        /// Header OID of the tree to check (all trees if omitted)
        #[arg(short, long)]
        tree: Option<u64>,
    },

    /// Print the keys and objects of an index tree
    DumpTree {
        /// Header OID of the tree
        #[arg(short, long)]
        tree: u64,

        /// Largest key first
        #[arg(short, long)]
        desc: bool,

        /// Maximum number of keys to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { trees, format } => {
            let path = cli.path.ok_or("Database path required for inspect")?;
            commands::inspect::run(&path, trees, &format)?;
        }
        Commands::Verify { tree } => {
            let path = cli.path.ok_or("Database path required for verify")?;
            commands::verify::run(&path, tree)?;
        }
        Commands::DumpTree { tree, desc, limit } => {
            let path = cli.path.ok_or("Database path required for dump-tree")?;
            commands::dump_tree::run(&path, tree, desc, limit)?;
        }
        Commands::Version => {
            println!("ObjDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ObjDB Core v{}", objdb_core::VERSION);
        }
    }

    Ok(())
}

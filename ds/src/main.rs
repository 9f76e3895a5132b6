use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::io::Read;

use docstore::Store;
use docstore::cli::{Cli, Command};
use docstore::config::Config;

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("docstore starting");

    let store = Store::open(&config.store_path)?;

    match cli.command {
        Command::Get { project, path, file } => match store.load(&project, &path, &file)? {
            Some(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
            None => {
                eprintln!("{} No document at {}/{}/{}", "✗".red(), project, path, file);
                std::process::exit(1);
            }
        },
        Command::Put {
            project,
            path,
            file,
            source,
        } => {
            let content = if source == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf).context("Failed to read stdin")?;
                buf
            } else {
                std::fs::read_to_string(&source).context(format!("Failed to read {}", source))?
            };
            let doc: serde_json::Value = serde_json::from_str(&content).context("Invalid JSON input")?;
            store.save(&project, &path, &file, &doc)?;
            println!("{} Saved {}/{}/{}", "✓".green(), project, path.cyan(), file);
        }
        Command::List { project } => {
            for (path, file) in store.list(&project)? {
                println!("{}/{}", path.cyan(), file);
            }
        }
        Command::Delete { project, path, file } => {
            if store.delete(&project, &path, &file)? {
                println!("{} Deleted {}/{}/{}", "✓".green(), project, path, file);
            } else {
                eprintln!("{} No document at {}/{}/{}", "✗".red(), project, path, file);
            }
        }
        Command::Stats { project } => {
            let stats = store.stats(&project)?;
            println!("paths:     {}", stats.path_count);
            println!("documents: {}", stats.doc_count);
            println!("bytes:     {}", stats.total_bytes);
        }
    }

    Ok(())
}

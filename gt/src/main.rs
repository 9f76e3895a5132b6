//! GoalTree CLI entry point

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::debug;

use docstore::Store;
use goaltree::cli::{Cli, Command};
use goaltree::config::Config;
use goaltree::domain::CompletionRecord;
use goaltree::engine::BuildOptions;
use goaltree::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, create_client};
use goaltree::pipeline::ResourceContext;
use goaltree::prompts::PromptLibrary;
use goaltree::service::PlannerService;

/// Client used for commands that never reach the LLM (next, show)
struct OfflineClient;

#[async_trait]
impl LlmClient for OfflineClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Err(LlmError::InvalidResponse("offline: no LLM configured for this command".to_string()))
    }
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    debug!(project = %cli.project, path = %cli.path, "gt starting");

    let needs_llm = matches!(cli.command, Command::Build { .. } | Command::Expand { .. } | Command::Complete { .. });
    let client: Arc<dyn LlmClient> = if needs_llm {
        config.validate()?;
        create_client(&config.llm)?
    } else {
        Arc::new(OfflineClient)
    };

    let store = Store::open(&config.storage.store_path).context("Failed to open document store")?;
    let prompts = match &config.prompts.templates_dir {
        Some(dir) => Arc::new(PromptLibrary::with_overrides(dir)?),
        None => Arc::new(PromptLibrary::new()),
    };

    let mut service = PlannerService::new(client, Some(store)).with_prompts(prompts);

    match cli.command {
        Command::Build {
            goal,
            depth,
            strict,
            force,
            context,
        } => {
            let context = match context {
                Some(raw) => serde_json::from_str(&raw).context("Invalid --context JSON")?,
                None => serde_json::json!({}),
            };
            let options = BuildOptions {
                target_depth: depth.or(config.decomposition.default_depth),
                force_regenerate: force,
                strict: strict || config.decomposition.strict,
            };

            let outcome = service.build_tree(&cli.project, &cli.path, &goal, context, &options).await?;
            print_warnings(&outcome.warnings, outcome.durable);

            let tree = &outcome.tree;
            println!(
                "{} Built tree {} to depth {}",
                "✓".green(),
                tree.id.cyan(),
                tree.available_depth
            );
            for branch in &tree.strategic_branches {
                println!("  {} {}", format!("[{}]", branch.priority).dimmed(), branch.name.bold());
            }
            println!("  {} frontier tasks", tree.frontier_tasks.len());
        }
        Command::Expand { depth } => {
            let outcome = service.expand_tree(&cli.project, &cli.path, depth).await?;
            print_warnings(&outcome.warnings, outcome.durable);
            println!(
                "{} Tree now at depth {} ({} tasks)",
                "✓".green(),
                outcome.tree.available_depth,
                outcome.tree.frontier_tasks.len()
            );
        }
        Command::Complete {
            task_id,
            quality,
            difficulty,
            minutes,
            reflections,
            breakthroughs,
            struggles,
            interests,
        } => {
            let record = CompletionRecord {
                duration_minutes: minutes,
                quality: quality.clamp(1, 5),
                difficulty_rating: difficulty.clamp(1, 5),
                reflections: reflections.unwrap_or_default(),
                learning_outcomes: Vec::new(),
                struggling_areas: struggles,
                breakthroughs,
                next_interests: interests,
                completed_at: docstore::now_ms(),
            };

            let outcome = service.record_completion(&cli.project, &cli.path, task_id, record).await?;
            println!("{} Recorded completion for task {}", "✓".green(), task_id);
            if outcome.evolution_triggered {
                println!("{} Tree evolved from your feedback", "↻".cyan());
            }
            if !outcome.durable {
                eprintln!("{} Results are in-memory only; persistence failed", "!".yellow());
            }
        }
        Command::Next { energy, time } => {
            let resources = ResourceContext {
                energy_level: energy.clamp(1, 5),
                time_available_minutes: time,
            };
            let pipeline = service.get_pipeline(&cli.project, &cli.path, &resources).await?;

            match &pipeline.primary {
                Some(task) => {
                    println!("{} {}", "primary".green().bold(), format_task(task));
                    for task in &pipeline.secondary {
                        println!("{} {}", "secondary".cyan(), format_task(task));
                    }
                    for task in &pipeline.tertiary {
                        println!("{} {}", "tertiary".dimmed(), format_task(task));
                    }
                }
                None => println!("No open tasks. Build or expand a tree first."),
            }
        }
        Command::Show => {
            let Some(tree) = service.tree(&cli.project, &cli.path)? else {
                eprintln!("{} No tree for {}/{}. Run `gt build` first.", "✗".red(), cli.project, cli.path);
                std::process::exit(1);
            };

            let created = chrono::DateTime::from_timestamp_millis(tree.created_at)
                .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            println!(
                "{} {}",
                tree.goal.bold(),
                format!("(depth {}, created {})", tree.available_depth, created).dimmed()
            );
            for branch in &tree.strategic_branches {
                println!("\n{} {}", format!("[{}]", branch.priority).dimmed(), branch.name.bold());
                for task in tree.frontier_tasks.iter().filter(|t| t.branch == branch.name) {
                    let mark = if task.completed { "✓".green() } else { "·".dimmed() };
                    println!("  {} #{:<3} {}", mark, task.id, task.title);
                }
            }
        }
    }

    Ok(())
}

fn format_task(task: &goaltree::domain::Task) -> String {
    format!(
        "#{} {} {}",
        task.id,
        task.title,
        format!("(difficulty {}, ~{}m)", task.difficulty, task.duration_minutes).dimmed()
    )
}

fn print_warnings(warnings: &[String], durable: bool) {
    for warning in warnings {
        eprintln!("{} {}", "!".yellow(), warning);
    }
    if !durable {
        eprintln!("{} Tree is in-memory only; persistence failed", "!".yellow());
    }
}

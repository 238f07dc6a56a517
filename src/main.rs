//! kbqa CLI: staged logical-form search over a knowledge-base fixture.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Deserialize;

use kbqa_staged::config::GenerationConfig;
use kbqa_staged::graph::Graph;
use kbqa_staged::kb::memory::MemoryKb;
use kbqa_staged::link::LabelLinker;
use kbqa_staged::operators::EntityEdgeOperators;
use kbqa_staged::score::LexicalOverlapModel;
use kbqa_staged::search::Generator;

#[derive(Parser)]
#[command(name = "kbqa", version, about = "Staged logical-form search for knowledge-base QA")]
struct Cli {
    /// Generation config (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for groundings whose answers match the question's gold answers.
    Gold {
        /// Knowledge-base fixture (JSON).
        #[arg(long)]
        kb: PathBuf,
        /// Question file (JSON) with tokens, entities and answers.
        #[arg(long)]
        question: PathBuf,
    },

    /// Search for groundings preferred by the lexical-overlap model.
    Model {
        #[arg(long)]
        kb: PathBuf,
        #[arg(long)]
        question: PathBuf,
        /// Override the configured beam width.
        #[arg(long)]
        beam_size: Option<usize>,
    },

    /// Enumerate all whitelisted groundings without scoring.
    Whitelist {
        #[arg(long)]
        kb: PathBuf,
        #[arg(long)]
        question: PathBuf,
    },

    /// Write a default generation config.
    InitConfig {
        /// Destination path.
        #[arg(long, default_value = "kbqa.toml")]
        path: PathBuf,
    },
}

/// A question as read from disk.
#[derive(Deserialize)]
struct Question {
    #[serde(flatten)]
    graph: Graph,
    /// Gold answers, required by `gold`.
    #[serde(default)]
    answers: Vec<String>,
}

fn load_question(path: &Path) -> Result<Question> {
    let content = std::fs::read_to_string(path).into_diagnostic()?;
    let question: Question = serde_json::from_str(&content).into_diagnostic()?;
    question.graph.validate()?;
    Ok(question)
}

fn load_config(path: Option<&Path>) -> Result<GenerationConfig> {
    match path {
        Some(path) => Ok(GenerationConfig::load(path)?),
        None => Ok(GenerationConfig::default()),
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let operators = EntityEdgeOperators;

    match cli.command {
        Commands::Gold { kb, question } => {
            let config = load_config(cli.config.as_deref())?;
            let kb = MemoryKb::load(&kb)?;
            let question = load_question(&question)?;
            if question.answers.is_empty() {
                miette::bail!("question file has no gold answers");
            }
            let linker = LabelLinker::new(&kb);
            let generator = Generator::new(&kb, &linker, &operators, config);
            let outcome = generator.generate_with_gold(question.graph, &question.answers)?;

            println!(
                "Gold-guided search: {} iteration(s), {} positive(s), {} negative(s), best F1 {:.4}",
                outcome.iterations,
                outcome.positives.len(),
                outcome.negatives.len(),
                outcome.best_f1()
            );
            if let Some(best) = outcome.best() {
                println!("{}", serde_json::to_string_pretty(best).into_diagnostic()?);
            }
        }

        Commands::Model {
            kb,
            question,
            beam_size,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(beam_size) = beam_size {
                config.beam_size = beam_size;
            }
            let kb = MemoryKb::load(&kb)?;
            let question = load_question(&question)?;
            let linker = LabelLinker::new(&kb);
            let generator = Generator::new(&kb, &linker, &operators, config);
            let generated = generator.generate_with_model(question.graph, &LexicalOverlapModel)?;

            println!("Model-guided search: {} candidate(s)", generated.len());
            println!("{}", serde_json::to_string_pretty(&generated).into_diagnostic()?);
        }

        Commands::Whitelist { kb, question } => {
            let config = load_config(cli.config.as_deref())?;
            let kb = MemoryKb::load(&kb)?;
            let question = load_question(&question)?;
            let linker = LabelLinker::new(&kb);
            let generator = Generator::new(&kb, &linker, &operators, config);
            let grounded = generator.generate_without_gold(question.graph)?;

            println!("Whitelisted groundings: {}", grounded.len());
            println!("{}", serde_json::to_string_pretty(&grounded).into_diagnostic()?);
        }

        Commands::InitConfig { path } => {
            GenerationConfig::default().save(&path)?;
            println!("Wrote default generation config to {}", path.display());
        }
    }

    Ok(())
}

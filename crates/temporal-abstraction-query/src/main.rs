//! Temporal abstraction query runner: entry point.

use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use temporal_abstraction::{Algorithms, CachingKnowledgeSource, InMemoryKnowledgeSource, RuleBaseBuilder};
use temporal_abstraction_query::{
    resolve_data_path, resolve_knowledge_path, JsonLinesDataSource, JsonLinesSink, Query, QueryConfig,
    QueryPipeline,
};

#[derive(Parser)]
#[command(
    name = "temporal-abstraction-query",
    about = "Derive temporal abstractions from time-stamped data",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query over a JSON lines file of key batches.
    Run {
        /// Path to the knowledge base JSON file.
        #[arg(short, long)]
        knowledge: Option<String>,

        /// Path to the key batch file, one JSON batch per line.
        #[arg(short, long)]
        data: Option<String>,

        /// Write results here instead of stdout.
        #[arg(short, long)]
        output: Option<String>,

        /// Proposition ids to derive.
        #[arg(short = 'p', long = "proposition", required = true)]
        propositions: Vec<String>,

        /// Capacity of the key batch queue.
        #[arg(long)]
        queue_capacity: Option<usize>,

        /// Maximum rule firings per key.
        #[arg(long)]
        firing_limit: Option<usize>,

        /// Keep per-key working memory between keys of the same id.
        #[arg(long)]
        stateful: bool,
    },

    /// Check that a knowledge base compiles for the given ids.
    Validate {
        /// Path to the knowledge base JSON file.
        #[arg(short, long)]
        knowledge: Option<String>,

        /// Proposition ids to compile.
        #[arg(short = 'p', long = "proposition", required = true)]
        propositions: Vec<String>,
    },
}

fn load_knowledge(explicit: Option<&str>) -> anyhow::Result<CachingKnowledgeSource<InMemoryKnowledgeSource>> {
    let path = resolve_knowledge_path(explicit);
    let kb = InMemoryKnowledgeSource::from_file(&path)
        .with_context(|| format!("loading knowledge base {}", path.display()))?;
    tracing::info!("Loaded {} definition(s) from {}", kb.len(), path.display());
    Ok(CachingKnowledgeSource::new(kb))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            knowledge,
            data,
            output,
            propositions,
            queue_capacity,
            firing_limit,
            stateful,
        } => {
            let mut config = QueryConfig::from_env()?;
            if let Some(capacity) = queue_capacity {
                config.queue_capacity = capacity;
            }
            if let Some(limit) = firing_limit {
                config.firing_limit = limit;
            }
            config.stateful |= stateful;

            let kb = load_knowledge(knowledge.as_deref())?;
            let data_path = resolve_data_path(data.as_deref());
            let source = JsonLinesDataSource::open(&data_path)?;

            let pipeline = QueryPipeline::new(Arc::new(kb), Arc::new(Algorithms::with_builtins()), config);
            let interrupt = pipeline.interrupt_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, stopping after the current key");
                    interrupt.store(true, Ordering::Relaxed);
                }
            });

            let query = Query::new(propositions);
            let report = match output {
                Some(path) => {
                    let sink = JsonLinesSink::create(std::path::Path::new(&path))?;
                    pipeline.run(&query, source, sink).await?.0
                }
                None => {
                    let sink: JsonLinesSink<Box<dyn Write + Send>> = JsonLinesSink::new(Box::new(std::io::stdout()));
                    pipeline.run(&query, source, sink).await?.0
                }
            };

            for failure in &report.failures {
                eprintln!("key {} failed: {}", failure.key_id, failure.error);
            }
            eprintln!(
                "{}: {} key(s) processed, {} failed{}",
                report.query_id,
                report.keys_processed,
                report.failures.len(),
                if report.interrupted { " (interrupted)" } else { "" }
            );
        }

        Commands::Validate {
            knowledge,
            propositions,
        } => {
            let kb = load_knowledge(knowledge.as_deref())?;
            let algorithms = Algorithms::with_builtins();
            let rule_base = RuleBaseBuilder::new(&kb, &algorithms).build(&propositions)?;
            for definition in rule_base.definitions() {
                println!("{:<28} {}", definition.id(), definition.kind().name());
            }
            println!(
                "{} definition(s), {} rule(s)",
                rule_base.definitions().len(),
                rule_base.rules().len()
            );
        }
    }

    Ok(())
}

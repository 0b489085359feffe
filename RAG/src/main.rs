use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use visual_rag::{IngestMode, PopplerBackend, RagConfig, RagRuntime};

#[derive(Parser)]
#[command(name = "visual_rag", about = "Ask questions about a PDF book, text and figures alike")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract page images and text, then build the index
    Ingest {
        /// PDF to ingest (defaults to PDF_PATH)
        #[arg(long)]
        pdf: Option<PathBuf>,
        /// Keep stored batches and only embed what is missing
        #[arg(long)]
        resume: bool,
    },
    /// Rebuild the index from an existing page manifest
    Index {
        #[arg(long)]
        resume: bool,
    },
    /// Answer one question and print the JSON result
    Query { question: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = RagConfig::from_env()?;
    let runtime = RagRuntime::new(config)?;

    let outcome = run(&runtime, cli.command).await;
    runtime.shutdown()?;
    outcome
}

async fn run(runtime: &RagRuntime, command: Command) -> Result<()> {
    match command {
        Command::Ingest { pdf, resume } => {
            let pdf = pdf.unwrap_or_else(|| runtime.config().pdf_path.clone());
            let pipeline = runtime.ingest_pipeline(Arc::new(PopplerBackend::new()))?;
            let report = match pipeline.run(&pdf, mode(resume)).await {
                Ok(report) => report,
                Err(e) => {
                    if e.is_transient() {
                        log::warn!("Committed batches are kept; rerun with --resume to continue");
                    }
                    return Err(e.into());
                }
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Index { resume } => {
            let pipeline = runtime.ingest_pipeline(Arc::new(PopplerBackend::new()))?;
            let manifest = pipeline.manifest_path();
            let report = pipeline.reindex_from_manifest(&manifest, mode(resume)).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Query { question } => {
            let result = runtime.query_service().answer_query(&question).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}

fn mode(resume: bool) -> IngestMode {
    if resume {
        IngestMode::Resume
    } else {
        IngestMode::Replace
    }
}

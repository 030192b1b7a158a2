//! # docrag
//!
//! Ask questions about a local folder of documents and get answers grounded
//! in, and cited from, those documents.
//!
//! ```bash
//! docrag ingest ./papers notes.docx
//! docrag query "What is the warranty period?" --k 4
//! docrag search "warranty"
//! docrag status
//! docrag delete notes.docx
//! ```

mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use docrag_core::config::{Config, Settings};
use docrag_core::reader::list_documents;
use docrag_core::Error;
use docrag_pipeline::backends;

use crate::output::{exit_code, format_answer, format_error, format_search};

const EXIT_INCOMPLETE: u8 = 3;

#[derive(Parser)]
#[command(name = "docrag")]
#[command(about = "Grounded question answering over local documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Extra configuration file layered over config.toml
    #[arg(long, short = 'c', global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Debug-level logging on stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index documents (.txt, .pdf, .docx); directories are walked recursively
    Ingest {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },
    /// Answer a question from the indexed documents
    Query {
        #[arg(value_name = "TEXT")]
        text: String,
        /// Number of chunks to retrieve (defaults to retrieval.k)
        #[arg(long, value_name = "N")]
        k: Option<usize>,
    },
    /// Show the retrieved context for a question without generating an answer
    Search {
        #[arg(value_name = "TEXT")]
        text: String,
        #[arg(long, value_name = "N")]
        k: Option<usize>,
    },
    /// Show collection size, vector width and embedding model
    Status,
    /// Remove every chunk of one document
    Delete {
        #[arg(value_name = "DOCUMENT")]
        document: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => match err.downcast_ref::<Error>() {
            Some(e) => {
                eprintln!("{}", format_error(e));
                ExitCode::from(exit_code(e))
            }
            None => {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let settings = Config::load_with(cli.config.as_deref())?.settings()?;
    match cli.command {
        Commands::Ingest { paths } => ingest(&settings, &paths).await,
        Commands::Query { text, k } => {
            let rag = build_rag(&settings).await?;
            let answer = rag.ask_with_k(&text, k.unwrap_or(rag.k())).await?;
            println!("{}", format_answer(&answer));
            Ok(0)
        }
        Commands::Search { text, k } => {
            let rag = build_rag(&settings).await?;
            let context = rag.search(&text, k.unwrap_or(rag.k())).await?;
            println!("{}", format_search(&context));
            Ok(0)
        }
        Commands::Status => status(&settings).await,
        Commands::Delete { document } => {
            let index = backends::open_index(&settings).await?;
            let removed = index.delete_source(&document).await?;
            if removed == 0 {
                return Err(Error::NotFound(format!("no chunks stored for '{document}'")).into());
            }
            println!("deleted {removed} chunks of {document}");
            Ok(0)
        }
    }
}

async fn build_rag(settings: &Settings) -> Result<docrag_pipeline::Rag> {
    let index = backends::open_index(settings).await?;
    let embedder = backends::build_embedder(settings)?;
    let generator = backends::build_generator(settings)?;
    Ok(backends::rag(settings, embedder, index, generator))
}

async fn ingest(settings: &Settings, roots: &[PathBuf]) -> Result<u8> {
    let mut documents = Vec::new();
    let mut missing = 0usize;
    for root in roots {
        if root.exists() {
            documents.extend(list_documents(root));
        } else {
            eprintln!("{}", format_error(&Error::NotFound(format!("{} does not exist", root.display()))));
            missing += 1;
        }
    }
    if documents.is_empty() {
        eprintln!("no supported documents (.txt, .pdf, .docx) found");
        return Ok(if missing > 0 { EXIT_INCOMPLETE } else { 0 });
    }

    let index = backends::open_index(settings).await?;
    let embedder = backends::build_embedder(settings)?;
    let pipeline = backends::ingestion_pipeline(settings, embedder, index);

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents {msg}")?
            .progress_chars("#>-"),
    );

    let mut complete = 0usize;
    let mut chunks = 0usize;
    let mut failures: Vec<u8> = Vec::new();
    let mut reports = Box::pin(pipeline.ingest_stream(&documents, settings.ingest.concurrency));
    while let Some(report) = reports.next().await {
        match &report.outcome {
            Ok(ingestion) if ingestion.is_complete() => {
                complete += 1;
                chunks += ingestion.chunk_count();
                pb.suspend(|| println!("ingested {}: {} chunks", ingestion.document, ingestion.chunk_count()));
            }
            Ok(ingestion) => {
                chunks += ingestion.chunk_count();
                failures.push(EXIT_INCOMPLETE);
                let cause = ingestion.failure.as_ref().map(format_error).unwrap_or_default();
                pb.suspend(|| {
                    println!("incomplete {}: {}/{} chunks", ingestion.document, ingestion.chunk_count(), ingestion.attempted);
                    eprintln!("{cause}");
                });
            }
            Err(e) => {
                failures.push(exit_code(e));
                pb.suspend(|| eprintln!("failed {}: {}", report.path.display(), format_error(e)));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!("ingested {complete} of {} documents ({chunks} chunks)", documents.len());
    Ok(ingest_exit_code(complete, missing, &failures))
}

/// 0 when everything went in. A run where every document was rejected for the
/// same input-class reason reports that reason; anything else short is 3.
fn ingest_exit_code(complete: usize, missing: usize, failures: &[u8]) -> u8 {
    match failures.first() {
        None if missing == 0 => 0,
        Some(&first) if complete == 0 && missing == 0 && failures.iter().all(|&c| c == first) && first != 1 => first,
        _ => EXIT_INCOMPLETE,
    }
}

async fn status(settings: &Settings) -> Result<u8> {
    let index = backends::open_index(settings).await?;
    let dimension = index.dimension().await;
    let embedder = index.embedder_id().await?;
    println!("collection: {}", index.collection());
    println!("path: {}", settings.store.resolved_path().display());
    println!("entries: {}", index.count().await?);
    println!("dimension: {}", dimension.map_or_else(|| "<unset>".to_string(), |d| d.to_string()));
    println!("embedder: {}", embedder.as_deref().unwrap_or("<unset>"));
    let documents = index.documents().await?;
    if !documents.is_empty() {
        println!("documents:");
        for (name, count) in documents {
            println!("  {name}: {count} chunks");
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_every_command() {
        let cli = Cli::try_parse_from(["docrag", "--verbose", "query", "what is it?", "--k", "2"]).expect("parse");
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Query { ref text, k: Some(2) } if text == "what is it?"));

        let cli = Cli::try_parse_from(["docrag", "ingest", "a.txt", "docs/", "--config", "alt.toml"]).expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert!(matches!(cli.command, Commands::Ingest { ref paths } if paths.len() == 2));

        assert!(Cli::try_parse_from(["docrag", "ingest"]).is_err());
        assert!(matches!(Cli::try_parse_from(["docrag", "status"]).expect("parse").command, Commands::Status));
        assert!(matches!(
            Cli::try_parse_from(["docrag", "delete", "doc.txt"]).expect("parse").command,
            Commands::Delete { ref document } if document == "doc.txt"
        ));
    }

    #[test]
    fn ingest_exit_codes() {
        assert_eq!(ingest_exit_code(3, 0, &[]), 0);
        assert_eq!(ingest_exit_code(2, 0, &[EXIT_INCOMPLETE]), EXIT_INCOMPLETE);
        assert_eq!(ingest_exit_code(0, 0, &[4]), 4);
        assert_eq!(ingest_exit_code(1, 0, &[4]), EXIT_INCOMPLETE);
        assert_eq!(ingest_exit_code(0, 0, &[1, 1]), EXIT_INCOMPLETE);
        assert_eq!(ingest_exit_code(2, 1, &[]), EXIT_INCOMPLETE);
    }
}

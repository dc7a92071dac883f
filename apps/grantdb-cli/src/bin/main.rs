use std::env;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use grantdb_core::config::resolve_with_base;
use grantdb_core::{DocumentStore, Settings, Task};
use grantdb_ingest::{Accepted, Extractor, Pipeline};
use grantdb_store::LanceDocumentStore;
use grantdb_text::PatentIndex;

const USAGE: &str = "Usage: grantdb <command> [args...]

Commands:
  ingest <url>                 download an archive and ingest its grants
  walk <dir>                   ingest grants already on disk
  search <query> [--limit N]   full-text search over indexed grants
  extract <archive> <dest>     unpack an archive (and nested ones) only
  show <storage-id> [--raw]    print a stored patent or its raw record";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

fn required(args: &[String], index: usize, what: &str) -> String {
    args.get(index).cloned().unwrap_or_else(|| {
        eprintln!("Missing {what}\n\n{USAGE}");
        std::process::exit(1)
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let settings = Settings::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "ingest" => run_task(&settings, Task::download(required(&args, 0, "url"))).await?,
        "walk" => {
            let dir = resolve_with_base(&env::current_dir()?, required(&args, 0, "directory"));
            run_task(&settings, Task::walk(dir)).await?;
        }
        "search" => {
            let query = required(&args, 0, "query");
            let limit = match args.iter().position(|a| a == "--limit") {
                Some(i) => Some(required(&args, i + 1, "limit").parse::<usize>()?),
                None => None,
            };
            let index = PatentIndex::open(&settings.index_dir())?.with_limits(settings.search.default_limit, settings.search.max_limit);
            let hits = match limit {
                Some(limit) => index.search_with_limit(&query, limit)?,
                None => index.search(&query)?,
            };
            println!("{}", serde_json::to_string_pretty(&hits)?);
            eprintln!("{} hit(s) for \"{query}\"", hits.len());
        }
        "extract" => {
            let archive = PathBuf::from(required(&args, 0, "archive"));
            let dest = PathBuf::from(required(&args, 1, "destination"));
            let extractor = Extractor::new(settings.extract.max_depth);
            let out = tokio::task::spawn_blocking(move || extractor.extract_recursively(&archive, &dest)).await??;
            println!("{}", out.display());
        }
        "show" => {
            let id = required(&args, 0, "storage id");
            let store = LanceDocumentStore::open(&settings.store_dir(), &settings.storage).await?;
            if args.iter().any(|a| a == "--raw") {
                println!("{}", serde_json::to_string_pretty(&store.raw_record(&id).await?)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&store.patent(&id).await?)?);
            }
        }
        _ => {
            eprintln!("Unknown command: {cmd}\n\n{USAGE}");
            std::process::exit(1);
        }
    }
    Ok(())
}

/// Admit one task, then drain the queue. Ctrl-C cancels in-flight downloads.
async fn run_task(settings: &Settings, task: Task) -> anyhow::Result<()> {
    ensure_dirs(settings)?;
    let pipeline = Pipeline::open(settings).await?;
    let root = CancellationToken::new();
    pipeline.start(root.clone())?;

    let interrupt = root.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; cancelling");
            interrupt.cancel();
        }
    });

    let outcome = pipeline.admission.request(task).await;
    match &outcome {
        Ok(accepted) => eprintln!("{} {} ({})", Accepted::STATUS_CODE, accepted.message(), accepted.task),
        Err(err) => eprintln!("{} {err}", err.status_code()),
    }
    pipeline.shutdown().await;
    if outcome.is_err() {
        std::process::exit(1);
    }
    eprintln!("{} document(s) in index", pipeline.index.num_docs());
    Ok(())
}

fn ensure_dirs(settings: &Settings) -> anyhow::Result<()> {
    for dir in [settings.staging_dir(), settings.index_dir(), settings.store_dir()] {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

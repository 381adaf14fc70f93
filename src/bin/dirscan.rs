//! Scan a local directory and print what the file list would show.
//!
//! Usage:
//!     dirscan ~/Downloads --query report --show-hidden

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use dircontents::{DirectoryContents, DirectoryContentsEvent, FileFilter, FileListContext, LocalFileSystem, ScanConfig};
use tokio::sync::broadcast::error::TryRecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "dirscan", about = "List a directory the way the file browser does")]
struct Args {
    /// Directory to scan
    path: PathBuf,

    /// Search the tree below the directory for names containing this text
    #[arg(long)]
    query: Option<String>,

    /// Also list hidden files
    #[arg(long)]
    show_hidden: bool,

    /// Log every scan event
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose { "dircontents=debug" } else { "dircontents=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ScanConfig::default();
    let fs = Arc::new(LocalFileSystem::new(args.path.clone()).with_config(&config));
    let root = fs.root_entry();
    let filter = Arc::new(FileFilter::new());
    filter.set_hidden_files_visible(args.show_hidden);

    let context = FileListContext::new(fs, filter, config);
    let contents = match &args.query {
        Some(query) => DirectoryContents::for_local_search(context, root, query),
        None => DirectoryContents::for_directory(context, root),
    };
    let mut events = contents.subscribe();
    contents.scan(false, false).await;

    let mut code = ExitCode::SUCCESS;
    loop {
        match events.try_recv() {
            Ok(DirectoryContentsEvent::ScanFailed(error)) => {
                tracing::error!("Scan of {} failed: {}", args.path.display(), error);
                code = ExitCode::FAILURE;
            }
            Ok(event) => tracing::debug!(event = event.name(), "scan event"),
            Err(TryRecvError::Lagged(skipped)) => tracing::debug!(skipped, "scan events skipped"),
            Err(_) => break,
        }
    }

    for entry in contents.file_list() {
        let suffix = if entry.is_dir() { "/" } else { "" };
        println!("{}{}", entry.full_path(), suffix);
    }
    code
}

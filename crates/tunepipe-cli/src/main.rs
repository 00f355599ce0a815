//! `tunepipe`: download songs from an `Artist - Title` list and convert them
//! to a target format, in parallel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

use tunepipe_core::config;
use tunepipe_core::convert::{AudioFormat, ConvertStage, INTERMEDIATE_EXT};
use tunepipe_core::discover;
use tunepipe_core::download::DownloadStage;
use tunepipe_core::logging;
use tunepipe_core::outcome::{JobResult, RunSummary};
use tunepipe_core::pool;
use tunepipe_core::search::CatalogClient;
use tunepipe_core::songlist;

/// Find, download, and convert music in parallel.
#[derive(Debug, Parser)]
#[command(name = "tunepipe")]
#[command(about = "Parallel music download and conversion pipeline", long_about = None)]
struct Cli {
    /// Text file with one `Artist - Title` per line (`#` starts a comment).
    #[arg(short = 'l', long, value_name = "FILE", required_unless_present = "convert_only")]
    list_file: Option<PathBuf>,

    /// Directory to download and convert music in.
    #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Target audio format.
    #[arg(short = 'f', long, default_value = "mp3")]
    format: AudioFormat,

    /// Delete intermediate files after a confirmed conversion.
    #[arg(long)]
    cleanup: bool,

    /// Skip the download phase and only convert files already present.
    #[arg(long)]
    convert_only: bool,

    /// Number of parallel download jobs (default from config).
    #[arg(long, value_name = "N")]
    download_workers: Option<usize>,

    /// Number of parallel conversion jobs (default from config).
    #[arg(long, value_name = "N")]
    convert_workers: Option<usize>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    // Per-job failures are reported in the summary and keep exit code 0;
    // only configuration and usage problems reach this handler.
    if let Err(err) = run(cli).await {
        eprintln!("tunepipe error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = config::load_or_init()?;
    tracing::debug!("loaded config: {:?}", cfg);
    let timeout = cfg.tool_timeout_secs.map(Duration::from_secs);

    std::fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("create output dir {}", cli.output_dir.display()))?;

    if !cli.convert_only {
        let list_path = cli
            .list_file
            .as_deref()
            .context("--list-file is required unless --convert-only is set")?;
        let list = songlist::read_song_list(list_path)?;
        for line in &list.malformed {
            eprintln!("skipping malformed line (no ' - ' separator): {line}");
        }

        let workers = cli.download_workers.unwrap_or(cfg.download_workers);
        println!(
            "Downloading {} song(s) with up to {} worker(s)",
            list.songs.len(),
            workers
        );

        let catalog = CatalogClient::new()?;
        let stage = Arc::new(DownloadStage::new(
            &cfg.downloader_bin,
            catalog,
            cli.output_dir.clone(),
            timeout,
        )?);
        let summary = run_phase(list.songs, workers, {
            let stage = Arc::clone(&stage);
            move |song| {
                let stage = Arc::clone(&stage);
                async move { stage.run(song).await }
            }
        })
        .await;
        print_summary("download", &summary);
    }

    let files = discover::discover_files(&cli.output_dir, &[INTERMEDIATE_EXT])?;
    if files.is_empty() {
        println!(
            "No .{INTERMEDIATE_EXT} files in {} to convert.",
            cli.output_dir.display()
        );
        return Ok(());
    }

    let workers = cli.convert_workers.unwrap_or(cfg.convert_workers);
    println!(
        "Converting {} file(s) to {} with up to {} worker(s)",
        files.len(),
        cli.format,
        workers
    );

    let stage = Arc::new(ConvertStage::new(
        &cfg.transcoder_bin,
        cli.format,
        cli.cleanup,
        cli.output_dir.clone(),
        timeout,
    )?);
    let summary = run_phase(files, workers, {
        let stage = Arc::clone(&stage);
        move |file| {
            let stage = Arc::clone(&stage);
            async move { stage.run(file).await }
        }
    })
    .await;
    print_summary("convert", &summary);

    Ok(())
}

/// Runs one pool phase with a printer task for live per-job lines.
async fn run_phase<T, F, Fut>(jobs: Vec<T>, workers: usize, stage: F) -> RunSummary
where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: std::future::Future<Output = JobResult> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<JobResult>(16);
    let printer = tokio::spawn(async move {
        while let Some(result) = rx.recv().await {
            println!("{}", result.render());
        }
    });
    let summary = pool::run_jobs(jobs, workers, Some(tx), stage).await;
    let _ = printer.await;
    summary
}

fn print_summary(phase: &str, summary: &RunSummary) {
    println!("{phase}: {summary}");
    if !summary.failed_ids.is_empty() {
        println!("failed:");
        for id in &summary.failed_ids {
            println!("  {id}");
        }
    }
}

//! `tunepipe-flatten`: flatten a nested music tree into a single directory
//! with descriptive, collision-checked filenames.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

use tunepipe_core::discover;
use tunepipe_core::flatten::{FlattenAction, FlattenStage};
use tunepipe_core::logging;
use tunepipe_core::outcome::JobResult;
use tunepipe_core::pool;

/// Flatten a nested directory of music files into a single folder.
#[derive(Debug, Parser)]
#[command(name = "tunepipe-flatten")]
#[command(about = "Flatten a nested music tree into one directory", long_about = None)]
struct Cli {
    /// Source directory with nested music files.
    source_dir: PathBuf,

    /// Destination directory for the flat layout.
    dest_dir: PathBuf,

    /// File extension to process; repeat the flag for several.
    #[arg(long, value_name = "EXT", default_value = "mp3")]
    formats: Vec<String>,

    /// Copy files (safe) or move them.
    #[arg(long, default_value = "copy")]
    action: FlattenAction,

    /// Number of parallel jobs.
    #[arg(long, value_name = "N", default_value_t = 4)]
    workers: usize,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    if let Err(err) = run(cli).await {
        eprintln!("tunepipe-flatten error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if !cli.source_dir.is_dir() {
        bail!("source directory {} does not exist", cli.source_dir.display());
    }
    std::fs::create_dir_all(&cli.dest_dir)
        .with_context(|| format!("create destination dir {}", cli.dest_dir.display()))?;

    let exts: Vec<&str> = cli.formats.iter().map(String::as_str).collect();
    let files = discover::discover_files(&cli.source_dir, &exts)?;
    if files.is_empty() {
        println!("No matching music files found to process.");
        return Ok(());
    }

    println!(
        "Flattening {} file(s) into {} (action: {})",
        files.len(),
        cli.dest_dir.display(),
        cli.action
    );

    let stage = Arc::new(FlattenStage::new(
        cli.source_dir.clone(),
        cli.dest_dir.clone(),
        cli.action,
    ));

    let (tx, mut rx) = mpsc::channel::<JobResult>(16);
    let printer = tokio::spawn(async move {
        while let Some(result) = rx.recv().await {
            println!("{}", result.render());
        }
    });
    let summary = pool::run_jobs(files, cli.workers, Some(tx), {
        let stage = Arc::clone(&stage);
        move |file| {
            let stage = Arc::clone(&stage);
            async move { stage.run(file).await }
        }
    })
    .await;
    let _ = printer.await;

    println!("flatten: {summary}");
    if !summary.failed_ids.is_empty() {
        println!("failed:");
        for id in &summary.failed_ids {
            println!("  {id}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn positional_dirs_are_required() {
        assert!(Cli::try_parse_from(["tunepipe-flatten"]).is_err());
        assert!(Cli::try_parse_from(["tunepipe-flatten", "src"]).is_err());

        let cli = Cli::try_parse_from(["tunepipe-flatten", "Music", "Flat"]).unwrap();
        assert_eq!(cli.source_dir, Path::new("Music"));
        assert_eq!(cli.dest_dir, Path::new("Flat"));
    }

    #[test]
    fn defaults_are_copy_and_mp3() {
        let cli = Cli::try_parse_from(["tunepipe-flatten", "a", "b"]).unwrap();
        assert_eq!(cli.action, FlattenAction::Copy);
        assert_eq!(cli.formats, vec!["mp3".to_string()]);
        assert_eq!(cli.workers, 4);
    }

    #[test]
    fn formats_flag_is_repeatable() {
        let cli = Cli::try_parse_from([
            "tunepipe-flatten",
            "a",
            "b",
            "--formats",
            "mp3",
            "--formats",
            "flac",
        ])
        .unwrap();
        assert_eq!(cli.formats, vec!["mp3".to_string(), "flac".to_string()]);
    }

    #[test]
    fn action_parses_and_rejects() {
        let cli =
            Cli::try_parse_from(["tunepipe-flatten", "a", "b", "--action", "move"]).unwrap();
        assert_eq!(cli.action, FlattenAction::Move);

        assert!(Cli::try_parse_from(["tunepipe-flatten", "a", "b", "--action", "link"]).is_err());
    }
}

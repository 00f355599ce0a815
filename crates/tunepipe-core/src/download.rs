//! Download stage: skip-if-present check, catalog lookup, downloader
//! subprocess.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

use crate::discover;
use crate::outcome::JobResult;
use crate::sanitize::match_key;
use crate::search::CatalogClient;
use crate::songlist::SongRequest;
use crate::tool;

/// Extensions a previous run (download or conversion) may have left behind.
const AUDIO_EXTS: &[&str] = &["m4a", "mp3", "flac"];

/// Downloads one song per job via the external downloader.
///
/// The downloader owns the nested output layout under `output_dir`; this
/// stage only passes the directory along and checks for existing files.
pub struct DownloadStage {
    downloader: PathBuf,
    catalog: CatalogClient,
    output_dir: PathBuf,
    timeout: Option<Duration>,
}

impl DownloadStage {
    /// Resolves the downloader binary up front, so a missing tool aborts the
    /// run before any job starts instead of failing every job.
    pub fn new(
        program: &str,
        catalog: CatalogClient,
        output_dir: PathBuf,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let downloader = tool::resolve(program)?;
        Ok(Self {
            downloader,
            catalog,
            output_dir,
            timeout,
        })
    }

    /// Runs the stage for one song. Every failure is folded into the
    /// returned JobResult; nothing propagates past the stage boundary.
    pub async fn run(&self, song: SongRequest) -> JobResult {
        let ident = song.search_term();

        match find_existing(&self.output_dir, &song) {
            Ok(Some(existing)) => {
                return JobResult::skipped(
                    ident,
                    format!("already present: {}", existing.display()),
                );
            }
            Ok(None) => {}
            Err(err) => return JobResult::failed(ident, format!("scan output dir: {err:#}")),
        }

        let track_url = match self.catalog.track_url(&ident).await {
            Ok(Some(url)) => url,
            Ok(None) => return JobResult::failed(ident, "no catalog match"),
            Err(err) => return JobResult::failed(ident, err.to_string()),
        };

        tracing::debug!(song = %ident, url = %track_url, "invoking downloader");
        let args: [&OsStr; 3] = [
            OsStr::new("--output-path"),
            self.output_dir.as_os_str(),
            OsStr::new(&track_url),
        ];
        match tool::run_tool(&self.downloader, args, self.timeout).await {
            Ok(_) => JobResult::success(ident),
            Err(err) => JobResult::failed(ident, err.to_string()),
        }
    }
}

/// Looks for a file under `dir` that already satisfies `song`.
///
/// Matching policy: a candidate matches when its file stem contains the
/// title and its relative path contains the artist, both compared through
/// `match_key` (case- and punctuation-insensitive). A false negative costs
/// one redundant download; the external tools write to fresh paths, so the
/// check-then-create race stays harmless.
pub fn find_existing(dir: &Path, song: &SongRequest) -> Result<Option<PathBuf>> {
    let title_key = match_key(&song.title);
    let artist_key = match_key(&song.artist);
    if title_key.is_empty() || artist_key.is_empty() || !dir.is_dir() {
        return Ok(None);
    }

    for path in discover::discover_files(dir, AUDIO_EXTS)? {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let rel = path.strip_prefix(dir).unwrap_or(&path);
        if match_key(stem).contains(&title_key)
            && match_key(&rel.to_string_lossy()).contains(&artist_key)
        {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

//! Flattening a nested Artist/Album tree into one directory with
//! collision-checked descriptive names.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use lofty::file::TaggedFileExt;
use lofty::prelude::Accessor;

use crate::outcome::JobResult;
use crate::sanitize::sanitize_filename;

/// Copy keeps the source; Move removes it after the destination write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlattenAction {
    Copy,
    Move,
}

impl fmt::Display for FlattenAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlattenAction::Copy => "copy",
            FlattenAction::Move => "move",
        })
    }
}

impl FromStr for FlattenAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "copy" => Ok(FlattenAction::Copy),
            "move" => Ok(FlattenAction::Move),
            other => Err(format!("unknown action '{other}' (expected copy or move)")),
        }
    }
}

/// Tag fields used for destination naming; any may be absent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

/// Reads the primary tag of `path`. Unreadable or untagged files yield empty
/// tags, letting path-derived naming take over.
pub fn read_tags(path: &Path) -> TrackTags {
    let Ok(tagged) = lofty::read_from_path(path) else {
        return TrackTags::default();
    };
    let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
        return TrackTags::default();
    };
    TrackTags {
        title: non_empty(tag.title().map(|v| v.into_owned())),
        artist: non_empty(tag.artist().map(|v| v.into_owned())),
        album: non_empty(tag.album().map(|v| v.into_owned())),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Derives the flat destination filename, `Title - Artist - Album.ext`.
///
/// Tag values win; missing tags fall back to the path: title from the file
/// stem, album from the parent directory, artist from the grandparent.
/// Directories at or above `root` are omitted, so `root/Album/Song.mp3`
/// maps to `Song - Album.mp3` and a file directly under `root` keeps its
/// name. The result is sanitized for Linux filesystems.
pub fn destination_name(src: &Path, root: &Path, tags: &TrackTags) -> String {
    let stem = src.file_stem().and_then(|s| s.to_str()).unwrap_or("track");
    let ext = src.extension().and_then(|s| s.to_str()).unwrap_or_default();

    let parent_dir = dir_name_below_root(src.parent(), root);
    let grandparent_dir = dir_name_below_root(src.parent().and_then(Path::parent), root);

    let title = tags.title.clone().unwrap_or_else(|| stem.to_string());
    let artist = tags.artist.clone().or(grandparent_dir);
    let album = tags.album.clone().or(parent_dir);

    let mut parts = vec![title];
    parts.extend(artist);
    parts.extend(album);
    let joined = parts.join(" - ");

    let name = if ext.is_empty() {
        joined
    } else {
        format!("{joined}.{ext}")
    };
    sanitize_filename(&name)
}

fn dir_name_below_root(dir: Option<&Path>, root: &Path) -> Option<String> {
    let dir = dir?;
    if dir == root || !dir.starts_with(root) {
        return None;
    }
    dir.file_name().and_then(|n| n.to_str()).map(str::to_string)
}

/// Moves or copies one discovered file per job into the flat destination.
pub struct FlattenStage {
    source_root: PathBuf,
    dest_dir: PathBuf,
    action: FlattenAction,
}

impl FlattenStage {
    pub fn new(source_root: PathBuf, dest_dir: PathBuf, action: FlattenAction) -> Self {
        Self {
            source_root,
            dest_dir,
            action,
        }
    }

    pub async fn run(&self, src: PathBuf) -> JobResult {
        let ident = src
            .strip_prefix(&self.source_root)
            .unwrap_or(&src)
            .display()
            .to_string();

        let tags = read_tags(&src);
        let name = destination_name(&src, &self.source_root, &tags);
        let dest = self.dest_dir.join(&name);

        if dest.exists() {
            // The sole collision-avoidance mechanism: an existing
            // destination is never overwritten.
            return JobResult::skipped(ident, format!("'{name}' already exists in destination"));
        }

        let outcome = match self.action {
            FlattenAction::Copy => fs::copy(&src, &dest).map(|_| ()),
            FlattenAction::Move => move_file(&src, &dest),
        };
        match outcome {
            Ok(()) => JobResult::success_with(ident, format!("-> {name}")),
            Err(err) => JobResult::failed(ident, format!("{}: {err}", self.action)),
        }
    }
}

/// Rename when possible, else copy and unlink (cross-device moves). The
/// source is removed only after the destination write completed.
fn move_file(src: &Path, dest: &Path) -> std::io::Result<()> {
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    fs::copy(src, dest)?;
    fs::remove_file(src)
}

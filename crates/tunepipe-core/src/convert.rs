//! Conversion stage: transcoder presets per target format, skip-if-converted,
//! partial-output removal, and source cleanup gated on a confirmed output.

use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;

use crate::outcome::JobResult;
use crate::tool;

/// Extension of the intermediate files the downloader produces.
pub const INTERMEDIATE_EXT: &str = "m4a";

/// Target formats the transcoder can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// Lossy VBR mp3.
    Mp3,
    /// Lossless FLAC.
    Flac,
    /// Apple Lossless in an m4a container.
    Alac,
}

impl AudioFormat {
    /// ffmpeg audio codec name.
    pub fn codec(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "libmp3lame",
            AudioFormat::Flac => "flac",
            AudioFormat::Alac => "alac",
        }
    }

    /// Extension of the converted file.
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::Alac => "m4a",
        }
    }

    /// Format-specific quality preset (VBR quality 2 for mp3).
    pub fn quality_args(self) -> &'static [&'static str] {
        match self {
            AudioFormat::Mp3 => &["-q:a", "2"],
            AudioFormat::Flac | AudioFormat::Alac => &[],
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::Alac => "alac",
        };
        f.write_str(name)
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "flac" => Ok(AudioFormat::Flac),
            "alac" => Ok(AudioFormat::Alac),
            other => Err(format!("unknown format '{other}' (expected mp3, flac, or alac)")),
        }
    }
}

/// Destination path for converting `src`: same stem, target extension.
/// When that would collide with the source itself (alac over an m4a input)
/// the stem gets a ` (alac)` suffix instead.
pub fn output_path(src: &Path, format: AudioFormat) -> PathBuf {
    let out = src.with_extension(format.extension());
    if out.as_path() == src {
        let stem = src.file_stem().and_then(OsStr::to_str).unwrap_or("track");
        src.with_file_name(format!("{stem} ({format}).{}", format.extension()))
    } else {
        out
    }
}

/// Converts one file per job via the external transcoder.
pub struct ConvertStage {
    transcoder: PathBuf,
    format: AudioFormat,
    cleanup: bool,
    timeout: Option<Duration>,
    /// Job identifiers are reported relative to this directory.
    base_dir: PathBuf,
}

impl ConvertStage {
    /// Resolves the transcoder binary up front, so a missing tool aborts the
    /// run before any job starts.
    pub fn new(
        program: &str,
        format: AudioFormat,
        cleanup: bool,
        base_dir: PathBuf,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let transcoder = tool::resolve(program)?;
        Ok(Self {
            transcoder,
            format,
            cleanup,
            timeout,
            base_dir,
        })
    }

    pub async fn run(&self, src: PathBuf) -> JobResult {
        let ident = src
            .strip_prefix(&self.base_dir)
            .unwrap_or(&src)
            .display()
            .to_string();
        let dest = output_path(&src, self.format);

        if dest.exists() {
            return JobResult::skipped(ident, "already converted");
        }

        let mut args: Vec<&OsStr> = vec![
            OsStr::new("-nostdin"),
            OsStr::new("-i"),
            src.as_os_str(),
            OsStr::new("-c:v"),
            OsStr::new("copy"),
            OsStr::new("-c:a"),
            OsStr::new(self.format.codec()),
        ];
        for flag in self.format.quality_args() {
            args.push(OsStr::new(flag));
        }
        args.extend([
            OsStr::new("-hide_banner"),
            OsStr::new("-loglevel"),
            OsStr::new("error"),
            dest.as_os_str(),
        ]);

        if let Err(err) = tool::run_tool(&self.transcoder, args, self.timeout).await {
            remove_partial(&dest);
            return JobResult::failed(ident, err.to_string());
        }

        if let Err(reason) = confirm_output(&dest) {
            remove_partial(&dest);
            return JobResult::failed(ident, reason);
        }

        if self.cleanup {
            // The source goes away only now that the destination is confirmed
            // to exist and be non-empty.
            if let Err(err) = fs::remove_file(&src) {
                tracing::warn!(src = %src.display(), error = %err, "converted but could not remove source");
                return JobResult::success_with(ident, format!("converted; source not removed: {err}"));
            }
            return JobResult::success_with(ident, "converted, source removed");
        }
        JobResult::success_with(ident, "converted")
    }
}

/// The transcoder exited cleanly; make sure it actually wrote something.
fn confirm_output(dest: &Path) -> Result<(), String> {
    match fs::metadata(dest) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err("transcoder wrote an empty file".to_string()),
        Err(err) => Err(format!("transcoder wrote no output: {err}")),
    }
}

fn remove_partial(dest: &Path) {
    if dest.exists() {
        if let Err(err) = fs::remove_file(dest) {
            tracing::warn!(dest = %dest.display(), error = %err, "could not remove partial output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_str_and_display() {
        assert_eq!("mp3".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert_eq!("FLAC".parse::<AudioFormat>().unwrap(), AudioFormat::Flac);
        assert_eq!("alac".parse::<AudioFormat>().unwrap(), AudioFormat::Alac);
        assert!("ogg".parse::<AudioFormat>().is_err());
        assert_eq!(AudioFormat::Alac.to_string(), "alac");
    }

    #[test]
    fn codec_presets() {
        assert_eq!(AudioFormat::Mp3.codec(), "libmp3lame");
        assert_eq!(AudioFormat::Mp3.quality_args(), &["-q:a", "2"]);
        assert_eq!(AudioFormat::Flac.codec(), "flac");
        assert!(AudioFormat::Flac.quality_args().is_empty());
    }

    #[test]
    fn output_path_swaps_extension() {
        let src = Path::new("/music/Artist/Album/song.m4a");
        assert_eq!(
            output_path(src, AudioFormat::Mp3),
            Path::new("/music/Artist/Album/song.mp3")
        );
        assert_eq!(
            output_path(src, AudioFormat::Flac),
            Path::new("/music/Artist/Album/song.flac")
        );
    }

    #[test]
    fn output_path_avoids_self_collision_for_alac() {
        let src = Path::new("/music/song.m4a");
        assert_eq!(
            output_path(src, AudioFormat::Alac),
            Path::new("/music/song (alac).m4a")
        );
    }

    #[test]
    fn confirm_output_rejects_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.mp3");
        assert!(confirm_output(&missing).is_err());

        let empty = dir.path().join("empty.mp3");
        fs::write(&empty, b"").unwrap();
        assert!(confirm_output(&empty).is_err());

        let good = dir.path().join("good.mp3");
        fs::write(&good, b"audio").unwrap();
        assert!(confirm_output(&good).is_ok());
    }
}

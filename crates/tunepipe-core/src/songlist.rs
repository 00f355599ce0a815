//! Song-list parsing: one `Artist - Title` entry per line.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// One requested song, parsed from a list line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongRequest {
    pub artist: String,
    pub title: String,
    /// The input line the request came from, trimmed.
    pub raw_line: String,
}

impl SongRequest {
    /// Splits a line on the FIRST `" - "`, trimming both halves. Returns
    /// None when the separator is missing or a half is empty.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (artist, title) = line.split_once(" - ")?;
        let artist = artist.trim();
        let title = title.trim();
        if artist.is_empty() || title.is_empty() {
            return None;
        }
        Some(Self {
            artist: artist.to_string(),
            title: title.to_string(),
            raw_line: line.to_string(),
        })
    }

    /// `Artist - Title`; the catalog search term and job identifier.
    pub fn search_term(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

/// Parsed song list: requests in input order plus the lines that did not parse.
#[derive(Debug, Default)]
pub struct SongList {
    pub songs: Vec<SongRequest>,
    pub malformed: Vec<String>,
}

/// Reads a UTF-8 song list file. Blank lines and `#` comments are ignored;
/// malformed lines are collected for reporting, never fatal.
pub fn read_song_list(path: &Path) -> Result<SongList> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read song list {}", path.display()))?;
    Ok(parse_song_list(&data))
}

pub fn parse_song_list(data: &str) -> SongList {
    let mut list = SongList::default();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match SongRequest::parse(line) {
            Some(song) => list.songs.push(song),
            None => list.malformed.push(line.to_string()),
        }
    }
    list
}

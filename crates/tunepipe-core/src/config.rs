use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Global configuration loaded from `~/.config/tunepipe/config.toml`.
///
/// Holds defaults only; CLI flags always win. No run state is persisted
/// anywhere, so a re-run sees nothing but the files on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Parallel download jobs when --download-workers is not given.
    pub download_workers: usize,
    /// Parallel conversion jobs when --convert-workers is not given.
    pub convert_workers: usize,
    /// Downloader binary name or path.
    #[serde(default = "default_downloader")]
    pub downloader_bin: String,
    /// Transcoder binary name or path.
    #[serde(default = "default_transcoder")]
    pub transcoder_bin: String,
    /// Optional per-invocation timeout for external tools, in seconds.
    /// Bounds how long a hung tool can occupy a worker slot.
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,
}

fn default_downloader() -> String {
    "gamdl".to_string()
}

fn default_transcoder() -> String {
    "ffmpeg".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            download_workers: 4,
            convert_workers: detected_parallelism(),
            downloader_bin: default_downloader(),
            transcoder_bin: default_transcoder(),
            tool_timeout_secs: None,
        }
    }
}

/// Default conversion worker count: one per available core.
pub fn detected_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tunepipe")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PipelineConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PipelineConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: PipelineConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.download_workers, 4);
        assert!(cfg.convert_workers >= 1);
        assert_eq!(cfg.downloader_bin, "gamdl");
        assert_eq!(cfg.transcoder_bin, "ffmpeg");
        assert!(cfg.tool_timeout_secs.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = PipelineConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: PipelineConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.download_workers, cfg.download_workers);
        assert_eq!(parsed.convert_workers, cfg.convert_workers);
        assert_eq!(parsed.downloader_bin, cfg.downloader_bin);
        assert_eq!(parsed.transcoder_bin, cfg.transcoder_bin);
    }

    #[test]
    fn config_toml_tool_overrides() {
        let toml = r#"
            download_workers = 2
            convert_workers = 8
            downloader_bin = "/opt/tools/gamdl"
            transcoder_bin = "ffmpeg6"
            tool_timeout_secs = 600
        "#;
        let cfg: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.download_workers, 2);
        assert_eq!(cfg.convert_workers, 8);
        assert_eq!(cfg.downloader_bin, "/opt/tools/gamdl");
        assert_eq!(cfg.transcoder_bin, "ffmpeg6");
        assert_eq!(cfg.tool_timeout_secs, Some(600));
    }

    #[test]
    fn config_toml_missing_tools_use_defaults() {
        let toml = r#"
            download_workers = 3
            convert_workers = 3
        "#;
        let cfg: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.downloader_bin, "gamdl");
        assert_eq!(cfg.transcoder_bin, "ffmpeg");
        assert!(cfg.tool_timeout_secs.is_none());
    }
}

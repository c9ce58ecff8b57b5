use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ingest::Style;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub extractor: ExtractorConfig,

    #[serde(default)]
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Root under which every ingest gets its own extraction directory.
    #[serde(default = "default_faces_root")]
    pub faces_root: PathBuf,

    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    #[serde(default)]
    pub default_style: Style,
}

fn default_faces_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("vidfaces/faces")
}

fn default_image_extensions() -> Vec<String> {
    vec!["jpg".to_string()]
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            faces_root: default_faces_root(),
            image_extensions: default_image_extensions(),
            default_style: Style::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default = "default_extractor_program")]
    pub program: String,

    /// Argument template; `{input}`, `{style}` and `{output}` are substituted.
    #[serde(default = "default_extractor_args")]
    pub args: Vec<String>,

    /// Kill the extractor if it runs longer than this.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_extractor_program() -> String {
    "videotofaces".to_string()
}

fn default_extractor_args() -> Vec<String> {
    vec![
        "-i".to_string(),
        "{input}".to_string(),
        "-s".to_string(),
        "{style}".to_string(),
        "-o".to_string(),
        "{output}".to_string(),
    ]
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: default_extractor_program(),
            args: default_extractor_args(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_program")]
    pub program: String,

    /// Argument template; `{input}` is substituted.
    #[serde(default = "default_probe_args")]
    pub args: Vec<String>,
}

fn default_probe_program() -> String {
    "ffprobe".to_string()
}

fn default_probe_args() -> Vec<String> {
    [
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=avg_frame_rate",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
        "{input}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            program: default_probe_program(),
            args: default_probe_args(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vidfaces")
        .join("registry.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            ingest: IngestConfig::default(),
            extractor: ExtractorConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, writing defaults there if missing.
    ///
    /// `VIDFACES_CONFIG` overrides the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Invalid config {:?}", path))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidfaces")
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("VIDFACES_CONFIG") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vidfaces").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.ingest.image_extensions, vec!["jpg"]);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.extractor.program, config.extractor.program);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            db_path = "/srv/faces/registry.db"

            [ingest]
            default_style = "anime"

            [extractor]
            timeout_secs = 600
            "#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/srv/faces/registry.db"));
        assert_eq!(config.ingest.default_style, Style::Anime);
        assert_eq!(config.extractor.timeout_secs, Some(600));
        assert_eq!(config.extractor.program, "videotofaces");
        assert_eq!(config.probe.program, "ffprobe");
    }
}

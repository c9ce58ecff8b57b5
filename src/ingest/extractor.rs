//! Seam to the external face extractor and frame-rate probe.
//!
//! Both run as child processes configured in `config.toml`. Argument
//! templates may use `{input}`, `{style}` and `{output}` placeholders.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{ExtractorConfig, ProbeConfig};
use crate::error::{RegistryError, Result};

/// Extractor model family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Live,
    Anime,
}

impl Style {
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Live => "live",
            Style::Anime => "anime",
        }
    }
}

impl std::fmt::Display for Style {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "live" => Ok(Style::Live),
            "anime" => Ok(Style::Anime),
            other => Err(RegistryError::Input(format!(
                "unknown style {:?} (expected live or anime)",
                other
            ))),
        }
    }
}

/// Arguments for one extraction run.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub video: &'a Path,
    pub style: Style,
    pub output_dir: &'a Path,
}

/// Something that turns a video into a tree of face crops under
/// `output_dir/{cluster}/{frame}_{suffix}.jpg`.
///
/// Nothing is read back from the extractor except the files it leaves behind.
pub trait Extractor {
    fn extract(&self, request: &ExtractionRequest<'_>) -> impl Future<Output = Result<()>>;
}

fn render_args(template: &[String], input: &Path, style: Option<Style>, output: Option<&Path>) -> Vec<String> {
    let input = input.to_string_lossy();
    let style = style.map(|s| s.as_str()).unwrap_or_default();
    let output = output.map(|p| p.to_string_lossy()).unwrap_or_default();
    template
        .iter()
        .map(|arg| {
            arg.replace("{input}", &input)
                .replace("{style}", style)
                .replace("{output}", &output)
        })
        .collect()
}

/// Runs the configured extractor program as a child process.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }
}

impl Extractor for CommandExtractor {
    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<()> {
        let args = render_args(&self.args, request.video, Some(request.style), Some(request.output_dir));
        info!("Running extractor: {} {:?}", self.program, args);

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let run = command.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                RegistryError::Extraction(format!("{} timed out after {:?}", self.program, limit))
            })?,
            None => run.await,
        }
        .map_err(|e| RegistryError::Extraction(format!("cannot run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(RegistryError::Extraction(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            )));
        }

        debug!("Extractor finished for {:?}", request.video);
        Ok(())
    }
}

/// Asks an external tool (ffprobe by default) for a video's frame rate.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: String,
    args: Vec<String>,
}

impl CommandProbe {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }

    /// Frames per second of `video`, or 0 when the probe fails or reports
    /// nothing usable.
    pub async fn probe_fps(&self, video: &Path) -> f64 {
        let args = render_args(&self.args, video, None, None);
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                let stdout = String::from_utf8_lossy(&out.stdout);
                match stdout.lines().find_map(parse_frame_rate) {
                    Some(fps) => fps,
                    None => {
                        warn!("Probe gave no frame rate for {:?}: {:?}", video, stdout.trim());
                        0.0
                    }
                }
            }
            Ok(out) => {
                warn!("Probe {} exited with {} for {:?}", self.program, out.status, video);
                0.0
            }
            Err(e) => {
                warn!("Cannot run probe {}: {}", self.program, e);
                0.0
            }
        }
    }
}

/// Parse a frame rate such as `25`, `29.97` or `30000/1001`.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let fps = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse().ok()?,
    };

    (fps.is_finite() && fps > 0.0).then_some(fps)
}

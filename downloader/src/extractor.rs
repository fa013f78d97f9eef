/// Extraction-library client: shells out to yt-dlp for the full rendition
/// dump the streaming resolver selects from.
use serde::Deserialize;
use tokio::process::Command;

use vidpipe_shared::errors::{VidpipeError, VidpipeResult};

pub const DEFAULT_YTDLP_BIN: &str = "yt-dlp";

/// One encoded variant (container, bitrate, resolution) offered upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct Rendition {
    #[serde(default)]
    pub format_id: String,
    pub url: String,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    /// Audio bitrate in kbit/s.
    #[serde(default)]
    pub abr: Option<f64>,
    /// Total bitrate in kbit/s.
    #[serde(default)]
    pub tbr: Option<f64>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl Rendition {
    pub fn has_audio(&self) -> bool {
        matches!(self.acodec.as_deref(), Some(c) if c != "none")
    }

    pub fn has_video(&self) -> bool {
        matches!(self.vcodec.as_deref(), Some(c) if c != "none")
    }
}

/// Full metadata dump for one video.
#[derive(Debug, Clone, Deserialize)]
pub struct FullInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub formats: Vec<Rendition>,
}

/// Client around the yt-dlp binary.
pub struct YtDlpExtractor {
    bin: String,
    cookies_file: Option<std::path::PathBuf>,
}

impl YtDlpExtractor {
    pub fn new(bin: impl Into<String>, cookies_file: Option<std::path::PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            cookies_file,
        }
    }

    /// Dump full metadata for a URL (`yt-dlp -J`).
    pub async fn full_info(&self, url: &str) -> VidpipeResult<FullInfo> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("--no-warnings").arg("--no-playlist").arg("-J");
        if let Some(ref path) = self.cookies_file {
            cmd.arg("--cookies").arg(path);
        }
        cmd.arg(url);

        let output = cmd.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let first = stderr.lines().next().unwrap_or("extractor failed");
            return Err(VidpipeError::Extractor(first.to_string()));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

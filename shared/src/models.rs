/// Data model shared across vidpipe crates.
use serde::{Deserialize, Serialize};

use crate::errors::VidpipeError;

/// Requested download format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Mp3,
    Mp4,
}

impl MediaFormat {
    /// Parse the query-string literal. Anything other than the two
    /// recognized values is a client error.
    pub fn parse(s: &str) -> Result<Self, VidpipeError> {
        match s {
            "mp3" => Ok(MediaFormat::Mp3),
            "mp4" => Ok(MediaFormat::Mp4),
            other => Err(VidpipeError::InvalidInput(format!(
                "unrecognized format: {other}"
            ))),
        }
    }

    /// MIME type of the outbound response body.
    pub fn content_type(&self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "audio/mpeg",
            MediaFormat::Mp4 => "video/mp4",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "mp3",
            MediaFormat::Mp4 => "mp4",
        }
    }
}

impl std::fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Metadata for one queued video. Produced fresh per request, never cached
/// or mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    /// Duration in seconds; 0 when the secondary lookup was unavailable.
    pub duration: u64,
    pub duration_string: String,
    pub url: String,
}

/// Format a duration in seconds as `M:SS`, with an hours prefix past 1h.
pub fn format_duration(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Reduce a video title to a safe download filename stem.
///
/// Keeps ASCII letters, digits, underscore, hyphen, and space; everything
/// else (emoji, slashes, quotes) is dropped, then the edges are trimmed.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' '))
        .collect::<String>()
        .trim()
        .to_string()
}

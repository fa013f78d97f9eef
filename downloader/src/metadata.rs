/// Metadata provider client: resolves a video URL to title, thumbnail, and
/// duration via a public oEmbed-style endpoint. Re-fetches on every call;
/// nothing is cached.
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use vidpipe_shared::errors::{VidpipeError, VidpipeResult};
use vidpipe_shared::models::{format_duration, VideoInfo};

/// Default public oEmbed endpoint.
pub const DEFAULT_OEMBED_URL: &str = "https://www.youtube.com/oembed";

/// Matches both accepted URL shapes: the short-link path form
/// (`youtu.be/<id>`) and the query-parameter form (`watch?v=<id>`).
/// Any non-empty id is accepted; length is not validated here.
static VIDEO_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:https?://)?(?:www\.)?(?:youtube\.com/watch\?(?:[^#\s]*&)?v=|youtu\.be/)([a-zA-Z0-9_-]+)"
    ).unwrap()
});

/// Extract the platform video id from a URL.
pub fn extract_video_id(url: &str) -> VidpipeResult<String> {
    VIDEO_ID_RE
        .captures(url)
        .map(|cap| cap[1].to_string())
        .ok_or_else(|| VidpipeError::InvalidUrl(url.to_string()))
}

/// Resolves a source URL to [`VideoInfo`].
#[async_trait]
pub trait InfoProvider: Send + Sync {
    async fn resolve_info(&self, url: &str) -> VidpipeResult<VideoInfo>;
}

#[derive(Deserialize)]
struct OembedPayload {
    title: String,
}

#[derive(Deserialize)]
struct DetailPayload {
    duration: u64,
}

/// oEmbed-backed metadata client.
pub struct OembedClient {
    client: reqwest::Client,
    oembed_base: String,
    /// Optional secondary endpoint supplying the duration. Failures here
    /// degrade the result (duration stays 0) instead of failing the call.
    detail_base: Option<String>,
}

impl OembedClient {
    pub fn new(oembed_base: impl Into<String>, detail_base: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            oembed_base: oembed_base.into(),
            detail_base,
        }
    }

    async fn fetch_duration(&self, id: &str) -> Option<u64> {
        let base = self.detail_base.as_ref()?;
        let resp = self.client.get(base).query(&[("id", id)]).send().await.ok()?;
        if !resp.status().is_success() {
            debug!("duration lookup for {} returned {}", id, resp.status());
            return None;
        }
        resp.json::<DetailPayload>().await.ok().map(|d| d.duration)
    }
}

#[async_trait]
impl InfoProvider for OembedClient {
    async fn resolve_info(&self, url: &str) -> VidpipeResult<VideoInfo> {
        let id = extract_video_id(url)?;

        let resp = self
            .client
            .get(&self.oembed_base)
            .query(&[("url", url), ("format", "json")])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(VidpipeError::MetadataFetch(resp.status().as_u16()));
        }

        let payload: OembedPayload = resp.json().await?;
        let duration = self.fetch_duration(&id).await.unwrap_or(0);

        Ok(VideoInfo {
            thumbnail: format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg"),
            duration_string: format_duration(duration),
            title: payload.title,
            duration,
            url: url.to_string(),
            id,
        })
    }
}

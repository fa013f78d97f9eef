/// Download resolvers: redirect mode hands the client a direct URL from an
/// external conversion service; streaming mode extracts renditions locally
/// and opens a live byte stream for the relay to drain. The mode is fixed
/// per deployment, never per request.
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use vidpipe_shared::errors::{VidpipeError, VidpipeResult};
use vidpipe_shared::models::MediaFormat;

use crate::cookies::CookieBundle;
use crate::extractor::{Rendition, YtDlpExtractor};
use crate::relay::{ByteSource, HttpByteSource};

pub const DEFAULT_DOWNLOAD_SERVICE_URL: &str = "https://api.cobalt.tools/";

/// Outcome of a resolution call. Exactly one variant per call; the
/// transport layer branches on which one it received.
pub enum DownloadResult {
    /// The caller fetches the bytes itself from a time-limited direct URL.
    Redirect { url: String },
    /// The server relays the bytes; the source is live and exclusively
    /// owned by the response that carries it.
    Stream {
        source: Box<dyn ByteSource>,
        content_type: &'static str,
    },
}

#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, url: &str, format: MediaFormat) -> VidpipeResult<DownloadResult>;
}

// ====== REDIRECT MODE ======

/// Resolver backed by an external conversion/download service.
pub struct RedirectResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl RedirectResolver {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

/// Interpret a success-status service payload: an embedded error status
/// still counts as failure, with the upstream code as the message.
fn extract_direct_url(payload: &serde_json::Value) -> VidpipeResult<String> {
    if payload.get("status").and_then(|s| s.as_str()) == Some("error") {
        let code = payload
            .pointer("/error/code")
            .and_then(|c| c.as_str())
            .unwrap_or("download failed");
        return Err(VidpipeError::DownloadService(code.to_string()));
    }

    payload
        .get("url")
        .and_then(|u| u.as_str())
        .map(str::to_string)
        .ok_or_else(|| VidpipeError::DownloadService("no url in service response".into()))
}

#[async_trait]
impl Resolver for RedirectResolver {
    async fn resolve(&self, url: &str, format: MediaFormat) -> VidpipeResult<DownloadResult> {
        let body = match format {
            MediaFormat::Mp3 => json!({
                "url": url,
                "downloadMode": "audio",
                "audioFormat": "mp3",
            }),
            MediaFormat::Mp4 => json!({
                "url": url,
                "videoQuality": "1080",
            }),
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = if text.is_empty() {
                "download service unavailable".to_string()
            } else {
                text
            };
            return Err(VidpipeError::DownloadService(message));
        }

        let payload: serde_json::Value = resp.json().await?;
        let direct = extract_direct_url(&payload)?;

        Ok(DownloadResult::Redirect { url: direct })
    }
}

// ====== STREAMING MODE ======

/// Pick the rendition to stream for the requested format.
///
/// Audio wants audio-only renditions by descending audio bitrate; video
/// wants combined audio+video renditions by descending height, then total
/// bitrate. `format_id` (ascending) breaks remaining ties so selection is
/// deterministic even when the upstream list order changes.
pub fn select_rendition(formats: &[Rendition], format: MediaFormat) -> Option<&Rendition> {
    match format {
        MediaFormat::Mp3 => formats
            .iter()
            .filter(|r| r.has_audio() && !r.has_video())
            .max_by(|a, b| {
                a.abr
                    .unwrap_or(0.0)
                    .partial_cmp(&b.abr.unwrap_or(0.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.format_id.cmp(&a.format_id))
            }),
        MediaFormat::Mp4 => formats
            .iter()
            .filter(|r| r.has_audio() && r.has_video())
            .max_by(|a, b| {
                a.height
                    .unwrap_or(0)
                    .cmp(&b.height.unwrap_or(0))
                    .then_with(|| {
                        a.tbr
                            .unwrap_or(0.0)
                            .partial_cmp(&b.tbr.unwrap_or(0.0))
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .then_with(|| b.format_id.cmp(&a.format_id))
            }),
    }
}

/// Streaming-mode resolver: local extraction plus a live byte stream.
pub struct StreamingResolver {
    extractor: YtDlpExtractor,
    client: reqwest::Client,
    cookie_header: Option<String>,
}

impl StreamingResolver {
    pub fn new(extractor: YtDlpExtractor, cookies: Option<&CookieBundle>) -> Self {
        // No overall timeout here: the client drains this connection for
        // the whole transfer.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            extractor,
            client,
            cookie_header: cookies.map(CookieBundle::header_value),
        }
    }
}

#[async_trait]
impl Resolver for StreamingResolver {
    async fn resolve(&self, url: &str, format: MediaFormat) -> VidpipeResult<DownloadResult> {
        let info = self.extractor.full_info(url).await?;

        let rendition = select_rendition(&info.formats, format)
            .ok_or_else(|| VidpipeError::Extractor("no matching rendition".into()))?;

        info!(
            "streaming {} as {} via rendition {}",
            info.id, format, rendition.format_id
        );

        let mut req = self.client.get(&rendition.url);
        if let Some(ref header) = self.cookie_header {
            req = req.header(reqwest::header::COOKIE, header.clone());
        }
        let resp = req.send().await?;

        if !resp.status().is_success() {
            return Err(VidpipeError::DownloadService(format!(
                "rendition fetch returned HTTP {}",
                resp.status().as_u16()
            )));
        }

        Ok(DownloadResult::Stream {
            source: Box::new(HttpByteSource::new(resp)),
            content_type: format.content_type(),
        })
    }
}

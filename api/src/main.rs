/// Vidpipe API Server
///
/// HTTP surface for the vidpipe queue UI: batch metadata lookups plus
/// audio/video downloads in redirect or streaming mode.
mod routes;

use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use routes::AppState;
use vidpipe_downloader::cookies::CookieBundle;
use vidpipe_downloader::extractor::{YtDlpExtractor, DEFAULT_YTDLP_BIN};
use vidpipe_downloader::metadata::{OembedClient, DEFAULT_OEMBED_URL};
use vidpipe_downloader::resolver::{
    RedirectResolver, Resolver, StreamingResolver, DEFAULT_DOWNLOAD_SERVICE_URL,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidpipe_api=info,tower_http=info".into()),
        )
        .init();

    // Config
    let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let api_port: u16 = std::env::var("API_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);
    let resolver_mode = std::env::var("RESOLVER_MODE").unwrap_or_else(|_| "redirect".to_string());
    let service_url = std::env::var("DOWNLOAD_SERVICE_URL")
        .unwrap_or_else(|_| DEFAULT_DOWNLOAD_SERVICE_URL.to_string());
    let oembed_url = std::env::var("OEMBED_URL").unwrap_or_else(|_| DEFAULT_OEMBED_URL.to_string());
    let detail_url = std::env::var("METADATA_DETAIL_URL").ok();
    let ytdlp_bin = std::env::var("YTDLP_BIN").unwrap_or_else(|_| DEFAULT_YTDLP_BIN.to_string());

    // Optional session cookies; malformed data degrades to "no credentials".
    let cookies = CookieBundle::from_env();
    if cookies.is_some() {
        info!("session cookie bundle loaded");
    }

    // The resolver strategy is fixed per deployment, not per request.
    let resolver: Arc<dyn Resolver> = if resolver_mode == "streaming" {
        let cookies_file = cookies.as_ref().and_then(|bundle| {
            match bundle.materialize(&std::env::temp_dir()) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("cannot materialize cookie file: {}", e);
                    None
                }
            }
        });
        let extractor = YtDlpExtractor::new(ytdlp_bin, cookies_file);
        Arc::new(StreamingResolver::new(extractor, cookies.as_ref()))
    } else {
        Arc::new(RedirectResolver::new(service_url))
    };
    info!(
        "resolver mode: {}",
        if resolver_mode == "streaming" { "streaming" } else { "redirect" }
    );

    // App state
    let state = Arc::new(AppState {
        info: Arc::new(OembedClient::new(oembed_url, detail_url)),
        resolver,
    });

    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Router
    let app = routes::build_router(state).layer(cors);

    // Bind
    let addr = format!("{}:{}", api_host, api_port);
    info!("Vidpipe API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Optional session-cookie bundle attached to metadata and streaming calls.
///
/// Supplied as base64-encoded JSON through `VIDPIPE_COOKIES`, or as a plain
/// JSON file via `VIDPIPE_COOKIES_FILE`. Loaded once at startup; malformed
/// data degrades to "no credentials" instead of failing.
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use tracing::warn;

pub const COOKIES_ENV: &str = "VIDPIPE_COOKIES";
pub const COOKIES_FILE_ENV: &str = "VIDPIPE_COOKIES_FILE";

#[derive(Debug, Clone, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
}

/// Process-wide credential bundle, injected into the resolvers that need it.
#[derive(Debug, Clone)]
pub struct CookieBundle {
    cookies: Vec<SessionCookie>,
}

impl CookieBundle {
    /// Load the bundle from the environment. Returns `None` when nothing is
    /// configured or the configured data is malformed.
    pub fn from_env() -> Option<Self> {
        if let Ok(b64) = std::env::var(COOKIES_ENV) {
            return Self::decode(&b64);
        }
        if let Ok(path) = std::env::var(COOKIES_FILE_ENV) {
            return match std::fs::read_to_string(&path) {
                Ok(json) => Self::from_json(&json),
                Err(e) => {
                    warn!("cannot read cookie file {}: {}", path, e);
                    None
                }
            };
        }
        None
    }

    /// Decode a base64-wrapped JSON bundle.
    pub fn decode(b64: &str) -> Option<Self> {
        let raw = match general_purpose::STANDARD.decode(b64.trim()) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("cookie bundle is not valid base64: {}", e);
                return None;
            }
        };
        match std::str::from_utf8(&raw) {
            Ok(json) => Self::from_json(json),
            Err(e) => {
                warn!("cookie bundle is not valid UTF-8: {}", e);
                None
            }
        }
    }

    fn from_json(json: &str) -> Option<Self> {
        match serde_json::from_str::<Vec<SessionCookie>>(json) {
            Ok(cookies) if !cookies.is_empty() => Some(Self { cookies }),
            Ok(_) => None,
            Err(e) => {
                warn!("cookie bundle is not valid JSON: {}", e);
                None
            }
        }
    }

    /// Render as a `Cookie` request header value.
    pub fn header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Render in Netscape cookie-file format for the extraction binary.
    pub fn to_netscape(&self) -> String {
        let mut out = String::from("# Netscape HTTP Cookie File\n");
        for c in &self.cookies {
            let domain = c.domain.as_deref().unwrap_or(".youtube.com");
            out.push_str(&format!("{}\tTRUE\t/\tTRUE\t0\t{}\t{}\n", domain, c.name, c.value));
        }
        out
    }

    /// Write the bundle as a Netscape file, returning its path.
    pub fn materialize(&self, dir: &std::path::Path) -> std::io::Result<std::path::PathBuf> {
        let path = dir.join(format!("vidpipe-cookies-{}.txt", std::process::id()));
        std::fs::write(&path, self.to_netscape())?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(json: &str) -> String {
        general_purpose::STANDARD.encode(json)
    }

    #[test]
    fn test_decode_valid_bundle() {
        let b64 = encode(r#"[{"name":"SID","value":"a1"},{"name":"HSID","value":"b2","domain":".example.com"}]"#);
        let bundle = CookieBundle::decode(&b64).expect("bundle should parse");
        assert_eq!(bundle.header_value(), "SID=a1; HSID=b2");
    }

    #[test]
    fn test_malformed_base64_degrades_to_none() {
        assert!(CookieBundle::decode("!!! not base64 !!!").is_none());
    }

    #[test]
    fn test_malformed_json_degrades_to_none() {
        assert!(CookieBundle::decode(&encode("not json")).is_none());
        assert!(CookieBundle::decode(&encode(r#"{"name":"SID"}"#)).is_none());
    }

    #[test]
    fn test_empty_bundle_degrades_to_none() {
        assert!(CookieBundle::decode(&encode("[]")).is_none());
    }

    #[test]
    fn test_netscape_rendering() {
        let b64 = encode(r#"[{"name":"SID","value":"a1","domain":".youtube.com"}]"#);
        let bundle = CookieBundle::decode(&b64).unwrap();
        let netscape = bundle.to_netscape();
        assert!(netscape.starts_with("# Netscape HTTP Cookie File\n"));
        assert!(netscape.contains(".youtube.com\tTRUE\t/\tTRUE\t0\tSID\ta1\n"));
    }
}

/// Download engine for vidpipe: metadata lookup, format resolution, and the
/// byte-stream relay that feeds outbound HTTP responses.
pub mod cookies;
pub mod extractor;
pub mod metadata;
pub mod relay;
pub mod resolver;

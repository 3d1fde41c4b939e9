//! Image byte fetcher with content sniffing.
//!
//! Search results routinely point at dead links, HTML interstitials, and
//! tracking pixels. The fetcher downloads candidate bytes with browser-like
//! headers and rejects anything that is not a plausibly-sized real image
//! before recognition spends budget on it.

use crate::config::OracleConfig;
use crate::error::{OracleError, Result};
use reqwest::Client;

/// Minimum plausible image size in bytes.
const MIN_IMAGE_BYTES: usize = 100;

/// Maximum accepted image size in bytes (10 MiB).
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Image format detected from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl SniffedFormat {
    /// Detect a supported image format from the first bytes of a body.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 12 {
            return None;
        }
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(SniffedFormat::Jpeg);
        }
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(SniffedFormat::Png);
        }
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            return Some(SniffedFormat::Gif);
        }
        if bytes.starts_with(b"RIFF") && bytes[8..12] == *b"WEBP" {
            return Some(SniffedFormat::Webp);
        }
        None
    }
}

/// Downloads image bytes and validates that they are a usable photograph.
#[derive(Clone)]
pub struct ImageFetcher {
    client: Client,
    user_agent: String,
}

impl ImageFetcher {
    /// Create a new fetcher from oracle configuration (timeout + user agent).
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(OracleError::HttpError)?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }

    /// Fetch and validate image bytes.
    ///
    /// Sends a browser-like `User-Agent` and a `Referer` derived from the
    /// image host. Rejects HTML-looking bodies, bodies outside the size
    /// bounds, and bodies whose magic bytes are not JPEG/PNG/GIF/WEBP.
    pub async fn fetch(&self, image_url: &str) -> Result<(Vec<u8>, SniffedFormat)> {
        let referer = derive_referer(image_url);

        let mut request = self
            .client
            .get(image_url)
            .header("user-agent", &self.user_agent)
            .header("accept", "image/avif,image/webp,image/apng,image/*,*/*;q=0.8");
        if let Some(ref referer) = referer {
            request = request.header("referer", referer);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout(format!("fetching {}", image_url))
            } else {
                OracleError::HttpError(e)
            }
        })?;

        if !response.status().is_success() {
            return Err(OracleError::ProviderError(format!(
                "image fetch returned {} for {}",
                response.status(),
                image_url
            )));
        }

        let bytes = response.bytes().await.map_err(OracleError::HttpError)?;
        validate_image_bytes(&bytes).map(|format| (bytes.to_vec(), format))
    }
}

/// Validate a downloaded body as a usable image and report its format.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<SniffedFormat> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(OracleError::UnsupportedMedia(format!(
            "body too small ({} bytes)",
            bytes.len()
        )));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(OracleError::UnsupportedMedia(format!(
            "body too large ({} bytes)",
            bytes.len()
        )));
    }
    if looks_like_html(bytes) {
        return Err(OracleError::UnsupportedMedia("body looks like HTML".to_string()));
    }
    SniffedFormat::sniff(bytes)
        .ok_or_else(|| OracleError::UnsupportedMedia("unrecognised magic bytes".to_string()))
}

/// True when the body starts with HTML markup (case-insensitive, after
/// leading whitespace or a BOM).
fn looks_like_html(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace() && *b != 0xEF && *b != 0xBB && *b != 0xBF)
        .unwrap_or(0);
    let head = &bytes[start..bytes.len().min(start + 64)];
    let lowered: Vec<u8> = head.iter().map(|b| b.to_ascii_lowercase()).collect();
    lowered.starts_with(b"<!doctype") || lowered.starts_with(b"<html") || lowered.starts_with(b"<head")
}

/// Derive an origin-level `Referer` from the image URL host.
fn derive_referer(image_url: &str) -> Option<String> {
    let rest = image_url
        .strip_prefix("https://")
        .or_else(|| image_url.strip_prefix("http://"))?;
    let host = rest.split('/').next()?;
    if host.is_empty() {
        return None;
    }
    let scheme = if image_url.starts_with("https://") { "https" } else { "http" };
    Some(format!("{}://{}/", scheme, host))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(prefix: &[u8]) -> Vec<u8> {
        let mut v = prefix.to_vec();
        v.resize(MIN_IMAGE_BYTES + 16, 0);
        v
    }

    #[test]
    fn test_sniff_jpeg() {
        assert_eq!(
            SniffedFormat::sniff(&padded(&[0xFF, 0xD8, 0xFF, 0xE0])),
            Some(SniffedFormat::Jpeg)
        );
    }

    #[test]
    fn test_sniff_png() {
        assert_eq!(
            SniffedFormat::sniff(&padded(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])),
            Some(SniffedFormat::Png)
        );
    }

    #[test]
    fn test_sniff_webp() {
        let mut body = b"RIFF\x00\x00\x00\x00WEBP".to_vec();
        body.resize(MIN_IMAGE_BYTES + 16, 0);
        assert_eq!(SniffedFormat::sniff(&body), Some(SniffedFormat::Webp));
    }

    #[test]
    fn test_validate_rejects_small_body() {
        let err = validate_image_bytes(&[0xFF, 0xD8, 0xFF]).unwrap_err();
        assert!(matches!(err, OracleError::UnsupportedMedia(_)));
    }

    #[test]
    fn test_validate_rejects_html() {
        let body = padded(b"  <!DOCTYPE html><html>");
        let err = validate_image_bytes(&body).unwrap_err();
        assert!(matches!(err, OracleError::UnsupportedMedia(_)));
    }

    #[test]
    fn test_validate_rejects_unknown_magic() {
        let body = padded(b"MZP\x00binarystuff");
        let err = validate_image_bytes(&body).unwrap_err();
        assert!(matches!(err, OracleError::UnsupportedMedia(_)));
    }

    #[test]
    fn test_validate_accepts_gif() {
        assert_eq!(
            validate_image_bytes(&padded(b"GIF89a")).unwrap(),
            SniffedFormat::Gif
        );
    }

    #[test]
    fn test_derive_referer() {
        assert_eq!(
            derive_referer("https://cdn.example.com/a/b.jpg"),
            Some("https://cdn.example.com/".to_string())
        );
        assert_eq!(derive_referer("not-a-url"), None);
    }
}

//! SERP-style image search client.
//!
//! Queries a Google-Images-compatible search API and maps the response into
//! [`ImageHit`](crate::ImageHit) records.

use crate::config::OracleConfig;
use crate::error::{OracleError, Result};
use crate::{ImageHit, ImageSearch};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Image search client over a SERP HTTP API.
#[derive(Clone)]
pub struct SerpImageSearch {
    config: OracleConfig,
    client: Client,
    /// Maximum number of hits returned per query.
    limit: usize,
}

impl SerpImageSearch {
    /// Create a new search client with the given configuration.
    pub fn new(config: OracleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(OracleError::HttpError)?;
        Ok(Self {
            config,
            client,
            limit: 10,
        })
    }

    /// Set the maximum number of hits returned per query.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[async_trait]
impl ImageSearch for SerpImageSearch {
    async fn search(&self, query: &str) -> Result<Vec<ImageHit>> {
        let url = format!("{}/search.json", self.config.base_url);

        tracing::debug!(query, "image search");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("engine", "google_images"),
                ("q", query),
                ("api_key", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(format!("image search for {:?}", query))
                } else {
                    OracleError::HttpError(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => OracleError::AuthenticationError(error_text),
                429 => OracleError::RateLimitExceeded(error_text),
                _ => OracleError::ProviderError(format!(
                    "image search error {}: {}",
                    status, error_text
                )),
            });
        }

        let body: SerpResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        let hits = body
            .images_results
            .into_iter()
            .filter_map(|r| {
                let image_url = r.original?;
                Some(ImageHit {
                    thumbnail_url: r.thumbnail.unwrap_or_else(|| image_url.clone()),
                    context_url: r.link.unwrap_or_default(),
                    title: r.title.unwrap_or_default(),
                    image_url,
                })
            })
            .take(self.limit)
            .collect();

        Ok(hits)
    }
}

// SERP API types
#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    images_results: Vec<SerpImage>,
}

#[derive(Debug, Deserialize)]
struct SerpImage {
    original: Option<String>,
    thumbnail: Option<String>,
    link: Option<String>,
    title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = OracleConfig::new("test-key", "https://serpapi.com");
        let _client = SerpImageSearch::new(config).unwrap().with_limit(5);
    }

    #[test]
    fn test_response_mapping_skips_hits_without_original() {
        let body: SerpResponse = serde_json::from_str(
            r#"{
                "images_results": [
                    {"original": "https://img/a.jpg", "thumbnail": "https://img/a_t.jpg",
                     "link": "https://page/a", "title": "A"},
                    {"thumbnail": "https://img/b_t.jpg", "link": "https://page/b", "title": "B"}
                ]
            }"#,
        )
        .unwrap();

        let usable: Vec<_> = body
            .images_results
            .into_iter()
            .filter(|r| r.original.is_some())
            .collect();
        assert_eq!(usable.len(), 1);
    }

    #[test]
    fn test_response_tolerates_missing_results() {
        let body: SerpResponse = serde_json::from_str("{}").unwrap();
        assert!(body.images_results.is_empty());
    }
}

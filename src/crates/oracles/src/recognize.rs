//! Celebrity face recognition client.
//!
//! Posts an image URL to a hosted recognition API and maps the detected
//! public figures into [`FaceDetection`](crate::FaceDetection) records.

use crate::config::OracleConfig;
use crate::error::{OracleError, Result};
use crate::{FaceDetection, FaceRecognizer};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Face recognition client over a celebrity-recognition HTTP API.
#[derive(Clone)]
pub struct HttpFaceRecognizer {
    config: OracleConfig,
    client: Client,
}

impl HttpFaceRecognizer {
    /// Create a new recognizer client with the given configuration.
    pub fn new(config: OracleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(OracleError::HttpError)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl FaceRecognizer for HttpFaceRecognizer {
    async fn recognize(&self, image_url: &str) -> Result<Vec<FaceDetection>> {
        let url = format!("{}/v1/celebrities/recognize", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.config.api_key))
            .json(&RecognizeRequest { image_url })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(format!("recognition of {}", image_url))
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
                    "recognition error {}: {}",
                    status, error_text
                )),
            });
        }

        let body: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        let detections = body
            .celebrities
            .into_iter()
            .filter(|c| !c.name.is_empty())
            .map(|c| FaceDetection {
                name: c.name,
                confidence: c.confidence.clamp(0.0, 100.0),
                bbox: c.bounding_box,
            })
            .collect();

        Ok(detections)
    }
}

// Recognition API types
#[derive(Debug, Serialize)]
struct RecognizeRequest<'a> {
    image_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    celebrities: Vec<RecognizedCelebrity>,
}

#[derive(Debug, Deserialize)]
struct RecognizedCelebrity {
    #[serde(default)]
    name: String,
    #[serde(default)]
    confidence: f32,
    bounding_box: Option<[f32; 4]>,
}

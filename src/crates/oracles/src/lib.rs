//! External oracle clients for lenslink.
//!
//! The investigation engine composes three oracles: web image search, face
//! recognition, and a vision scene filter. This crate defines the traits the
//! engine consumes, HTTP implementations for the hosted services, an image
//! byte fetcher with content sniffing, and scripted in-process oracles used
//! by tests and offline runs.

pub mod config;
pub mod error;
pub mod fetch;
pub mod recognize;
pub mod scripted;
pub mod search;

pub use config::OracleConfig;
pub use error::{OracleError, Result};
pub use fetch::{ImageFetcher, SniffedFormat};
pub use recognize::HttpFaceRecognizer;
pub use search::SerpImageSearch;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One result from a web image search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageHit {
    /// Direct URL of the full-size image
    pub image_url: String,
    /// URL of a small thumbnail rendition
    pub thumbnail_url: String,
    /// Page the image was found on
    pub context_url: String,
    /// Title of the hosting page
    pub title: String,
}

/// A face recognised in an image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaceDetection {
    /// Recognised person's name as the provider reports it
    pub name: String,
    /// Recognition confidence in `[0, 100]`
    pub confidence: f32,
    /// Bounding box `[x, y, width, height]` in relative coordinates
    pub bbox: Option<[f32; 4]>,
}

/// Verdict from the vision scene filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneCheck {
    /// True when the image is one photographic scene (not a collage,
    /// side-by-side composite, or screenshot grid)
    pub valid: bool,
    /// Provider's reasoning when the image is rejected
    pub reason: Option<String>,
}

/// Web image search oracle.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Run an image search and return up to a provider-defined number of hits.
    async fn search(&self, query: &str) -> Result<Vec<ImageHit>>;
}

/// Face recognition oracle.
#[async_trait]
pub trait FaceRecognizer: Send + Sync {
    /// Recognise the public figures visible in the image at `image_url`.
    async fn recognize(&self, image_url: &str) -> Result<Vec<FaceDetection>>;
}

/// Vision scene filter oracle.
#[async_trait]
pub trait VisionFilter: Send + Sync {
    /// Decide whether the image depicts a single photographic scene.
    async fn is_single_scene(&self, image_url: &str) -> Result<SceneCheck>;
}

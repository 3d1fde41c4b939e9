//! Scripted in-process oracles.
//!
//! Keyed canned responses with call counters, used by engine and server
//! tests and as offline stand-ins when no provider credentials are set.
//! Lookup is by exact key first, then by substring of the query/URL, so a
//! script can cover families of queries with one entry.

use crate::error::{OracleError, Result};
use crate::{FaceDetection, FaceRecognizer, ImageHit, ImageSearch, SceneCheck, VisionFilter};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scripted image search: query (sub)string → canned hits.
#[derive(Default)]
pub struct ScriptedImageSearch {
    responses: Mutex<HashMap<String, Vec<ImageHit>>>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl ScriptedImageSearch {
    /// Create an empty scripted search (every query returns no hits).
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the hits returned for queries containing `key`.
    pub fn on(self, key: impl Into<String>, hits: Vec<ImageHit>) -> Self {
        self.responses.lock().insert(key.into(), hits);
        self
    }

    /// Number of search calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Queries observed, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl ImageSearch for ScriptedImageSearch {
    async fn search(&self, query: &str) -> Result<Vec<ImageHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(query.to_string());
        Ok(lookup(&self.responses.lock(), query).unwrap_or_default())
    }
}

/// Scripted face recognizer: image URL (sub)string → canned detections.
#[derive(Default)]
pub struct ScriptedFaceRecognizer {
    responses: Mutex<HashMap<String, Vec<FaceDetection>>>,
    failures: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
}

impl ScriptedFaceRecognizer {
    /// Create an empty scripted recognizer (every image yields no faces).
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the detections returned for image URLs containing `key`.
    pub fn on(self, key: impl Into<String>, detections: Vec<FaceDetection>) -> Self {
        self.responses.lock().insert(key.into(), detections);
        self
    }

    /// Script a provider error for image URLs containing `key`.
    pub fn failing_on(self, key: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failures.lock().insert(key.into(), reason.into());
        self
    }

    /// Number of recognition calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceRecognizer for ScriptedFaceRecognizer {
    async fn recognize(&self, image_url: &str) -> Result<Vec<FaceDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = lookup(&self.failures.lock(), image_url) {
            return Err(OracleError::ProviderError(reason));
        }
        Ok(lookup(&self.responses.lock(), image_url).unwrap_or_default())
    }
}

/// Scripted vision filter.
///
/// Defaults to accepting every image; individual URLs (or all of them, via
/// [`rejecting_all`](Self::rejecting_all)) can be scripted as composites.
pub struct ScriptedVisionFilter {
    rejects: Mutex<HashMap<String, String>>,
    reject_all: bool,
    calls: AtomicUsize,
}

impl ScriptedVisionFilter {
    /// Create a filter that accepts every image as a single scene.
    pub fn accepting_all() -> Self {
        Self {
            rejects: Mutex::new(HashMap::new()),
            reject_all: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a filter that rejects every image as a composite.
    pub fn rejecting_all() -> Self {
        Self {
            rejects: Mutex::new(HashMap::new()),
            reject_all: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Script a rejection for image URLs containing `key`.
    pub fn rejecting(self, key: impl Into<String>, reason: impl Into<String>) -> Self {
        self.rejects.lock().insert(key.into(), reason.into());
        self
    }

    /// Number of scene checks made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionFilter for ScriptedVisionFilter {
    async fn is_single_scene(&self, image_url: &str) -> Result<SceneCheck> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_all {
            return Ok(SceneCheck {
                valid: false,
                reason: Some("scripted composite".to_string()),
            });
        }
        match lookup(&self.rejects.lock(), image_url) {
            Some(reason) => Ok(SceneCheck {
                valid: false,
                reason: Some(reason),
            }),
            None => Ok(SceneCheck {
                valid: true,
                reason: None,
            }),
        }
    }
}

/// Exact-key lookup first, then first entry whose key is a substring of the
/// probe (insertion order is not guaranteed; scripts should keep substring
/// keys non-overlapping).
fn lookup<V: Clone>(map: &HashMap<String, V>, probe: &str) -> Option<V> {
    if let Some(v) = map.get(probe) {
        return Some(v.clone());
    }
    map.iter()
        .find(|(k, _)| probe.contains(k.as_str()))
        .map(|(_, v)| v.clone())
}

/// Convenience constructor for a canned [`ImageHit`].
pub fn hit(image_url: &str, context_url: &str) -> ImageHit {
    ImageHit {
        image_url: image_url.to_string(),
        thumbnail_url: format!("{}?thumb=1", image_url),
        context_url: context_url.to_string(),
        title: String::new(),
    }
}

/// Convenience constructor for a canned [`FaceDetection`].
pub fn face(name: &str, confidence: f32) -> FaceDetection {
    FaceDetection {
        name: name.to_string(),
        confidence,
        bbox: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_search_by_substring() {
        let search = ScriptedImageSearch::new().on(
            "Trump Kanye",
            vec![hit("https://img/tk.jpg", "https://page/tk")],
        );

        let hits = search.search("Donald Trump Kanye West photo").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(search.call_count(), 1);
        assert_eq!(search.queries().len(), 1);

        let empty = search.search("unrelated query").await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_scripted_recognizer_failure() {
        let recog = ScriptedFaceRecognizer::new()
            .on("good.jpg", vec![face("Barack Obama", 95.0)])
            .failing_on("bad.jpg", "provider down");

        assert_eq!(recog.recognize("https://img/good.jpg").await.unwrap().len(), 1);
        assert!(recog.recognize("https://img/bad.jpg").await.is_err());
        assert_eq!(recog.call_count(), 2);
    }

    #[tokio::test]
    async fn test_scripted_vision_filter_modes() {
        let accept = ScriptedVisionFilter::accepting_all();
        assert!(accept.is_single_scene("https://img/x.jpg").await.unwrap().valid);

        let reject = ScriptedVisionFilter::rejecting_all();
        let check = reject.is_single_scene("https://img/x.jpg").await.unwrap();
        assert!(!check.valid);
        assert!(check.reason.is_some());

        let selective = ScriptedVisionFilter::accepting_all().rejecting("collage", "grid of photos");
        assert!(!selective
            .is_single_scene("https://img/collage.jpg")
            .await
            .unwrap()
            .valid);
    }
}

//! Confidence calculus for evidence images and paths
//!
//! An image scores the weaker of the two recognitions it contains; a path is
//! only as strong as its weakest edge. The cumulative product is carried
//! alongside the bottleneck for clients that want a compounding view.

/// Score for a single evidence image: the weaker of the two recognition
/// confidences.
pub fn image_score(conf_a: u8, conf_b: u8) -> u8 {
    conf_a.min(conf_b)
}

/// Bottleneck confidence of a path: the minimum edge confidence.
///
/// An empty path (same-node lookup) is fully confident.
pub fn bottleneck(edge_confidences: &[u8]) -> u8 {
    edge_confidences.iter().copied().min().unwrap_or(100)
}

/// Cumulative confidence of a path: the product of per-edge probabilities.
pub fn cumulative(edge_confidences: &[u8]) -> f64 {
    edge_confidences
        .iter()
        .map(|&c| f64::from(c) / 100.0)
        .product()
}

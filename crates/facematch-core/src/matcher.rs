//! Nearest-template classification.

use crate::store::TemplateStore;
use crate::types::{Embedding, MatchResult};
use crate::vector::{self, VectorError};

/// Euclidean distance between a probe and a template.
pub fn distance(a: &Embedding, b: &Embedding) -> Result<f32, VectorError> {
    vector::distance(a.as_slice(), b.as_slice())
}

/// Strategy for comparing a probe embedding against the enrolled templates.
pub trait Matcher: Send + Sync {
    /// Classify `probe`. Accepts only when the nearest distance is strictly
    /// below `threshold`.
    fn compare(
        &self,
        probe: &Embedding,
        store: &TemplateStore,
        threshold: f32,
    ) -> Result<MatchResult, VectorError>;
}

/// Linear scan over every template.
///
/// Equidistant identities resolve to the lexicographically smallest name.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(
        &self,
        probe: &Embedding,
        store: &TemplateStore,
        threshold: f32,
    ) -> Result<MatchResult, VectorError> {
        let Some(dim) = store.dim() else {
            return Ok(MatchResult::no_templates());
        };
        if probe.dim() != dim {
            return Err(VectorError::DimensionMismatch {
                expected: dim,
                actual: probe.dim(),
            });
        }

        // Templates iterate in name order, so only a strictly smaller
        // distance may replace the current best.
        let mut best: Option<(&str, f32)> = None;
        for (identity, template) in store.templates() {
            let dist = distance(probe, template)?;
            if !dist.is_finite() {
                tracing::debug!(identity, "non-finite distance ignored");
                continue;
            }
            let closer = match best {
                None => true,
                Some((_, best_dist)) => dist < best_dist,
            };
            if closer {
                best = Some((identity, dist));
            }
        }

        // Every distance was NaN or infinite: nothing is nearest
        let Some((nearest, dist)) = best else {
            return Ok(MatchResult::no_templates());
        };

        let matched = dist < threshold;
        Ok(MatchResult {
            matched,
            distance: dist,
            identity: matched.then(|| nearest.to_string()),
            nearest: Some(nearest.to_string()),
        })
    }
}

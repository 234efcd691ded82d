use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label reported for a probe that matched no enrolled identity.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Face embedding vector (512-dimensional for FaceNet).
///
/// Immutable once created; serialized as a plain array of numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Number of components.
    pub fn dim(&self) -> usize {
        self.values.len()
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.values
    }
}

/// Pixel bounding box of a detected face, as corners `(x1, y1)`-`(x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Clamp the box to a `width` x `height` frame.
    ///
    /// Returns `None` when the clamped box is degenerate (`x2 <= x1` or `y2 <= y1`).
    pub fn clamp(&self, width: u32, height: u32) -> Option<Self> {
        let w = i32::try_from(width).unwrap_or(i32::MAX);
        let h = i32::try_from(height).unwrap_or(i32::MAX);
        let clamped = Self {
            x1: self.x1.max(0),
            y1: self.y1.max(0),
            x2: self.x2.min(w),
            y2: self.y2.min(h),
        };
        if clamped.x2 <= clamped.x1 || clamped.y2 <= clamped.y1 {
            None
        } else {
            Some(clamped)
        }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1).max(0) as u32
    }
}

/// Raw enrollment samples: identity name → ordered embeddings.
///
/// This is what gets persisted; templates are always derived from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrollmentData {
    samples: BTreeMap<String, Vec<Embedding>>,
}

impl EnrollmentData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the samples for `identity`, replacing any previous set.
    pub fn insert(&mut self, identity: impl Into<String>, embeddings: Vec<Embedding>) {
        self.samples.insert(identity.into(), embeddings);
    }

    pub fn get(&self, identity: &str) -> Option<&[Embedding]> {
        self.samples.get(identity).map(Vec::as_slice)
    }

    /// Identities with their samples, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Embedding])> {
        self.samples.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Result of matching a probe embedding against the template store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub matched: bool,
    /// Euclidean distance to the nearest template (`+inf` for an empty store).
    pub distance: f32,
    /// Accepted identity, set only when `matched`.
    pub identity: Option<String>,
    /// Nearest identity regardless of the threshold, for diagnostics.
    pub nearest: Option<String>,
}

impl MatchResult {
    /// Result for a store with no templates.
    pub fn no_templates() -> Self {
        Self {
            matched: false,
            distance: f32::INFINITY,
            identity: None,
            nearest: None,
        }
    }

    /// The accepted identity, or [`UNKNOWN_LABEL`].
    pub fn label(&self) -> &str {
        self.identity.as_deref().unwrap_or(UNKNOWN_LABEL)
    }
}

/// One labeled face in a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceMatch {
    /// Detected region, clamped to the frame.
    pub region: BoundingBox,
    pub result: MatchResult,
}

/// External face detection capability.
pub trait FaceDetector {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Return face boxes for `frame`, possibly empty or overlapping.
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<BoundingBox>, Self::Error>;
}

/// External embedding capability.
pub trait FaceEmbedder {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Side length of the square face image `embed` expects.
    fn input_size(&self) -> u32;

    /// Map a face image of `input_size()` x `input_size()` to an embedding.
    fn embed(&mut self, face: &RgbImage) -> Result<Embedding, Self::Error>;

    /// Length of every embedding this model produces, when known up front.
    fn output_dim(&self) -> Option<usize> {
        None
    }
}

//! facematch-core — Face embedding templates and nearest-template matching.
//!
//! Detection and embedding are external capabilities behind the
//! [`FaceDetector`] and [`FaceEmbedder`] traits; this crate owns template
//! aggregation, the accept/reject rule, and the enrollment and per-frame
//! recognition pipelines around them.

pub mod enrollment;
pub mod face;
pub mod matcher;
pub mod persist;
pub mod recognition;
pub mod store;
pub mod types;
pub mod vector;

pub use enrollment::{enroll_directory, enroll_identity, EnrollmentError};
pub use matcher::{EuclideanMatcher, Matcher};
pub use recognition::recognize_frame;
pub use store::{SharedTemplates, TemplateError, TemplateStore};
pub use types::{
    BoundingBox, Embedding, EnrollmentData, FaceDetector, FaceEmbedder, FaceMatch, MatchResult,
    UNKNOWN_LABEL,
};
pub use vector::VectorError;

//! facematch-models — ONNX Runtime implementations of the face capabilities.
//!
//! SCRFD for detection and FaceNet (InceptionResnetV1, VGGFace2) for
//! embeddings, both on CPU.

pub mod detector;
pub mod embedder;

pub use detector::{DetectorError, ScrfdDetector};
pub use embedder::{EmbedderError, FaceNetEmbedder, FACENET_EMBEDDING_DIM};

/// File name of the SCRFD detection model inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";

/// File name of the FaceNet embedding model inside the model directory.
pub const EMBEDDER_MODEL_FILE: &str = "facenet_vggface2.onnx";

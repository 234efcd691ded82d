//! FaceNet face embedder via ONNX Runtime.
//!
//! InceptionResnetV1 trained on VGGFace2, exported to ONNX. Maps a 160×160
//! RGB face crop to a 512-dimensional L2-normalized embedding.

use facematch_core::vector;
use facematch_core::{Embedding, FaceEmbedder};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (different from SCRFD!) ---
const FACENET_INPUT_SIZE: usize = 160;
const FACENET_MEAN: f32 = 127.5;
const FACENET_STD: f32 = 127.5; // maps [0, 255] onto [-1, 1]
pub const FACENET_EMBEDDING_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("model file not found: {0} — export InceptionResnetV1 (vggface2) to ONNX and place it in the model directory")]
    ModelNotFound(String),
    #[error("face image must be {expected}x{expected}, got {width}x{height}")]
    InvalidInput {
        expected: usize,
        width: u32,
        height: u32,
    },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// FaceNet-based face embedder.
pub struct FaceNetEmbedder {
    session: Session,
}

impl FaceNetEmbedder {
    /// Load the FaceNet ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EmbedderError> {
        if !Path::new(model_path).exists() {
            return Err(EmbedderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded FaceNet model"
        );

        Ok(Self { session })
    }

    /// Preprocess a 160x160 RGB face crop into a NCHW float tensor.
    fn preprocess(face: &RgbImage) -> Array4<f32> {
        let size = FACENET_INPUT_SIZE;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for (x, y, pixel) in face.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            if x >= size || y >= size {
                continue;
            }
            for c in 0..3 {
                tensor[[0, c, y, x]] = (f32::from(pixel[c]) - FACENET_MEAN) / FACENET_STD;
            }
        }

        tensor
    }
}

impl FaceEmbedder for FaceNetEmbedder {
    type Error = EmbedderError;

    fn input_size(&self) -> u32 {
        FACENET_INPUT_SIZE as u32
    }

    fn output_dim(&self) -> Option<usize> {
        Some(FACENET_EMBEDDING_DIM)
    }

    fn embed(&mut self, face: &RgbImage) -> Result<Embedding, EmbedderError> {
        let (width, height) = face.dimensions();
        if (width as usize, height as usize) != (FACENET_INPUT_SIZE, FACENET_INPUT_SIZE) {
            return Err(EmbedderError::InvalidInput {
                expected: FACENET_INPUT_SIZE,
                width,
                height,
            });
        }

        let input = Self::preprocess(face);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let raw: Vec<f32> = raw_data.to_vec();

        if raw.len() != FACENET_EMBEDDING_DIM {
            return Err(EmbedderError::InferenceFailed(format!(
                "expected {FACENET_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding::new(l2_normalize(raw)))
    }
}

/// Scale to unit length; the zero vector is returned unchanged.
fn l2_normalize(raw: Vec<f32>) -> Vec<f32> {
    let norm = vector::norm(&raw);
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn face(pixel: [u8; 3]) -> RgbImage {
        let size = FACENET_INPUT_SIZE as u32;
        RgbImage::from_pixel(size, size, Rgb(pixel))
    }

    #[test]
    fn test_preprocess_output_shape() {
        let tensor = FaceNetEmbedder::preprocess(&face([128, 128, 128]));
        assert_eq!(tensor.shape(), &[1, 3, FACENET_INPUT_SIZE, FACENET_INPUT_SIZE]);
    }

    #[test]
    fn test_preprocess_normalization_range() {
        let tensor = FaceNetEmbedder::preprocess(&face([0, 255, 128]));
        assert!((tensor[[0, 0, 5, 5]] + 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 5, 5]] - 1.0).abs() < 1e-6);
        let expected = (128.0 - FACENET_MEAN) / FACENET_STD;
        assert!((tensor[[0, 2, 5, 5]] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_rgb_channel_order() {
        let mut img = face([0, 0, 0]);
        img.put_pixel(7, 3, Rgb([255, 0, 0]));
        let tensor = FaceNetEmbedder::preprocess(&img);
        assert!((tensor[[0, 0, 3, 7]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 3, 7]] + 1.0).abs() < 1e-6);
        assert!((tensor[[0, 0, 7, 3]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!((vector::norm(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        assert_eq!(l2_normalize(vec![0.0; 4]), vec![0.0; 4]);
    }
}

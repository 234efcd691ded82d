//! Elementary operations on fixed-length embedding vectors.
//!
//! All binary operations require both operands to have the same length.
//! A mismatch is reported, never truncated or padded.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VectorError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("mean of zero vectors is undefined")]
    EmptyInput,
}

fn check_dim(expected: usize, actual: usize) -> Result<(), VectorError> {
    if expected == actual {
        Ok(())
    } else {
        Err(VectorError::DimensionMismatch { expected, actual })
    }
}

/// Element-wise difference `a - b`.
pub fn subtract(a: &[f32], b: &[f32]) -> Result<Vec<f32>, VectorError> {
    check_dim(a.len(), b.len())?;
    Ok(a.iter().zip(b).map(|(x, y)| x - y).collect())
}

/// Euclidean (L2) norm.
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Euclidean distance, `norm(subtract(a, b))`.
pub fn distance(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    Ok(norm(&subtract(a, b)?))
}

/// Element-wise arithmetic mean.
///
/// Sums in input order with an `f64` accumulator, so the same list always
/// yields bit-identical output.
pub fn mean<V: AsRef<[f32]>>(vectors: &[V]) -> Result<Vec<f32>, VectorError> {
    let first = vectors.first().ok_or(VectorError::EmptyInput)?.as_ref();
    let dim = first.len();

    let mut acc = vec![0.0f64; dim];
    for v in vectors {
        let v = v.as_ref();
        check_dim(dim, v.len())?;
        for (sum, x) in acc.iter_mut().zip(v) {
            *sum += f64::from(*x);
        }
    }

    let n = vectors.len() as f64;
    Ok(acc.into_iter().map(|sum| (sum / n) as f32).collect())
}

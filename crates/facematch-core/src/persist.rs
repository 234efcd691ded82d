//! Serialization of raw enrollment samples.
//!
//! Stores embeddings, not templates, so templates can always be rederived.

use crate::types::EnrollmentData;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("embeddings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed embeddings data: {0}")]
    Format(#[from] serde_json::Error),
}

/// Encode enrollment data as pretty-printed JSON.
pub fn persist(data: &EnrollmentData) -> Result<Vec<u8>, PersistError> {
    Ok(serde_json::to_vec_pretty(data)?)
}

/// Decode enrollment data produced by [`persist`].
pub fn load(bytes: &[u8]) -> Result<EnrollmentData, PersistError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn save_file(path: &Path, data: &EnrollmentData) -> Result<(), PersistError> {
    let bytes = persist(data)?;
    std::fs::write(path, bytes).map_err(|source| PersistError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_file(path: &Path) -> Result<EnrollmentData, PersistError> {
    let bytes = std::fs::read(path).map_err(|source| PersistError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embedding;

    fn sample_data() -> EnrollmentData {
        let mut data = EnrollmentData::new();
        data.insert(
            "joao",
            vec![Embedding::new(vec![0.25, -0.5, 1.0]), Embedding::new(vec![0.0, 0.125, -2.0])],
        );
        data.insert("maria", vec![Embedding::new(vec![1.5, 0.75, -0.0625])]);
        data.insert("nobody", vec![]);
        data
    }

    #[test]
    fn test_load_persist_identity() {
        let data = sample_data();
        let bytes = persist(&data).unwrap();
        assert_eq!(load(&bytes).unwrap(), data);
    }

    #[test]
    fn test_persisted_layout_is_plain_mapping() {
        let bytes = persist(&sample_data()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["maria"], serde_json::json!([[1.5, 0.75, -0.0625]]));
        assert_eq!(value["nobody"], serde_json::json!([]));
    }

    #[test]
    fn test_load_malformed() {
        assert!(matches!(load(b"{\"a\": [1, 2]}"), Err(PersistError::Format(_))));
        assert!(matches!(load(b"not json"), Err(PersistError::Format(_))));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = std::env::temp_dir().join(format!("facematch-persist-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("embeddings.json");

        let data = sample_data();
        save_file(&path, &data).unwrap();
        assert_eq!(load_file(&path).unwrap(), data);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_file_missing() {
        let path = std::env::temp_dir().join("facematch-definitely-missing.json");
        assert!(matches!(load_file(&path), Err(PersistError::Io { .. })));
    }
}

use std::path::PathBuf;

/// CLI configuration, loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Root of the `<identity>/<image>` face dataset.
    pub dataset_dir: PathBuf,
    /// Persisted enrollment embeddings.
    pub embeddings_path: PathBuf,
    /// Euclidean distance below which a face is accepted.
    pub threshold: f32,
    /// Number of faces to save per capture run.
    pub max_capture: usize,
    /// Side length of saved face crops.
    pub crop_size: u32,
}

impl Config {
    /// Load configuration from `FACEMATCH_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = var("FACEMATCH_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                var("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| {
                        let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                        PathBuf::from(home).join(".local/share")
                    })
                    .join("facematch/models")
            });

        Self {
            model_dir,
            dataset_dir: var("FACEMATCH_DATASET_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("dataset")),
            embeddings_path: var("FACEMATCH_EMBEDDINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("embeddings.json")),
            threshold: parsed(&var, "FACEMATCH_THRESHOLD", 0.8),
            max_capture: parsed(&var, "FACEMATCH_MAX_CAPTURE", 20),
            crop_size: parsed(&var, "FACEMATCH_CROP_SIZE", 160),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join(facematch_models::DETECTOR_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the FaceNet embedding model.
    pub fn embedder_model_path(&self) -> String {
        self.model_dir
            .join(facematch_models::EMBEDDER_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }
}

/// Reject thresholds that would make the accept rule meaningless.
pub fn validate_threshold(threshold: f32) -> anyhow::Result<f32> {
    anyhow::ensure!(
        threshold.is_finite() && threshold >= 0.0,
        "threshold must be a finite, non-negative distance (got {threshold})"
    );
    Ok(threshold)
}

fn parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[("HOME", "/home/ana")]);
        assert_eq!(config.model_dir, PathBuf::from("/home/ana/.local/share/facematch/models"));
        assert_eq!(config.dataset_dir, PathBuf::from("dataset"));
        assert_eq!(config.embeddings_path, PathBuf::from("embeddings.json"));
        assert_eq!(config.threshold, 0.8);
        assert_eq!(config.max_capture, 20);
        assert_eq!(config.crop_size, 160);
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            ("XDG_DATA_HOME", "/data"),
            ("FACEMATCH_DATASET_DIR", "/faces"),
            ("FACEMATCH_THRESHOLD", "0.65"),
            ("FACEMATCH_MAX_CAPTURE", "5"),
        ]);
        assert_eq!(config.model_dir, PathBuf::from("/data/facematch/models"));
        assert_eq!(config.dataset_dir, PathBuf::from("/faces"));
        assert_eq!(config.threshold, 0.65);
        assert_eq!(config.max_capture, 5);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_with(&[("FACEMATCH_THRESHOLD", "strict"), ("FACEMATCH_CROP_SIZE", "-1")]);
        assert_eq!(config.threshold, 0.8);
        assert_eq!(config.crop_size, 160);
    }

    #[test]
    fn test_model_paths() {
        let config = config_with(&[("FACEMATCH_MODEL_DIR", "/models")]);
        assert_eq!(config.detector_model_path(), "/models/det_10g.onnx");
        assert_eq!(config.embedder_model_path(), "/models/facenet_vggface2.onnx");
    }

    #[test]
    fn test_validate_threshold() {
        assert_eq!(validate_threshold(0.8).unwrap(), 0.8);
        assert_eq!(validate_threshold(0.0).unwrap(), 0.0);
        assert!(validate_threshold(-0.1).is_err());
        assert!(validate_threshold(f32::NAN).is_err());
        assert!(validate_threshold(f32::INFINITY).is_err());
    }
}

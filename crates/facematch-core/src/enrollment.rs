//! Enrollment: face images → per-identity embedding sets.

use crate::face::prepare_face;
use crate::types::{Embedding, EnrollmentData, FaceEmbedder};
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollmentError {
    #[error("embedding failed for {image}: {reason}")]
    EmbeddingFailed { image: String, reason: String },
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A face image plus a reference to where it came from (usually a file path).
pub struct FaceSample {
    pub source: String,
    pub image: RgbImage,
}

/// Outcome of enrolling one identity. Failed images are skipped, not fatal.
#[derive(Debug, Default)]
pub struct IdentityEnrollment {
    pub embeddings: Vec<Embedding>,
    pub failures: Vec<EnrollmentError>,
}

/// Outcome of enrolling a whole dataset directory.
#[derive(Debug, Default)]
pub struct DatasetEnrollment {
    pub data: EnrollmentData,
    pub failures: Vec<EnrollmentError>,
}

/// Embed every sample of `name`, keeping the ones that succeed.
pub fn enroll_identity<E, I>(name: &str, samples: I, embedder: &mut E) -> IdentityEnrollment
where
    E: FaceEmbedder,
    I: IntoIterator<Item = FaceSample>,
{
    let mut outcome = IdentityEnrollment::default();
    for sample in samples {
        record(name, embed_sample(&sample, embedder), &mut outcome);
    }
    outcome
}

/// Enroll `dataset_dir/<identity>/<image>` for every identity subdirectory.
///
/// Directories and files are visited in name order. Images that fail to
/// decode count as embedding failures. Identities with no successful
/// embedding are kept with an empty sample list.
pub fn enroll_directory<E: FaceEmbedder>(
    dataset_dir: &Path,
    embedder: &mut E,
) -> Result<DatasetEnrollment, EnrollmentError> {
    let mut result = DatasetEnrollment::default();

    for person_dir in sorted_entries(dataset_dir)? {
        if !person_dir.is_dir() {
            continue;
        }
        let Some(name) = person_dir.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!(path = %person_dir.display(), "skipping identity directory with non-UTF-8 name");
            continue;
        };

        let mut samples = Vec::new();
        let mut unreadable = Vec::new();
        for image_path in sorted_entries(&person_dir)? {
            if !image_path.is_file() {
                continue;
            }
            match load_sample(&image_path) {
                Ok(sample) => samples.push(sample),
                Err(err) => {
                    tracing::warn!(identity = name, error = %err, "enrollment image skipped");
                    unreadable.push(err);
                }
            }
        }

        let outcome = enroll_identity(name, samples, embedder);
        tracing::info!(
            identity = name,
            embeddings = outcome.embeddings.len(),
            failed = outcome.failures.len() + unreadable.len(),
            "identity enrolled"
        );
        result.data.insert(name, outcome.embeddings);
        result.failures.extend(unreadable);
        result.failures.extend(outcome.failures);
    }

    Ok(result)
}

fn record(
    name: &str,
    embedded: Result<Embedding, EnrollmentError>,
    outcome: &mut IdentityEnrollment,
) {
    match embedded {
        Ok(embedding) => outcome.embeddings.push(embedding),
        Err(err) => {
            tracing::warn!(identity = name, error = %err, "enrollment image skipped");
            outcome.failures.push(err);
        }
    }
}

fn embed_sample<E: FaceEmbedder>(
    sample: &FaceSample,
    embedder: &mut E,
) -> Result<Embedding, EnrollmentError> {
    let face = prepare_face(&sample.image, embedder.input_size());
    embedder
        .embed(&face)
        .map_err(|e| EnrollmentError::EmbeddingFailed {
            image: sample.source.clone(),
            reason: e.to_string(),
        })
}

fn load_sample(path: &Path) -> Result<FaceSample, EnrollmentError> {
    let source = path.display().to_string();
    match image::open(path) {
        Ok(img) => Ok(FaceSample {
            source,
            image: img.to_rgb8(),
        }),
        Err(e) => Err(EnrollmentError::EmbeddingFailed {
            image: source,
            reason: e.to_string(),
        }),
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, EnrollmentError> {
    let io_err = |source: std::io::Error| EnrollmentError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut entries = std::fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[derive(Debug, thiserror::Error)]
    #[error("fake embedder rejected the image")]
    struct FakeEmbedError;

    /// Embeds a face as the red and green levels of its top-left pixel; rejects black.
    struct FakeEmbedder {
        size: u32,
    }

    impl FaceEmbedder for FakeEmbedder {
        type Error = FakeEmbedError;

        fn input_size(&self) -> u32 {
            self.size
        }

        fn embed(&mut self, face: &RgbImage) -> Result<Embedding, FakeEmbedError> {
            assert_eq!(face.dimensions(), (self.size, self.size));
            let Rgb([r, g, _]) = *face.get_pixel(0, 0);
            if r == 0 && g == 0 {
                return Err(FakeEmbedError);
            }
            Ok(Embedding::new(vec![f32::from(r) / 255.0, f32::from(g) / 255.0]))
        }
    }

    fn solid(r: u8, g: u8, size: u32) -> RgbImage {
        RgbImage::from_pixel(size, size, Rgb([r, g, 0]))
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("facematch-enroll-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_enroll_identity_skips_failed_image() {
        let samples = vec![
            FaceSample { source: "0.jpg".into(), image: solid(255, 0, 8) },
            FaceSample { source: "1.jpg".into(), image: solid(0, 0, 8) },
            FaceSample { source: "2.jpg".into(), image: solid(255, 0, 8) },
        ];
        let outcome = enroll_identity("ana", samples, &mut FakeEmbedder { size: 8 });

        assert_eq!(outcome.embeddings.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(
            &outcome.failures[0],
            EnrollmentError::EmbeddingFailed { image, .. } if image == "1.jpg"
        ));
    }

    #[test]
    fn test_enroll_identity_resizes_to_embedder_input() {
        let samples = vec![FaceSample { source: "big.png".into(), image: solid(0, 255, 40) }];
        let outcome = enroll_identity("bia", samples, &mut FakeEmbedder { size: 4 });
        assert_eq!(outcome.embeddings, vec![Embedding::new(vec![0.0, 1.0])]);
    }

    #[test]
    fn test_enroll_directory() {
        let dataset = temp_dir("dataset");
        let ana = dataset.join("ana");
        let rui = dataset.join("rui");
        std::fs::create_dir_all(&ana).unwrap();
        std::fs::create_dir_all(&rui).unwrap();

        solid(255, 0, 12).save(ana.join("0.png")).unwrap();
        solid(255, 0, 12).save(ana.join("1.png")).unwrap();
        std::fs::write(ana.join("2.png"), b"not an image").unwrap();
        solid(0, 0, 12).save(rui.join("0.png")).unwrap();
        std::fs::write(dataset.join("README.txt"), b"stray file").unwrap();

        let result = enroll_directory(&dataset, &mut FakeEmbedder { size: 6 }).unwrap();

        assert_eq!(result.data.len(), 2);
        assert_eq!(result.data.get("ana").map(<[Embedding]>::len), Some(2));
        // Every image failed, identity still recorded with no samples
        assert_eq!(result.data.get("rui").map(<[Embedding]>::len), Some(0));
        assert_eq!(result.failures.len(), 2);

        // Decode failure for ana, then the embedder rejection for rui
        let failed: Vec<&str> = result
            .failures
            .iter()
            .map(|err| match err {
                EnrollmentError::EmbeddingFailed { image, .. } => image.as_str(),
                EnrollmentError::Io { path, .. } => path.as_str(),
            })
            .collect();
        assert!(failed[0].ends_with("ana/2.png"), "got {failed:?}");
        assert!(failed[1].ends_with("rui/0.png"), "got {failed:?}");

        std::fs::remove_dir_all(&dataset).unwrap();
    }

    #[test]
    fn test_enroll_directory_missing() {
        let missing = std::env::temp_dir().join("facematch-no-such-dataset");
        let err = enroll_directory(&missing, &mut FakeEmbedder { size: 4 }).unwrap_err();
        assert!(matches!(err, EnrollmentError::Io { .. }));
    }
}

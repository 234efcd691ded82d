//! Face capture: save the first detected face of each frame into the dataset.

use crate::engine::EngineHandle;
use anyhow::{Context, Result};
use facematch_core::face::{crop_face, prepare_face};
use std::path::{Path, PathBuf};

pub struct CaptureSettings {
    pub identity: String,
    pub dataset_dir: PathBuf,
    pub max_faces: usize,
    pub crop_size: u32,
}

/// Save up to `max_faces` crops as `<dataset>/<identity>/<n>.jpg`.
///
/// Frames that cannot be read, or show no usable face, are skipped.
/// Returns the number of faces saved.
pub async fn capture_faces(
    engine: &EngineHandle,
    frames: &[PathBuf],
    settings: &CaptureSettings,
) -> Result<usize> {
    let save_dir = settings.dataset_dir.join(&settings.identity);
    std::fs::create_dir_all(&save_dir)
        .with_context(|| format!("creating {}", save_dir.display()))?;

    let mut count = 0;
    for path in frames {
        if count >= settings.max_faces {
            break;
        }

        let frame = match image::open(path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                tracing::warn!(frame = %path.display(), error = %e, "unreadable frame skipped");
                continue;
            }
        };

        let boxes = match engine.detect(frame.clone()).await {
            Ok(boxes) => boxes,
            Err(e) => {
                tracing::warn!(frame = %path.display(), error = %e, "detection failed; frame skipped");
                continue;
            }
        };

        // Only the first detected face is kept per frame
        let Some((region, crop)) = boxes.first().and_then(|b| crop_face(&frame, b)) else {
            tracing::debug!(frame = %path.display(), "no usable face in frame");
            continue;
        };

        let face = prepare_face(&crop, settings.crop_size);
        let filename = face_path(&save_dir, count);
        face.save(&filename)
            .with_context(|| format!("saving {}", filename.display()))?;
        tracing::info!(
            face = count,
            ?region,
            path = %filename.display(),
            "face saved"
        );
        count += 1;
    }

    Ok(count)
}

fn face_path(save_dir: &Path, index: usize) -> PathBuf {
    save_dir.join(format!("{index}.jpg"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spawn_engine;
    use facematch_core::{BoundingBox, Embedding, FaceDetector, FaceEmbedder, TemplateStore};
    use image::{Rgb, RgbImage};

    #[derive(Debug, thiserror::Error)]
    #[error("unused")]
    struct Never;

    /// Finds a face in frames whose top-left pixel is white.
    struct WhiteCornerDetector;

    impl FaceDetector for WhiteCornerDetector {
        type Error = Never;

        fn detect(&mut self, frame: &RgbImage) -> Result<Vec<BoundingBox>, Never> {
            if frame.get_pixel(0, 0) == &Rgb([255, 255, 255]) {
                Ok(vec![BoundingBox::new(2, 2, 12, 12), BoundingBox::new(0, 0, 4, 4)])
            } else {
                Ok(vec![])
            }
        }
    }

    struct NoEmbedder;

    impl FaceEmbedder for NoEmbedder {
        type Error = Never;

        fn input_size(&self) -> u32 {
            1
        }

        fn embed(&mut self, _face: &RgbImage) -> Result<Embedding, Never> {
            Ok(Embedding::new(vec![]))
        }
    }

    #[tokio::test]
    async fn test_capture_faces() {
        let root = std::env::temp_dir().join(format!("facematch-capture-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        let frames_dir = root.join("frames");
        std::fs::create_dir_all(&frames_dir).unwrap();

        let with_face = RgbImage::from_pixel(32, 24, Rgb([255, 255, 255]));
        let without_face = RgbImage::from_pixel(32, 24, Rgb([0, 0, 0]));
        let mut frames = Vec::new();
        for (i, img) in [&with_face, &without_face, &with_face, &with_face].iter().enumerate() {
            let path = frames_dir.join(format!("frame{i}.png"));
            img.save(&path).unwrap();
            frames.push(path);
        }
        frames.insert(1, frames_dir.join("missing.png"));

        let engine =
            spawn_engine::<_, NoEmbedder>(Some(WhiteCornerDetector), None, TemplateStore::default())
                .unwrap();
        let settings = CaptureSettings {
            identity: "joao".into(),
            dataset_dir: root.join("dataset"),
            max_faces: 2,
            crop_size: 20,
        };

        let saved = capture_faces(&engine, &frames, &settings).await.unwrap();
        assert_eq!(saved, 2);

        let person = root.join("dataset/joao");
        let first = image::open(person.join("0.jpg")).unwrap();
        assert_eq!((first.width(), first.height()), (20, 20));
        assert!(person.join("1.jpg").exists());
        assert!(!person.join("2.jpg").exists());

        std::fs::remove_dir_all(&root).unwrap();
    }
}

//! Per-frame recognition: detect → crop → embed → match.
//!
//! Nothing in here fails a frame. A detector error yields no faces, and a
//! face that cannot be cropped, embedded, or matched is dropped with a log.

use crate::face::{crop_face, prepare_face};
use crate::matcher::Matcher;
use crate::store::TemplateStore;
use crate::types::{FaceDetector, FaceEmbedder, FaceMatch};
use image::RgbImage;

/// Label every face `detector` finds in `frame`.
///
/// Output follows detector order.
pub fn recognize_frame<D, E, M>(
    frame: &RgbImage,
    detector: &mut D,
    embedder: &mut E,
    matcher: &M,
    store: &TemplateStore,
    threshold: f32,
) -> Vec<FaceMatch>
where
    D: FaceDetector,
    E: FaceEmbedder,
    M: Matcher + ?Sized,
{
    let boxes = match detector.detect(frame) {
        Ok(boxes) => boxes,
        Err(err) => {
            tracing::warn!(error = %err, "face detection failed; frame yields no faces");
            return Vec::new();
        }
    };

    let mut faces = Vec::with_capacity(boxes.len());
    for (index, bbox) in boxes.iter().enumerate() {
        let Some((region, crop)) = crop_face(frame, bbox) else {
            tracing::debug!(index, ?bbox, "skipping degenerate face box");
            continue;
        };

        let face = prepare_face(&crop, embedder.input_size());
        let embedding = match embedder.embed(&face) {
            Ok(embedding) => embedding,
            Err(err) => {
                tracing::warn!(index, error = %err, "face embedding failed; face skipped");
                continue;
            }
        };

        match matcher.compare(&embedding, store, threshold) {
            Ok(result) => {
                tracing::debug!(
                    index,
                    label = result.label(),
                    distance = result.distance,
                    "face matched"
                );
                faces.push(FaceMatch { region, result });
            }
            Err(err) => {
                tracing::warn!(index, error = %err, "probe incompatible with templates; face skipped");
            }
        }
    }

    faces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::EuclideanMatcher;
    use crate::types::{BoundingBox, Embedding, EnrollmentData, UNKNOWN_LABEL};
    use image::Rgb;

    #[derive(Debug, thiserror::Error)]
    #[error("fake model failure")]
    struct FakeError;

    struct FakeDetector {
        boxes: Result<Vec<BoundingBox>, ()>,
    }

    impl FaceDetector for FakeDetector {
        type Error = FakeError;

        fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<BoundingBox>, FakeError> {
            self.boxes.clone().map_err(|()| FakeError)
        }
    }

    /// Embeds a face as the normalized red and green of its top-left pixel.
    /// Blue faces fail, and a green-only face gets a third dimension.
    struct FakeEmbedder;

    impl FaceEmbedder for FakeEmbedder {
        type Error = FakeError;

        fn input_size(&self) -> u32 {
            4
        }

        fn embed(&mut self, face: &RgbImage) -> Result<Embedding, FakeError> {
            let Rgb([r, g, b]) = *face.get_pixel(0, 0);
            match (r, g, b) {
                (_, _, 255) => Err(FakeError),
                (0, 255, 0) => Ok(Embedding::new(vec![0.0, 1.0, 0.0])),
                _ => Ok(Embedding::new(vec![f32::from(r) / 255.0, f32::from(g) / 255.0])),
            }
        }
    }

    /// 100x40 frame: red on x < 40, dark on 40..60, blue on 60..80, green beyond.
    fn frame() -> RgbImage {
        RgbImage::from_fn(100, 40, |x, _| match x {
            0..=39 => Rgb([255, 0, 0]),
            40..=59 => Rgb([10, 10, 0]),
            60..=79 => Rgb([0, 0, 255]),
            _ => Rgb([0, 255, 0]),
        })
    }

    fn store() -> TemplateStore {
        let mut data = EnrollmentData::new();
        data.insert("red", vec![Embedding::new(vec![1.0, 0.0])]);
        data.insert("green", vec![Embedding::new(vec![0.0, 1.0])]);
        TemplateStore::build(&data)
    }

    fn run(boxes: Result<Vec<BoundingBox>, ()>, store: &TemplateStore) -> Vec<FaceMatch> {
        recognize_frame(
            &frame(),
            &mut FakeDetector { boxes },
            &mut FakeEmbedder,
            &EuclideanMatcher,
            store,
            0.8,
        )
    }

    #[test]
    fn test_recognize_preserves_detection_order() {
        let boxes = vec![
            BoundingBox::new(45, 0, 55, 20),
            BoundingBox::new(-10, -10, 20, 20),
        ];
        let faces = run(Ok(boxes), &store());

        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].result.label(), UNKNOWN_LABEL);
        assert_eq!(faces[1].result.label(), "red");
        // Second box clamped to the frame
        assert_eq!(faces[1].region, BoundingBox::new(0, 0, 20, 20));
    }

    #[test]
    fn test_recognize_skips_degenerate_boxes() {
        let boxes = vec![
            BoundingBox::new(10, 10, 10, 30),
            BoundingBox::new(120, 0, 150, 20),
            BoundingBox::new(5, 5, 25, 25),
        ];
        let faces = run(Ok(boxes), &store());
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].result.label(), "red");
    }

    #[test]
    fn test_recognize_detector_failure_yields_nothing() {
        assert!(run(Err(()), &store()).is_empty());
    }

    #[test]
    fn test_recognize_no_detections() {
        assert!(run(Ok(vec![]), &store()).is_empty());
    }

    #[test]
    fn test_recognize_skips_failed_and_mismatched_faces() {
        let boxes = vec![
            BoundingBox::new(62, 0, 78, 20), // blue: embed fails
            BoundingBox::new(82, 0, 98, 20), // green: wrong dimension
            BoundingBox::new(0, 0, 30, 30),
        ];
        let faces = run(Ok(boxes), &store());
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].region, BoundingBox::new(0, 0, 30, 30));
    }

    #[test]
    fn test_recognize_empty_store_reports_unknown() {
        let faces = run(Ok(vec![BoundingBox::new(0, 0, 30, 30)]), &TemplateStore::default());
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].result.label(), UNKNOWN_LABEL);
        assert!(faces[0].result.distance.is_infinite());
    }
}

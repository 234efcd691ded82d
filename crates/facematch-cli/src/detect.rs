//! Detection only: report every face box found in each frame.

use crate::engine::EngineHandle;
use facematch_core::BoundingBox;
use serde::Serialize;
use std::path::PathBuf;

/// All boxes of one frame, in detector order.
#[derive(Debug, Serialize)]
pub struct FrameDetections {
    pub frame: PathBuf,
    pub boxes: Vec<BoundingBox>,
}

impl FrameDetections {
    /// One tab-separated line per box.
    pub fn to_lines(&self) -> Vec<String> {
        self.boxes
            .iter()
            .map(|b| format!("{}\t[{},{},{},{}]", self.frame.display(), b.x1, b.y1, b.x2, b.y2))
            .collect()
    }
}

/// Run the detector over `frames` in order.
///
/// Unreadable frames and frames the detector fails on are logged and
/// skipped; frames without faces are reported with no boxes.
pub async fn detect_frames(engine: &EngineHandle, frames: &[PathBuf]) -> Vec<FrameDetections> {
    let mut detections = Vec::with_capacity(frames.len());
    for path in frames {
        let frame = match image::open(path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                tracing::warn!(frame = %path.display(), error = %e, "unreadable frame skipped");
                continue;
            }
        };

        match engine.detect(frame).await {
            Ok(boxes) => {
                tracing::debug!(frame = %path.display(), faces = boxes.len(), "frame scanned");
                detections.push(FrameDetections {
                    frame: path.clone(),
                    boxes,
                });
            }
            Err(e) => {
                tracing::warn!(frame = %path.display(), error = %e, "detection failed; frame skipped");
            }
        }
    }
    detections
}

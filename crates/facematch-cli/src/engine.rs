use facematch_core::enrollment::DatasetEnrollment;
use facematch_core::{
    enroll_directory, recognize_frame, BoundingBox, EnrollmentError, EuclideanMatcher,
    FaceDetector, FaceEmbedder, FaceMatch, SharedTemplates, TemplateStore,
};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(String),
    #[error("enrollment error: {0}")]
    Enrollment(#[from] EnrollmentError),
    #[error("no detection model loaded")]
    DetectorUnavailable,
    #[error("no embedding model loaded")]
    EmbedderUnavailable,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from async callers to the engine thread.
enum EngineRequest {
    Detect {
        frame: RgbImage,
        reply: oneshot::Sender<Result<Vec<BoundingBox>, EngineError>>,
    },
    Recognize {
        frame: RgbImage,
        threshold: f32,
        reply: oneshot::Sender<Result<Vec<FaceMatch>, EngineError>>,
    },
    Enroll {
        dataset_dir: PathBuf,
        reply: oneshot::Sender<Result<DatasetEnrollment, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    templates: Arc<SharedTemplates>,
}

impl EngineHandle {
    /// Request face boxes for one frame, in detector order.
    pub async fn detect(&self, frame: RgbImage) -> Result<Vec<BoundingBox>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Detect {
            frame,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Request labels for every face in one frame, against the current templates.
    pub async fn recognize(
        &self,
        frame: RgbImage,
        threshold: f32,
    ) -> Result<Vec<FaceMatch>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Recognize {
            frame,
            threshold,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Request enrollment of a dataset directory. On success the engine's
    /// templates are rebuilt from the new samples and swapped in.
    pub async fn enroll(&self, dataset_dir: &Path) -> Result<DatasetEnrollment, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Enroll {
            dataset_dir: dataset_dir.to_path_buf(),
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Templates the next recognition will match against.
    pub fn templates(&self) -> Arc<TemplateStore> {
        self.templates.snapshot()
    }

    async fn send(&self, request: EngineRequest) -> Result<(), EngineError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns both models (inference sessions are not shared) and
/// serves requests in order until every handle is dropped. Either model may
/// be absent; requests that need it fail instead.
pub fn spawn_engine<D, E>(
    mut detector: Option<D>,
    mut embedder: Option<E>,
    templates: TemplateStore,
) -> Result<EngineHandle, EngineError>
where
    D: FaceDetector + Send + 'static,
    E: FaceEmbedder + Send + 'static,
{
    let templates = Arc::new(SharedTemplates::new(templates));
    let engine_templates = Arc::clone(&templates);

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("facematch-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Detect { frame, reply } => {
                        let result = match detector.as_mut() {
                            Some(detector) => detector
                                .detect(&frame)
                                .map_err(|e| EngineError::Detector(e.to_string())),
                            None => Err(EngineError::DetectorUnavailable),
                        };
                        let _ = reply.send(result);
                    }
                    EngineRequest::Recognize {
                        frame,
                        threshold,
                        reply,
                    } => {
                        let result = match (detector.as_mut(), embedder.as_mut()) {
                            (Some(detector), Some(embedder)) => {
                                let store = engine_templates.snapshot();
                                Ok(recognize_frame(
                                    &frame,
                                    detector,
                                    embedder,
                                    &EuclideanMatcher,
                                    &store,
                                    threshold,
                                ))
                            }
                            (None, _) => Err(EngineError::DetectorUnavailable),
                            (_, None) => Err(EngineError::EmbedderUnavailable),
                        };
                        let _ = reply.send(result);
                    }
                    EngineRequest::Enroll { dataset_dir, reply } => {
                        let result = match embedder.as_mut() {
                            Some(embedder) => run_enroll(&dataset_dir, embedder, &engine_templates),
                            None => Err(EngineError::EmbedderUnavailable),
                        };
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx, templates })
}

/// Embed the dataset, then rebuild and swap the templates.
fn run_enroll<E: FaceEmbedder>(
    dataset_dir: &Path,
    embedder: &mut E,
    templates: &SharedTemplates,
) -> Result<DatasetEnrollment, EngineError> {
    let enrollment = enroll_directory(dataset_dir, embedder)?;

    let store = TemplateStore::build_with_dim(&enrollment.data, embedder.output_dim());
    tracing::info!(
        identities = store.len(),
        excluded = store.excluded().len(),
        failed_images = enrollment.failures.len(),
        "enroll: templates rebuilt"
    );
    templates.replace(store);

    Ok(enrollment)
}

//! Provider and detector tests against mock collaborators
//!
//! Provides counting implementations of `ImageModel`, `ModelFetcher` and
//! `ModelLoader` so load-once behavior and failure paths can be verified
//! without network access or a real ONNX graph.

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tumora_classifier::fetcher::partial_path;
use tumora_classifier::provider::sha256_file;
use tumora_classifier::{
    ImageModel, InputTensor, ModelConfig, ModelFetcher, ModelHandle, ModelLoader, ModelProvider,
    ModelSource, OnnxLoader, TumorDetector,
};
use tumora_core::{Error, ErrorKind, Label, Result};

/// A model that always returns the same score
pub struct StaticModel {
    score: f32,
    calls: AtomicU32,
}

impl StaticModel {
    pub fn new(score: f32) -> Self {
        Self {
            score,
            calls: AtomicU32::new(0),
        }
    }
}

impl ImageModel for StaticModel {
    fn infer(&self, _input: &InputTensor) -> Result<f32> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.score)
    }

    fn name(&self) -> &str {
        "static"
    }

    fn input_shape(&self) -> [usize; 4] {
        [1, 224, 224, 3]
    }
}

/// How a mock fetcher behaves when called
#[derive(Clone)]
enum FetchBehavior {
    /// Write these bytes to the destination
    Write(Vec<u8>),
    /// Fail with a download error
    Fail,
    /// Start a partial file, then hang
    Hang,
    /// Report success without writing anything
    Nothing,
}

/// A fetcher that counts calls and follows a fixed behavior
pub struct CountingFetcher {
    behavior: FetchBehavior,
    calls: AtomicU32,
}

impl CountingFetcher {
    fn new(behavior: FetchBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicU32::new(0),
        }
    }

    pub fn writing(bytes: &[u8]) -> Self {
        Self::new(FetchBehavior::Write(bytes.to_vec()))
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ModelFetcher for CountingFetcher {
    async fn fetch(&self, _source: &ModelSource, dest: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        match &self.behavior {
            FetchBehavior::Write(bytes) => {
                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let part = partial_path(dest);
                tokio::fs::write(&part, bytes).await?;
                tokio::fs::rename(&part, dest).await?;
                Ok(())
            }
            FetchBehavior::Fail => Err(Error::download("connection refused")),
            FetchBehavior::Hang => {
                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(partial_path(dest), b"half").await?;
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
            FetchBehavior::Nothing => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// A loader that hands out a static model unless the artifact says "corrupt"
pub struct CountingLoader {
    score: f32,
    calls: AtomicU32,
}

impl CountingLoader {
    pub fn new(score: f32) -> Self {
        Self {
            score,
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl ModelLoader for CountingLoader {
    fn load(&self, path: &Path, _input_shape: [usize; 4]) -> Result<Arc<dyn ImageModel>> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let bytes = std::fs::read(path)?;
        if bytes == b"corrupt" {
            return Err(Error::deserialization("bad graph"));
        }
        Ok(Arc::new(StaticModel::new(self.score)))
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    artifact: PathBuf,
    fetcher: Arc<CountingFetcher>,
    loader: Arc<CountingLoader>,
    provider: Arc<ModelProvider>,
}

fn artifact_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("models").join("tumor_detection_model.onnx")
}

fn fixture_with(
    fetcher: CountingFetcher,
    score: f32,
    configure: impl FnOnce(ModelConfig) -> ModelConfig,
) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let artifact = artifact_path(&dir);
    let config = configure(ModelConfig::from_url(
        "https://models.invalid/tumor.onnx",
        &artifact,
    ));

    let fetcher = Arc::new(fetcher);
    let loader = Arc::new(CountingLoader::new(score));
    let provider = Arc::new(
        ModelProvider::new(
            config,
            Arc::clone(&fetcher) as Arc<dyn ModelFetcher>,
            Arc::clone(&loader) as Arc<dyn ModelLoader>,
        )
        .unwrap(),
    );

    Fixture {
        _dir: dir,
        artifact,
        fetcher,
        loader,
        provider,
    }
}

fn fixture(score: f32) -> Fixture {
    fixture_with(CountingFetcher::writing(b"graph"), score, |c| c)
}

fn jpeg(width: u32, height: u32) -> Bytes {
    let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 200) as u8, (y % 200) as u8, 90])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    Bytes::from(bytes)
}

#[tokio::test]
async fn test_download_then_load_once() {
    let f = fixture(0.73);
    assert!(!f.artifact.exists());

    let first = f.provider.ensure_model().await;
    let second = f.provider.ensure_model().await;

    assert!(first.is_ready());
    assert!(first.same_model(&second));
    assert!(f.artifact.exists());
    assert_eq!(f.fetcher.call_count(), 1);
    assert_eq!(f.loader.call_count(), 1);
    assert_eq!(f.provider.status().state, "ready");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_calls_initialize_once() {
    let f = fixture(0.73);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let provider = Arc::clone(&f.provider);
            tokio::spawn(async move { provider.ensure_model().await })
        })
        .collect();

    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap());
    }

    for handle in &handles {
        assert!(handle.same_model(&handles[0]));
    }
    assert_eq!(f.fetcher.call_count(), 1);
    assert_eq!(f.loader.call_count(), 1);
}

#[tokio::test]
async fn test_existing_artifact_is_not_fetched() {
    let f = fixture(0.2);
    std::fs::create_dir_all(f.artifact.parent().unwrap()).unwrap();
    std::fs::write(&f.artifact, b"graph").unwrap();

    assert!(f.provider.ensure_model().await.is_ready());
    assert_eq!(f.fetcher.call_count(), 0);
    assert_eq!(f.loader.call_count(), 1);
}

#[tokio::test]
async fn test_detect_positive_jpeg() {
    let f = fixture(0.73);
    let detector = TumorDetector::new(Arc::clone(&f.provider));

    let prediction = detector.detect(jpeg(512, 384)).await.unwrap();
    assert_eq!(prediction.label, Label::TumorDetected);
    assert_eq!(prediction.confidence, 0.73);
    assert_eq!(prediction.label.to_string(), "tumor detected");
}

#[tokio::test]
async fn test_detect_negative_jpeg() {
    let f = fixture(0.2);
    let detector = TumorDetector::new(Arc::clone(&f.provider));

    let prediction = detector.detect(jpeg(512, 384)).await.unwrap();
    assert_eq!(prediction.label, Label::NoTumor);
    assert_eq!(prediction.confidence, 0.2);
}

#[tokio::test]
async fn test_decode_failure_leaves_model_cached() {
    let f = fixture(0.73);
    let detector = TumorDetector::new(Arc::clone(&f.provider));

    let before = f.provider.ensure_model().await;

    let err = detector
        .detect(Bytes::from_static(b"%PDF-1.4 not an image"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);

    let after = f.provider.cached().unwrap();
    assert!(before.same_model(&after));

    let prediction = detector.detect(jpeg(64, 64)).await.unwrap();
    assert_eq!(prediction.label, Label::TumorDetected);
    assert_eq!(f.loader.call_count(), 1);
}

#[tokio::test]
async fn test_failed_download_is_cached_as_unavailable() {
    let f = fixture_with(CountingFetcher::new(FetchBehavior::Fail), 0.73, |c| c);
    let detector = TumorDetector::new(Arc::clone(&f.provider));

    let handle = f.provider.ensure_model().await;
    match &handle {
        ModelHandle::Unavailable { kind, reason } => {
            assert_eq!(*kind, ErrorKind::Download);
            assert!(reason.contains("connection refused"));
        }
        ModelHandle::Ready(_) => panic!("expected unavailable handle"),
    }

    let err = detector.detect(jpeg(32, 32)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelUnavailable);

    // Not retried within the process
    assert!(!f.provider.ensure_model().await.is_ready());
    assert_eq!(f.fetcher.call_count(), 1);
    assert_eq!(f.loader.call_count(), 0);
    assert_eq!(f.provider.status().state, "unavailable");
}

#[tokio::test]
async fn test_unavailable_model_fails_before_decoding() {
    let f = fixture_with(CountingFetcher::new(FetchBehavior::Fail), 0.73, |c| c);
    let detector = TumorDetector::new(Arc::clone(&f.provider));

    // Garbage bytes would be a decode error if the image were looked at
    let err = detector.detect(Bytes::from_static(b"garbage")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
}

#[tokio::test]
async fn test_try_load_reports_typed_error_uncached() {
    let f = fixture_with(CountingFetcher::new(FetchBehavior::Fail), 0.73, |c| c);

    let err = f.provider.try_load().await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Download);

    assert!(f.provider.try_load().await.is_err());
    assert_eq!(f.fetcher.call_count(), 2);
    assert!(f.provider.cached().is_none());
}

#[tokio::test]
async fn test_corrupt_artifact_is_deserialization_error() {
    let f = fixture_with(CountingFetcher::writing(b"corrupt"), 0.73, |c| c);

    let err = f.provider.try_load().await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Deserialization);

    match f.provider.ensure_model().await {
        ModelHandle::Unavailable { kind, .. } => assert_eq!(kind, ErrorKind::Deserialization),
        ModelHandle::Ready(_) => panic!("expected unavailable handle"),
    }
}

#[tokio::test]
async fn test_corrupt_onnx_with_real_loader() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = artifact_path(&dir);
    let provider = ModelProvider::new(
        ModelConfig::from_url("https://models.invalid/tumor.onnx", &artifact),
        Arc::new(CountingFetcher::writing(b"\x08\x07 not protobuf")),
        Arc::new(OnnxLoader),
    )
    .unwrap();

    match provider.ensure_model().await {
        ModelHandle::Unavailable { kind, .. } => assert_eq!(kind, ErrorKind::Deserialization),
        ModelHandle::Ready(_) => panic!("expected unavailable handle"),
    }
}

#[tokio::test]
async fn test_download_timeout() {
    let f = fixture_with(CountingFetcher::new(FetchBehavior::Hang), 0.73, |c| {
        c.with_download_timeout(Duration::from_secs(1))
    });

    let err = f.provider.try_load().await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Download);
    assert!(err.to_string().contains("timed out"));

    assert!(!f.artifact.exists());
    assert!(!partial_path(&f.artifact).exists());
}

#[tokio::test]
async fn test_fetcher_that_writes_nothing() {
    let f = fixture_with(CountingFetcher::new(FetchBehavior::Nothing), 0.73, |c| c);

    let err = f.provider.try_load().await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Download);
    assert_eq!(f.loader.call_count(), 0);
}

#[tokio::test]
async fn test_integrity_match() {
    let scratch = tempfile::tempdir().unwrap();
    let reference = scratch.path().join("reference.onnx");
    std::fs::write(&reference, b"graph").unwrap();
    let digest = sha256_file(reference).await.unwrap();

    let f = fixture_with(CountingFetcher::writing(b"graph"), 0.73, |c| {
        c.with_sha256(digest.to_uppercase())
    });

    assert!(f.provider.ensure_model().await.is_ready());
}

#[tokio::test]
async fn test_integrity_mismatch_discards_download() {
    let f = fixture_with(CountingFetcher::writing(b"tampered"), 0.73, |c| {
        c.with_sha256("0".repeat(64))
    });

    let err = f.provider.try_load().await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(!f.artifact.exists());
    assert_eq!(f.loader.call_count(), 0);
}

#[tokio::test]
async fn test_integrity_mismatch_keeps_existing_artifact() {
    let f = fixture_with(CountingFetcher::writing(b"graph"), 0.73, |c| {
        c.with_sha256("f".repeat(64))
    });
    std::fs::create_dir_all(f.artifact.parent().unwrap()).unwrap();
    std::fs::write(&f.artifact, b"operator-provided").unwrap();

    let err = f.provider.try_load().await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(f.artifact.exists());
    assert_eq!(f.fetcher.call_count(), 0);
}

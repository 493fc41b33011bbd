//! Shared fixtures: a scriptable stub generator, a marking compressor,
//! and a fully wired service over a temporary history root.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use blog_image_engine::config::{GenerationConfig, ProviderConfig, ProviderKind};
use blog_image_engine::service::GenerationEvent;
use blog_image_engine::task::store::TaskStore;
use blog_image_engine::{
    EngineError, ImageCompressor, ImageGenerator, ImageRequest, ImageService, Result, TaskStorage,
};

/// Generator stub: succeeds with unique bytes per call, fails any prompt
/// containing the configured marker, and records what it was asked.
pub struct StubGenerator {
    pub calls: AtomicU32,
    pub fail_marker: Option<String>,
    pub prompts: Mutex<Vec<String>>,
    pub references_seen: Mutex<Vec<Vec<Vec<u8>>>>,
}

impl StubGenerator {
    pub fn new(fail_marker: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            fail_marker: fail_marker.map(String::from),
            prompts: Mutex::new(Vec::new()),
            references_seen: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for StubGenerator {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.references_seen
            .lock()
            .unwrap()
            .push(request.references.clone());

        if let Some(marker) = &self.fail_marker {
            if request.prompt.contains(marker) {
                return Err(EngineError::provider(500, "stub provider failure"));
            }
        }

        Ok(format!("image-{}", call).into_bytes())
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::NativeImage
    }
}

/// Compressor stub that prefixes `C:` so compressed bytes are
/// distinguishable from raw provider output.
pub struct MarkingCompressor;

impl ImageCompressor for MarkingCompressor {
    fn compress(&self, data: &[u8], _max_size_kb: usize) -> Result<Vec<u8>> {
        let mut out = b"C:".to_vec();
        out.extend_from_slice(data);
        Ok(out)
    }
}

/// Prefix `data` the way the marking compressor would
pub fn compressed(data: &[u8]) -> Vec<u8> {
    let mut out = b"C:".to_vec();
    out.extend_from_slice(data);
    out
}

pub struct TestHarness {
    pub service: ImageService,
    pub generator: Arc<StubGenerator>,
    pub store: Arc<TaskStore>,
    pub storage: TaskStorage,
    // Held so the history root outlives the test
    pub _dir: tempfile::TempDir,
}

pub fn harness(high_concurrency: bool, fail_marker: Option<&str>) -> TestHarness {
    harness_with_limits(high_concurrency, fail_marker, fast_limits())
}

pub fn harness_with_limits(
    high_concurrency: bool,
    fail_marker: Option<&str>,
    limits: GenerationConfig,
) -> TestHarness {
    let dir = tempfile::tempdir().unwrap();
    let generator = StubGenerator::new(fail_marker);
    let store = Arc::new(TaskStore::new());
    let storage = TaskStorage::new(dir.path(), Arc::new(MarkingCompressor));

    let provider: ProviderConfig = serde_json::from_value(serde_json::json!({
        "type": "native_image",
        "api_key": "test-key",
        "high_concurrency": high_concurrency
    }))
    .unwrap();

    let service = ImageService::with_generator(
        generator.clone(),
        provider,
        store.clone(),
        storage.clone(),
        limits,
    );

    TestHarness {
        service,
        generator,
        store,
        storage,
        _dir: dir,
    }
}

/// Single-attempt budgets so failure tests do not sit in backoff sleeps
pub fn fast_limits() -> GenerationConfig {
    GenerationConfig {
        page_attempts: 1,
        provider_attempts: 1,
        ..GenerationConfig::default()
    }
}

/// Drain the event stream until the producer finishes
pub async fn collect_events(mut rx: mpsc::Receiver<GenerationEvent>) -> Vec<GenerationEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

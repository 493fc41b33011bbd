//! Image generation orchestrator
//!
//! Drives the two-phase pipeline for one task: the cover is generated
//! first and its pixels become the visual reference for every remaining
//! page, which then run either sequentially or through a bounded worker
//! pool. Progress is pushed as typed events onto a bounded channel the
//! transport layer consumes at its own pace.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{GenerationConfig, ProviderConfig};
use crate::error::Result;
use crate::generator::{factory, ImageGenerator, ImageRequest};
use crate::retry::RetryPolicy;
use crate::service::events::{FinishData, GenerationEvent, Phase, RetryFinishData, RetryStartData};
use crate::service::prompt;
use crate::storage::TaskStorage;
use crate::task::store::TaskStore;
use crate::task::{ImageStyle, OutlineContext, Page, PageKind};

/// A running generation task: its resolved id and the event stream
pub struct GenerationRun {
    pub task_id: String,
    pub events: mpsc::Receiver<GenerationEvent>,
}

/// Context overrides for single-image retries. Fields left `None` fall
/// back to the stored task state.
#[derive(Debug, Clone, Default)]
pub struct RetryOverrides {
    pub full_outline: Option<String>,
    pub user_topic: Option<String>,
    pub style: Option<ImageStyle>,
}

/// Outcome of a single-image retry or regeneration
#[derive(Debug, Clone, Serialize)]
pub struct SingleImageResult {
    pub success: bool,
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

/// Result of one per-page generation routine run
#[derive(Debug)]
struct PageOutcome {
    index: u32,
    filename: Option<String>,
    error: Option<String>,
}

/// Image generation service, owned by the hosting application and
/// injected wherever generation is triggered.
#[derive(Clone)]
pub struct ImageService {
    generator: Arc<dyn ImageGenerator>,
    provider: ProviderConfig,
    store: Arc<TaskStore>,
    storage: TaskStorage,
    limits: GenerationConfig,
}

impl ImageService {
    /// Build the service for a provider configuration, constructing the
    /// matching adapter through the factory.
    pub fn new(
        provider: ProviderConfig,
        store: Arc<TaskStore>,
        storage: TaskStorage,
        limits: GenerationConfig,
    ) -> Result<Self> {
        let generator = factory::create(&provider)?;
        Ok(Self::with_generator(generator, provider, store, storage, limits))
    }

    /// Build the service around an existing adapter instance
    pub fn with_generator(
        generator: Arc<dyn ImageGenerator>,
        provider: ProviderConfig,
        store: Arc<TaskStore>,
        storage: TaskStorage,
        limits: GenerationConfig,
    ) -> Self {
        Self {
            generator,
            provider,
            store,
            storage,
            limits,
        }
    }

    /// Start generating one image per page for a task.
    ///
    /// The cover page runs first; its image seeds the reference set for
    /// the remaining pages. Returns the resolved task id and the event
    /// stream. Dropping the receiver abandons the run: in-flight workers
    /// finish and their results are discarded.
    pub async fn generate_images(
        &self,
        pages: Vec<Page>,
        task_id: Option<String>,
        mut context: OutlineContext,
    ) -> Result<GenerationRun> {
        let task_id = task_id.unwrap_or_else(generate_task_id);

        info!(
            task_id = %task_id,
            pages = pages.len(),
            provider = self.provider.kind.as_str(),
            "Starting image generation task"
        );

        self.storage.ensure_task_dir(&task_id).await?;

        // Compress user references once, up front
        context.user_images = self.storage.compress_references(&context.user_images)?;
        self.store.create(&task_id, pages.clone(), &context);

        let (tx, rx) = mpsc::channel(self.limits.event_buffer.max(1));

        let service = self.clone();
        let run_id = task_id.clone();
        tokio::spawn(async move {
            service.run_generation(pages, run_id, context, tx).await;
        });

        Ok(GenerationRun { task_id, events: rx })
    }

    async fn run_generation(
        self,
        pages: Vec<Page>,
        task_id: String,
        context: OutlineContext,
        tx: mpsc::Sender<GenerationEvent>,
    ) {
        let total = pages.len();
        let mut images: Vec<String> = Vec::new();
        let mut failed_indices: Vec<u32> = Vec::new();
        let mut cover_reference: Option<Vec<u8>> = None;

        // Phase 1: the cover is a hard dependency of everything else.
        // The first cover-typed page is it; without one, page index 0.
        let mut pages = pages;
        let cover_page = if pages.is_empty() {
            None
        } else {
            let position = pages
                .iter()
                .position(|p| p.kind == PageKind::Cover)
                .unwrap_or(0);
            Some(pages.remove(position))
        };
        let other_pages = pages;

        let mut consumer_open = true;

        if let Some(cover) = &cover_page {
            consumer_open &= send(&tx, GenerationEvent::cover_generating(cover.index, total)).await;

            // The cover itself can only reference user uploads
            let outcome = self
                .generate_page(cover, &task_id, context.user_images.clone(), &context)
                .await;

            if let Some(filename) = &outcome.filename {
                images.push(filename.clone());
                self.store.record_success(&task_id, outcome.index, filename);

                // Reload from disk and recompress so the reference is the
                // same bytes phase 2 will be judged against
                match self.storage.load_reference(&task_id, filename).await {
                    Ok(reference) => {
                        self.store.set_cover_image(&task_id, reference.clone());
                        cover_reference = Some(reference);
                    }
                    Err(e) => {
                        warn!(task_id = %task_id, error = %e, "Could not reload cover as reference");
                    }
                }

                consumer_open &= send(
                    &tx,
                    GenerationEvent::complete(
                        outcome.index,
                        TaskStorage::public_url(&task_id, filename),
                        Some(Phase::Cover),
                    ),
                )
                .await;
            } else {
                let message = outcome.error.unwrap_or_default();
                failed_indices.push(outcome.index);
                self.store.record_failure(&task_id, outcome.index, &message);

                consumer_open &=
                    send(&tx, GenerationEvent::error(outcome.index, message, Some(Phase::Cover)))
                        .await;
            }
        }

        // Phase 2: remaining pages, with the cover (when it exists)
        // appended to the user references
        if !other_pages.is_empty() && consumer_open {
            let mut references = context.user_images.clone();
            if let Some(cover) = cover_reference {
                references.push(cover);
            }

            if self.provider.high_concurrency {
                self.run_concurrent_batch(
                    &other_pages,
                    &task_id,
                    references,
                    &context,
                    total,
                    &mut images,
                    &mut failed_indices,
                    &mut consumer_open,
                    &tx,
                )
                .await;
            } else {
                consumer_open &= send(
                    &tx,
                    GenerationEvent::batch_start(
                        format!(
                            "Starting sequential generation of {} pages...",
                            other_pages.len()
                        ),
                        images.len(),
                        total,
                    ),
                )
                .await;

                for page in &other_pages {
                    if !consumer_open {
                        debug!(task_id = %task_id, "Consumer gone, abandoning sequential run");
                        return;
                    }

                    consumer_open &= send(
                        &tx,
                        GenerationEvent::generating(
                            page.index,
                            images.len() + 1,
                            total,
                            Phase::Content,
                        ),
                    )
                    .await;

                    let outcome = self
                        .generate_page(page, &task_id, references.clone(), &context)
                        .await;
                    consumer_open &= self
                        .collect_outcome(
                            outcome,
                            &task_id,
                            Some(Phase::Content),
                            &mut images,
                            &mut failed_indices,
                            &tx,
                        )
                        .await;
                }
            }
        }

        let finish = GenerationEvent::Finish(FinishData {
            success: failed_indices.is_empty(),
            task_id: task_id.clone(),
            completed: images.len(),
            failed: failed_indices.len(),
            images,
            total,
            failed_indices,
        });
        send(&tx, finish).await;

        info!(task_id = %task_id, "Image generation task finished");
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_concurrent_batch(
        &self,
        pages: &[Page],
        task_id: &str,
        references: Vec<Vec<u8>>,
        context: &OutlineContext,
        total: usize,
        images: &mut Vec<String>,
        failed_indices: &mut Vec<u32>,
        consumer_open: &mut bool,
        tx: &mpsc::Sender<GenerationEvent>,
    ) {
        *consumer_open &= send(
            tx,
            GenerationEvent::batch_start(
                format!("Starting concurrent generation of {} pages...", pages.len()),
                images.len(),
                total,
            ),
        )
        .await;

        let semaphore = Arc::new(Semaphore::new(self.limits.max_concurrent));
        let mut workers = JoinSet::new();

        for page in pages {
            let service = self.clone();
            let page = page.clone();
            let task_id = task_id.to_string();
            let references = references.clone();
            let context = context.clone();
            let semaphore = semaphore.clone();

            workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return PageOutcome {
                            index: page.index,
                            filename: None,
                            error: Some("Worker pool closed".to_string()),
                        }
                    }
                };
                service
                    .generate_page(&page, &task_id, references, &context)
                    .await
            });
        }

        for page in pages {
            *consumer_open &= send(
                tx,
                GenerationEvent::generating(page.index, images.len() + 1, total, Phase::Content),
            )
            .await;
        }

        // Completion order is whatever the pool yields. Even with the
        // consumer gone, keep draining so task state stays accurate.
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => {
                    *consumer_open &= self
                        .collect_outcome(
                            outcome,
                            task_id,
                            Some(Phase::Content),
                            images,
                            failed_indices,
                            tx,
                        )
                        .await;
                }
                Err(e) => {
                    error!(task_id = %task_id, error = %e, "Page worker aborted");
                }
            }
        }
    }

    /// Record one page outcome in the task state and emit its event.
    /// Returns false once the consumer has gone away.
    async fn collect_outcome(
        &self,
        outcome: PageOutcome,
        task_id: &str,
        phase: Option<Phase>,
        images: &mut Vec<String>,
        failed_indices: &mut Vec<u32>,
        tx: &mpsc::Sender<GenerationEvent>,
    ) -> bool {
        if let Some(filename) = &outcome.filename {
            images.push(filename.clone());
            self.store.record_success(task_id, outcome.index, filename);
            send(
                tx,
                GenerationEvent::complete(
                    outcome.index,
                    TaskStorage::public_url(task_id, filename),
                    phase,
                ),
            )
            .await
        } else {
            let message = outcome.error.unwrap_or_default();
            failed_indices.push(outcome.index);
            self.store.record_failure(task_id, outcome.index, &message);
            send(tx, GenerationEvent::error(outcome.index, message, phase)).await
        }
    }

    /// Generate one page end to end: prompt, provider call with its own
    /// retry budget, persistence. Retries the whole routine up to the
    /// page attempt budget with plain exponential backoff.
    async fn generate_page(
        &self,
        page: &Page,
        task_id: &str,
        references: Vec<Vec<u8>>,
        context: &OutlineContext,
    ) -> PageOutcome {
        let provider_retry =
            RetryPolicy::provider().with_attempts(self.limits.provider_attempts);
        let page_attempts = self.limits.page_attempts.max(1);

        let prompt = prompt::render(
            page,
            &context.full_outline,
            &context.user_topic,
            context.style,
            self.provider.short_prompt,
        );
        let request = self.build_request(prompt, references);

        let mut last_error = String::new();

        for attempt in 0..page_attempts {
            debug!(
                index = page.index,
                page_type = page.kind.as_str(),
                attempt = attempt + 1,
                max_attempts = page_attempts,
                "Generating page image"
            );

            let result = provider_retry.run(|| self.generator.generate(&request)).await;

            match result {
                Ok(image_data) => {
                    match self
                        .storage
                        .save_page_image(task_id, page.index, &image_data)
                        .await
                    {
                        Ok(filename) => {
                            info!(index = page.index, filename = %filename, "Page image generated");
                            return PageOutcome {
                                index: page.index,
                                filename: Some(filename),
                                error: None,
                            };
                        }
                        Err(e) => last_error = e.to_string(),
                    }
                }
                Err(e) => last_error = e.to_string(),
            }

            warn!(
                index = page.index,
                attempt = attempt + 1,
                max_attempts = page_attempts,
                "Page generation attempt failed: {}",
                last_error.chars().take(200).collect::<String>()
            );

            if attempt + 1 < page_attempts {
                tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
            }
        }

        error!(index = page.index, "Page generation failed, retries exhausted");
        PageOutcome {
            index: page.index,
            filename: None,
            error: Some(last_error),
        }
    }

    fn build_request(&self, prompt: String, references: Vec<Vec<u8>>) -> ImageRequest {
        ImageRequest {
            prompt,
            model: self.provider.model.clone(),
            size: self.provider.default_size.clone(),
            aspect_ratio: self.provider.default_aspect_ratio.clone(),
            temperature: self.provider.temperature,
            quality: self.provider.quality.clone(),
            references,
        }
    }

    /// Re-run one page using stored or overridden context. Succeeded
    /// pages may be overwritten; only this page's entries change.
    pub async fn retry_single_image(
        &self,
        task_id: &str,
        page: Page,
        use_reference: bool,
        overrides: RetryOverrides,
    ) -> Result<SingleImageResult> {
        self.storage.ensure_task_dir(task_id).await?;

        let stored = self.store.retry_context(task_id).unwrap_or_default();

        let context = OutlineContext {
            full_outline: overrides
                .full_outline
                .filter(|s| !s.is_empty())
                .unwrap_or(stored.full_outline),
            user_topic: overrides
                .user_topic
                .filter(|s| !s.is_empty())
                .unwrap_or(stored.user_topic),
            style: overrides.style.or(stored.style).unwrap_or_default(),
            user_images: stored.user_images,
        };

        let mut references = context.user_images.clone();
        if use_reference {
            let cover = match stored.cover_image {
                Some(cover) => Some(cover),
                // No cover cached in memory: fall back to the file on disk
                None => self.storage.load_cover_fallback(task_id).await?,
            };
            if let Some(cover) = cover {
                references.push(cover);
            }
        }

        let outcome = self
            .generate_page(&page, task_id, references, &context)
            .await;

        if let Some(filename) = &outcome.filename {
            self.store.record_success(task_id, outcome.index, filename);
            Ok(SingleImageResult {
                success: true,
                index: outcome.index,
                image_url: Some(TaskStorage::public_url(task_id, filename)),
                error: None,
                retryable: None,
            })
        } else {
            Ok(SingleImageResult {
                success: false,
                index: outcome.index,
                image_url: None,
                error: outcome.error,
                retryable: Some(true),
            })
        }
    }

    /// Batch-retry failed pages, seeded entirely from stored task state.
    /// No cover phase: the stored reference is reused as-is.
    pub async fn retry_failed_images(
        &self,
        task_id: &str,
        pages: Vec<Page>,
    ) -> mpsc::Receiver<GenerationEvent> {
        let (tx, rx) = mpsc::channel(self.limits.event_buffer.max(1));

        let service = self.clone();
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            service.run_retry_batch(pages, task_id, tx).await;
        });

        rx
    }

    async fn run_retry_batch(
        self,
        pages: Vec<Page>,
        task_id: String,
        tx: mpsc::Sender<GenerationEvent>,
    ) {
        let stored = self.store.retry_context(&task_id).unwrap_or_default();
        let context = OutlineContext {
            full_outline: stored.full_outline,
            user_topic: stored.user_topic,
            style: stored.style.unwrap_or_default(),
            user_images: stored.user_images,
        };

        let mut references = context.user_images.clone();
        if let Some(cover) = stored.cover_image {
            references.push(cover);
        }

        let total = pages.len();
        info!(task_id = %task_id, total = total, "Retrying failed images");

        send(
            &tx,
            GenerationEvent::RetryStart(RetryStartData {
                total,
                message: format!("Starting retry of {} failed images", total),
            }),
        )
        .await;

        let semaphore = Arc::new(Semaphore::new(self.limits.max_concurrent));
        let mut workers = JoinSet::new();

        for page in pages {
            let service = self.clone();
            let task_id = task_id.clone();
            let references = references.clone();
            let context = context.clone();
            let semaphore = semaphore.clone();

            workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return PageOutcome {
                            index: page.index,
                            filename: None,
                            error: Some("Worker pool closed".to_string()),
                        }
                    }
                };
                service
                    .generate_page(&page, &task_id, references, &context)
                    .await
            });
        }

        let mut completed = 0usize;
        let mut failed = 0usize;

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => {
                    if let Some(filename) = &outcome.filename {
                        completed += 1;
                        self.store.record_success(&task_id, outcome.index, filename);
                        send(
                            &tx,
                            GenerationEvent::complete(
                                outcome.index,
                                TaskStorage::public_url(&task_id, filename),
                                None,
                            ),
                        )
                        .await;
                    } else {
                        failed += 1;
                        let message = outcome.error.unwrap_or_default();
                        self.store.record_failure(&task_id, outcome.index, &message);
                        send(&tx, GenerationEvent::error(outcome.index, message, None)).await;
                    }
                }
                Err(e) => {
                    failed += 1;
                    error!(task_id = %task_id, error = %e, "Retry worker aborted");
                }
            }
        }

        send(
            &tx,
            GenerationEvent::RetryFinish(RetryFinishData {
                success: failed == 0,
                total,
                completed,
                failed,
            }),
        )
        .await;
    }

    /// User-triggered regeneration of a page regardless of prior success
    pub async fn regenerate_image(
        &self,
        task_id: &str,
        page: Page,
        use_reference: bool,
        overrides: RetryOverrides,
    ) -> Result<SingleImageResult> {
        self.retry_single_image(task_id, page, use_reference, overrides)
            .await
    }

    /// Full path of a stored task image, for the route layer
    pub fn image_path(&self, task_id: &str, filename: &str) -> std::path::PathBuf {
        self.storage.image_path(task_id, filename)
    }

    /// Snapshot of a task's state
    pub fn task_state(&self, task_id: &str) -> Option<crate::task::store::TaskState> {
        self.store.get(task_id)
    }

    /// Drop a task's in-memory state
    pub fn cleanup_task(&self, task_id: &str) {
        self.store.remove(task_id);
    }
}

fn generate_task_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("task_{}", &hex[..8])
}

/// Push an event, reporting whether the consumer is still listening
async fn send(tx: &mpsc::Sender<GenerationEvent>, event: GenerationEvent) -> bool {
    tx.send(event).await.is_ok()
}

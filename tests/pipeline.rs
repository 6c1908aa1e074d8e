//! Integration tests for the page-processing pipeline.
//!
//! These tests exercise the fan-out, retry, ordering, and combination logic
//! through the [`VisionModel`] seam with scripted mock models — no pdfium,
//! no network, no API keys.

use async_trait::async_trait;
use pagemark::{
    combine_markdown, transcribe_batch, ConversionConfig, ModelError, PageImage, Transcriber,
    VisionModel,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

static TRACING: std::sync::Once = std::sync::Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Write a fake page artifact whose bytes encode the page number, so mock
/// models can tell pages apart without filename parsing.
fn page_image(dir: &Path, page_num: usize) -> PageImage {
    init_tracing();
    let path = dir.join(format!("page_{page_num:03}.jpg"));
    std::fs::write(&path, format!("img-{page_num}")).unwrap();
    PageImage {
        page_num,
        path,
        doc_hash: "cafebabe00000000".to_string(),
    }
}

fn page_from_bytes(bytes: &[u8]) -> usize {
    std::str::from_utf8(bytes)
        .unwrap()
        .strip_prefix("img-")
        .unwrap()
        .parse()
        .unwrap()
}

fn fast_config() -> ConversionConfig {
    ConversionConfig::builder()
        .retry_delay_ms(1)
        .worker_count(4)
        .build()
        .unwrap()
}

/// Scripted model: per-page behaviour, with call counting.
struct ScriptedModel {
    /// Pages that fail on every attempt.
    always_fail: Vec<usize>,
    /// Pages that return an empty response on every attempt.
    always_empty: Vec<usize>,
    /// page → number of failures before the first success.
    fail_first: HashMap<usize, u32>,
    /// Delay per call, to scramble completion order.
    delay_per_page_ms: u64,
    calls: Mutex<HashMap<usize, u32>>,
}

impl ScriptedModel {
    fn ok() -> Self {
        Self {
            always_fail: Vec::new(),
            always_empty: Vec::new(),
            fail_first: HashMap::new(),
            delay_per_page_ms: 0,
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn calls_for(&self, page: usize) -> u32 {
        *self.calls.lock().unwrap().get(&page).unwrap_or(&0)
    }
}

#[async_trait]
impl VisionModel for ScriptedModel {
    async fn transcribe_image(
        &self,
        image_bytes: &[u8],
        _mime_type: &str,
        _instruction: &str,
    ) -> Result<String, ModelError> {
        let page = page_from_bytes(image_bytes);
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let entry = calls.entry(page).or_insert(0);
            *entry += 1;
            *entry
        };

        if self.delay_per_page_ms > 0 {
            // Later pages finish first: page N sleeps less than page 1.
            let weight = 10usize.saturating_sub(page) as u64;
            tokio::time::sleep(Duration::from_millis(self.delay_per_page_ms * weight)).await;
        }

        if self.always_fail.contains(&page) {
            return Err(ModelError(format!("scripted failure for page {page}")));
        }
        if self.always_empty.contains(&page) {
            return Ok("   \n".to_string());
        }
        if let Some(&failures) = self.fail_first.get(&page) {
            if call <= failures {
                return Err(ModelError(format!("transient fault {call}")));
            }
        }

        Ok(format!("content of page {page}"))
    }
}

// ── Ordering ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn combined_output_is_page_ordered_regardless_of_completion_order() {
    let dir = tempfile::tempdir().unwrap();
    let images: Vec<_> = (1..=5).map(|n| page_image(dir.path(), n)).collect();

    let model = Arc::new(ScriptedModel {
        delay_per_page_ms: 20,
        ..ScriptedModel::ok()
    });

    let mut outcomes = transcribe_batch(model, images, &fast_config()).await;
    outcomes.sort_by_key(|o| o.page_num);
    let md = combine_markdown(&outcomes);

    let positions: Vec<_> = (1..=5)
        .map(|n| md.find(&format!("## Page {n}\n")).unwrap())
        .collect();
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "sections out of order: {positions:?}"
    );
}

#[tokio::test]
async fn every_submitted_image_produces_exactly_one_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let images: Vec<_> = (1..=7).map(|n| page_image(dir.path(), n)).collect();

    let model = Arc::new(ScriptedModel {
        always_fail: vec![2, 5],
        ..ScriptedModel::ok()
    });

    let outcomes = transcribe_batch(model, images, &fast_config()).await;

    assert_eq!(outcomes.len(), 7);
    let mut pages: Vec<_> = outcomes.iter().map(|o| o.page_num).collect();
    pages.sort_unstable();
    assert_eq!(pages, vec![1, 2, 3, 4, 5, 6, 7]);

    let successful = outcomes.iter().filter(|o| o.is_success()).count();
    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    assert_eq!(successful + failed, outcomes.len());
    assert_eq!(failed, 2);
}

// ── Retry semantics ──────────────────────────────────────────────────────────

#[tokio::test]
async fn persistent_failure_uses_exactly_max_retries_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let image = page_image(dir.path(), 1);

    let model = Arc::new(ScriptedModel {
        always_fail: vec![1],
        ..ScriptedModel::ok()
    });
    let config = ConversionConfig::builder()
        .max_retries(4)
        .retry_delay_ms(1)
        .build()
        .unwrap();

    let outcome = Transcriber::new(model.clone(), &config)
        .transcribe(&image)
        .await;

    assert_eq!(model.calls_for(1), 4);
    assert!(!outcome.is_success());
    assert_eq!(outcome.attempts, 4);
    let detail = outcome.error.unwrap().to_string();
    assert!(detail.contains("4 attempts"), "got: {detail}");
    assert!(detail.contains("scripted failure"), "got: {detail}");
    assert!(outcome.markdown.is_empty());
}

#[tokio::test]
async fn success_on_attempt_k_stops_retrying() {
    let dir = tempfile::tempdir().unwrap();
    let image = page_image(dir.path(), 3);

    let model = Arc::new(ScriptedModel {
        fail_first: HashMap::from([(3, 2)]),
        ..ScriptedModel::ok()
    });
    let config = ConversionConfig::builder()
        .max_retries(5)
        .retry_delay_ms(1)
        .build()
        .unwrap();

    let outcome = Transcriber::new(model.clone(), &config)
        .transcribe(&image)
        .await;

    // Two failures, then success on the third attempt — and no further calls.
    assert_eq!(model.calls_for(3), 3);
    assert!(outcome.is_success());
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.markdown, "content of page 3");
}

#[tokio::test]
async fn single_attempt_config_never_retries() {
    let dir = tempfile::tempdir().unwrap();
    let image = page_image(dir.path(), 1);

    let model = Arc::new(ScriptedModel {
        always_fail: vec![1],
        ..ScriptedModel::ok()
    });
    let config = ConversionConfig::builder()
        .max_retries(1)
        .retry_delay_ms(1)
        .build()
        .unwrap();

    let outcome = Transcriber::new(model.clone(), &config)
        .transcribe(&image)
        .await;

    assert_eq!(model.calls_for(1), 1);
    assert!(!outcome.is_success());
}

// ── Empty responses ──────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_response_is_a_failure_not_empty_success() {
    let dir = tempfile::tempdir().unwrap();
    let image = page_image(dir.path(), 2);

    let model = Arc::new(ScriptedModel {
        always_empty: vec![2],
        ..ScriptedModel::ok()
    });
    let config = ConversionConfig::builder()
        .max_retries(2)
        .retry_delay_ms(1)
        .build()
        .unwrap();

    let outcome = Transcriber::new(model.clone(), &config)
        .transcribe(&image)
        .await;

    // Empty content is retried like any other fault, then recorded as error.
    assert_eq!(model.calls_for(2), 2);
    assert!(!outcome.is_success());
    let detail = outcome.error.unwrap().to_string();
    assert!(detail.contains("empty response"), "got: {detail}");
}

// ── Timeouts ─────────────────────────────────────────────────────────────────

struct HangingModel;

#[async_trait]
impl VisionModel for HangingModel {
    async fn transcribe_image(
        &self,
        _image_bytes: &[u8],
        _mime_type: &str,
        _instruction: &str,
    ) -> Result<String, ModelError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("unreachable".to_string())
    }
}

#[tokio::test]
async fn hung_model_call_burns_one_attempt_via_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let image = page_image(dir.path(), 1);

    let config = ConversionConfig::builder()
        .max_retries(1)
        .retry_delay_ms(1)
        .api_timeout_secs(1)
        .build()
        .unwrap();

    let outcome = Transcriber::new(Arc::new(HangingModel), &config)
        .transcribe(&image)
        .await;

    assert!(!outcome.is_success());
    let detail = outcome.error.unwrap().to_string();
    assert!(detail.contains("timed out"), "got: {detail}");
}

// ── The canonical partial-failure scenario ───────────────────────────────────

#[tokio::test]
async fn three_pages_with_page_two_failing_assembles_best_effort_document() {
    let dir = tempfile::tempdir().unwrap();
    let images: Vec<_> = (1..=3).map(|n| page_image(dir.path(), n)).collect();

    let model = Arc::new(ScriptedModel {
        always_fail: vec![2],
        ..ScriptedModel::ok()
    });
    let config = ConversionConfig::builder()
        .max_retries(3)
        .retry_delay_ms(1)
        .build()
        .unwrap();

    let mut outcomes = transcribe_batch(model.clone(), images, &config).await;
    outcomes.sort_by_key(|o| o.page_num);

    // Page 2 used all attempts before being recorded as an error.
    assert_eq!(model.calls_for(2), 3);

    let successful = outcomes.iter().filter(|o| o.is_success()).count();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(successful, 2);

    let md = combine_markdown(&outcomes);
    let p1 = md.find("## Page 1\n").unwrap();
    let p2 = md.find("## Page 2 - Error\n").unwrap();
    let p3 = md.find("## Page 3\n").unwrap();
    assert!(p1 < p2 && p2 < p3);
    assert!(md.contains("content of page 1"));
    assert!(md.contains("*Error processing this page:"));
    assert!(md.contains("content of page 3"));
}

// ── Worker faults ────────────────────────────────────────────────────────────

struct PanickingModel;

#[async_trait]
impl VisionModel for PanickingModel {
    async fn transcribe_image(
        &self,
        image_bytes: &[u8],
        _mime_type: &str,
        _instruction: &str,
    ) -> Result<String, ModelError> {
        let page = page_from_bytes(image_bytes);
        if page == 2 {
            panic!("model client bug");
        }
        Ok(format!("content of page {page}"))
    }
}

#[tokio::test]
async fn panicking_worker_is_captured_as_a_page_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let images: Vec<_> = (1..=3).map(|n| page_image(dir.path(), n)).collect();

    let config = ConversionConfig::builder()
        .max_retries(1)
        .retry_delay_ms(1)
        .build()
        .unwrap();

    let mut outcomes = transcribe_batch(Arc::new(PanickingModel), images, &config).await;
    outcomes.sort_by_key(|o| o.page_num);

    assert_eq!(outcomes.len(), 3, "no page may be lost to a panic");
    assert!(outcomes[0].is_success());
    assert!(!outcomes[1].is_success());
    assert!(outcomes[2].is_success());
    let detail = outcomes[1].error.as_ref().unwrap().to_string();
    assert!(detail.contains("faulted"), "got: {detail}");
}

// ── Default instruction plumbing ─────────────────────────────────────────────

struct InstructionRecorder {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl VisionModel for InstructionRecorder {
    async fn transcribe_image(
        &self,
        _image_bytes: &[u8],
        _mime_type: &str,
        instruction: &str,
    ) -> Result<String, ModelError> {
        self.seen.lock().unwrap().push(instruction.to_string());
        Ok("ok".to_string())
    }
}

#[tokio::test]
async fn custom_instruction_overrides_the_default() {
    let dir = tempfile::tempdir().unwrap();
    let image = page_image(dir.path(), 1);

    let recorder = Arc::new(InstructionRecorder {
        seen: Mutex::new(Vec::new()),
    });

    let default_config = fast_config();
    Transcriber::new(recorder.clone(), &default_config)
        .transcribe(&image)
        .await;

    let custom_config = ConversionConfig::builder()
        .retry_delay_ms(1)
        .instruction("Tables only, as CSV")
        .build()
        .unwrap();
    Transcriber::new(recorder.clone(), &custom_config)
        .transcribe(&image)
        .await;

    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].contains("Markdown only"), "got: {}", seen[0]);
    assert_eq!(seen[1], "Tables only, as CSV");
}

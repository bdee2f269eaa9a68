//! Test doubles shared by the unit tests

use crate::embeddings::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::llm::{CompletionOptions, CompletionProvider};
use crate::models::{DocumentRecord, FileSummary};
use crate::store::{DocumentFetcher, InMemoryDocumentStore};
use chrono::{TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn doc(id: &str, title: &str, content: &str) -> DocumentRecord {
    DocumentRecord::new(
        id,
        title,
        content,
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        format!("memory://{}", id),
    )
}

const VOCABULARY: &[&str] = &["apple", "fruit", "tree", "car", "engine", "wheel", "ai", "report"];

/// Bag-of-keywords embedder: one dimension per vocabulary word plus a bias
pub struct KeywordEmbedder {
    calls: AtomicUsize,
    fail_on: Option<String>,
    nan_on: Option<String>,
    delay: Option<Duration>,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: None,
            nan_on: None,
            delay: None,
        }
    }

    /// Fail any input containing `needle`
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    /// Return a NaN-poisoned vector for any input containing `needle`
    pub fn nan_on(mut self, needle: &str) -> Self {
        self.nan_on = Some(needle.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn compute_embedding(&self, content: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(needle) = &self.fail_on {
            if content.contains(needle.as_str()) {
                return Err(Error::Embedding(format!("refusing to embed {:?}", needle)));
            }
        }

        if let Some(needle) = &self.nan_on {
            if content.contains(needle.as_str()) {
                return Ok(vec![f32::NAN; self.dimension()]);
            }
        }

        let lower = content.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let mut vector: Vec<f32> = VOCABULARY
            .iter()
            .map(|term| words.iter().filter(|w| w.starts_with(term)).count() as f32)
            .collect();
        vector.push(0.1);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len() + 1
    }
}

/// Completion double that replays scripted replies in order
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<(String, Option<String>)>>,
    options: Mutex<Vec<CompletionOptions>>,
    fallback: String,
    slow_calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedCompletion {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
            fallback: "scripted answer".to_string(),
            slow_calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Queue a failure after the replies queued so far
    pub fn then_fail(self, error: Error) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    /// Make the next `count` calls sleep for `delay` before replying
    pub fn slow_for(mut self, count: usize, delay: Duration) -> Self {
        self.slow_calls = AtomicUsize::new(count);
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<(String, Option<String>)> {
        self.prompts.lock().unwrap().clone()
    }

    /// Sampling options of every call, in call order
    pub fn options(&self) -> Vec<CompletionOptions> {
        self.options.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(&self, prompt: &str, context: Option<&str>) -> Result<String> {
        self.complete_with(prompt, context, CompletionOptions::default())
            .await
    }

    async fn complete_with(
        &self,
        prompt: &str,
        context: Option<&str>,
        options: CompletionOptions,
    ) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), context.map(str::to_string)));
        self.options.lock().unwrap().push(options);

        let slow = self
            .slow_calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if slow {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// In-memory store that counts every call made to it
pub struct CountingStore {
    inner: InMemoryDocumentStore,
    pub list_all_calls: AtomicUsize,
    pub read_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub list_files_calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(documents: Vec<DocumentRecord>) -> Self {
        Self {
            inner: InMemoryDocumentStore::with_documents(documents),
            list_all_calls: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            list_files_calls: AtomicUsize::new(0),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.list_all_calls.load(Ordering::SeqCst)
            + self.read_calls.load(Ordering::SeqCst)
            + self.create_calls.load(Ordering::SeqCst)
            + self.list_files_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DocumentFetcher for CountingStore {
    async fn list_all(&self) -> Result<Vec<DocumentRecord>> {
        self.list_all_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_all().await
    }

    async fn read(&self, document_id: &str) -> Result<DocumentRecord> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.read(document_id).await
    }

    async fn create(&self, title: &str, body: &str) -> Result<DocumentRecord> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.create(title, body).await
    }

    async fn list_files(&self, limit: usize, mime_type: Option<&str>) -> Result<Vec<FileSummary>> {
        self.list_files_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_files(limit, mime_type).await
    }
}

/// Store whose every call fails
pub struct FailingStore;

#[async_trait::async_trait]
impl DocumentFetcher for FailingStore {
    async fn list_all(&self) -> Result<Vec<DocumentRecord>> {
        Err(Error::Fetch("store unavailable".to_string()))
    }

    async fn read(&self, _document_id: &str) -> Result<DocumentRecord> {
        Err(Error::Fetch("store unavailable".to_string()))
    }

    async fn create(&self, _title: &str, _body: &str) -> Result<DocumentRecord> {
        Err(Error::Write("store unavailable".to_string()))
    }

    async fn list_files(&self, _limit: usize, _mime_type: Option<&str>) -> Result<Vec<FileSummary>> {
        Err(Error::Fetch("store unavailable".to_string()))
    }
}

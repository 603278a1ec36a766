#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use bytes::Bytes;
use futures::stream::BoxStream;

use rec2text::application::ports::{
    AudioStore, AudioStoreError, StagedAudio, TranscriptionEngine, TranscriptionError,
};
use rec2text::application::services::TranscriptionService;
use rec2text::domain::StoragePath;
use rec2text::infrastructure::storage::LocalAudioStore;
use rec2text::presentation::{AppState, UploadSettings, create_router};

pub const BOUNDARY: &str = "rec2text-test-boundary";
pub const TEST_LANGUAGE: &str = "en";

#[derive(Clone)]
pub enum Behavior {
    /// Returns the staged file contents as text.
    Echo,
    Fixed(String),
    Fail(String),
    Hang,
}

/// Engine double that records every call and the interval it was running.
pub struct ScriptedEngine {
    behavior: Behavior,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    intervals: Mutex<Vec<(Instant, Instant)>>,
    seen_paths: Mutex<Vec<PathBuf>>,
    languages: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            intervals: Mutex::new(Vec::new()),
            seen_paths: Mutex::new(Vec::new()),
            languages: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn intervals(&self) -> Vec<(Instant, Instant)> {
        self.intervals.lock().unwrap().clone()
    }

    pub fn seen_paths(&self) -> Vec<PathBuf> {
        self.seen_paths.lock().unwrap().clone()
    }

    pub fn languages(&self) -> Vec<String> {
        self.languages.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TranscriptionEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        let started = Instant::now();
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.seen_paths
            .lock()
            .unwrap()
            .push(audio_path.to_path_buf());
        self.languages.lock().unwrap().push(language.to_string());

        let contents = tokio::fs::read(audio_path).await;

        if matches!(self.behavior, Behavior::Hang) {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.intervals
            .lock()
            .unwrap()
            .push((started, Instant::now()));

        match &self.behavior {
            Behavior::Echo => {
                let bytes = contents.map_err(|e| {
                    TranscriptionError::DecodingFailed(format!("read audio: {}", e))
                })?;
                Ok(String::from_utf8_lossy(&bytes).to_string())
            }
            Behavior::Fixed(text) => Ok(text.clone()),
            Behavior::Fail(reason) => Err(TranscriptionError::DecodingFailed(reason.clone())),
            Behavior::Hang => unreachable!(),
        }
    }
}

/// Local store that counts store and release calls.
pub struct TrackingStore {
    inner: LocalAudioStore,
    stores: AtomicUsize,
    releases: AtomicUsize,
}

impl TrackingStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            inner: LocalAudioStore::new(base_path).unwrap(),
            stores: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    pub fn stores(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AudioStore for TrackingStore {
    async fn store(
        &self,
        path: &StoragePath,
        stream: BoxStream<'_, Result<Bytes, io::Error>>,
        content_length: Option<u64>,
    ) -> Result<StagedAudio, AudioStoreError> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        self.inner.store(path, stream, content_length).await
    }

    async fn release(&self, staged: StagedAudio) -> Result<(), AudioStoreError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release(staged).await
    }

    async fn head(&self, path: &StoragePath) -> Result<u64, AudioStoreError> {
        self.inner.head(path).await
    }
}

/// Store whose medium rejects every write.
pub struct FailingStore {
    pub stores: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            stores: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl AudioStore for FailingStore {
    async fn store(
        &self,
        _path: &StoragePath,
        _stream: BoxStream<'_, Result<Bytes, io::Error>>,
        _content_length: Option<u64>,
    ) -> Result<StagedAudio, AudioStoreError> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        Err(AudioStoreError::WriteFailed("no space left on device".to_string()))
    }

    async fn release(&self, _staged: StagedAudio) -> Result<(), AudioStoreError> {
        Ok(())
    }

    async fn head(&self, path: &StoragePath) -> Result<u64, AudioStoreError> {
        Err(AudioStoreError::NotFound(path.to_string()))
    }
}

pub fn test_upload_settings() -> UploadSettings {
    UploadSettings {
        max_file_size_mb: 1,
        read_timeout_secs: 1,
    }
}

pub fn build_app(
    audio_store: Arc<dyn AudioStore>,
    engine: Arc<dyn TranscriptionEngine>,
) -> Router {
    let transcription_service = Arc::new(TranscriptionService::new(
        audio_store,
        engine,
        TEST_LANGUAGE,
    ));
    create_router(AppState {
        transcription_service,
        upload: test_upload_settings(),
    })
}

pub fn multipart_body(field: &str, filename: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    match filename {
        Some(name) => body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: audio/wav\r\n\r\n",
                field, name
            )
            .as_bytes(),
        ),
        None => body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", field).as_bytes(),
        ),
    }
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/speechToText")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(body.into())
        .unwrap()
}

pub fn build_wav(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let data_size = (samples.len() * 2) as u32;
    let block_align = channels * 2;
    let byte_rate = sample_rate * block_align as u32;
    let file_size = 36 + data_size;

    let mut wav = Vec::with_capacity(44 + data_size as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&file_size.to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    for &s in samples {
        wav.extend_from_slice(&s.to_le_bytes());
    }
    wav
}

pub fn entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Polls until `dir` is empty or `within` elapses.
pub async fn wait_until_empty(dir: &Path, within: Duration) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if entry_count(dir) == 0 {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    entry_count(dir) == 0
}

//! Mock backend for testing the session and playback without a server.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{ApiFuture, BookApi};
use crate::{BookMeta, Sentence, SessionError};

/// A scripted response sequence: one entry per call, repeating the last
/// entry once exhausted.
struct Script<T: Clone> {
    // Reversed so we can pop() from the front cheaply.
    seq: Mutex<Vec<T>>,
    fallback: T,
}

impl<T: Clone> Script<T> {
    fn always(fallback: T) -> Self {
        Self {
            seq: Mutex::new(Vec::new()),
            fallback,
        }
    }

    fn sequence(mut responses: Vec<T>, fallback: T) -> Self {
        responses.reverse();
        Self {
            seq: Mutex::new(responses),
            fallback,
        }
    }

    fn next(&self) -> T {
        let mut seq = self.seq.lock().unwrap();
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

/// A hand-rolled mock implementing [`BookApi`] for tests.
///
/// Supports:
/// - Scripted metadata / save / TTS responses (last entry repeats).
/// - Per-paragraph-id fetch failures.
/// - Optional per-call latency.
/// - Call counting and a record of every saved position.
///
/// Paragraph fetches that are not scripted to fail return two generated
/// sentences in *descending* id order, so consumers must sort.
pub struct MockBookApi {
    meta: Script<Result<BookMeta, SessionError>>,
    saves: Script<Result<(), SessionError>>,
    tts: Script<Result<Vec<u8>, SessionError>>,
    paragraph_failures: Mutex<HashMap<u64, SessionError>>,
    delay: Option<Duration>,
    meta_calls: AtomicUsize,
    paragraph_calls: AtomicUsize,
    save_calls: AtomicUsize,
    tts_calls: AtomicUsize,
    saved_positions: Mutex<Vec<u64>>,
}

impl MockBookApi {
    /// Create a mock that always serves `meta` and succeeds everywhere else.
    pub fn new(meta: BookMeta) -> Self {
        Self {
            meta: Script::always(Ok(meta)),
            saves: Script::always(Ok(())),
            tts: Script::always(Ok(vec![0xFF, 0xF3, 0x00, 0x00])),
            paragraph_failures: Mutex::new(HashMap::new()),
            delay: None,
            meta_calls: AtomicUsize::new(0),
            paragraph_calls: AtomicUsize::new(0),
            save_calls: AtomicUsize::new(0),
            tts_calls: AtomicUsize::new(0),
            saved_positions: Mutex::new(Vec::new()),
        }
    }

    /// Convenience metadata for a book spanning `[min, max]`.
    pub fn meta(min: u64, max: u64, current: Option<u64>) -> BookMeta {
        BookMeta {
            id_book: 1,
            book_name: "Test Book".into(),
            current_paragraph: current,
            min_paragraph_number: min,
            max_paragraph_number: max,
            paragraphs_read_24h: None,
        }
    }

    /// Script metadata responses in order; the last repeats.
    pub fn with_meta_sequence(mut self, responses: Vec<Result<BookMeta, SessionError>>) -> Self {
        let fallback = responses.last().cloned().expect("sequence must not be empty");
        self.meta = Script::sequence(responses, fallback);
        self
    }

    /// Script save responses in order; the last repeats.
    pub fn with_save_results(mut self, responses: Vec<Result<(), SessionError>>) -> Self {
        let fallback = responses.last().cloned().expect("sequence must not be empty");
        self.saves = Script::sequence(responses, fallback);
        self
    }

    /// Script TTS responses in order; the last repeats.
    pub fn with_tts_results(mut self, responses: Vec<Result<Vec<u8>, SessionError>>) -> Self {
        let fallback = responses.last().cloned().expect("sequence must not be empty");
        self.tts = Script::sequence(responses, fallback);
        self
    }

    /// Set simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make every fetch of `paragraph_id` fail with `error`.
    pub fn fail_paragraph(&self, paragraph_id: u64, error: SessionError) {
        self.paragraph_failures
            .lock()
            .unwrap()
            .insert(paragraph_id, error);
    }

    pub fn clear_paragraph_failures(&self) {
        self.paragraph_failures.lock().unwrap().clear();
    }

    pub fn meta_calls(&self) -> usize {
        self.meta_calls.load(Ordering::SeqCst)
    }

    pub fn paragraph_calls(&self) -> usize {
        self.paragraph_calls.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn tts_calls(&self) -> usize {
        self.tts_calls.load(Ordering::SeqCst)
    }

    /// Every position handed to `save_position`, in call order.
    pub fn saved_positions(&self) -> Vec<u64> {
        self.saved_positions.lock().unwrap().clone()
    }

    async fn simulate_latency(delay: Option<Duration>) {
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
    }
}

impl BookApi for MockBookApi {
    fn fetch_book(&self, _book_id: u64) -> ApiFuture<'_, BookMeta> {
        self.meta_calls.fetch_add(1, Ordering::SeqCst);
        let response = self.meta.next();
        let delay = self.delay;
        Box::pin(async move {
            Self::simulate_latency(delay).await;
            response
        })
    }

    fn fetch_paragraph(&self, _book_id: u64, paragraph_id: u64) -> ApiFuture<'_, Vec<Sentence>> {
        self.paragraph_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .paragraph_failures
            .lock()
            .unwrap()
            .get(&paragraph_id)
            .cloned();
        let delay = self.delay;
        Box::pin(async move {
            Self::simulate_latency(delay).await;
            if let Some(error) = failure {
                return Err(error);
            }
            // Served out of order on purpose: the contract says the
            // consumer sorts by id_sentence.
            Ok(vec![
                Sentence {
                    id_sentence: 2,
                    sentence: format!("Second sentence of paragraph {paragraph_id}."),
                },
                Sentence {
                    id_sentence: 1,
                    sentence: format!("First sentence of paragraph {paragraph_id}."),
                },
            ])
        })
    }

    fn save_position(&self, _book_id: u64, new_paragraph: u64) -> ApiFuture<'_, ()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let response = self.saves.next();
        if response.is_ok() {
            self.saved_positions.lock().unwrap().push(new_paragraph);
        }
        let delay = self.delay;
        Box::pin(async move {
            Self::simulate_latency(delay).await;
            response
        })
    }

    fn synthesize<'a>(&'a self, _text: &'a str) -> ApiFuture<'a, Vec<u8>> {
        self.tts_calls.fetch_add(1, Ordering::SeqCst);
        let response = self.tts.next();
        let delay = self.delay;
        Box::pin(async move {
            Self::simulate_latency(delay).await;
            response
        })
    }
}

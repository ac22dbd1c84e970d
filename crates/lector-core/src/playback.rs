//! Single-item audio playback lifecycle for spoken sentences.
//!
//! State machine over `{Idle, Loading, Playing, Paused}` driven by user
//! actions and the natural end of playback. At most one audio resource is
//! alive at any time; a newer `play()` supersedes any in-flight or active
//! one, and `stop()` always releases the resource.

use std::sync::Arc;
use std::sync::Mutex;

use crate::api::BookApi;
use crate::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
}

/// Seam to a real audio device. Implementations decode the synthesized
/// payload and start playing it immediately.
pub trait AudioSink: Send + Sync {
    fn start(&self, audio: Vec<u8>) -> Result<Box<dyn AudioHandle>, String>;
}

/// The one live playback resource. Dropping the handle releases it.
pub trait AudioHandle: Send {
    fn pause(&self);
    fn resume(&self);
    fn is_finished(&self) -> bool;
}

struct PlayerInner {
    state: PlaybackState,
    handle: Option<Box<dyn AudioHandle>>,
    /// Bumped by every `play()` and `stop()`; an in-flight synthesis whose
    /// generation no longer matches is discarded on arrival.
    generation: u64,
}

/// Playback controller for text-to-speech snippets.
///
/// Methods take `&self` so concurrent `play()` calls from separate tasks
/// race safely: exactly one generation wins and exactly one resource stays
/// alive. The lock is never held across an await.
pub struct Player {
    api: Arc<dyn BookApi>,
    sink: Box<dyn AudioSink>,
    inner: Mutex<PlayerInner>,
}

impl Player {
    pub fn new(api: Arc<dyn BookApi>, sink: Box<dyn AudioSink>) -> Self {
        Self {
            api,
            sink,
            inner: Mutex::new(PlayerInner {
                state: PlaybackState::Idle,
                handle: None,
                generation: 0,
            }),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.lock().unwrap().state
    }

    /// Synthesize `text` and start playing it. No-op on empty text.
    ///
    /// On synthesis or decode failure the player returns to `Idle` with
    /// the resource released and the error surfaced to the caller; a
    /// result arriving for a superseded request is dropped silently.
    pub async fn play(&self, text: &str) -> Result<(), SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let generation = {
            let mut inner = self.inner.lock().unwrap();
            inner.generation += 1;
            inner.state = PlaybackState::Loading;
            inner.generation
        };

        let fetched = self.api.synthesize(text).await;

        let mut inner = self.inner.lock().unwrap();
        if inner.generation != generation {
            // Superseded by a newer play() or a stop() while in flight.
            return Ok(());
        }

        let audio = match fetched {
            Ok(audio) => audio,
            Err(e) => {
                inner.handle = None;
                inner.state = PlaybackState::Idle;
                tracing::error!(error = %e, "speech synthesis failed");
                return Err(match e {
                    SessionError::Unauthorized(code) => SessionError::Unauthorized(code),
                    other => SessionError::Playback(other.to_string()),
                });
            }
        };

        match self.sink.start(audio) {
            Ok(handle) => {
                // Swap releases the previous resource; the two never
                // coexist beyond this assignment.
                inner.handle = Some(handle);
                inner.state = PlaybackState::Playing;
                Ok(())
            }
            Err(e) => {
                inner.handle = None;
                inner.state = PlaybackState::Idle;
                tracing::error!(error = %e, "audio decode failed");
                Err(SessionError::Playback(e))
            }
        }
    }

    /// Playing → Paused; ignored in every other state.
    pub fn pause(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == PlaybackState::Playing {
            if let Some(handle) = inner.handle.as_ref() {
                handle.pause();
            }
            inner.state = PlaybackState::Paused;
        }
    }

    /// Paused → Playing; ignored in every other state.
    pub fn resume(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == PlaybackState::Paused {
            if let Some(handle) = inner.handle.as_ref() {
                handle.resume();
            }
            inner.state = PlaybackState::Playing;
        }
    }

    /// Any state → Idle, always releasing the audio resource. Cancels an
    /// in-flight synthesis.
    pub fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.generation += 1;
        inner.handle = None;
        inner.state = PlaybackState::Idle;
    }

    /// Observe natural end of playback: Playing → Idle once the sink
    /// reports the resource finished. Returns the (possibly updated) state.
    pub fn tick(&self) -> PlaybackState {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == PlaybackState::Playing
            && inner.handle.as_ref().is_some_and(|h| h.is_finished())
        {
            inner.handle = None;
            inner.state = PlaybackState::Idle;
        }
        inner.state
    }
}

/// Test sink counting live resources instead of producing sound.
pub struct CountingSink {
    live: Arc<std::sync::atomic::AtomicUsize>,
    started: std::sync::atomic::AtomicUsize,
    fail: std::sync::atomic::AtomicBool,
    finished: Arc<std::sync::atomic::AtomicBool>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self {
            live: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
            started: std::sync::atomic::AtomicUsize::new(0),
            fail: std::sync::atomic::AtomicBool::new(false),
            finished: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// How many handles exist right now. The one-live-resource invariant
    /// means this never exceeds 1 under correct use.
    pub fn live_handles(&self) -> usize {
        self.live.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// How many handles were ever created.
    pub fn started(&self) -> usize {
        self.started.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Make every subsequent `start` fail, simulating a decode error.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Mark all outstanding handles as finished playing.
    pub fn finish_all(&self) {
        self.finished.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// A second reference to the live-handle counter, for asserting after
    /// the sink has been moved into a [`Player`].
    pub fn live_counter(&self) -> Arc<std::sync::atomic::AtomicUsize> {
        Arc::clone(&self.live)
    }

    /// Shared finish flag, same purpose as [`live_counter`](Self::live_counter).
    pub fn finish_flag(&self) -> Arc<std::sync::atomic::AtomicBool> {
        Arc::clone(&self.finished)
    }
}

impl Default for CountingSink {
    fn default() -> Self {
        Self::new()
    }
}

struct CountingHandle {
    live: Arc<std::sync::atomic::AtomicUsize>,
    finished: Arc<std::sync::atomic::AtomicBool>,
}

impl AudioHandle for CountingHandle {
    fn pause(&self) {}
    fn resume(&self) {}
    fn is_finished(&self) -> bool {
        self.finished.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Drop for CountingHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    }
}

impl AudioSink for CountingSink {
    fn start(&self, _audio: Vec<u8>) -> Result<Box<dyn AudioHandle>, String> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err("decode failed".into());
        }
        self.live.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.started.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(Box::new(CountingHandle {
            live: Arc::clone(&self.live),
            finished: Arc::clone(&self.finished),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockBookApi;

    fn player() -> (Player, Arc<std::sync::atomic::AtomicUsize>, Arc<std::sync::atomic::AtomicBool>) {
        let api = Arc::new(MockBookApi::new(MockBookApi::meta(1, 10, None)));
        let sink = CountingSink::new();
        let live = sink.live_counter();
        let finished = sink.finish_flag();
        (Player::new(api, Box::new(sink)), live, finished)
    }

    #[tokio::test]
    async fn play_starts_and_stop_releases() {
        let (player, live, _) = player();
        assert_eq!(player.state(), PlaybackState::Idle);

        player.play("hello").await.unwrap();
        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(live.load(std::sync::atomic::Ordering::SeqCst), 1);

        player.stop();
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(live.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_text_is_a_no_op() {
        let (player, live, _) = player();
        player.play("   ").await.unwrap();
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(live.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pause_and_resume_only_from_matching_states() {
        let (player, _, _) = player();

        // Ignored while idle.
        player.pause();
        player.resume();
        assert_eq!(player.state(), PlaybackState::Idle);

        player.play("hello").await.unwrap();
        player.resume(); // ignored while playing
        assert_eq!(player.state(), PlaybackState::Playing);

        player.pause();
        assert_eq!(player.state(), PlaybackState::Paused);
        player.pause(); // ignored while paused
        assert_eq!(player.state(), PlaybackState::Paused);

        player.resume();
        assert_eq!(player.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn natural_end_returns_to_idle() {
        let (player, live, finished) = player();
        player.play("hello").await.unwrap();
        assert_eq!(player.tick(), PlaybackState::Playing);

        finished.store(true, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(player.tick(), PlaybackState::Idle);
        assert_eq!(live.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn synthesis_failure_reports_and_goes_idle() {
        let api = Arc::new(
            MockBookApi::new(MockBookApi::meta(1, 10, None))
                .with_tts_results(vec![Err(SessionError::Http(500))]),
        );
        let sink = CountingSink::new();
        let live = sink.live_counter();
        let player = Player::new(api, Box::new(sink));

        let err = player.play("hello").await.unwrap_err();
        assert!(matches!(err, SessionError::Playback(_)));
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(live.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn decode_failure_reports_and_goes_idle() {
        let api = Arc::new(MockBookApi::new(MockBookApi::meta(1, 10, None)));
        let sink = CountingSink::new();
        sink.set_fail(true);
        let player = Player::new(api, Box::new(sink));

        let err = player.play("hello").await.unwrap_err();
        assert!(matches!(err, SessionError::Playback(_)));
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn stop_cancels_an_in_flight_request() {
        let api = Arc::new(
            MockBookApi::new(MockBookApi::meta(1, 10, None))
                .with_delay(std::time::Duration::from_millis(20)),
        );
        let sink = CountingSink::new();
        let live = sink.live_counter();
        let player = Player::new(api, Box::new(sink));

        let play = player.play("hello");
        let cancel = async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            player.stop();
        };
        let (played, ()) = tokio::join!(play, cancel);
        played.unwrap();

        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(live.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}

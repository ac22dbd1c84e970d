use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod api;
pub mod config_file;
pub mod playback;
pub mod session;
pub mod window;

// Re-export for convenience
pub use api::{BookApi, HttpBookApi, mock::MockBookApi};
pub use playback::{AudioHandle, AudioSink, PlaybackState, Player};
pub use session::ReadingSession;
pub use window::{Progress, WINDOW_SIZE, at_end, at_start, next_start, prev_start, window_ids};

/// Book metadata as served by `GET /book`.
///
/// Field names on the wire follow the collaborator API
/// (`Min_Paragraph_Number` / `Max_Paragraph_Number` are capitalized there).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMeta {
    pub id_book: u64,
    pub book_name: String,
    /// Last persisted reading position. Absent or zero means "never read".
    #[serde(default)]
    pub current_paragraph: Option<u64>,
    #[serde(rename = "Min_Paragraph_Number")]
    pub min_paragraph_number: u64,
    #[serde(rename = "Max_Paragraph_Number")]
    pub max_paragraph_number: u64,
    /// Rolling 24h read counter, refreshed after each position save.
    #[serde(default)]
    pub paragraphs_read_24h: Option<u64>,
}

/// One sentence of a paragraph as served by `GET /book/paragraph`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub id_sentence: u64,
    pub sentence: String,
}

/// A paragraph assembled for display: sentences sorted ascending by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub id_paragraph: u64,
    pub sentences: Vec<Sentence>,
}

/// Error taxonomy for the reading session.
///
/// Metadata and window-load failures are terminal for that attempt.
/// Position-save and playback failures are non-fatal: they are logged and
/// recorded, but the session stays usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("not found: {0}")]
    NotFound(String),
    /// 401/403-class response. Propagated so the host can redirect to
    /// sign-in; never retried here.
    #[error("session expired (HTTP {0})")]
    Unauthorized(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response: HTTP {0}")]
    Http(u16),
    #[error("malformed response: {0}")]
    Parse(String),
    #[error("playback failed: {0}")]
    Playback(String),
}

impl From<reqwest::Error> for SessionError {
    fn from(e: reqwest::Error) -> Self {
        SessionError::Network(e.to_string())
    }
}

/// Runtime configuration for the HTTP backend.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the collaborator API, without trailing slash.
    pub base_url: String,
    /// Ambient session credential sent as the `Cookie` header on every
    /// request. Authentication itself happens outside this crate.
    pub session_cookie: Option<String>,
    pub timeout_secs: u64,
    /// MIME type requested from the speech-synthesis endpoint.
    pub audio_accept: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("session_cookie", &self.session_cookie.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .field("audio_accept", &self.audio_accept)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            session_cookie: None,
            timeout_secs: 30,
            audio_accept: "audio/mpeg".to_string(),
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

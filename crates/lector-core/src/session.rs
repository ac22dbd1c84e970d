//! The reading-session controller: one instance per open book.
//!
//! Owns the book metadata, the current 5-paragraph window and the reader's
//! position, and mediates every network call for those concerns. Navigation
//! and position persistence run concurrently; a failed save never rolls
//! back navigation the reader already sees.

use std::ops::Range;
use std::sync::Arc;

use crate::api::BookApi;
use crate::window::{self, Progress, window_ids};
use crate::{BookMeta, Paragraph, SessionError};

pub struct ReadingSession {
    api: Arc<dyn BookApi>,
    book_id: u64,
    meta: BookMeta,
    /// Anchor of the displayed window (absolute paragraph id).
    start_paragraph: u64,
    window: Vec<Paragraph>,
    /// Most recent non-fatal persistence failure, for a host UI notice.
    last_save_error: Option<SessionError>,
}

impl std::fmt::Debug for ReadingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadingSession")
            .field("book_id", &self.book_id)
            .field("meta", &self.meta)
            .field("start_paragraph", &self.start_paragraph)
            .field("window", &self.window)
            .field("last_save_error", &self.last_save_error)
            .finish_non_exhaustive()
    }
}

/// Initial anchor: the persisted position if present and non-zero,
/// otherwise the first paragraph of the book.
fn initial_start(meta: &BookMeta) -> u64 {
    meta.current_paragraph
        .filter(|&p| p != 0)
        .unwrap_or(meta.min_paragraph_number)
}

/// Fetch and assemble one window, sequentially and in ascending id order.
///
/// Sequential on purpose, to bound concurrent load on the collaborator
/// API. Any single paragraph failure aborts the whole load; partial
/// windows are never returned.
async fn fetch_window(
    api: &dyn BookApi,
    book_id: u64,
    ids: Range<u64>,
) -> Result<Vec<Paragraph>, SessionError> {
    let mut paragraphs = Vec::with_capacity(ids.clone().count());
    for id_paragraph in ids {
        let mut sentences = api.fetch_paragraph(book_id, id_paragraph).await?;
        sentences.sort_by_key(|s| s.id_sentence);
        paragraphs.push(Paragraph {
            id_paragraph,
            sentences,
        });
    }
    tracing::debug!(book_id, count = paragraphs.len(), "window loaded");
    Ok(paragraphs)
}

impl ReadingSession {
    /// Open a book: fetch its metadata and the initial window.
    ///
    /// Fails with [`SessionError::NotFound`] if the book does not exist or
    /// the caller lacks access; any failure here is terminal for the open.
    pub async fn open(api: Arc<dyn BookApi>, book_id: u64) -> Result<Self, SessionError> {
        let meta = api.fetch_book(book_id).await?;
        let start_paragraph = initial_start(&meta);
        let window = fetch_window(
            api.as_ref(),
            book_id,
            window_ids(meta.min_paragraph_number, meta.max_paragraph_number, start_paragraph),
        )
        .await?;
        Ok(Self {
            api,
            book_id,
            meta,
            start_paragraph,
            window,
            last_save_error: None,
        })
    }

    pub fn book_id(&self) -> u64 {
        self.book_id
    }

    pub fn meta(&self) -> &BookMeta {
        &self.meta
    }

    /// The currently displayed window, ascending by paragraph id.
    pub fn window(&self) -> &[Paragraph] {
        &self.window
    }

    pub fn start_paragraph(&self) -> u64 {
        self.start_paragraph
    }

    pub fn at_start(&self) -> bool {
        window::at_start(self.meta.min_paragraph_number, self.start_paragraph)
    }

    pub fn at_end(&self) -> bool {
        window::at_end(self.meta.max_paragraph_number, self.start_paragraph)
    }

    pub fn progress(&self) -> Progress {
        Progress::compute(
            self.meta.min_paragraph_number,
            self.meta.max_paragraph_number,
            self.start_paragraph,
        )
    }

    pub fn last_save_error(&self) -> Option<&SessionError> {
        self.last_save_error.as_ref()
    }

    pub fn take_save_error(&mut self) -> Option<SessionError> {
        self.last_save_error.take()
    }

    /// Re-fetch the current window. On failure the previously displayed
    /// window is left untouched.
    pub async fn reload(&mut self) -> Result<(), SessionError> {
        let fresh = fetch_window(
            self.api.as_ref(),
            self.book_id,
            window_ids(
                self.meta.min_paragraph_number,
                self.meta.max_paragraph_number,
                self.start_paragraph,
            ),
        )
        .await?;
        self.window = fresh;
        Ok(())
    }

    /// Move the window back by one stride. No-op at the start of the book.
    pub async fn go_prev(&mut self) -> Result<(), SessionError> {
        if self.at_start() {
            return Ok(());
        }
        let new_start = window::prev_start(self.meta.min_paragraph_number, self.start_paragraph);
        self.navigate(new_start).await
    }

    /// Move the window forward by one stride. No-op at the end of the book.
    pub async fn go_next(&mut self) -> Result<(), SessionError> {
        if self.at_end() {
            return Ok(());
        }
        let new_start = window::next_start(self.meta.max_paragraph_number, self.start_paragraph);
        self.navigate(new_start).await
    }

    /// Apply a new window anchor: reload the window and persist the
    /// position concurrently.
    ///
    /// A persistence failure is recorded and traced but never reverts the
    /// navigation; a window-load failure propagates while keeping the
    /// previous window displayed.
    async fn navigate(&mut self, new_start: u64) -> Result<(), SessionError> {
        self.start_paragraph = new_start;
        let ids = window_ids(
            self.meta.min_paragraph_number,
            self.meta.max_paragraph_number,
            new_start,
        );
        let api = Arc::clone(&self.api);
        let book_id = self.book_id;

        let (loaded, saved) = tokio::join!(
            fetch_window(api.as_ref(), book_id, ids),
            api.save_position(book_id, new_start),
        );

        match saved {
            Ok(()) => self.refresh_stats().await,
            Err(e) => {
                tracing::warn!(book_id, new_start, error = %e, "failed to save reading position");
                self.last_save_error = Some(e);
            }
        }

        self.window = loaded?;
        Ok(())
    }

    /// Lightweight metadata refresh after a successful save: merge the
    /// dynamic fields only, keeping anything the response omits.
    /// Failures here are silent; the next save refreshes again.
    async fn refresh_stats(&mut self) {
        match self.api.fetch_book(self.book_id).await {
            Ok(fresh) => {
                self.meta.paragraphs_read_24h =
                    fresh.paragraphs_read_24h.or(self.meta.paragraphs_read_24h);
                self.meta.current_paragraph =
                    fresh.current_paragraph.or(self.meta.current_paragraph);
                self.meta.min_paragraph_number = fresh.min_paragraph_number;
                self.meta.max_paragraph_number = fresh.max_paragraph_number;
            }
            Err(e) => {
                tracing::debug!(book_id = self.book_id, error = %e, "stats refresh after save failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockBookApi;

    #[test]
    fn initial_start_prefers_nonzero_position() {
        let meta = MockBookApi::meta(3, 50, Some(17));
        assert_eq!(initial_start(&meta), 17);
    }

    #[test]
    fn initial_start_falls_back_to_min_for_zero_or_absent() {
        assert_eq!(initial_start(&MockBookApi::meta(3, 50, Some(0))), 3);
        assert_eq!(initial_start(&MockBookApi::meta(3, 50, None)), 3);
    }
}

//! Backend trait for the collaborator API, plus HTTP and mock implementations.

pub mod http;
pub mod mock;

use std::future::Future;
use std::pin::Pin;

use crate::{BookMeta, Sentence, SessionError};

pub use http::HttpBookApi;

/// Boxed future returned by [`BookApi`] methods, so the trait stays
/// object-safe and implementations can be swapped behind `Arc<dyn BookApi>`.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SessionError>> + Send + 'a>>;

/// The collaborator API surface the reading session depends on.
///
/// All calls carry ambient session credentials; a 401-class response maps
/// to [`SessionError::Unauthorized`]. No call is ever retried here.
pub trait BookApi: Send + Sync {
    /// `GET /book?book_id=<id>` — book metadata including paragraph bounds.
    fn fetch_book(&self, book_id: u64) -> ApiFuture<'_, BookMeta>;

    /// `GET /book/paragraph?id_book=<id>&id_paragraph=<n>` — the sentences
    /// of one paragraph, in server order (not necessarily sorted).
    fn fetch_paragraph(&self, book_id: u64, paragraph_id: u64) -> ApiFuture<'_, Vec<Sentence>>;

    /// `POST /book/paragraph` — persist the reader's bookmark.
    fn save_position(&self, book_id: u64, new_paragraph: u64) -> ApiFuture<'_, ()>;

    /// `POST /text_to_speech` — synthesize `text` and return the binary
    /// audio payload.
    fn synthesize<'a>(&'a self, text: &'a str) -> ApiFuture<'a, Vec<u8>>;
}

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};

use super::{ApiFuture, BookApi};
use crate::{BookMeta, Config, Sentence, SessionError};

/// [`BookApi`] implementation over the real HTTP collaborator.
///
/// One shared `reqwest::Client` with a cookie store; the configured session
/// cookie is attached to every request and refreshed from `Set-Cookie`
/// responses.
pub struct HttpBookApi {
    client: reqwest::Client,
    base_url: String,
    audio_accept: String,
    timeout: Duration,
}

impl HttpBookApi {
    pub fn new(config: &Config) -> Result<Self, SessionError> {
        let mut headers = HeaderMap::new();
        if let Some(ref cookie) = config.session_cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|_| SessionError::Parse("invalid session cookie".into()))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            audio_accept: config.audio_accept.clone(),
            timeout: config.timeout(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Map a non-success status to the session error taxonomy.
///
/// `context` names the missing entity for 404s (e.g. "book 3").
fn check_status(
    resp: reqwest::Response,
    context: impl Fn() -> String,
) -> Result<reqwest::Response, SessionError> {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SessionError::Unauthorized(status.as_u16()));
    }
    if status == StatusCode::NOT_FOUND {
        return Err(SessionError::NotFound(context()));
    }
    if !status.is_success() {
        return Err(SessionError::Http(status.as_u16()));
    }
    Ok(resp)
}

impl BookApi for HttpBookApi {
    fn fetch_book(&self, book_id: u64) -> ApiFuture<'_, BookMeta> {
        Box::pin(async move {
            let resp = self
                .client
                .get(self.url("/book"))
                .query(&[("book_id", book_id)])
                .timeout(self.timeout)
                .send()
                .await?;
            let resp = check_status(resp, || format!("book {book_id}"))?;
            resp.json::<BookMeta>()
                .await
                .map_err(|e| SessionError::Parse(e.to_string()))
        })
    }

    fn fetch_paragraph(&self, book_id: u64, paragraph_id: u64) -> ApiFuture<'_, Vec<Sentence>> {
        Box::pin(async move {
            let resp = self
                .client
                .get(self.url("/book/paragraph"))
                .query(&[("id_book", book_id), ("id_paragraph", paragraph_id)])
                .timeout(self.timeout)
                .send()
                .await?;
            let resp = check_status(resp, || format!("paragraph {paragraph_id} of book {book_id}"))?;
            resp.json::<Vec<Sentence>>()
                .await
                .map_err(|e| SessionError::Parse(e.to_string()))
        })
    }

    fn save_position(&self, book_id: u64, new_paragraph: u64) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let body = serde_json::json!({
                "id_book": book_id,
                "id_new_paragraph": new_paragraph,
            });
            let resp = self
                .client
                .post(self.url("/book/paragraph"))
                .json(&body)
                .timeout(self.timeout)
                .send()
                .await?;
            check_status(resp, || format!("book {book_id}"))?;
            Ok(())
        })
    }

    fn synthesize<'a>(&'a self, text: &'a str) -> ApiFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let body = serde_json::json!({ "text": text });
            let resp = self
                .client
                .post(self.url("/text_to_speech"))
                .header("accept", &self.audio_accept)
                .json(&body)
                .timeout(self.timeout)
                .send()
                .await?;
            let resp = check_status(resp, || "speech synthesis".to_string())?;
            let bytes = resp.bytes().await?;
            Ok(bytes.to_vec())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = HttpBookApi::new(&Config {
            base_url: "http://example.test/api/".into(),
            ..Config::default()
        })
        .unwrap();
        assert_eq!(api.url("/book"), "http://example.test/api/book");
    }

    #[test]
    fn invalid_cookie_is_rejected() {
        let result = HttpBookApi::new(&Config {
            session_cookie: Some("bad\nvalue".into()),
            ..Config::default()
        });
        assert!(matches!(result, Err(SessionError::Parse(_))));
    }
}

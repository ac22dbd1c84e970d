//! Integration tests for [`ReadingSession`] and [`Player`] over the mock
//! backend. No HTTP requests are made.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use lector_core::api::mock::MockBookApi;
use lector_core::playback::{CountingSink, PlaybackState, Player};
use lector_core::{ReadingSession, SessionError};

fn window_ids_of(session: &ReadingSession) -> Vec<u64> {
    session.window().iter().map(|p| p.id_paragraph).collect()
}

#[tokio::test]
async fn open_resumes_at_persisted_position() {
    let api = Arc::new(MockBookApi::new(MockBookApi::meta(1, 100, Some(42))));
    let session = ReadingSession::open(api, 1).await.unwrap();

    assert_eq!(session.start_paragraph(), 42);
    assert_eq!(window_ids_of(&session), vec![42, 43, 44, 45, 46]);
    assert!(!session.at_start());
    assert!(!session.at_end());
}

#[tokio::test]
async fn open_falls_back_to_min_when_position_absent_or_zero() {
    let api = Arc::new(MockBookApi::new(MockBookApi::meta(3, 100, None)));
    let session = ReadingSession::open(api, 1).await.unwrap();
    assert_eq!(session.start_paragraph(), 3);

    let api = Arc::new(MockBookApi::new(MockBookApi::meta(3, 100, Some(0))));
    let session = ReadingSession::open(api, 1).await.unwrap();
    assert_eq!(session.start_paragraph(), 3);
}

#[tokio::test]
async fn sentences_are_sorted_ascending() {
    // The mock deliberately serves sentences in descending id order.
    let api = Arc::new(MockBookApi::new(MockBookApi::meta(1, 10, None)));
    let session = ReadingSession::open(api, 1).await.unwrap();

    for paragraph in session.window() {
        let ids: Vec<u64> = paragraph.sentences.iter().map(|s| s.id_sentence).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}

#[tokio::test]
async fn short_tail_window_near_the_end() {
    // min=1, max=12, start=10: only three paragraphs remain.
    let api = Arc::new(MockBookApi::new(MockBookApi::meta(1, 12, Some(10))));
    let session = ReadingSession::open(api, 1).await.unwrap();

    assert_eq!(window_ids_of(&session), vec![10, 11, 12]);
    assert!(session.at_end());
    assert!(!session.at_start());
}

#[tokio::test]
async fn prev_then_next_returns_to_the_same_anchor() {
    let api = Arc::new(MockBookApi::new(MockBookApi::meta(1, 100, Some(41))));
    let mut session = ReadingSession::open(api, 1).await.unwrap();

    session.go_prev().await.unwrap();
    assert_eq!(session.start_paragraph(), 36);
    session.go_next().await.unwrap();
    assert_eq!(session.start_paragraph(), 41);
}

#[tokio::test]
async fn navigation_is_a_no_op_at_the_boundaries() {
    let api = Arc::new(MockBookApi::new(MockBookApi::meta(1, 12, Some(10))));
    let mut session = ReadingSession::open(api.clone(), 1).await.unwrap();
    let fetches_after_open = api.paragraph_calls();

    // at_end: go_next must not fetch or save anything.
    session.go_next().await.unwrap();
    assert_eq!(session.start_paragraph(), 10);
    assert_eq!(api.paragraph_calls(), fetches_after_open);
    assert_eq!(api.save_calls(), 0);

    session.go_prev().await.unwrap();
    session.go_prev().await.unwrap();
    assert_eq!(session.start_paragraph(), 1);
    assert!(session.at_start());

    let saves_so_far = api.save_calls();
    session.go_prev().await.unwrap();
    assert_eq!(api.save_calls(), saves_so_far);
}

#[tokio::test]
async fn successful_navigation_persists_and_refreshes_stats() {
    let first = MockBookApi::meta(1, 100, Some(11));
    let mut refreshed = first.clone();
    refreshed.book_name = "Renamed On Server".into();
    refreshed.paragraphs_read_24h = Some(7);

    let api = Arc::new(
        MockBookApi::new(first).with_meta_sequence(vec![
            Ok(MockBookApi::meta(1, 100, Some(11))),
            Ok(refreshed),
        ]),
    );
    let mut session = ReadingSession::open(api.clone(), 1).await.unwrap();

    session.go_next().await.unwrap();

    assert_eq!(api.saved_positions(), vec![16]);
    // The stats refresh merged the dynamic fields only.
    assert_eq!(session.meta().paragraphs_read_24h, Some(7));
    assert_eq!(session.meta().book_name, "Test Book");
    assert_eq!(api.meta_calls(), 2);
}

#[tokio::test]
async fn failed_save_never_reverts_navigation() {
    let api = Arc::new(
        MockBookApi::new(MockBookApi::meta(1, 100, Some(11)))
            .with_save_results(vec![Err(SessionError::Network("connection reset".into()))]),
    );
    let mut session = ReadingSession::open(api.clone(), 1).await.unwrap();

    session.go_next().await.unwrap();

    // Position advanced and the new window is displayed.
    assert_eq!(session.start_paragraph(), 16);
    assert_eq!(window_ids_of(&session), vec![16, 17, 18, 19, 20]);
    // The failure is recorded, not surfaced as a blocking error.
    assert!(matches!(
        session.last_save_error(),
        Some(SessionError::Network(_))
    ));
    // No stats refresh after a failed save.
    assert_eq!(api.meta_calls(), 1);

    assert!(session.take_save_error().is_some());
    assert!(session.last_save_error().is_none());
}

#[tokio::test]
async fn window_load_failure_keeps_the_previous_window() {
    let api = Arc::new(MockBookApi::new(MockBookApi::meta(1, 100, None)));
    let mut session = ReadingSession::open(api.clone(), 1).await.unwrap();
    assert_eq!(window_ids_of(&session), vec![1, 2, 3, 4, 5]);

    api.fail_paragraph(8, SessionError::Network("timeout".into()));
    let err = session.go_next().await.unwrap_err();
    assert!(matches!(err, SessionError::Network(_)));

    // The anchor advanced, but no partial window was displayed.
    assert_eq!(session.start_paragraph(), 6);
    assert_eq!(window_ids_of(&session), vec![1, 2, 3, 4, 5]);

    // Manual retry: reload succeeds once the paragraph is reachable again.
    api.clear_paragraph_failures();
    session.reload().await.unwrap();
    assert_eq!(window_ids_of(&session), vec![6, 7, 8, 9, 10]);
}

#[tokio::test]
async fn unauthorized_propagates_from_open() {
    let api = Arc::new(
        MockBookApi::new(MockBookApi::meta(1, 10, None))
            .with_meta_sequence(vec![Err(SessionError::Unauthorized(401))]),
    );
    let err = ReadingSession::open(api, 1).await.unwrap_err();
    assert_eq!(err, SessionError::Unauthorized(401));
}

#[tokio::test]
async fn missing_book_propagates_not_found() {
    let api = Arc::new(
        MockBookApi::new(MockBookApi::meta(1, 10, None))
            .with_meta_sequence(vec![Err(SessionError::NotFound("book 99".into()))]),
    );
    let err = ReadingSession::open(api, 99).await.unwrap_err();
    assert_eq!(err, SessionError::NotFound("book 99".into()));
}

#[tokio::test]
async fn progress_follows_the_window_anchor() {
    let api = Arc::new(MockBookApi::new(MockBookApi::meta(1, 20, Some(5))));
    let session = ReadingSession::open(api, 1).await.unwrap();

    let progress = session.progress();
    assert_eq!(progress.index, Some(5));
    assert_eq!(progress.total, Some(20));
    assert_eq!(progress.percent, Some(25.0));
}

#[tokio::test]
async fn rapid_double_play_leaves_exactly_one_live_resource() {
    let api = Arc::new(
        MockBookApi::new(MockBookApi::meta(1, 10, None))
            .with_delay(Duration::from_millis(10)),
    );
    let sink = CountingSink::new();
    let live = sink.live_counter();
    let player = Player::new(api, Box::new(sink));

    // Second call starts before the first completes; the first is
    // superseded and must not leave a resource behind.
    let (a, b) = tokio::join!(player.play("hello"), player.play("hello"));
    a.unwrap();
    b.unwrap();

    assert_eq!(player.state(), PlaybackState::Playing);
    assert_eq!(live.load(Ordering::SeqCst), 1);

    player.stop();
    assert_eq!(player.state(), PlaybackState::Idle);
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

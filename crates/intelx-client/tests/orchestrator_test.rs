//! Integration tests for the search polling state machine.

mod common;

use common::{
    client, client_with_limiter, page, record, started, Reply, ScriptedTransport, RESULTS,
    SEARCH, TERMINATE,
};
use intelx_client::{RateLimiter, SearchError, SearchRequest, SearchState, SearchStatus};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn request(max_results: u32, timeout_secs: u64) -> SearchRequest {
    SearchRequest::new("test@example.com")
        .with_bucket("pastes")
        .with_max_results(max_results)
        .with_timeout_secs(timeout_secs)
}

fn ids(records: &[intelx_client::Record]) -> Vec<&str> {
    records.iter().map(|r| r.systemid.as_str()).collect()
}

#[tokio::test]
async fn test_keep_trying_then_no_more_results() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(SEARCH, started("search-1"))
        .push_json(RESULTS, page(3, &[]))
        .push_json(RESULTS, page(3, &[]))
        .push_json(
            RESULTS,
            page(
                1,
                &[
                    record("a", "pastes"),
                    record("b", "pastes"),
                    record("c", "pastes"),
                ],
            ),
        );

    let outcome = client(&transport)
        .search(&request(5, 10))
        .await
        .expect("search succeeds");

    assert_eq!(outcome.id, "search-1");
    assert_eq!(outcome.state, SearchState::Done);
    assert_eq!(outcome.status, Some(SearchStatus::NoMoreResults));
    assert_eq!(ids(&outcome.records), ["a", "b", "c"]);
    assert_eq!(outcome.polls, 3);
    assert!(outcome.is_complete());

    let init = &transport.calls_to(SEARCH)[0];
    let body = init.body.as_ref().expect("init body");
    assert_eq!(body["term"], "test@example.com");
    assert_eq!(body["buckets"], json!(["pastes"]));
    assert_eq!(body["maxresults"], 5);
    assert_eq!(body["timeout"], 10);

    assert_eq!(transport.params(RESULTS, "id"), ["search-1"; 3]);
    assert_eq!(transport.params(RESULTS, "offset"), ["0", "0", "0"]);
    assert!(transport.calls_to(TERMINATE).is_empty());
}

#[tokio::test]
async fn test_not_found_yields_empty_result() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(SEARCH, started("search-2"))
        .push_json(RESULTS, page(2, &[]));

    let outcome = client(&transport)
        .search(&request(5, 10))
        .await
        .expect("not found is not an error");

    assert_eq!(outcome.state, SearchState::NotFound);
    assert_eq!(outcome.status, Some(SearchStatus::NotFound));
    assert!(outcome.records.is_empty());
}

#[tokio::test]
async fn test_not_found_discards_earlier_records() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(SEARCH, started("search-3"))
        .push_json(RESULTS, page(0, &[record("a", "pastes")]))
        .push_json(RESULTS, page(2, &[]));

    let outcome = client(&transport)
        .search(&request(5, 10))
        .await
        .expect("search succeeds");

    assert_eq!(outcome.state, SearchState::NotFound);
    assert!(outcome.records.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_returns_partial_records() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(SEARCH, started("search-4"))
        .push_json(RESULTS, page(0, &[record("a", "pastes")]))
        .repeat(RESULTS, Reply::Json(page(3, &[])));

    let limiter = Arc::new(RateLimiter::new(Duration::from_secs(1)));
    let outcome = client_with_limiter(&transport, limiter)
        .search(&request(100, 2))
        .await
        .expect("timeout is not an error");

    assert_eq!(outcome.state, SearchState::TimedOut);
    assert_eq!(ids(&outcome.records), ["a"]);
    assert!(!outcome.is_complete());
    assert!(outcome.elapsed >= Duration::from_secs(2));
    assert!(outcome.elapsed < Duration::from_secs(5));

    // Best-effort cleanup against the remote session.
    assert_eq!(transport.params(TERMINATE, "id"), ["search-4"]);
}

#[tokio::test]
async fn test_invalid_bucket_is_rejected_with_status() {
    let transport = ScriptedTransport::new();
    transport.push(SEARCH, Reply::Status(401, "Unauthorized".to_string()));

    let err = client(&transport)
        .search(
            &SearchRequest::new("test@example.com")
                .with_bucket("invalid_bucket_name")
                .with_max_results(1)
                .with_timeout_secs(5),
        )
        .await
        .expect_err("initiation fails");

    assert!(matches!(err, SearchError::SearchInit { status: 401, .. }));
    assert!(err.to_string().contains("401"));
    assert_eq!(err.status(), Some(401));
    assert!(transport.calls_to(RESULTS).is_empty());
}

#[tokio::test]
async fn test_initiation_status_rejection() {
    let transport = ScriptedTransport::new();
    transport.push_json(SEARCH, json!({ "id": "", "status": 2 }));

    let err = client(&transport)
        .search(&request(5, 10))
        .await
        .expect_err("too many searches");

    assert!(matches!(err, SearchError::SearchRejected { code: 2, .. }));
}

#[tokio::test]
async fn test_invalid_request_makes_no_calls() {
    let transport = ScriptedTransport::new();

    let err = client(&transport)
        .search(&request(0, 10))
        .await
        .expect_err("zero maxresults rejected");

    assert!(matches!(err, SearchError::InvalidRequest(_)));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_result_cap_truncates_and_terminates() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(SEARCH, started("search-5"))
        .push_json(RESULTS, page(0, &[record("1", "pastes"), record("2", "pastes")]))
        .push_json(
            RESULTS,
            page(
                0,
                &[
                    record("3", "pastes"),
                    record("4", "pastes"),
                    record("5", "pastes"),
                ],
            ),
        )
        .push_json(TERMINATE, json!({}));

    let outcome = client(&transport)
        .search(&request(3, 10))
        .await
        .expect("search succeeds");

    assert_eq!(outcome.state, SearchState::Done);
    assert_eq!(ids(&outcome.records), ["1", "2", "3"]);
    assert_eq!(transport.params(RESULTS, "offset"), ["0", "2"]);
    assert_eq!(transport.params(RESULTS, "limit"), ["3", "1"]);
    assert_eq!(transport.params(TERMINATE, "id"), ["search-5"]);
}

#[tokio::test]
async fn test_duplicates_are_dropped_and_offset_follows_kept_count() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(SEARCH, started("search-6"))
        .push_json(RESULTS, page(0, &[record("1", "pastes"), record("1", "pastes")]))
        .push_json(RESULTS, page(0, &[record("1", "pastes"), record("1", "web.public")]))
        .push_json(RESULTS, page(1, &[record("2", "pastes")]));

    let outcome = client(&transport)
        .search(&request(10, 10))
        .await
        .expect("search succeeds");

    let keys: Vec<_> = outcome
        .records
        .iter()
        .map(|r| (r.systemid.as_str(), r.bucket.as_str()))
        .collect();
    assert_eq!(keys, [("1", "pastes"), ("1", "web.public"), ("2", "pastes")]);
    assert_eq!(transport.params(RESULTS, "offset"), ["0", "1", "2"]);
}

#[tokio::test]
async fn test_unknown_status_keeps_polling() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(SEARCH, started("search-7"))
        .push_json(RESULTS, page(9, &[record("1", "pastes")]))
        .push_json(RESULTS, page(1, &[]));

    let outcome = client(&transport)
        .search(&request(10, 10))
        .await
        .expect("search succeeds");

    assert_eq!(outcome.state, SearchState::Done);
    assert_eq!(outcome.polls, 2);
    assert_eq!(ids(&outcome.records), ["1"]);
}

#[tokio::test]
async fn test_network_error_aborts_search() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(SEARCH, started("search-8"))
        .push_json(RESULTS, page(3, &[]))
        .push(RESULTS, Reply::Network("connection reset".to_string()))
        .push_json(RESULTS, page(1, &[record("1", "pastes")]));

    let err = client(&transport)
        .search(&request(10, 10))
        .await
        .expect_err("dropped poll ends the search");

    assert!(matches!(err, SearchError::Network(_)));
    assert_eq!(transport.calls_to(RESULTS).len(), 2);
}

#[tokio::test]
async fn test_poll_http_error_preserves_status() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(SEARCH, started("search-9"))
        .push(RESULTS, Reply::Status(500, "server error".to_string()));

    let err = client(&transport)
        .search(&request(10, 10))
        .await
        .expect_err("server error propagates");

    assert!(matches!(err, SearchError::Http { status: 500, .. }));
}

#[tokio::test]
async fn test_terminate_is_idempotent() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(TERMINATE, json!({}))
        .push(TERMINATE, Reply::Status(404, "not found".to_string()));
    let client = client(&transport);

    assert!(client.terminate_search("search-10").await.expect("first call"));
    assert!(!client.terminate_search("search-10").await.expect("second call"));
}

#[tokio::test]
async fn test_direct_terminate_propagates_errors() {
    let transport = ScriptedTransport::new();
    transport.push(TERMINATE, Reply::Status(401, "Unauthorized".to_string()));

    let err = client(&transport)
        .terminate_search("search-11")
        .await
        .expect_err("auth failure surfaces");
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_intelligent_search_returns_id_only() {
    let transport = ScriptedTransport::new();
    transport.push_json(SEARCH, started("search-12"));

    let id = client(&transport)
        .intelligent_search(&request(100, 30))
        .await
        .expect("start search");

    assert_eq!(id, "search-12");
    assert!(transport.calls_to(RESULTS).is_empty());
}

#[tokio::test]
async fn test_manual_stepping_and_cancellation() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(SEARCH, started("search-13"))
        .push_json(RESULTS, page(3, &[record("1", "pastes")]))
        .push_json(RESULTS, page(1, &[record("2", "pastes")]));
    let client = client(&transport);
    let orchestrator = client.orchestrator();

    let mut session = client.start_search(&request(10, 10)).await.expect("start");
    assert_eq!(session.state(), SearchState::Init);

    let state = orchestrator.step(&mut session).await.expect("first poll");
    assert_eq!(state, SearchState::Polling);
    assert_eq!(session.offset(), 1);

    session.cancellation_token().cancel();
    let state = orchestrator.step(&mut session).await.expect("guarded step");
    assert_eq!(state, SearchState::Terminated);

    // Terminal sessions are not polled again.
    let state = orchestrator.step(&mut session).await.expect("terminal step");
    assert_eq!(state, SearchState::Terminated);

    let outcome = orchestrator.run(session).await.expect("run terminal session");
    assert_eq!(outcome.state, SearchState::Terminated);
    assert_eq!(ids(&outcome.records), ["1"]);
    assert_eq!(transport.calls_to(RESULTS).len(), 1);
    assert_eq!(transport.params(TERMINATE, "id"), ["search-13"]);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_from_another_task() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(SEARCH, started("search-14"))
        .repeat(RESULTS, Reply::Json(page(3, &[])));
    let client = client_with_limiter(
        &transport,
        Arc::new(RateLimiter::new(Duration::from_millis(100))),
    );

    let session = client.start_search(&request(10, 60)).await.expect("start");
    let token = session.cancellation_token();
    let orchestrator = client.orchestrator().clone();
    let run = tokio::spawn(async move { orchestrator.run(session).await });

    tokio::time::sleep(Duration::from_millis(550)).await;
    token.cancel();

    let outcome = run.await.expect("task joins").expect("cancel is not an error");
    assert_eq!(outcome.state, SearchState::Terminated);
    assert!(outcome.elapsed < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_terminate_stops_running_search() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(SEARCH, started("search-15"))
        .repeat(RESULTS, Reply::Json(page(3, &[record("1", "pastes")])))
        .repeat(TERMINATE, Reply::Json(json!({})));
    let client = client_with_limiter(
        &transport,
        Arc::new(RateLimiter::new(Duration::from_millis(100))),
    );

    let search = {
        let client = client.clone();
        tokio::spawn(async move { client.search(&request(100, 30)).await })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(client.orchestrator().is_running("search-15"));
    let acknowledged = client.terminate_search("search-15").await.expect("terminate");
    assert!(acknowledged);

    let outcome = search
        .await
        .expect("task joins")
        .expect("termination is not an error");
    assert_eq!(outcome.state, SearchState::Terminated);
    assert_eq!(ids(&outcome.records), ["1"]);
    assert!(outcome.elapsed < Duration::from_secs(2));
    assert!(outcome.polls < 10);
    assert!(!client.orchestrator().is_running("search-15"));
    assert!(transport.params(TERMINATE, "id").iter().all(|id| id == "search-15"));
}

#[tokio::test]
async fn test_finished_search_leaves_no_running_loop() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(SEARCH, started("search-16"))
        .push_json(RESULTS, page(1, &[record("1", "pastes")]))
        .push(TERMINATE, Reply::Status(404, "not found".to_string()));
    let client = client(&transport);

    let outcome = client.search(&request(10, 10)).await.expect("search");
    assert_eq!(outcome.state, SearchState::Done);
    assert!(!client.orchestrator().is_running("search-16"));

    let acknowledged = client.terminate_search("search-16").await.expect("terminate");
    assert!(!acknowledged);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_searches_share_limiter() {
    let transport = ScriptedTransport::with_handler(|call| {
        if call.path == SEARCH {
            let term = call.body.as_ref()?["term"].as_str()?.to_string();
            return Some(Reply::Json(started(&format!("id-{term}"))));
        }
        if call.path == RESULTS {
            let id = call.query_value("id")?;
            return Some(Reply::Json(page(
                1,
                &[record(&format!("{id}-1"), "pastes"), record(&format!("{id}-2"), "pastes")],
            )));
        }
        None
    });
    let client = client_with_limiter(
        &transport,
        Arc::new(RateLimiter::new(Duration::from_millis(100))),
    );

    let first = SearchRequest::new("alpha").with_max_results(5);
    let second = SearchRequest::new("beta").with_max_results(5);
    let start = tokio::time::Instant::now();
    let (first, second) = tokio::join!(client.search(&first), client.search(&second));
    let first = first.expect("first search");
    let second = second.expect("second search");

    assert_eq!(ids(&first.records), ["id-alpha-1", "id-alpha-2"]);
    assert_eq!(ids(&second.records), ["id-beta-1", "id-beta-2"]);
    assert!(start.elapsed() >= Duration::from_millis(300));
}

//! Search orchestrator for driving remote searches to completion.
//!
//! This module provides the [`SearchOrchestrator`], which turns a request into
//! a [`SearchSession`] and advances it through the polling state machine:
//!
//! ```text
//! INIT -> POLLING -> { DONE | NOT_FOUND | TIMED_OUT | TERMINATED }
//! ```
//!
//! [`SearchOrchestrator::step`] performs one transition so callers can drive
//! the machine themselves; [`SearchOrchestrator::run`] loops it to a terminal
//! state. Cancellation and the deadline are checked as guards before every
//! poll, and again after a poll that left the session running.
//!
//! Sessions driven by [`SearchOrchestrator::run`] are registered by id, so a
//! [`SearchOrchestrator::terminate`] issued from anywhere in the process also
//! stops the local poll loop before its next iteration.

use crate::error::{Result, SearchError};
use crate::session::{SearchKind, SearchOutcome, SearchSession, SearchState};
use crate::transport::{ApiClient, ApiRequest};
use intelx_core::SearchStatus;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;

/// Endpoint that terminates a remote search of any kind.
pub const TERMINATE_PATH: &str = "/intelligent/search/terminate";

/// Body of an initiation response.
#[derive(Debug, Deserialize)]
struct InitResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: i64,
}

/// Body of a result poll.
#[derive(Debug, Deserialize)]
struct ResultPage<T> {
    #[serde(alias = "selectors")]
    records: Option<Vec<T>>,
    status: SearchStatus,
}

/// Cancellation tokens of the poll loops currently running, by search id.
#[derive(Clone, Default)]
struct ActiveSearches {
    tokens: Arc<RwLock<HashMap<String, CancellationToken>>>,
}

impl ActiveSearches {
    fn register(&self, search_id: &str, token: CancellationToken) -> Registration<'_> {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(search_id.to_string(), token);
        Registration {
            searches: self,
            search_id: search_id.to_string(),
        }
    }

    /// Cancel the loop polling `search_id`. Returns whether one was running.
    fn cancel(&self, search_id: &str) -> bool {
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        match tokens.get(search_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn contains(&self, search_id: &str) -> bool {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(search_id)
    }
}

/// Removes a loop from the registry when it ends, however it ends.
struct Registration<'a> {
    searches: &'a ActiveSearches,
    search_id: String,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.searches
            .tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.search_id);
    }
}

/// Drives searches against the remote service.
///
/// Clones share the registry of running poll loops.
#[derive(Clone)]
pub struct SearchOrchestrator {
    api: ApiClient,
    active: ActiveSearches,
}

impl SearchOrchestrator {
    /// Create an orchestrator over a rate limited API client.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            active: ActiveSearches::default(),
        }
    }

    /// Whether a poll loop for `search_id` is running in this process.
    #[must_use]
    pub fn is_running(&self, search_id: &str) -> bool {
        self.active.contains(search_id)
    }

    /// Issue the initiation call and return a fresh session.
    ///
    /// Any non-2xx response is surfaced as [`SearchError::SearchInit`] with
    /// the HTTP status preserved, and is never retried.
    pub async fn start<K: SearchKind>(&self, request: &K::Request) -> Result<SearchSession<K>> {
        K::validate(request)?;
        let limits = K::limits(request);

        let call = K::init_call(request)?;
        let response: InitResponse = match self.api.json(&call).await {
            Ok(response) => response,
            Err(SearchError::Http { status, body }) => {
                tracing::warn!(kind = K::LABEL, status, "Search initiation rejected");
                return Err(SearchError::SearchInit {
                    status,
                    message: body,
                });
            }
            Err(e) => return Err(e),
        };

        if response.status != 0 {
            return Err(SearchError::SearchRejected {
                code: response.status,
                reason: init_status_reason(response.status).to_string(),
            });
        }
        if response.id.is_empty() {
            return Err(SearchError::SearchRejected {
                code: response.status,
                reason: "service returned no search id".to_string(),
            });
        }

        tracing::info!(
            kind = K::LABEL,
            search_id = %response.id,
            max_results = limits.max_results,
            timeout_secs = limits.timeout.as_secs(),
            "Search started"
        );

        Ok(SearchSession::new(response.id, limits))
    }

    /// Advance a session by one transition.
    ///
    /// Terminal sessions are returned unchanged. Errors from the poll call
    /// abort the search and leave the session state as it was.
    pub async fn step<K: SearchKind>(&self, session: &mut SearchSession<K>) -> Result<SearchState> {
        if session.state().is_terminal() {
            return Ok(session.state());
        }
        if let Some(state) = self.check_guards(session).await {
            return Ok(state);
        }

        let page = self.fetch_page(session).await?;
        let status = page.status;
        let batch = page.records.unwrap_or_default();
        let received = batch.len();
        session.record_poll(status);

        let state = match status {
            SearchStatus::NotFound => {
                session.clear();
                SearchState::NotFound
            }
            SearchStatus::NoMoreResults => {
                session.append(batch);
                SearchState::Done
            }
            _ => {
                session.append(batch);
                if session.is_full() {
                    // The remote side may still be producing hits.
                    self.terminate_quietly(session.id()).await;
                    SearchState::Done
                } else {
                    SearchState::Polling
                }
            }
        };

        tracing::debug!(
            kind = K::LABEL,
            search_id = session.id(),
            status = status.code(),
            received,
            records = session.records().len(),
            ?state,
            "Poll completed"
        );

        session.set_state(state);
        if state == SearchState::Polling {
            if let Some(state) = self.check_guards(session).await {
                return Ok(state);
            }
        }
        Ok(state)
    }

    /// Poll a session until it reaches a terminal state.
    ///
    /// Timeouts and local cancellation are normal outcomes carrying the
    /// partial results; only call failures are errors.
    pub async fn run<K: SearchKind>(
        &self,
        mut session: SearchSession<K>,
    ) -> Result<SearchOutcome<K::Item>> {
        let registration = self
            .active
            .register(session.id(), session.cancellation_token());

        loop {
            let state = match self.step(&mut session).await {
                Ok(state) => state,
                Err(e) => {
                    tracing::error!(
                        kind = K::LABEL,
                        search_id = session.id(),
                        "Search aborted: {}",
                        e
                    );
                    return Err(e);
                }
            };

            if state.is_terminal() {
                break;
            }
            tokio::task::yield_now().await;
        }
        drop(registration);

        let outcome = session.into_outcome();
        tracing::info!(
            kind = K::LABEL,
            search_id = %outcome.id,
            state = ?outcome.state,
            records = outcome.records.len(),
            polls = outcome.polls,
            elapsed = ?outcome.elapsed,
            "Search finished"
        );
        Ok(outcome)
    }

    /// Start a search and run it to a terminal state.
    pub async fn search<K: SearchKind>(
        &self,
        request: &K::Request,
    ) -> Result<SearchOutcome<K::Item>> {
        let session = self.start::<K>(request).await?;
        self.run(session).await
    }

    /// Terminate a remote search.
    ///
    /// A poll loop for `search_id` running in this process stops before its
    /// next poll and ends in [`SearchState::Terminated`]. Returns `true` if
    /// the service acknowledged the call and `false` if it no longer knows
    /// the id, so repeated calls are safe. Other failures propagate.
    pub async fn terminate(&self, search_id: &str) -> Result<bool> {
        if self.active.cancel(search_id) {
            tracing::debug!(search_id, "Stopping local poll loop");
        }

        let call = ApiRequest::get(TERMINATE_PATH).param("id", search_id);
        match self.api.bytes(&call).await {
            Ok(_) => {
                tracing::debug!(search_id, "Search terminated");
                Ok(true)
            }
            Err(SearchError::Http { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Best-effort termination used during cleanup; failures are logged.
    async fn terminate_quietly(&self, search_id: &str) {
        if let Err(e) = self.terminate(search_id).await {
            tracing::warn!(search_id, "Best-effort termination failed: {}", e);
        }
    }

    /// Cancellation and deadline guards. Returns the terminal state entered,
    /// if any.
    async fn check_guards<K: SearchKind>(
        &self,
        session: &mut SearchSession<K>,
    ) -> Option<SearchState> {
        let state = if session.is_cancelled() {
            SearchState::Terminated
        } else if session.is_expired() {
            SearchState::TimedOut
        } else {
            return None;
        };

        tracing::info!(
            kind = K::LABEL,
            search_id = session.id(),
            ?state,
            records = session.records().len(),
            "Search stopped before completion"
        );
        self.terminate_quietly(session.id()).await;
        session.set_state(state);
        Some(state)
    }

    async fn fetch_page<K: SearchKind>(
        &self,
        session: &SearchSession<K>,
    ) -> Result<ResultPage<K::Item>> {
        let call = K::result_call(session.id(), session.offset(), session.remaining());
        self.api.json(&call).await
    }
}

fn init_status_reason(code: i64) -> &'static str {
    match code {
        1 => "invalid search term",
        2 => "too many concurrent searches",
        _ => "unknown initiation status",
    }
}

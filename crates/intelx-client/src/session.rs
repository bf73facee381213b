//! Local model of one remote search.
//!
//! A [`SearchSession`] is created by a successful initiation call, mutated
//! only by the orchestrator's poll step, and consumed into a
//! [`SearchOutcome`] once it reaches a terminal [`SearchState`].

use crate::error::Result;
use crate::transport::ApiRequest;
use crate::types::{Record, SearchRequest};
use intelx_core::SearchStatus;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A remote search flavour: which endpoints to use, what comes back, and how
/// hits are deduplicated.
pub trait SearchKind: Send + Sync + 'static {
    /// Body of the initiation call
    type Request: Serialize + Send + Sync;
    /// One result entry
    type Item: DeserializeOwned + Clone + Send + Sync;
    /// Natural key of an entry
    type Key: Eq + Hash + Send + Sync;

    /// Name used in log lines
    const LABEL: &'static str;
    /// Initiation endpoint
    const SEARCH_PATH: &'static str;
    /// Result endpoint
    const RESULT_PATH: &'static str;

    /// Reject malformed requests before any call is made.
    fn validate(request: &Self::Request) -> Result<()>;

    /// Result cap and polling deadline of a request.
    fn limits(request: &Self::Request) -> SearchLimits;

    /// Natural key of an entry.
    fn key(item: &Self::Item) -> Self::Key;

    /// Initiation call for a request: a JSON POST to [`Self::SEARCH_PATH`].
    fn init_call(request: &Self::Request) -> Result<ApiRequest> {
        ApiRequest::post(Self::SEARCH_PATH, request)
    }

    /// Poll call asking for up to `limit` entries beyond the `offset` held.
    fn result_call(search_id: &str, offset: usize, limit: usize) -> ApiRequest {
        ApiRequest::get(Self::RESULT_PATH)
            .param("id", search_id)
            .param("offset", offset)
            .param("limit", limit)
    }
}

/// Content search over buckets.
#[derive(Debug, Clone, Copy)]
pub struct IntelligentSearch;

impl SearchKind for IntelligentSearch {
    type Request = SearchRequest;
    type Item = Record;
    type Key = (String, String);

    const LABEL: &'static str = "intelligent";
    const SEARCH_PATH: &'static str = "/intelligent/search";
    const RESULT_PATH: &'static str = "/intelligent/search/result";

    fn validate(request: &SearchRequest) -> Result<()> {
        request.validate()
    }

    fn limits(request: &SearchRequest) -> SearchLimits {
        SearchLimits {
            max_results: request.max_results,
            timeout: request.timeout(),
        }
    }

    fn key(item: &Record) -> (String, String) {
        item.key()
    }
}

/// Result cap and polling deadline of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    /// Upper bound on accumulated entries
    pub max_results: u32,
    /// Wall-clock deadline measured from initiation
    pub timeout: Duration,
}

/// Position of a session in the polling state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchState {
    /// Initiated, not yet polled
    Init,
    /// Polling in progress
    Polling,
    /// Finished: exhausted or result cap reached
    Done,
    /// Finished: nothing matched
    NotFound,
    /// Deadline passed, partial results kept
    TimedOut,
    /// Cancelled locally, partial results kept
    Terminated,
}

impl SearchState {
    /// Whether no further polls will be made.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Init | Self::Polling)
    }
}

/// Accumulated state of one remote search.
pub struct SearchSession<K: SearchKind> {
    id: String,
    state: SearchState,
    status: Option<SearchStatus>,
    records: Vec<K::Item>,
    seen: HashSet<K::Key>,
    limits: SearchLimits,
    started_at: Instant,
    polls: u32,
    cancel: CancellationToken,
}

impl<K: SearchKind> SearchSession<K> {
    /// Start tracking a session the service has just issued.
    #[must_use]
    pub fn new(id: impl Into<String>, limits: SearchLimits) -> Self {
        Self {
            id: id.into(),
            state: SearchState::Init,
            status: None,
            records: Vec::new(),
            seen: HashSet::new(),
            limits,
            started_at: Instant::now(),
            polls: 0,
            cancel: CancellationToken::new(),
        }
    }

    /// Opaque id issued by the service.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SearchState {
        self.state
    }

    /// Status code of the most recent poll.
    #[must_use]
    pub fn status(&self) -> Option<SearchStatus> {
        self.status
    }

    /// Entries accumulated so far, in arrival order.
    #[must_use]
    pub fn records(&self) -> &[K::Item] {
        &self.records
    }

    /// Limits the session runs under.
    #[must_use]
    pub fn limits(&self) -> SearchLimits {
        self.limits
    }

    /// Number of polls issued.
    #[must_use]
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Time since initiation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Whether the polling deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.limits.timeout
    }

    /// Whether the result cap has been reached.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.limits.max_results as usize
    }

    /// Offset for the next poll: entries already held.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.records.len()
    }

    /// Entries still wanted before the cap is reached.
    #[must_use]
    pub fn remaining(&self) -> usize {
        (self.limits.max_results as usize).saturating_sub(self.records.len())
    }

    /// Token that stops the poll loop before its next iteration.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether local cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Append a batch in order, dropping duplicates and truncating at the
    /// cap. Returns the number of entries kept.
    pub(crate) fn append(&mut self, batch: Vec<K::Item>) -> usize {
        let before = self.records.len();
        for item in batch {
            if self.is_full() {
                break;
            }
            if self.seen.insert(K::key(&item)) {
                self.records.push(item);
            }
        }
        self.records.len() - before
    }

    pub(crate) fn record_poll(&mut self, status: SearchStatus) {
        self.polls += 1;
        self.status = Some(status);
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.seen.clear();
    }

    pub(crate) fn set_state(&mut self, state: SearchState) {
        self.state = state;
    }

    /// Consume the session into what the caller receives.
    #[must_use]
    pub fn into_outcome(self) -> SearchOutcome<K::Item> {
        SearchOutcome {
            elapsed: self.elapsed(),
            id: self.id,
            state: self.state,
            status: self.status,
            records: self.records,
            polls: self.polls,
        }
    }
}

/// Final result of a search run.
#[derive(Debug, Clone)]
pub struct SearchOutcome<T> {
    /// Remote session id
    pub id: String,
    /// Terminal state reached
    pub state: SearchState,
    /// Status code of the last poll, if any poll was made
    pub status: Option<SearchStatus>,
    /// Accumulated entries
    pub records: Vec<T>,
    /// Time from initiation to completion
    pub elapsed: Duration,
    /// Number of polls issued
    pub polls: u32,
}

impl<T> SearchOutcome<T> {
    /// Whether the search ran to completion rather than being cut short.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.state, SearchState::Done | SearchState::NotFound)
    }
}

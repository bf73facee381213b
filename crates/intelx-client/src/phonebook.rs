//! Phonebook resolution: related domains, email addresses and URLs for a
//! selector.
//!
//! Phonebook searches reuse the orchestrator's polling loop with their own
//! endpoints. Callers only see the resolved entries; the session is drained
//! and dropped inside [`PhonebookResolver::resolve`].

use crate::error::Result;
use crate::orchestrator::SearchOrchestrator;
use crate::session::{SearchKind, SearchLimits, SearchState};
use crate::types::{
    date_format, validate_common, validate_date_range, DEFAULT_MAX_RESULTS, DEFAULT_TIMEOUT_SECS,
};
use chrono::NaiveDateTime;
use intelx_core::PhonebookTarget;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Parameters of a phonebook search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonebookRequest {
    /// Selector to resolve, e.g. `github.com` or `@gmail.com`
    pub term: String,
    /// Selector family to return
    pub target: PhonebookTarget,
    /// Buckets to search; empty means all
    #[serde(default)]
    pub buckets: BTreeSet<String>,
    /// Upper bound on returned entries
    #[serde(rename = "maxresults")]
    pub max_results: u32,
    /// Upper bound on total polling time, in seconds
    #[serde(rename = "timeout")]
    pub timeout_secs: u64,
    /// Lower date bound
    #[serde(rename = "datefrom", default, with = "date_format")]
    pub date_from: Option<NaiveDateTime>,
    /// Upper date bound
    #[serde(rename = "dateto", default, with = "date_format")]
    pub date_to: Option<NaiveDateTime>,
    /// Ids of earlier searches the service should terminate first
    #[serde(default)]
    pub terminate: Vec<String>,
}

impl PhonebookRequest {
    /// Create a request for `term` returning every selector family.
    #[must_use]
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            target: PhonebookTarget::All,
            buckets: BTreeSet::new(),
            max_results: DEFAULT_MAX_RESULTS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            date_from: None,
            date_to: None,
            terminate: Vec::new(),
        }
    }

    /// Set the selector family.
    #[must_use]
    pub fn with_target(mut self, target: PhonebookTarget) -> Self {
        self.target = target;
        self
    }

    /// Set the result cap.
    #[must_use]
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    /// Set the polling deadline in seconds.
    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// A resolved selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonebookEntry {
    /// Selector value
    #[serde(alias = "selectorvalue")]
    pub selector: String,
    /// Related values, when the service groups them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selectors: Vec<serde_json::Value>,
    /// Selector type code
    #[serde(default)]
    pub selectortype: i64,
    /// Human readable selector type
    #[serde(default, rename = "selectortypeh", skip_serializing_if = "Option::is_none")]
    pub selectortype_label: Option<String>,
    /// Bucket the selector was seen in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

/// Phonebook search flavour for the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct PhonebookSearch;

impl SearchKind for PhonebookSearch {
    type Request = PhonebookRequest;
    type Item = PhonebookEntry;
    type Key = (String, i64);

    const LABEL: &'static str = "phonebook";
    const SEARCH_PATH: &'static str = "/phonebook/search";
    const RESULT_PATH: &'static str = "/phonebook/search/result";

    fn validate(request: &PhonebookRequest) -> Result<()> {
        validate_common(&request.term, request.max_results)?;
        validate_date_range(request.date_from, request.date_to)
    }

    fn limits(request: &PhonebookRequest) -> SearchLimits {
        SearchLimits {
            max_results: request.max_results,
            timeout: Duration::from_secs(request.timeout_secs),
        }
    }

    fn key(item: &PhonebookEntry) -> (String, i64) {
        (item.selector.clone(), item.selectortype)
    }
}

/// Runs phonebook searches to completion.
#[derive(Clone)]
pub struct PhonebookResolver {
    orchestrator: SearchOrchestrator,
}

impl PhonebookResolver {
    /// Create a resolver on top of an orchestrator.
    #[must_use]
    pub fn new(orchestrator: SearchOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Start a phonebook search and return its id without polling.
    pub async fn start(&self, request: &PhonebookRequest) -> Result<String> {
        let session = self.orchestrator.start::<PhonebookSearch>(request).await?;
        Ok(session.id().to_string())
    }

    /// Resolve `request` to its selectors.
    ///
    /// A deadline hit is not retried: whatever was resolved by then is
    /// returned, same as a search that ran dry.
    pub async fn resolve(&self, request: &PhonebookRequest) -> Result<Vec<PhonebookEntry>> {
        let outcome = self.orchestrator.search::<PhonebookSearch>(request).await?;
        if outcome.state == SearchState::TimedOut {
            tracing::debug!(
                search_id = %outcome.id,
                entries = outcome.records.len(),
                "Phonebook search hit its deadline, returning partial selectors"
            );
        }
        Ok(outcome.records)
    }
}

/// Flatten entries to their selector values, dropping repeats.
#[must_use]
pub fn selector_values(entries: &[PhonebookEntry]) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    entries
        .iter()
        .map(|entry| entry.selector.as_str())
        .filter(|value| seen.insert(*value))
        .collect()
}

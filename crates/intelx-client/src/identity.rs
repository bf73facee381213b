//! Identity service: breach lookups and account exports for a selector.
//!
//! The identity host speaks the same asynchronous search protocol as the
//! main API, so both flavours here are [`SearchKind`]s driven by the shared
//! [`SearchOrchestrator`]. Searches start with a GET carrying query
//! parameters, and every poll hands out the next batch instead of paging by
//! offset.

use crate::error::Result;
use crate::orchestrator::SearchOrchestrator;
use crate::rate_limit::RateLimiter;
use crate::session::{SearchKind, SearchLimits, SearchOutcome, SearchState};
use crate::transport::{ApiClient, ApiRequest, HttpTransport, Transport};
use crate::types::{
    date_format, validate_common, validate_date_range, DEFAULT_MAX_RESULTS, DEFAULT_TIMEOUT_SECS,
};
use chrono::NaiveDateTime;
use intelx_core::{ApiConfig, ClientConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Result endpoint shared by both identity flavours.
const LIVE_RESULT_PATH: &str = "/live/search/result";

/// Parameters of an identity search or account export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRequest {
    /// Email address, domain (`@example.com`) or other selector
    pub selector: String,
    /// Buckets to search; empty means all
    #[serde(default)]
    pub buckets: BTreeSet<String>,
    /// Upper bound on returned entries
    #[serde(rename = "limit")]
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
    /// Ask the service to analyze matched items
    #[serde(default)]
    pub analyze: bool,
    /// Drop entries the service flags as invalid
    #[serde(default, rename = "skipinvalid")]
    pub skip_invalid: bool,
    /// Ids of earlier searches the service should terminate first
    #[serde(default)]
    pub terminate: Vec<String>,
}

impl IdentityRequest {
    /// Create a request for `selector` across all buckets with default
    /// limits.
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            buckets: BTreeSet::new(),
            max_results: DEFAULT_MAX_RESULTS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            date_from: None,
            date_to: None,
            analyze: false,
            skip_invalid: false,
            terminate: Vec::new(),
        }
    }

    /// Add one bucket.
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.buckets.insert(bucket.into());
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

    /// Restrict to a date range. Either bound may be open.
    #[must_use]
    pub fn with_date_range(
        mut self,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    /// Check the request before it is sent.
    pub fn validate(&self) -> Result<()> {
        validate_common(&self.selector, self.max_results)?;
        validate_date_range(self.date_from, self.date_to)
    }

    fn limits(&self) -> SearchLimits {
        SearchLimits {
            max_results: self.max_results,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    /// Initiation call against `path`, parameters in the query string.
    fn to_call(&self, path: &str) -> ApiRequest {
        let buckets: Vec<&str> = self.buckets.iter().map(String::as_str).collect();
        let mut call = ApiRequest::get(path)
            .param("selector", &self.selector)
            .param("bucket", buckets.join(","))
            .param("limit", self.max_results)
            .param("analyze", self.analyze)
            .param("skipinvalid", self.skip_invalid)
            .param("datefrom", date_format::to_wire(self.date_from))
            .param("dateto", date_format::to_wire(self.date_to));
        for id in &self.terminate {
            call = call.param("terminate", id);
        }
        call
    }
}

/// One breach hit. Fields not modelled here are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Item id of the leak the hit comes from
    #[serde(default)]
    pub systemid: String,
    /// Name of the leak
    #[serde(default)]
    pub name: String,
    /// Bucket of the leak
    #[serde(default)]
    pub bucket: String,
    /// Date of the leak
    #[serde(default)]
    pub date: Option<String>,
    /// Remaining fields, passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One exported credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// User name or email address
    pub user: String,
    /// Password as leaked, possibly hashed
    #[serde(default)]
    pub password: String,
    /// Password type code
    #[serde(default, rename = "passwordtype")]
    pub password_type: i64,
    /// Short name of the leak the account comes from
    #[serde(default, rename = "sourceshort")]
    pub source: String,
    /// Remaining fields, passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Breach lookup flavour for the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct IdentitySearch;

impl SearchKind for IdentitySearch {
    type Request = IdentityRequest;
    type Item = IdentityRecord;
    type Key = (String, String, String);

    const LABEL: &'static str = "identity";
    const SEARCH_PATH: &'static str = "/live/search/internal";
    const RESULT_PATH: &'static str = LIVE_RESULT_PATH;

    fn validate(request: &IdentityRequest) -> Result<()> {
        request.validate()
    }

    fn limits(request: &IdentityRequest) -> SearchLimits {
        request.limits()
    }

    fn key(item: &IdentityRecord) -> Self::Key {
        (item.systemid.clone(), item.bucket.clone(), item.name.clone())
    }

    fn init_call(request: &IdentityRequest) -> Result<ApiRequest> {
        Ok(request.to_call(Self::SEARCH_PATH))
    }

    fn result_call(search_id: &str, _offset: usize, limit: usize) -> ApiRequest {
        live_result_call(search_id, limit)
    }
}

/// Account export flavour for the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct AccountExport;

impl SearchKind for AccountExport {
    type Request = IdentityRequest;
    type Item = Account;
    type Key = (String, String, String);

    const LABEL: &'static str = "accounts";
    const SEARCH_PATH: &'static str = "/accounts/csv";
    const RESULT_PATH: &'static str = LIVE_RESULT_PATH;

    fn validate(request: &IdentityRequest) -> Result<()> {
        request.validate()
    }

    fn limits(request: &IdentityRequest) -> SearchLimits {
        request.limits()
    }

    fn key(item: &Account) -> Self::Key {
        (item.user.clone(), item.password.clone(), item.source.clone())
    }

    fn init_call(request: &IdentityRequest) -> Result<ApiRequest> {
        Ok(request.to_call(Self::SEARCH_PATH))
    }

    fn result_call(search_id: &str, _offset: usize, limit: usize) -> ApiRequest {
        live_result_call(search_id, limit)
    }
}

fn live_result_call(search_id: &str, limit: usize) -> ApiRequest {
    ApiRequest::get(LIVE_RESULT_PATH)
        .param("id", search_id)
        .param("format", 1)
        .param("limit", limit)
}

/// Client for the identity host.
///
/// Cloning is cheap; clones share the same transport and rate limiter.
#[derive(Clone)]
pub struct IdentityClient {
    orchestrator: SearchOrchestrator,
    limiter: Arc<RateLimiter>,
}

impl IdentityClient {
    /// Create a client for the identity host with default settings.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let mut config = ClientConfig::default();
        config.api.api_key = Some(api_key.into());
        Self::from_config(&config)
    }

    /// Create a client from configuration with its own rate limiter.
    ///
    /// # Errors
    /// Returns error if no API key is configured or the HTTP client cannot
    /// be created.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::new(config.search.rate_limit()));
        Self::from_config_with_limiter(config, limiter)
    }

    /// Create a client from configuration sharing an existing rate limiter,
    /// typically the one of an [`IntelxClient`](crate::IntelxClient).
    ///
    /// # Errors
    /// Returns error if no API key is configured or the HTTP client cannot
    /// be created.
    pub fn from_config_with_limiter(
        config: &ClientConfig,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        let api = ApiConfig {
            base_url: config.api.identity_url.clone(),
            ..config.api.clone()
        };
        let transport = HttpTransport::from_config(&api)?;
        tracing::debug!(base_url = transport.base_url(), "Creating identity client");
        Ok(Self::with_transport(Arc::new(transport), limiter))
    }

    /// Create a client over any transport.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>, limiter: Arc<RateLimiter>) -> Self {
        let api = ApiClient::new(transport, Arc::clone(&limiter));
        Self {
            orchestrator: SearchOrchestrator::new(api),
            limiter,
        }
    }

    /// The rate limiter shared by every call of this client.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The underlying orchestrator, for callers driving sessions by hand.
    #[must_use]
    pub fn orchestrator(&self) -> &SearchOrchestrator {
        &self.orchestrator
    }

    /// Run a breach lookup to a terminal state.
    pub async fn search_outcome(
        &self,
        request: &IdentityRequest,
    ) -> Result<SearchOutcome<IdentityRecord>> {
        self.orchestrator.search::<IdentitySearch>(request).await
    }

    /// Breach hits for a selector. A deadline hit returns what arrived.
    pub async fn search(&self, request: &IdentityRequest) -> Result<Vec<IdentityRecord>> {
        let outcome = self.search_outcome(request).await?;
        log_partial(IdentitySearch::LABEL, &outcome);
        Ok(outcome.records)
    }

    /// Credentials leaked for a selector. A deadline hit returns what
    /// arrived.
    pub async fn export_accounts(&self, request: &IdentityRequest) -> Result<Vec<Account>> {
        let outcome = self.orchestrator.search::<AccountExport>(request).await?;
        log_partial(AccountExport::LABEL, &outcome);
        Ok(outcome.records)
    }

    /// Terminate a remote identity search and stop its local poll loop.
    pub async fn terminate_search(&self, search_id: &str) -> Result<bool> {
        self.orchestrator.terminate(search_id).await
    }
}

fn log_partial<T>(kind: &'static str, outcome: &SearchOutcome<T>) {
    if outcome.state == SearchState::TimedOut {
        tracing::debug!(
            kind,
            search_id = %outcome.id,
            entries = outcome.records.len(),
            "Identity search hit its deadline, returning partial results"
        );
    }
}

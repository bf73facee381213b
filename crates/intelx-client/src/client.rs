//! High-level client tying the search components together.

use crate::error::Result;
use crate::files::{search_stats, FileService};
use crate::orchestrator::SearchOrchestrator;
use crate::phonebook::{PhonebookEntry, PhonebookRequest, PhonebookResolver};
use crate::rate_limit::RateLimiter;
use crate::session::{IntelligentSearch, SearchOutcome, SearchSession};
use crate::transport::{ApiClient, HttpTransport, Transport};
use crate::tree::{TreeBranch, TreeReconstructor};
use crate::types::{Record, SearchRequest};
use intelx_core::{ClientConfig, ContentType, FileFormat, MediaType, SearchConfig};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Entry point for searches, phonebook lookups, tree views and file calls.
///
/// Cloning is cheap; clones share the same transport and rate limiter.
#[derive(Clone)]
pub struct IntelxClient {
    orchestrator: SearchOrchestrator,
    phonebook: PhonebookResolver,
    trees: TreeReconstructor,
    files: FileService,
    limiter: Arc<RateLimiter>,
    defaults: SearchConfig,
}

impl IntelxClient {
    /// Create a client for the main API host with default settings.
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

    /// Create a client from configuration sharing an existing rate limiter.
    ///
    /// # Errors
    /// Returns error if no API key is configured or the HTTP client cannot
    /// be created.
    pub fn from_config_with_limiter(
        config: &ClientConfig,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        let transport = HttpTransport::from_config(&config.api)?;
        tracing::debug!(base_url = transport.base_url(), "Creating search client");
        Ok(Self::with_transport(Arc::new(transport), limiter, &config.search))
    }

    /// Create a client over any transport.
    #[must_use]
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
        config: &SearchConfig,
    ) -> Self {
        let api = ApiClient::new(transport, Arc::clone(&limiter));
        let orchestrator = SearchOrchestrator::new(api.clone());
        Self {
            phonebook: PhonebookResolver::new(orchestrator.clone()),
            trees: TreeReconstructor::new(api.clone(), config.tree_page_size),
            files: FileService::new(api),
            orchestrator,
            limiter,
            defaults: config.clone(),
        }
    }

    /// Search request for `term` with the configured result cap and deadline.
    #[must_use]
    pub fn search_request(&self, term: impl Into<String>) -> SearchRequest {
        SearchRequest::new(term)
            .with_max_results(self.defaults.default_max_results)
            .with_timeout_secs(self.defaults.default_timeout_secs)
    }

    /// Phonebook request for `term` with the configured result cap and
    /// deadline.
    #[must_use]
    pub fn phonebook_request(&self, term: impl Into<String>) -> PhonebookRequest {
        PhonebookRequest::new(term)
            .with_max_results(self.defaults.default_max_results)
            .with_timeout_secs(self.defaults.default_timeout_secs)
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

    /// Run an intelligent search to a terminal state.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome<Record>> {
        self.orchestrator.search::<IntelligentSearch>(request).await
    }

    /// Start an intelligent search and return the session without polling.
    pub async fn start_search(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchSession<IntelligentSearch>> {
        self.orchestrator.start::<IntelligentSearch>(request).await
    }

    /// Start an intelligent search and return only its id.
    pub async fn intelligent_search(&self, request: &SearchRequest) -> Result<String> {
        let session = self.start_search(request).await?;
        Ok(session.id().to_string())
    }

    /// Terminate a remote search and stop its local poll loop, if one is
    /// running. Safe to repeat.
    pub async fn terminate_search(&self, search_id: &str) -> Result<bool> {
        self.orchestrator.terminate(search_id).await
    }

    /// Start a phonebook search and return only its id.
    pub async fn phonebook_search(&self, request: &PhonebookRequest) -> Result<String> {
        self.phonebook.start(request).await
    }

    /// Run a phonebook search to completion and return the selectors.
    pub async fn phonebook_search_complete(
        &self,
        request: &PhonebookRequest,
    ) -> Result<Vec<PhonebookEntry>> {
        self.phonebook.resolve(request).await
    }

    /// File tree of a container item.
    pub async fn file_tree_view(&self, bucket: &str, indexfile: &str) -> Result<Vec<TreeBranch>> {
        self.trees.fetch(bucket, indexfile).await
    }

    /// Account information and capabilities of the API key.
    pub async fn capabilities(&self) -> Result<serde_json::Value> {
        self.files.capabilities().await
    }

    /// First `lines` lines of an item.
    pub async fn file_preview(
        &self,
        storageid: &str,
        bucket: &str,
        media: MediaType,
        content_type: ContentType,
        lines: u32,
    ) -> Result<String> {
        self.files
            .preview(storageid, bucket, media, content_type, lines)
            .await
    }

    /// Full text of an item.
    pub async fn file_view(
        &self,
        storageid: &str,
        bucket: &str,
        media: MediaType,
        content_type: ContentType,
    ) -> Result<String> {
        self.files
            .view(storageid, bucket, media, content_type, FileFormat::Text)
            .await
    }

    /// Raw bytes of an item.
    pub async fn file_read(&self, systemid: &str, bucket: &str) -> Result<Vec<u8>> {
        self.files.read(systemid, bucket).await
    }

    /// Selectors extracted from an item.
    pub async fn selectors(&self, systemid: &str) -> Result<Vec<PhonebookEntry>> {
        self.files.selectors(systemid).await
    }

    /// Count records per bucket.
    #[must_use]
    pub fn search_stats(&self, records: &[Record]) -> BTreeMap<String, usize> {
        search_stats(records)
    }
}

//! IntelX Client - Search orchestration for the IntelX intelligence-search API.
//!
//! This crate starts asynchronous searches against remote data buckets,
//! polls them to completion under the service's status-code state machine,
//! resolves phonebook selectors, rebuilds file trees of container items and
//! queries the identity service for breached accounts.
//!
//! # Features
//!
//! - **Polling state machine**: explicit `INIT -> POLLING -> terminal` steps
//!   with timeout and cancellation guards
//! - **Offset pagination**: each poll asks for entries beyond those held,
//!   with deduplication and truncation at the result cap
//! - **Process-wide rate limiting**: one shared limiter spaces every call
//! - **Pluggable transport**: reqwest in production, scripted in tests
//!
//! # Example
//!
//! ```rust,no_run
//! use intelx_client::{IntelxClient, SearchRequest, SearchState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = IntelxClient::new(std::env::var("INTELX_API_KEY")?)?;
//!
//! let request = SearchRequest::new("test@example.com")
//!     .with_bucket("pastes")
//!     .with_max_results(5)
//!     .with_timeout_secs(10);
//!
//! let outcome = client.search(&request).await?;
//! if outcome.state == SearchState::TimedOut {
//!     println!("partial results");
//! }
//! for (bucket, count) in client.search_stats(&outcome.records) {
//!     println!("{bucket}: {count}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod client;
pub mod error;
pub mod files;
pub mod identity;
pub mod orchestrator;
pub mod phonebook;
pub mod rate_limit;
pub mod session;
pub mod transport;
pub mod tree;
pub mod types;

// Re-export commonly used types
pub use client::IntelxClient;
pub use error::{Result, SearchError};
pub use files::{search_stats, FileService};
pub use identity::{
    Account, AccountExport, IdentityClient, IdentityRecord, IdentityRequest, IdentitySearch,
};
pub use orchestrator::SearchOrchestrator;
pub use phonebook::{
    selector_values, PhonebookEntry, PhonebookRequest, PhonebookResolver, PhonebookSearch,
};
pub use rate_limit::{RateLimiter, RatePermit};
pub use session::{
    IntelligentSearch, SearchKind, SearchLimits, SearchOutcome, SearchSession, SearchState,
};
pub use transport::{
    ApiClient, ApiRequest, HttpTransport, Method, RateLimitedTransport, Transport,
};
pub use tree::{build_forest, TreeBranch, TreeNode, TreeReconstructor};
pub use types::{Record, SearchRequest};

pub use intelx_core::{
    ClientConfig, ContentType, FileFormat, MediaType, PhonebookTarget, SearchConfig, SearchStatus,
    SortOrder,
};

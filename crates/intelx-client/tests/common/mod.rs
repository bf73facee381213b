//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use intelx_client::{
    ApiRequest, IdentityClient, IntelxClient, RateLimiter, Result, SearchConfig, SearchError,
    Transport,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Canned reply for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Status(u16, String),
    Network(String),
}

impl Reply {
    fn into_result(self) -> Result<Vec<u8>> {
        match self {
            Self::Json(value) => Ok(serde_json::to_vec(&value).expect("encode reply")),
            Self::Status(status, body) => Err(SearchError::Http { status, body }),
            Self::Network(message) => Err(SearchError::Network(message)),
        }
    }
}

type Handler = Box<dyn Fn(&ApiRequest) -> Option<Reply> + Send + Sync>;

/// Replies from per-path queues, then per-path repeating fallbacks, then an
/// optional handler. Anything unscripted answers HTTP 404.
#[derive(Default)]
pub struct ScriptedTransport {
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    repeating: Mutex<HashMap<String, Reply>>,
    handler: Option<Handler>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_handler<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&ApiRequest) -> Option<Reply> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Some(Box::new(handler)),
            ..Self::default()
        })
    }

    pub fn push(&self, path: &str, reply: Reply) -> &Self {
        self.queued
            .lock()
            .expect("lock queue")
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn push_json(&self, path: &str, value: Value) -> &Self {
        self.push(path, Reply::Json(value))
    }

    pub fn repeat(&self, path: &str, reply: Reply) -> &Self {
        self.repeating
            .lock()
            .expect("lock fallback")
            .insert(path.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().expect("lock calls").clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<ApiRequest> {
        self.calls()
            .into_iter()
            .filter(|call| call.path == path)
            .collect()
    }

    /// Values of one query parameter across the calls to `path`.
    pub fn params(&self, path: &str, key: &str) -> Vec<String> {
        self.calls_to(path)
            .iter()
            .filter_map(|call| call.query_value(key).map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<Vec<u8>> {
        self.calls.lock().expect("lock calls").push(request.clone());

        let queued = self
            .queued
            .lock()
            .expect("lock queue")
            .get_mut(&request.path)
            .and_then(VecDeque::pop_front);
        let reply = queued
            .or_else(|| {
                self.repeating
                    .lock()
                    .expect("lock fallback")
                    .get(&request.path)
                    .cloned()
            })
            .or_else(|| self.handler.as_ref().and_then(|handler| handler(request)))
            .unwrap_or_else(|| Reply::Status(404, format!("no script for {}", request.path)));

        reply.into_result()
    }
}

pub const SEARCH: &str = "/intelligent/search";
pub const RESULTS: &str = "/intelligent/search/result";
pub const TERMINATE: &str = "/intelligent/search/terminate";
pub const PHONEBOOK: &str = "/phonebook/search";
pub const PHONEBOOK_RESULTS: &str = "/phonebook/search/result";
pub const TREE: &str = "/file/view";
pub const IDENTITY_SEARCH: &str = "/live/search/internal";
pub const ACCOUNTS: &str = "/accounts/csv";
pub const LIVE_RESULTS: &str = "/live/search/result";

/// Client over `transport` with no call spacing.
pub fn client(transport: &Arc<ScriptedTransport>) -> IntelxClient {
    client_with_limiter(transport, Arc::new(RateLimiter::unlimited()))
}

pub fn client_with_limiter(
    transport: &Arc<ScriptedTransport>,
    limiter: Arc<RateLimiter>,
) -> IntelxClient {
    IntelxClient::with_transport(transport.clone(), limiter, &SearchConfig::default())
}

/// Identity client over `transport` with no call spacing.
pub fn identity_client(transport: &Arc<ScriptedTransport>) -> IdentityClient {
    IdentityClient::with_transport(transport.clone(), Arc::new(RateLimiter::unlimited()))
}

pub fn record(systemid: &str, bucket: &str) -> Value {
    json!({
        "systemid": systemid,
        "storageid": format!("storage-{systemid}"),
        "bucket": bucket,
        "media": 1,
        "type": 1,
        "name": format!("{systemid}.txt"),
    })
}

pub fn page(status: i64, records: &[Value]) -> Value {
    json!({ "records": records, "status": status })
}

pub fn started(id: &str) -> Value {
    json!({ "id": id, "status": 0 })
}

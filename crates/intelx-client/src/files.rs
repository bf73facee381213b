//! Thin file and account endpoints.
//!
//! Plain request/response calls with no polling: account capabilities,
//! text previews and views of stored items, raw downloads, and the
//! selectors extracted from an item.

use crate::error::Result;
use crate::phonebook::PhonebookEntry;
use crate::transport::{ApiClient, ApiRequest};
use crate::types::Record;
use intelx_core::{ContentType, FileFormat, MediaType};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct SelectorList {
    #[serde(default)]
    selectors: Option<Vec<PhonebookEntry>>,
}

/// File-level calls against stored items.
#[derive(Clone)]
pub struct FileService {
    api: ApiClient,
}

impl FileService {
    /// Create a service over a rate limited API client.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Account information and per-bucket capabilities of the API key.
    pub async fn capabilities(&self) -> Result<serde_json::Value> {
        self.api.json(&ApiRequest::get("/authenticate/info")).await
    }

    /// First `lines` lines of an item, as text.
    pub async fn preview(
        &self,
        storageid: &str,
        bucket: &str,
        media: MediaType,
        content_type: ContentType,
        lines: u32,
    ) -> Result<String> {
        let call = ApiRequest::get("/file/preview")
            .param("c", content_type.code())
            .param("m", media.code())
            .param("f", FileFormat::Text.code())
            .param("sid", storageid)
            .param("b", bucket)
            .param("e", 0)
            .param("lines", lines);
        self.api.text(&call).await
    }

    /// Full content of an item rendered in `format`.
    pub async fn view(
        &self,
        storageid: &str,
        bucket: &str,
        media: MediaType,
        content_type: ContentType,
        format: FileFormat,
    ) -> Result<String> {
        let call = ApiRequest::get("/file/view")
            .param("f", format.code())
            .param("c", content_type.code())
            .param("m", media.code())
            .param("storageid", storageid)
            .param("bucket", bucket)
            .param("escape", 0);
        self.api.text(&call).await
    }

    /// Raw bytes of an item.
    pub async fn read(&self, systemid: &str, bucket: &str) -> Result<Vec<u8>> {
        let call = ApiRequest::get("/file/read")
            .param("type", 0)
            .param("systemid", systemid)
            .param("bucket", bucket);
        self.api.bytes(&call).await
    }

    /// Selectors the service extracted from an item.
    pub async fn selectors(&self, systemid: &str) -> Result<Vec<PhonebookEntry>> {
        let call = ApiRequest::get("/item/selectors").param("id", systemid);
        let list: SelectorList = self.api.json(&call).await?;
        Ok(list.selectors.unwrap_or_default())
    }
}

/// Count records per bucket.
#[must_use]
pub fn search_stats(records: &[Record]) -> BTreeMap<String, usize> {
    let mut stats = BTreeMap::new();
    for record in records {
        *stats.entry(record.bucket.clone()).or_insert(0) += 1;
    }
    stats
}

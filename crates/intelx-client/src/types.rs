//! Search request and result record types.

use crate::error::{Result, SearchError};
use chrono::NaiveDateTime;
use intelx_core::{ContentType, MediaType, SortOrder};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Result cap used by [`SearchRequest::new`].
pub const DEFAULT_MAX_RESULTS: u32 = 100;

/// Polling deadline in seconds used by [`SearchRequest::new`].
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Parameters of an intelligent search.
///
/// An empty bucket set searches every bucket the key has access to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Selector or free text to search for
    pub term: String,
    /// Buckets to search
    #[serde(default)]
    pub buckets: BTreeSet<String>,
    /// Upper bound on returned records
    #[serde(rename = "maxresults")]
    pub max_results: u32,
    /// Upper bound on total polling time, in seconds
    #[serde(rename = "timeout")]
    pub timeout_secs: u64,
    /// Requested ordering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOrder>,
    /// Restrict to one media type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaType>,
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

impl SearchRequest {
    /// Create a request for `term` across all buckets with default limits.
    #[must_use]
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            buckets: BTreeSet::new(),
            max_results: DEFAULT_MAX_RESULTS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            sort: None,
            media: None,
            date_from: None,
            date_to: None,
            terminate: Vec::new(),
        }
    }

    /// Add one bucket.
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.buckets.insert(bucket.into());
        self
    }

    /// Add several buckets.
    #[must_use]
    pub fn with_buckets<I, S>(mut self, buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.buckets.extend(buckets.into_iter().map(Into::into));
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

    /// Set the ordering.
    #[must_use]
    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Restrict to a media type.
    #[must_use]
    pub fn with_media(mut self, media: MediaType) -> Self {
        self.media = Some(media);
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

    /// Polling deadline as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check the request before it is sent.
    pub fn validate(&self) -> Result<()> {
        validate_common(&self.term, self.max_results)?;
        validate_date_range(self.date_from, self.date_to)
    }
}

pub(crate) fn validate_date_range(
    from: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
) -> Result<()> {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(SearchError::InvalidRequest(format!(
                "datefrom {from} is after dateto {to}"
            )));
        }
    }
    Ok(())
}

pub(crate) fn validate_common(term: &str, max_results: u32) -> Result<()> {
    if term.trim().is_empty() {
        return Err(SearchError::InvalidRequest(
            "search term must not be empty".to_string(),
        ));
    }
    if max_results == 0 {
        return Err(SearchError::InvalidRequest(
            "maxresults must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// One search hit. Fields not modelled here are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique item id
    pub systemid: String,
    /// Storage id used by file calls
    #[serde(default)]
    pub storageid: String,
    /// Bucket the item lives in
    pub bucket: String,
    /// Media type code
    #[serde(default)]
    pub media: MediaType,
    /// Content type code
    #[serde(rename = "type", default)]
    pub content_type: ContentType,
    /// Index file of a container, for tree views
    #[serde(default, deserialize_with = "empty_as_none")]
    pub indexfile: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Date of the item
    #[serde(default)]
    pub date: Option<String>,
    /// Date the item was indexed
    #[serde(default)]
    pub added: Option<String>,
    /// Size in bytes
    #[serde(default)]
    pub size: Option<u64>,
    /// Relevance score
    #[serde(default)]
    pub xscore: Option<i64>,
    /// Remaining fields, passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    /// Natural key used to drop duplicate hits within a session.
    #[must_use]
    pub fn key(&self) -> (String, String) {
        (self.systemid.clone(), self.bucket.clone())
    }
}

pub(crate) fn empty_as_none<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

/// Dates travel as `YYYY-MM-DD HH:MM:SS`, with an empty string for "unset".
pub(crate) mod date_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// Wire text of an optional date, for query parameters.
    pub fn to_wire(value: Option<NaiveDateTime>) -> String {
        value
            .map(|date| date.format(FORMAT).to_string())
            .unwrap_or_default()
    }

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&to_wire(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if raw.trim().is_empty() {
            return Ok(None);
        }
        NaiveDateTime::parse_from_str(raw.trim(), FORMAT)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

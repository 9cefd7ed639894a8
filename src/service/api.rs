//! Request and response shapes of the service APIs

use crate::source::Record;
use serde::{Deserialize, Serialize};

/// Read API parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReadQuery {
    /// Maximum items per page; absent or zero returns everything
    pub limit: Option<usize>,
    /// Cursor from a previous response
    pub last_key: Option<String>,
    /// Purge the resource before reading
    pub force_refresh: bool,
    /// Run one scan attempt before reading
    pub force_start: bool,
}

impl ReadQuery {
    pub fn page(limit: usize, last_key: Option<String>) -> Self {
        Self {
            limit: Some(limit),
            last_key,
            ..Self::default()
        }
    }
}

/// Read API response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResponse {
    pub items: Vec<Record>,
    /// Present only when more items remain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<String>,
    /// Size of the whole cached array
    pub total: usize,
    pub is_complete: bool,
}

impl ReadResponse {
    /// Cut the page selected by `query` out of `records`
    pub fn paginate(records: Vec<Record>, is_complete: bool, query: &ReadQuery) -> Self {
        let total = records.len();
        let start = query
            .last_key
            .as_deref()
            .and_then(decode_cursor)
            .unwrap_or(0)
            .min(total);
        let limit = query.limit.filter(|limit| *limit > 0).unwrap_or(total);
        let end = start.saturating_add(limit).min(total);

        let items = records.into_iter().skip(start).take(end - start).collect();
        Self {
            items,
            last_evaluated_key: (end < total).then(|| encode_cursor(end)),
            total,
            is_complete,
        }
    }
}

/// Opaque cursor for the item at `offset`
pub fn encode_cursor(offset: usize) -> String {
    hex::encode(offset.to_string())
}

/// Offset encoded in `cursor`, if it is one of ours
pub fn decode_cursor(cursor: &str) -> Option<usize> {
    let bytes = hex::decode(cursor).ok()?;
    std::str::from_utf8(&bytes).ok()?.parse().ok()
}

/// Cache Invalidation API actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheAction {
    Invalidate,
}

/// `{"action": "invalidate"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheActionRequest {
    pub action: CacheAction,
}

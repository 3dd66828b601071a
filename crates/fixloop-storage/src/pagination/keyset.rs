//! Composite `(sort_value, id)` cursors, encoded as URL-safe base64 JSON.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use fixloop_core::errors::StorageError;
use fixloop_core::traits::Page;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationCursor {
    pub last_sort_value: i64,
    pub last_id: String,
}

impl PaginationCursor {
    pub fn encode(&self) -> Result<String, StorageError> {
        let json = serde_json::to_vec(self).map_err(|e| StorageError::Serialization {
            message: e.to_string(),
        })?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(encoded: &str) -> Result<Self, StorageError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| StorageError::InvalidCursor(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::InvalidCursor(e.to_string()))
    }
}

/// Turn a `limit + 1` fetch into a page. The cursor is `Some` exactly when
/// the extra row proved that another page exists.
pub fn finish_page<T, K>(mut rows: Vec<T>, limit: usize, key: K) -> Result<Page<T>, StorageError>
where
    K: Fn(&T) -> PaginationCursor,
{
    let has_more = rows.len() > limit;
    rows.truncate(limit);
    let next_cursor = match (has_more, rows.last()) {
        (true, Some(last)) => Some(key(last).encode()?),
        _ => None,
    };
    Ok(Page {
        items: rows,
        next_cursor,
    })
}

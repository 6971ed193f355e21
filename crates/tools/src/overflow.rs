//! Oversized tool output handling.
//!
//! Output at or below `max_inline_size` characters passes through untouched.
//! Anything larger is kept in memory under its tool call id and replaced by a
//! preview that tells the agent how to page through the rest with
//! `read_tool_result`. Sizes, offsets and lengths count Unicode scalar values.

use crate::error::OverflowError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_MAX_INLINE_SIZE: usize = 8192;
pub const DEFAULT_PREVIEW_SIZE: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverflowConfig {
    #[serde(default = "default_max_inline_size")]
    pub max_inline_size: usize,
    #[serde(default = "default_preview_size")]
    pub preview_size: usize,
}

fn default_max_inline_size() -> usize {
    DEFAULT_MAX_INLINE_SIZE
}

fn default_preview_size() -> usize {
    DEFAULT_PREVIEW_SIZE
}

impl Default for OverflowConfig {
    fn default() -> Self {
        Self {
            max_inline_size: DEFAULT_MAX_INLINE_SIZE,
            preview_size: DEFAULT_PREVIEW_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResult {
    pub tool_call_id: String,
    pub session_id: String,
    pub full_content: String,
    pub char_len: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Entries {
    results: HashMap<String, Arc<StoredResult>>,
    by_session: HashMap<String, HashSet<String>>,
}

pub struct ResultOverflowStore {
    config: OverflowConfig,
    entries: RwLock<Entries>,
}

impl ResultOverflowStore {
    pub fn new(config: OverflowConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(Entries::default()),
        }
    }

    pub fn config(&self) -> OverflowConfig {
        self.config
    }

    /// Pass small output through; store large output and return its preview.
    pub fn process_tool_result(
        &self,
        tool_call_id: &str,
        content: String,
        session_id: &str,
    ) -> String {
        self.spill(tool_call_id, &content, session_id)
            .unwrap_or(content)
    }

    /// Store `content` if it exceeds the inline threshold, returning the
    /// preview that replaces it. `None` means the content fits inline.
    pub fn spill(&self, tool_call_id: &str, content: &str, session_id: &str) -> Option<String> {
        let max = self.config.max_inline_size;
        if content.len() <= max {
            return None;
        }
        let char_len = content.chars().count();
        if char_len <= max {
            return None;
        }

        let stored = Arc::new(StoredResult {
            tool_call_id: tool_call_id.to_string(),
            session_id: session_id.to_string(),
            full_content: content.to_string(),
            char_len,
            created_at: Utc::now(),
        });

        {
            let mut entries = self.entries.write();
            if let Some(previous) = entries.results.insert(tool_call_id.to_string(), stored) {
                if previous.session_id != session_id {
                    if let Some(ids) = entries.by_session.get_mut(&previous.session_id) {
                        ids.remove(tool_call_id);
                    }
                }
            }
            entries
                .by_session
                .entry(session_id.to_string())
                .or_default()
                .insert(tool_call_id.to_string());
        }

        info!(
            tool_call_id,
            session = session_id,
            total_chars = char_len,
            "Tool output exceeded inline limit, stored for paging"
        );

        let shown = self.config.preview_size.min(char_len);
        Some(format!(
            "[Output truncated: {} characters total, showing first {}. Use read_tool_result with toolCallId \"{}\" to read more.]\n{}",
            char_len,
            shown,
            tool_call_id,
            char_slice(content, 0, shown)
        ))
    }

    /// Characters `[offset, offset + length)` of a stored result, clamped to
    /// its bounds.
    pub fn read_stored(
        &self,
        tool_call_id: &str,
        offset: usize,
        length: usize,
    ) -> Result<String, OverflowError> {
        let stored = self.get(tool_call_id)?;
        let start = offset.min(stored.char_len);
        let end = offset.saturating_add(length).min(stored.char_len);
        Ok(char_slice(&stored.full_content, start, end).to_string())
    }

    pub fn get(&self, tool_call_id: &str) -> Result<Arc<StoredResult>, OverflowError> {
        self.entries
            .read()
            .results
            .get(tool_call_id)
            .cloned()
            .ok_or_else(|| OverflowError::UnknownStoredResult(tool_call_id.to_string()))
    }

    pub fn contains(&self, tool_call_id: &str) -> bool {
        self.entries.read().results.contains_key(tool_call_id)
    }

    pub fn stored_len(&self, tool_call_id: &str) -> Option<usize> {
        self.entries
            .read()
            .results
            .get(tool_call_id)
            .map(|stored| stored.char_len)
    }

    pub fn len(&self) -> usize {
        self.entries.read().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored result of a session. Returns how many were removed.
    pub fn evict_session(&self, session_id: &str) -> usize {
        let mut entries = self.entries.write();
        let Some(ids) = entries.by_session.remove(session_id) else {
            return 0;
        };

        let removed = ids
            .iter()
            .filter(|id| entries.results.remove(id.as_str()).is_some())
            .count();
        debug!(session = session_id, removed, "Evicted stored tool results");
        removed
    }
}

impl Default for ResultOverflowStore {
    fn default() -> Self {
        Self::new(OverflowConfig::default())
    }
}

fn char_slice(s: &str, start: usize, end: usize) -> &str {
    let byte_at = |idx: usize| {
        s.char_indices()
            .nth(idx)
            .map(|(byte, _)| byte)
            .unwrap_or(s.len())
    };
    let start_byte = byte_at(start);
    let end_byte = if end <= start {
        start_byte
    } else {
        start_byte
            + s[start_byte..]
                .char_indices()
                .nth(end - start)
                .map(|(byte, _)| byte)
                .unwrap_or(s.len() - start_byte)
    };
    &s[start_byte..end_byte]
}

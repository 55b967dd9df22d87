//! File-backed replay feed.
//!
//! Loads scripted pages from a JSON file and serves them through the
//! [`TransactionFeed`] interface, one page per fetch. Cursors are the count
//! of pages already consumed, rendered as a decimal string, so re-fetching
//! with an old cursor replays the same page - exactly the retry behavior
//! the sync loop expects from a real upstream.
//!
//! Script shape:
//!
//! ```json
//! {
//!   "feeds": {
//!     "access-token-1": [
//!       { "added": [ { "external_id": "t1", "amount_minor": -25000,
//!                      "currency": "USD", "posted_on": "2026-01-15",
//!                      "description": "ACME payroll" } ],
//!         "removed": [] }
//!     ]
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{Error, Result};
use crate::feed::{FeedError, FeedPage, FeedTransaction, TransactionFeed};

/// One scripted page; cursor fields are derived from position, not stored.
#[derive(Debug, Clone, Default, Deserialize)]
struct ReplayPage {
    #[serde(default)]
    added: Vec<FeedTransaction>,
    #[serde(default)]
    modified: Vec<FeedTransaction>,
    #[serde(default)]
    removed: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReplayScript {
    feeds: HashMap<String, Vec<ReplayPage>>,
}

/// Deterministic [`TransactionFeed`] backed by a JSON script.
#[derive(Debug)]
pub struct ReplayFeed {
    feeds: HashMap<String, Vec<ReplayPage>>,
}

impl ReplayFeed {
    /// Loads a replay script from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
            message: format!("Failed to read feed file: {e}"),
        })?;
        Self::from_json(&contents)
    }

    /// Parses a replay script from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let script: ReplayScript = serde_json::from_str(json).map_err(|e| Error::Config {
            message: format!("Failed to parse feed script: {e}"),
        })?;
        Ok(Self {
            feeds: script.feeds,
        })
    }
}

impl TransactionFeed for ReplayFeed {
    async fn fetch_page(
        &self,
        access_token: &str,
        cursor: Option<&str>,
    ) -> std::result::Result<FeedPage, FeedError> {
        let pages = self
            .feeds
            .get(access_token)
            .ok_or_else(|| FeedError("access token not present in replay script".to_string()))?;

        let consumed: usize = match cursor {
            None => 0,
            Some(c) => c
                .parse()
                .map_err(|_| FeedError(format!("malformed replay cursor '{c}'")))?,
        };

        // Past the end of the script the feed is simply quiet: an empty
        // page that leaves the cursor where it was.
        if consumed >= pages.len() {
            return Ok(FeedPage {
                added: Vec::new(),
                modified: Vec::new(),
                removed: Vec::new(),
                next_cursor: consumed.to_string(),
                has_more: false,
            });
        }

        let page = &pages[consumed];
        Ok(FeedPage {
            added: page.added.clone(),
            modified: page.modified.clone(),
            removed: page.removed.clone(),
            next_cursor: (consumed + 1).to_string(),
            has_more: consumed + 1 < pages.len(),
        })
    }
}

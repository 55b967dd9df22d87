//! Upstream transaction feed boundary.
//!
//! The sync loop consumes any paginated delta feed through the
//! [`TransactionFeed`] trait: hand it an access token and the last cursor,
//! get back three disjoint change lists plus the next cursor. The actual
//! wire protocol of the upstream provider is out of scope; the crate ships
//! [`replay::ReplayFeed`], a deterministic file-backed implementation used
//! by the binary and by tests.
//!
//! Amounts in feed data use the upstream sign convention (credits are
//! negative). The sign is flipped exactly once, when the sync loop hands
//! the data to the ledger.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod replay;

/// Error reported by a feed implementation.
///
/// Feeds don't know which connection they are serving, so this carries only
/// a message; the sync loop attributes it to the connection it was syncing.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct FeedError(pub String);

/// One transaction as reported by the upstream feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedTransaction {
    /// Stable upstream identifier, unique across the feed's history
    pub external_id: String,
    /// Signed amount in currency minor units, upstream convention
    /// (negative = credit/inflow)
    pub amount_minor: i64,
    /// ISO 4217 currency code
    pub currency: String,
    /// Date the transaction occurred
    pub posted_on: NaiveDate,
    /// Human-readable description
    pub description: String,
}

/// One page of changes from the upstream feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    /// Transactions observed for the first time
    pub added: Vec<FeedTransaction>,
    /// Transactions whose details changed upstream
    pub modified: Vec<FeedTransaction>,
    /// External ids of transactions removed upstream
    pub removed: Vec<String>,
    /// Cursor to persist once this page is durably written
    pub next_cursor: String,
    /// Whether another page is available behind `next_cursor`
    pub has_more: bool,
}

/// A paginated delta feed of transaction changes.
///
/// Implementations must return the same page again when called with the
/// same cursor; the sync loop relies on that for crash-safe retries.
// Callers are generic over the feed type, so the auto-trait leakage the
// `async_fn_in_trait` lint warns about does not bite here.
#[allow(async_fn_in_trait)]
pub trait TransactionFeed {
    /// Fetches the page of changes following `cursor` (None = start of
    /// history) for the account behind `access_token`.
    async fn fetch_page(
        &self,
        access_token: &str,
        cursor: Option<&str>,
    ) -> std::result::Result<FeedPage, FeedError>;
}

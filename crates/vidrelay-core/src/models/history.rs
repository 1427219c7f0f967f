use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A completed transfer.
///
/// `ts` is the completion instant in Unix epoch milliseconds and doubles as the
/// entry's key in the history ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct HistoryEntry {
    pub filename: String,
    pub url: String,
    pub ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteHistoryResponse {
    pub success: bool,
}

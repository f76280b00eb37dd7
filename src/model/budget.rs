use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A hierarchical accounting bucket for token spend.
///
/// Invariant: `used_budget + remaining_budget == total_budget` at every
/// observable instant. `version` guards concurrent updates; the store rejects
/// a write whose expected version no longer matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetPool {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_pool_id: Option<String>,
    pub total_budget: i64,
    pub used_budget: i64,
    pub remaining_budget: i64,
    pub status: PoolStatus,
    #[serde(default)]
    pub version: u64,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Active,
    Exhausted,
    Suspended,
}

impl BudgetPool {
    /// True when the accounting invariant holds.
    pub fn is_balanced(&self) -> bool {
        self.used_budget + self.remaining_budget == self.total_budget
    }
}

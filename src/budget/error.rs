use thiserror::Error;

use crate::store::StoreError;

/// Errors raised by the budget pool manager.
#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("budget pool not found: {0}")]
    PoolNotFound(String),
    #[error("budget pool '{0}' is not active")]
    PoolInactive(String),
    #[error("budget exhausted in pool '{pool_id}': requested {requested}, remaining {remaining}")]
    BudgetExhausted {
        pool_id: String,
        requested: i64,
        remaining: i64,
    },
    #[error("invalid budget amount: {0}")]
    InvalidAmount(i64),
    #[error("budget pool parent chain would form a cycle at '{0}'")]
    CyclicParent(String),
    #[error("persistent update contention on pool '{0}'")]
    Contention(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

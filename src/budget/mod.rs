//! Hierarchical budget pool accounting.
//!
//! Pools form a parent tree; consuming from a pool propagates the same
//! amount to every ancestor. Writes go through a short per-manager serial
//! section and a version-guarded compare-and-update in the store, so
//! concurrent consumers cannot double-spend.

mod error;

pub use error::BudgetError;

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::core::RuntimeContext;
use crate::model::{BudgetPool, PoolStatus};
use crate::store::{StoreError, WorkflowStore};

/// Bound on version-conflict retries against external writers.
const MAX_UPDATE_ATTEMPTS: usize = 8;

/// Bound on parent-chain length; longer chains are treated as cyclic.
const MAX_CHAIN_DEPTH: usize = 64;

/// Parameters for [`BudgetManager::create`].
#[derive(Debug, Clone, Default)]
pub struct CreatePool {
    /// Generated when absent.
    pub id: Option<String>,
    pub total_budget: i64,
    pub parent_pool_id: Option<String>,
    pub metadata: Option<Value>,
}

pub struct BudgetManager {
    store: Arc<dyn WorkflowStore>,
    context: RuntimeContext,
    write_lock: Mutex<()>,
}

impl BudgetManager {
    pub fn new(store: Arc<dyn WorkflowStore>, context: RuntimeContext) -> Self {
        Self {
            store,
            context,
            write_lock: Mutex::new(()),
        }
    }

    /// Create a pool, rejecting parent chains that do not resolve or would
    /// form a cycle.
    pub async fn create(&self, params: CreatePool) -> Result<BudgetPool, BudgetError> {
        if params.total_budget < 0 {
            return Err(BudgetError::InvalidAmount(params.total_budget));
        }
        let id = params
            .id
            .unwrap_or_else(|| self.context.id_generator.next_id());

        if let Some(parent_id) = &params.parent_pool_id {
            self.check_ancestry(parent_id, &id).await?;
        }

        let total = params.total_budget;
        let pool = BudgetPool {
            id,
            parent_pool_id: params.parent_pool_id,
            total_budget: total,
            used_budget: 0,
            remaining_budget: total,
            status: if total > 0 {
                PoolStatus::Active
            } else {
                PoolStatus::Exhausted
            },
            version: 0,
            created_at: self.context.time_provider.now_ms(),
            metadata: params.metadata,
        };
        self.store.create_budget_pool(pool.clone()).await?;
        Ok(pool)
    }

    pub async fn get(&self, pool_id: &str) -> Result<BudgetPool, BudgetError> {
        self.load(pool_id).await
    }

    /// Whether the pool is active and can cover `amount`.
    pub async fn check(&self, pool_id: &str, amount: i64) -> Result<bool, BudgetError> {
        if amount < 0 {
            return Err(BudgetError::InvalidAmount(amount));
        }
        let pool = self.load(pool_id).await?;
        Ok(pool.status == PoolStatus::Active && pool.remaining_budget >= amount)
    }

    /// Consume `amount` from the pool and every ancestor.
    ///
    /// The whole chain is validated before any pool is written, so a consume
    /// that fails leaves every pool untouched. `consume(pool, 0)` is a no-op
    /// on totals.
    pub async fn consume(&self, pool_id: &str, amount: i64) -> Result<(), BudgetError> {
        if amount < 0 {
            return Err(BudgetError::InvalidAmount(amount));
        }
        let _guard = self.write_lock.lock().await;
        if amount == 0 {
            self.load(pool_id).await?;
            return Ok(());
        }

        let chain = self.load_chain(pool_id).await?;
        for pool in &chain {
            if pool.status != PoolStatus::Active {
                return Err(BudgetError::PoolInactive(pool.id.clone()));
            }
            if pool.remaining_budget < amount {
                return Err(BudgetError::BudgetExhausted {
                    pool_id: pool.id.clone(),
                    requested: amount,
                    remaining: pool.remaining_budget,
                });
            }
        }

        for pool in chain {
            self.apply_consume(&pool.id, amount).await?;
        }
        Ok(())
    }

    /// Grow the pool's total (a top-up). Clears `Exhausted` when the new
    /// remaining budget is positive; a suspended pool stays suspended.
    pub async fn increase(&self, pool_id: &str, amount: i64) -> Result<BudgetPool, BudgetError> {
        if amount < 0 {
            return Err(BudgetError::InvalidAmount(amount));
        }
        let _guard = self.write_lock.lock().await;
        self.update_with_retry(pool_id, |pool| {
            pool.total_budget += amount;
            pool.remaining_budget += amount;
            if pool.status == PoolStatus::Exhausted && pool.remaining_budget > 0 {
                pool.status = PoolStatus::Active;
            }
            Ok(())
        })
        .await
    }

    pub async fn suspend(&self, pool_id: &str) -> Result<BudgetPool, BudgetError> {
        let _guard = self.write_lock.lock().await;
        self.update_with_retry(pool_id, |pool| {
            pool.status = PoolStatus::Suspended;
            Ok(())
        })
        .await
    }

    /// Move a suspended pool back to `Active`, but only with budget left;
    /// a drained pool goes to `Exhausted` instead.
    pub async fn reactivate(&self, pool_id: &str) -> Result<BudgetPool, BudgetError> {
        let _guard = self.write_lock.lock().await;
        self.update_with_retry(pool_id, |pool| {
            if pool.status == PoolStatus::Suspended {
                pool.status = if pool.remaining_budget > 0 {
                    PoolStatus::Active
                } else {
                    PoolStatus::Exhausted
                };
            }
            Ok(())
        })
        .await
    }

    pub async fn children(&self, pool_id: &str) -> Result<Vec<BudgetPool>, BudgetError> {
        self.load(pool_id).await?;
        Ok(self.store.list_child_pools(pool_id).await?)
    }

    async fn load(&self, pool_id: &str) -> Result<BudgetPool, BudgetError> {
        self.store
            .get_budget_pool(pool_id)
            .await?
            .ok_or_else(|| BudgetError::PoolNotFound(pool_id.to_string()))
    }

    /// Load `pool_id` and all its ancestors, child first.
    async fn load_chain(&self, pool_id: &str) -> Result<Vec<BudgetPool>, BudgetError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(pool_id.to_string());
        while let Some(id) = current {
            if !seen.insert(id.clone()) || chain.len() >= MAX_CHAIN_DEPTH {
                return Err(BudgetError::CyclicParent(id));
            }
            let pool = self.load(&id).await?;
            current = pool.parent_pool_id.clone();
            chain.push(pool);
        }
        Ok(chain)
    }

    /// Reject a `parent_id` chain that is missing a link or would contain
    /// `new_id`.
    async fn check_ancestry(&self, parent_id: &str, new_id: &str) -> Result<(), BudgetError> {
        let chain = self.load_chain(parent_id).await?;
        if chain.iter().any(|p| p.id == new_id) {
            return Err(BudgetError::CyclicParent(new_id.to_string()));
        }
        Ok(())
    }

    async fn apply_consume(&self, pool_id: &str, amount: i64) -> Result<(), BudgetError> {
        self.update_with_retry(pool_id, |pool| {
            if pool.status != PoolStatus::Active {
                return Err(BudgetError::PoolInactive(pool.id.clone()));
            }
            if pool.remaining_budget < amount {
                return Err(BudgetError::BudgetExhausted {
                    pool_id: pool.id.clone(),
                    requested: amount,
                    remaining: pool.remaining_budget,
                });
            }
            pool.used_budget += amount;
            pool.remaining_budget -= amount;
            if pool.remaining_budget <= 0 {
                pool.status = PoolStatus::Exhausted;
            }
            Ok(())
        })
        .await
        .map(|_| ())
    }

    /// Load-mutate-update with version-conflict retries against writers
    /// outside this manager.
    async fn update_with_retry(
        &self,
        pool_id: &str,
        mutate: impl Fn(&mut BudgetPool) -> Result<(), BudgetError>,
    ) -> Result<BudgetPool, BudgetError> {
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let mut pool = self.load(pool_id).await?;
            let expected_version = pool.version;
            mutate(&mut pool)?;
            match self
                .store
                .update_budget_pool(pool.clone(), expected_version)
                .await
            {
                Ok(()) => {
                    pool.version = expected_version + 1;
                    return Ok(pool);
                }
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(BudgetError::Contention(pool_id.to_string()))
    }
}

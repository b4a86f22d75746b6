//! Balance ledger service.
//!
//! Every balance change is a locked read-modify-write of the user row plus
//! an appended `transactions` row, executed on one database transaction.

use std::sync::Arc;

use enrollo_common::{AppError, AppResult, IdGenerator};
use enrollo_db::{
    entities::transaction::{self, TransactionType},
    repositories::{TransactionRepository, UserRepository},
};
use sea_orm::{ConnectionTrait, DatabaseConnection, Set, TransactionTrait};

/// Default page size of the transaction history.
pub const DEFAULT_HISTORY_LIMIT: u64 = 15;
const MAX_HISTORY_LIMIT: u64 = 100;

/// Compute the balance after applying an entry.
///
/// Amounts are positive; the entry type gives the direction.
pub fn next_balance(before: i64, amount: i64, kind: TransactionType) -> AppResult<i64> {
    if amount <= 0 {
        return Err(AppError::BadRequest("Amount must be positive".to_string()));
    }

    let after = match kind {
        TransactionType::Topup => before.checked_add(amount),
        TransactionType::Payment => before.checked_sub(amount),
    }
    .ok_or_else(|| AppError::BadRequest("Amount out of range".to_string()))?;

    if after < 0 {
        return Err(AppError::Forbidden("Insufficient balance".to_string()));
    }
    Ok(after)
}

/// Balance ledger service.
#[derive(Clone)]
pub struct LedgerService {
    db: Arc<DatabaseConnection>,
    transaction_repo: TransactionRepository,
    id_gen: IdGenerator,
}

impl LedgerService {
    /// Create a new ledger service.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, transaction_repo: TransactionRepository) -> Self {
        Self {
            db,
            transaction_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Credit a user's balance in its own transaction.
    pub async fn credit(&self, user_id: &str, amount: i64) -> AppResult<transaction::Model> {
        self.apply(user_id, amount, TransactionType::Topup).await
    }

    /// Debit a user's balance in its own transaction.
    pub async fn debit(&self, user_id: &str, amount: i64) -> AppResult<transaction::Model> {
        self.apply(user_id, amount, TransactionType::Payment).await
    }

    /// Credit a user's balance as part of the caller's transaction.
    pub async fn credit_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        amount: i64,
    ) -> AppResult<transaction::Model> {
        self.apply_in(conn, user_id, amount, TransactionType::Topup)
            .await
    }

    /// A user's ledger, newest first.
    pub async fn list_transactions(
        &self,
        user_id: &str,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> AppResult<Vec<transaction::Model>> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        self.transaction_repo
            .find_by_user(user_id, limit, offset.unwrap_or(0))
            .await
    }

    async fn apply(
        &self,
        user_id: &str,
        amount: i64,
        kind: TransactionType,
    ) -> AppResult<transaction::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let entry = self.apply_in(&txn, user_id, amount, kind).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(entry)
    }

    async fn apply_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        amount: i64,
        kind: TransactionType,
    ) -> AppResult<transaction::Model> {
        let user = UserRepository::find_for_update(conn, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User: {user_id}")))?;

        let balance_before = user.balance;
        let balance_after = next_balance(balance_before, amount, kind)?;

        UserRepository::set_balance(conn, user, balance_after).await?;

        let entry = transaction::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            amount: Set(amount),
            balance_before: Set(balance_before),
            balance_after: Set(balance_after),
            transaction_type: Set(kind),
            created_at: Set(chrono::Utc::now().into()),
        };
        let entry = TransactionRepository::create_in(conn, entry).await?;

        tracing::info!(
            user_id = %user_id,
            transaction_id = %entry.id,
            kind = ?kind,
            amount,
            balance_before,
            balance_after,
            "Ledger entry recorded"
        );

        Ok(entry)
    }
}

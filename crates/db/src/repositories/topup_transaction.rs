//! Topup transaction repository.

use std::sync::Arc;

use crate::entities::{TopupTransaction, topup_transaction};
use enrollo_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter,
};

/// Message used whenever a slip payload is redeemed twice.
pub const SLIP_ALREADY_USED: &str = "Slip has already been used";

/// Topup transaction repository.
#[derive(Clone)]
pub struct TopupTransactionRepository {
    db: Arc<DatabaseConnection>,
}

impl TopupTransactionRepository {
    /// Create a new topup transaction repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Whether a payload has been redeemed by any user.
    ///
    /// This is a fast-path check only; the unique index on `payload` is
    /// what guarantees single redemption.
    pub async fn payload_exists(&self, payload: &str) -> AppResult<bool> {
        let count = TopupTransaction::find()
            .filter(topup_transaction::Column::Payload.eq(payload))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Insert a topup record on the given connection.
    pub async fn create_in<C: ConnectionTrait>(
        conn: &C,
        model: topup_transaction::ActiveModel,
    ) -> AppResult<topup_transaction::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::from_db(e, SLIP_ALREADY_USED))
    }
}

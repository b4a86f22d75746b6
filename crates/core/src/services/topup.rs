//! Balance topup from an uploaded bank transfer slip.
//!
//! Decoding and external verification happen before any database
//! transaction is opened, so no row lock is held across the network call.

use std::sync::Arc;

use enrollo_common::{AppError, AppResult, IdGenerator, StoredObject};
use enrollo_db::{
    entities::{topup_transaction, transaction},
    repositories::{TopupTransactionRepository, topup_transaction::SLIP_ALREADY_USED},
};
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::Serialize;

use super::{
    file::{FileService, FileUpload},
    ledger::LedgerService,
    qr::QrDecoder,
    slip::{SlipVerifier, VerifiedSlip},
};

/// Outcome of a successful topup.
#[derive(Debug, Clone, Serialize)]
pub struct TopupReceipt {
    /// Ledger credit.
    pub transaction: transaction::Model,
    /// Slip redemption record.
    pub topup: topup_transaction::Model,
}

/// Whether the account printed on a slip can be the configured account.
///
/// Slips mask most digits (`xxx-x-x1234-x`); only the disclosed digits are
/// compared, in order, against the configured number without separators.
#[must_use]
pub fn validate_account(slip_account: &str, configured: &str) -> bool {
    let visible: String = slip_account
        .chars()
        .filter(|c| !matches!(c, 'x' | 'X' | '-'))
        .collect();
    if visible.is_empty() {
        return false;
    }
    let expected: String = configured.chars().filter(|c| *c != '-').collect();
    expected.contains(&visible)
}

/// Topup service.
#[derive(Clone)]
pub struct TopupService {
    db: Arc<DatabaseConnection>,
    qr_decoder: Arc<dyn QrDecoder>,
    slip_verifier: Arc<dyn SlipVerifier>,
    file_service: FileService,
    ledger: LedgerService,
    topup_repo: TopupTransactionRepository,
    account_number: String,
    id_gen: IdGenerator,
}

impl TopupService {
    /// Create a new topup service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        qr_decoder: Arc<dyn QrDecoder>,
        slip_verifier: Arc<dyn SlipVerifier>,
        file_service: FileService,
        ledger: LedgerService,
        topup_repo: TopupTransactionRepository,
        account_number: String,
    ) -> Self {
        Self {
            db,
            qr_decoder,
            slip_verifier,
            file_service,
            ledger,
            topup_repo,
            account_number,
            id_gen: IdGenerator::new(),
        }
    }

    /// Redeem a slip image and credit the payer.
    pub async fn create_topup_payment(
        &self,
        user_id: &str,
        slip: FileUpload,
    ) -> AppResult<TopupReceipt> {
        let payload = self.qr_decoder.decode(&slip.data).await?;
        let verified = self.slip_verifier.verify(&payload).await?;

        if self.topup_repo.payload_exists(&payload).await? {
            return Err(AppError::Conflict(SLIP_ALREADY_USED.to_string()));
        }

        if !validate_account(&verified.receiver_account, &self.account_number) {
            return Err(AppError::Forbidden(
                "Receiving account does not match".to_string(),
            ));
        }

        let stored = self.file_service.store_object(&slip).await?;

        match self
            .record(user_id, &payload, &verified, &slip, &stored)
            .await
        {
            Ok(receipt) => {
                tracing::info!(
                    user_id = %user_id,
                    transaction_id = %receipt.transaction.id,
                    transaction_ref = %verified.transaction_ref,
                    amount = verified.amount,
                    balance_after = receipt.transaction.balance_after,
                    "Topup credited"
                );
                Ok(receipt)
            }
            Err(e) => {
                self.file_service.discard_object(&stored).await;
                Err(e)
            }
        }
    }

    async fn record(
        &self,
        user_id: &str,
        payload: &str,
        verified: &VerifiedSlip,
        slip: &FileUpload,
        stored: &StoredObject,
    ) -> AppResult<TopupReceipt> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let file = self.file_service.record_in(&txn, slip, stored).await?;
        let transaction = self.ledger.credit_in(&txn, user_id, verified.amount).await?;

        let topup = topup_transaction::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            transaction_id: Set(transaction.id.clone()),
            file_id: Set(file.id),
            payload: Set(payload.to_string()),
            transaction_ref: Set(verified.transaction_ref.clone()),
            amount: Set(verified.amount),
            created_at: Set(chrono::Utc::now().into()),
        };
        let topup = TopupTransactionRepository::create_in(&txn, topup).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(TopupReceipt { transaction, topup })
    }
}

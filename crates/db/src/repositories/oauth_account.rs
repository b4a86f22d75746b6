//! OAuth account repository.

use std::sync::Arc;

use crate::entities::{OAuthAccount, oauth_account};
use enrollo_common::{AppError, AppResult};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Repository for external identities linked to users.
#[derive(Clone)]
pub struct OAuthAccountRepository {
    db: Arc<DatabaseConnection>,
}

impl OAuthAccountRepository {
    /// Create a new OAuth account repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the link for a provider account.
    pub async fn find_by_provider_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> AppResult<Option<oauth_account::Model>> {
        OAuthAccount::find()
            .filter(oauth_account::Column::Provider.eq(provider))
            .filter(oauth_account::Column::ProviderAccountId.eq(provider_account_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Link a provider account to a user.
    pub async fn create(
        &self,
        model: oauth_account::ActiveModel,
    ) -> AppResult<oauth_account::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::from_db(e, "Provider account is already linked"))
    }
}

//! E-mail template repository.

use std::sync::Arc;

use crate::entities::{EmailTemplate, email_template};
use chrono::Utc;
use enrollo_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::OnConflict,
};

/// E-mail template repository.
#[derive(Clone)]
pub struct EmailTemplateRepository {
    db: Arc<DatabaseConnection>,
}

impl EmailTemplateRepository {
    /// Create a new e-mail template repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the template of an activity.
    pub async fn find_by_activity(
        &self,
        activity_id: &str,
    ) -> AppResult<Option<email_template::Model>> {
        EmailTemplate::find()
            .filter(email_template::Column::ActivityId.eq(activity_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert or replace the template of an activity.
    pub async fn upsert(
        &self,
        id: String,
        activity_id: &str,
        subject: &str,
        body: &str,
    ) -> AppResult<email_template::Model> {
        let now = Utc::now();
        let model = email_template::ActiveModel {
            id: Set(id),
            activity_id: Set(activity_id.to_string()),
            subject: Set(subject.to_string()),
            body: Set(body.to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        EmailTemplate::insert(model)
            .on_conflict(
                OnConflict::column(email_template::Column::ActivityId)
                    .update_columns([
                        email_template::Column::Subject,
                        email_template::Column::Body,
                        email_template::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_with_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

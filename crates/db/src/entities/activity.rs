//! Activity entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// User who created the activity
    pub owner_id: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    pub thumbnail_file_id: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    #[sea_orm(column_type = "Text")]
    pub description_short: String,

    /// Set exactly once by an administrator
    #[sea_orm(default_value = false)]
    pub approved: bool,

    pub registration_open_at: DateTimeWithTimeZone,

    pub registration_close_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,

    #[sea_orm(
        belongs_to = "super::file::Entity",
        from = "Column::ThumbnailFileId",
        to = "super::file::Column::Id"
    )]
    Thumbnail,

    #[sea_orm(has_many = "super::activity_schedule::Entity")]
    Schedules,

    #[sea_orm(has_many = "super::activity_file::Entity")]
    Files,

    #[sea_orm(has_one = "super::email_template::Entity")]
    EmailTemplate,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::activity_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedules.def()
    }
}

impl Related<super::activity_file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Files.def()
    }
}

impl Related<super::email_template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailTemplate.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

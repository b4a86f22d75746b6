//! Student information entity.
//!
//! A user may keep several student profiles (e.g. a parent registering
//! siblings). Registrations reference a profile, not the paying account.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "student_information")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning account
    pub user_id: String,

    /// Name prefix (e.g. "Mr.", "Ms.")
    pub prefix: String,

    pub full_name: String,

    /// Education level, 1 to 6
    pub education_level: i32,

    pub school: String,

    #[sea_orm(nullable)]
    pub food_allergies: Option<String>,

    pub parent_name: String,

    pub parent_email: String,

    #[sea_orm(nullable)]
    pub secondary_email: Option<String>,

    #[sea_orm(nullable)]
    pub phone_number: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,

    #[sea_orm(has_many = "super::registration::Entity")]
    Registrations,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::registration::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Registrations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Registration entity: a student's claim on a seat in a schedule.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment review state of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl PaymentStatus {
    /// Whether a registration in this state occupies a seat.
    #[must_use]
    pub const fn holds_seat(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "registrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub schedule_id: String,

    pub student_information_id: String,

    pub payment_status: PaymentStatus,

    /// Uploaded proof of payment, if any
    #[sea_orm(nullable)]
    pub payment_file_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::activity_schedule::Entity",
        from = "Column::ScheduleId",
        to = "super::activity_schedule::Column::Id",
        on_delete = "Cascade"
    )]
    Schedule,

    #[sea_orm(
        belongs_to = "super::student_information::Entity",
        from = "Column::StudentInformationId",
        to = "super::student_information::Column::Id"
    )]
    StudentInformation,

    #[sea_orm(
        belongs_to = "super::file::Entity",
        from = "Column::PaymentFileId",
        to = "super::file::Column::Id"
    )]
    PaymentFile,
}

impl Related<super::activity_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedule.def()
    }
}

impl Related<super::student_information::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StudentInformation.def()
    }
}

impl Related<super::file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentFile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

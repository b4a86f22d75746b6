//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_user_table;
mod m20250101_000002_create_identity_tables;
mod m20250101_000003_create_student_information_table;
mod m20250101_000004_create_file_table;
mod m20250101_000005_create_activity_tables;
mod m20250101_000006_create_registration_table;
mod m20250101_000007_create_ledger_tables;
mod m20250101_000008_create_email_template_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_user_table::Migration),
            Box::new(m20250101_000002_create_identity_tables::Migration),
            Box::new(m20250101_000003_create_student_information_table::Migration),
            Box::new(m20250101_000004_create_file_table::Migration),
            Box::new(m20250101_000005_create_activity_tables::Migration),
            Box::new(m20250101_000006_create_registration_table::Migration),
            Box::new(m20250101_000007_create_ledger_tables::Migration),
            Box::new(m20250101_000008_create_email_template_table::Migration),
        ]
    }
}

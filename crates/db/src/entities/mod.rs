//! Database entities.

#![allow(missing_docs)]

pub mod activity;
pub mod activity_file;
pub mod activity_schedule;
pub mod email_template;
pub mod file;
pub mod oauth_account;
pub mod registration;
pub mod session;
pub mod student_information;
pub mod topup_transaction;
pub mod transaction;
pub mod user;

pub use activity::Entity as Activity;
pub use activity_file::Entity as ActivityFile;
pub use activity_schedule::Entity as ActivitySchedule;
pub use email_template::Entity as EmailTemplate;
pub use file::Entity as File;
pub use oauth_account::Entity as OAuthAccount;
pub use registration::Entity as Registration;
pub use session::Entity as Session;
pub use student_information::Entity as StudentInformation;
pub use topup_transaction::Entity as TopupTransaction;
pub use transaction::Entity as Transaction;
pub use user::Entity as User;

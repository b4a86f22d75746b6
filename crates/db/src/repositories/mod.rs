//! Repositories wrapping entity queries.

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

pub use activity::ActivityRepository;
pub use activity_file::ActivityFileRepository;
pub use activity_schedule::ActivityScheduleRepository;
pub use email_template::EmailTemplateRepository;
pub use file::FileRepository;
pub use oauth_account::OAuthAccountRepository;
pub use registration::RegistrationRepository;
pub use session::SessionRepository;
pub use student_information::StudentInformationRepository;
pub use topup_transaction::TopupTransactionRepository;
pub use transaction::TransactionRepository;
pub use user::UserRepository;

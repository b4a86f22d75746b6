//! Business logic services.

#![allow(missing_docs)]

pub mod activity;
pub mod approval;
pub mod auth;
pub mod eligibility;
pub mod email;
pub mod file;
pub mod ledger;
pub mod qr;
pub mod registrant_email;
pub mod registration;
pub mod slip;
pub mod student_information;
pub mod topup;
pub mod upstream;

pub use activity::{
    ActivityDetail, ActivityService, ActivitySummary, AttachmentDetail, CreateActivityInput,
    NewAttachment, NewSchedule, PriceRange, ScheduleDetail,
};
pub use approval::{ApprovalService, PendingRegistration, RegistrantAccount};
pub use auth::{AuthService, ExternalIdentity, GoogleIdentityProvider, IdentityProvider};
pub use eligibility::{EligibilityChecker, JoinRequest};
pub use email::{EmailSender, OutgoingEmail, ResendSender, SmtpSender, sender_from_config};
pub use file::{FileService, FileUpload};
pub use ledger::LedgerService;
pub use qr::{QrDecoder, RqrrDecoder};
pub use registrant_email::{EmailTemplateInput, RegistrantEmailService};
pub use registration::RegistrationService;
pub use slip::{EasySlipVerifier, SlipVerifier, VerifiedSlip};
pub use student_information::{
    CreateStudentInformationInput, StudentInformationService, UpdateStudentInformationInput,
};
pub use topup::{TopupReceipt, TopupService};

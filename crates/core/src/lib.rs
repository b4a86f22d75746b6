//! Core business logic for enrollo.
//!
//! The registration and ledger workflow lives here: eligibility checks,
//! balance mutations, joins, slip topups and admin approval, together with
//! the collaborators they depend on (object storage, QR decoding, slip
//! verification, identity provider, e-mail).

pub mod services;

pub use services::*;

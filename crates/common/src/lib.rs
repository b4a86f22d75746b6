//! Common utilities and shared types for enrollo.
//!
//! This crate provides foundational components used across all enrollo crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: UUIDv7-based identifiers via [`IdGenerator`]
//! - **Storage**: Object storage backends with signed URLs
//!
//! # Example
//!
//! ```no_run
//! use enrollo_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {} for {}", id, config.server.url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use storage::{LocalStorage, ObjectStorage, StoredObject, file_extension, generate_storage_key};

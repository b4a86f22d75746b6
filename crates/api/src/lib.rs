//! HTTP API layer for enrollo.
//!
//! - **Endpoints**: auth, student profiles, activities and joins, wallet,
//!   admin review, signed file downloads
//! - **Extractors**: session user and admin guards
//! - **Middleware**: cookie session resolution
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::{files_router, router};
pub use middleware::{AppState, WebSettings, auth_middleware};

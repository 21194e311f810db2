// crates/backend-lib/src/middleware/mod.rs

//! Middleware for the Pinboard HTTP backend.

pub mod auth;
pub mod csrf;
pub mod json;
pub mod panic;
pub mod track;

pub use auth::{principal_from, require_anonymous, require_auth, CurrentUser};
pub use csrf::csrf_gate;
pub use json::json_content_type;
pub use panic::panic_guard;
pub use track::track_requests;

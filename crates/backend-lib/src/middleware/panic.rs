// crates/backend-lib/src/middleware/panic.rs

//! Last-resort boundary turning handler panics into 500 responses.
use std::{any::Any, backtrace::Backtrace};

use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

use crate::error::AppError;

pub type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response;

/// Layer catching panics from everything it wraps
pub fn panic_guard() -> CatchPanicLayer<PanicHandler> {
    CatchPanicLayer::custom(handle_panic as PanicHandler)
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    let backtrace = Backtrace::force_capture();
    error!(panic = %message, %backtrace, "handler panicked");

    // the payload stays in the log
    AppError::Internal("request handler panicked".to_string()).into_response()
}

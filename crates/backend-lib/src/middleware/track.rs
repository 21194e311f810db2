// crates/backend-lib/src/middleware/track.rs

//! Request metrics and the structured error log.
use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use metrics::{counter, histogram};
use pinboard_common::Principal;
use tracing::{error, info};

use crate::error::ErrorReport;
use crate::metrics::{HTTP_REQUESTS, HTTP_REQUEST_DURATION};

pub async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let status = response.status();
    let labels = [
        ("method", method.to_string()),
        ("status", status.as_u16().to_string()),
    ];
    counter!(HTTP_REQUESTS, &labels).increment(1);
    histogram!(HTTP_REQUEST_DURATION, &labels).record(start.elapsed().as_secs_f64());

    if let Some(report) = response.extensions().get::<ErrorReport>() {
        let principal_id = response.extensions().get::<Principal>().map(|p| p.id);
        if report.status.is_server_error() {
            error!(
                %method,
                %uri,
                ?principal_id,
                code = report.code,
                error = %report.message,
                "request failed"
            );
        } else {
            info!(
                %method,
                %uri,
                status = status.as_u16(),
                code = report.code,
                "request rejected"
            );
        }
    }
    response
}

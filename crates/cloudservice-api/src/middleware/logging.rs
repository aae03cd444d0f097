//! One log line per request.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Successful preview lookups log at debug, server errors at warn, and
/// everything else at info.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    macro_rules! log_request {
        ($level:ident, $msg:literal) => {
            tracing::$level!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                elapsed_ms,
                $msg
            )
        };
    }

    if status.is_server_error() {
        log_request!(warn, "Request failed");
    } else if status.is_success() && path.starts_with("/api/preview") {
        log_request!(debug, "Preview served");
    } else {
        log_request!(info, "Request handled");
    }

    response
}

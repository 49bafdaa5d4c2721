//! Request accounting for every route.

use crate::api::ApiState;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Endpoint label for requests that matched no route. Raw paths would give
/// every distinct 404 URL its own series.
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Counts the request and records its latency under the matched route
/// template (e.g. `/servers/{id}`), or `UNMATCHED_ENDPOINT`.
pub async fn track_requests(State(state): State<ApiState>, request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED_ENDPOINT, |path| path.as_str())
        .to_string();
    let method = request.method().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    state.metrics.record_request(&endpoint, &method, start.elapsed());
    response
}

use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::telemetry::request_span::{accept_trace, new_request_span, record_trace_id};

/// Wraps every route of the router in a request span joined to the caller's trace.
pub fn add_middleware<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http().make_span_with(new_request_span))
            .map_request(accept_trace)
            .map_request(record_trace_id),
    )
}

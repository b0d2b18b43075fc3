pub mod request_span;
pub mod tracer;

//! Process setup shared by the service binaries: log/trace initialisation
//! and the HTTP request-span middleware.
pub mod router;
pub mod telemetry;

pub use router::add_middleware;
pub use telemetry::tracer::init_tracer;

//! HTTP API handlers for viva-rp
//!
//! The event ingestion gateway: webhook receiver, registration endpoint,
//! poll/correction endpoints, SSE stream and health check.

pub mod events;
pub mod health;
pub mod register;
pub mod responses;
pub mod webhook;

pub use events::event_stream;
pub use health::health_routes;
pub use register::register_routes;
pub use responses::response_routes;
pub use webhook::webhook_routes;

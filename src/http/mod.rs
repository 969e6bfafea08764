//! HTTP surface: router, health probe and WebSocket upgrade

pub mod routes;

pub use routes::build_router;

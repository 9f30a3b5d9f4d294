//! HTTP surface: routing and health reporting

pub mod routes;

pub use routes::build_router;

//! HTTP surface: router, health and room endpoints

pub mod routes;

pub use routes::{build_router, AppError};

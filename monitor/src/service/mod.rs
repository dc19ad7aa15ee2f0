//! HTTP face of the record store: alerts, emergency contacts and settings.

pub mod payload;
pub mod routes;

pub use routes::{routes, serve};

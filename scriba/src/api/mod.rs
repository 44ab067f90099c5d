//! HTTP API: control surface and the progress event stream.

pub mod error;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod server;

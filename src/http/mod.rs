//! HTTP server module exposing the quota service.

mod routes;
mod server;

pub use routes::router;
pub use server::HttpServer;

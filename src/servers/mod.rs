//! Long-running transports implementing the server lifecycle contract.

pub mod http;
pub mod passthrough;

pub use http::HttpServer;
pub use passthrough::PassthroughServer;

//! Network listener and request dispatcher.

mod http;

pub use http::Server;

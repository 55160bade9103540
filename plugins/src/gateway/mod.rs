mod classify;
mod http;

pub use http::HttpScanGateway;

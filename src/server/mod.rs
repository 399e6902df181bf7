pub mod http_server;

pub use http_server::{router, AppState, DEFAULT_PORT};

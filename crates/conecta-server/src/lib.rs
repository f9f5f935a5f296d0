pub mod auth;
pub mod client;
pub mod diagnostics;
pub mod handlers;
pub mod ingest;
pub mod rpc;
pub mod server;

pub use handlers::HandlerState;
pub use server::{start, ServerConfig, ServerHandle};

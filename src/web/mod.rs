pub mod api;
pub mod client;
pub mod server;

pub use api::{AppState, SessionDetail};
pub use client::{ClientError, SessionClient};
pub use server::{build_router, run_server};

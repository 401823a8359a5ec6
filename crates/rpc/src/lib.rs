//! HTTP surface: login/registration pages, the prediction form, the chat
//! endpoint, and health/metrics.

pub mod pages;
pub mod server;

pub use server::{build_router, start_server, AppState, SharedState};

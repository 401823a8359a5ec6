//! Gateway to a hosted chat-completion service.
//!
//! One user message in, one reply (or explanatory fallback string) out.
//! No conversation memory, no streaming, no retries. Without a configured
//! credential the gateway answers with a fixed offline notice and never
//! touches the network.

pub mod gateway;
pub mod selection;

pub use gateway::{AssistantConfig, Gateway, OFFLINE_NOTICE};
pub use selection::{select_model, ModelEntry};

pub mod chat;
pub mod client;
pub mod sse;

pub use chat::ChatSession;
pub use client::{GenAiClient, GenerateContentResponse};

//! The objects passed around by the agent.
//!
//! There are two related vocabularies here:
//! - chat history messages, rendered by whatever frontend is attached
//! - wire messages, sent between the session and the LLM provider
//!
//! They overlap but are not the same shape: history entries carry stable ids
//! and a pending/resolved state for tool invocations, while wire messages
//! follow the request/response pairing the providers expect. The session
//! boundary converts between the two.
pub mod chat;
pub mod content;
pub mod message;
pub mod role;
pub mod tool;

//! Atelier is an agentic chat library: it drives a hosted LLM through a
//! tool-use loop, executing the model's requested tool calls against local
//! collaborators and feeding the results back until the model produces a
//! final reply.
//!
//! The [`agent::Agent`] owns the loop and the user-visible chat history; the
//! [`session`] module manages the provider binding and its wire transcript;
//! [`providers`] speaks the Gemini and OpenAI chat APIs; [`tools`] holds the
//! registry of executors the model can call.

pub mod agent;
pub mod errors;
pub mod models;
pub mod prompt;
pub mod providers;
pub mod session;
pub mod tools;

//! Moodchat is a terminal chat client that streams Gemini replies.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation model, the turn orchestrator that drives
//!   one exchange across tool calls, the reducer that applies streamed
//!   output to sessions, and failure classification.
//! - [`commands`] parses the slash commands typed at the chat prompt.
//! - [`auth`] stores and re-selects the API key.
//! - [`api`] defines the Gemini request and response payloads.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod auth;
pub mod cli;
pub mod commands;
pub mod core;
pub mod utils;

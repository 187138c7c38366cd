pub mod app;
pub mod chat_stream;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod keyring;
pub mod message;
pub mod orchestrator;
pub mod reducer;
pub mod session;
pub mod stream_errors;
pub mod tools;

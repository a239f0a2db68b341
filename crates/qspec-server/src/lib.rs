//! qspec server - HTTP front end for the query spec validation gate
//!
//! Wraps `qspec-validate` in an axum service, together with the pieces that
//! surround validation in the generation pipeline: the generator prompt
//! template, column extraction from stored prompts and the completion record
//! file.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod prompt;
pub mod records;
pub mod routes;

pub use config::Config;
pub use routes::{router, serve, AppState};

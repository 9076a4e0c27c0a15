//! # HTTP API
//!
//! JSON endpoints over the research pipeline, the idea assistant and the
//! auto-runner. Every response carries `ok`; failures add an `error` message
//! and a mapped status code.

mod error;
mod server;

pub use error::ApiError;
pub use server::{AppState, router, serve};

//! Core logic including agent loop, tool dispatch, configurations, etc.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod error;
mod model_client;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, DEFAULT_MAX_TURNS, RunOptions, RunStream,
};
pub use error::AgentError;

/// Re-exports of [`converse_model`] crate.
pub mod model {
    pub use converse_model::*;
}

// Core types and runtime for Relay visual automation flows

pub mod types;
pub mod config;
pub mod condition;
pub mod dag;
pub mod validator;
pub mod executors;
pub mod events;
pub mod store;
pub mod engine;
pub mod error;

pub use engine::Engine;
pub use error::EngineError;
pub use types::*;

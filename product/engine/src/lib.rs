pub mod archive;
pub mod classify;
pub mod config;
pub mod download;
mod error;
pub mod extract;
pub mod fetch;
pub mod logging;
pub mod normalize;
pub mod paths;
pub mod pipeline;
pub mod rank;
pub mod service;
pub mod session;

pub use error::{EngineError, Result};

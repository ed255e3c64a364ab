pub mod config;
pub mod logging;

pub mod auth;
pub mod cache;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod http;
pub mod materials;
pub mod model;
pub mod orchestrator;
pub mod page_model;
pub mod paths;
pub mod resolver;
pub mod retry;
pub mod sink;

pub use engine::Engine;
pub use error::EngineError;

pub mod config;
pub mod logging;

// Pipeline components, leaves first.
pub mod clock;
pub mod control;
pub mod registry;
pub mod checkpoint;
pub mod evasion;
pub mod gateway;
pub mod retry;
pub mod sink;
pub mod fetch;
pub mod session;
pub mod scheduler;
pub mod summary;

pub mod api;
pub mod pipeline;
pub mod subject;

pub use pipeline::{Pipeline, PipelineBuilder};

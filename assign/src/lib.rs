pub mod version;
pub mod logging;
pub mod error;

pub mod kernel;
pub mod atoms;
pub mod partition;
pub mod comm;
pub mod config;
pub mod assigner;
pub mod merge;
pub mod pipeline;
pub mod cli;

pub use cli::OptProcess;

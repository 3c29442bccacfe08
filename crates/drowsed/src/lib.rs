//! Drowse daemon library - exposes modules for testing.

pub mod client;
pub mod daemon;
pub mod host;
pub mod process_tree;
pub mod report_builder;
pub mod reporter;
pub mod response;
pub mod sampler;
pub mod server;
pub mod signal;

//! Drowse common library - shared types for the drowse daemon.
//!
//! Holds the segment accumulator, the collector wire types, configuration
//! and the error classification used by every telemetry component.

pub mod config;
pub mod error;
pub mod report;
pub mod segment;

pub use config::*;
pub use error::*;
pub use report::*;
pub use segment::*;

/// Software name used in identifying headers and logs
pub const SOFTWARE_NAME: &str = "drowse";

/// Software version reported to the collector
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

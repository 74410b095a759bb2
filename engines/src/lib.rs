//! Benchmark tool engines
//!
//! This crate provides implementations of the `Engine` trait for:
//!
//! - ApacheBench (`ab`)
//! - Siege (`siege`)
//!
//! Each engine knows how to invoke its tool on a worker and how to read the
//! summary it prints back into a `MetricRecord`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ab;
pub mod measure;
pub mod registry;
pub mod siege;

pub use ab::AbEngine;
pub use registry::EngineRegistry;
pub use siege::SiegeEngine;

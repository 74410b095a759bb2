//! bees-core: Core data model for distributed load testing
//!
//! This crate provides the foundational types used across all bees components,
//! including:
//!
//! - The metric record and its fleet aggregation
//! - Core traits (Engine, RemoteShell, BlobStore, Hive)
//! - Attack configuration and the per-worker split
//! - The roster of active workers and its on-disk store
//! - Content-addressed artifact staging
//! - Attack fan-out with per-worker failure isolation
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod outcome;
pub mod roster;
pub mod traits;

pub use artifact::*;
pub use config::*;
pub use error::*;
pub use metrics::*;
pub use orchestrator::{
    aggregate, AggregationError, Dispatcher, DispatcherBuilder, FleetResult, TaskGroup,
};
pub use outcome::*;
pub use roster::*;
pub use traits::*;

//! Blob stores for staging shared attack inputs
//!
//! This crate provides implementations of the `BlobStore` trait for:
//!
//! - Local filesystem
//! - Process memory
//!
//! The S3 store lives in `bees-remote` next to the other `aws` CLI wrappers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod local;
pub mod memory;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

//! Remote collaborators for bees
//!
//! This crate provides implementations of the core collaborator traits that
//! shell out to existing tools:
//!
//! - `RemoteShell` over the system `ssh` client
//! - `Hive` over `aws ec2`
//! - `BlobStore` over `aws s3`
//!
//! plus key-file resolution for the fleet credentials.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aws;
pub mod ec2;
pub mod keys;
pub mod s3;
pub mod ssh;

pub use aws::{AwsCli, AwsError};
pub use ec2::{region_of, Ec2Hive};
pub use s3::S3BlobStore;
pub use ssh::{SshSession, SshShell};

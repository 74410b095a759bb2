//! Attack fan-out and result aggregation
//!
//! The Dispatcher coordinates one attack:
//! - Fanning the benchmark command out to every bee via a [`TaskGroup`]
//! - Capturing each bee's failure as an [`Outcome`](crate::Outcome)
//! - Cancelling stragglers via timeout or broadcast shutdown
//!
//! The aggregator then reduces the successful outcomes to a [`FleetResult`].
//!
//! # Example
//!
//! ```ignore
//! use bees_core::{DispatcherBuilder, FleetResult};
//!
//! let dispatcher = DispatcherBuilder::new()
//!     .shell(shell)
//!     .engine(engine)
//!     .credentials(credentials)
//!     .build()?;
//!
//! let outcomes = dispatcher.run_with_signal_handling(&targets, &plan.command).await?;
//! let result = FleetResult::from_outcomes(&outcomes)?;
//! ```

mod aggregator;
mod builder;
mod executor;
mod task_group;

pub use aggregator::{aggregate, AggregationError, FleetResult};
pub use builder::DispatcherBuilder;
pub use executor::Dispatcher;
pub use task_group::TaskGroup;

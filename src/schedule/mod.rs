//! Load scheduling.
//!
//! Turns a [`TileManifest`](crate::manifest::TileManifest) into a prioritized,
//! rate-limited stream of decoded sources.
//!
//! # Components
//!
//! - [`TileSourceStrategy`]: plans [`LoadTask`]s for standalone tiles or packed sheets
//! - [`distance_order`] / [`spiral_order`]: the two priority orderings
//! - [`LoadPolicy`] / [`RenderBudget`]: device-dependent batching and resolution
//! - [`LoadScheduler`]: cache-first fetch, decode and delivery, in batches
//! - [`GenerationCounter`]: cancellation of stale work after a reset

mod generation;
mod order;
mod policy;
mod scheduler;
mod task;

pub use generation::{GenerationCounter, GenerationToken};
pub use order::{center_distance, distance_order, spiral_order};
pub use policy::{DeviceClass, DeviceProfile, LoadPolicy, RenderBudget, BATCH_YIELD, MIN_UPSCALE};
pub use scheduler::{LoadScheduler, LoadedSource, ScheduleReport};
pub use task::{LoadTask, Placement, SourceRegion, TaskState, TileSourceStrategy};

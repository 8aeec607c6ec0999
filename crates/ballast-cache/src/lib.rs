//! Sampling cache: merges hypervisor and host samples into immutable
//! snapshots.
//!
//! Each tick fetches fresh domain statistics and host counters,
//! derives per-VM quantities (CPU usage, balloon-data age) against the
//! previous snapshot, and swaps the whole [`Snapshot`] atomically from
//! the point of view of readers on the event-loop thread.

mod cache;
mod error;
mod snapshot;

pub use cache::{SamplingCache, MIN_VM_MEMORY};
pub use error::{CacheError, Result};
pub use snapshot::{diff, HostSample, Snapshot, VMCache, STALE_AFTER_SEC};

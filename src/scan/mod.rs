//! Bounded, paginated directory scanning.
//!
//! A scan walks a directory tree lazily, one [`FileEntry`] at a time, and
//! stops early when a configured ceiling trips:
//!
//! - **Memory**: resident-set growth since the scan began, sampled every
//!   `check_interval` entries
//! - **Time**: wall-clock budget for the scan
//! - **Entries**: maximum number of collected entries
//!
//! A tripped ceiling is not an error. The scan returns what it has gathered,
//! flagged as partial with a [`StopReason`].
//!
//! Sorting happens after collection and pagination after sorting, so the
//! slice returned for an offset is stable while the tree is unchanged.
//!
//! # Walk Order
//!
//! Children are visited depth first in file-name order. That order equals
//! the component-wise ordering of relative paths, which lets a stream resume
//! from the last emitted path without holding a live iterator.

mod entry;
mod error;
mod limits;
mod page;
mod scanner;
mod walker;

pub use entry::{CompiledFilter, EntryFilter, EntryType, FileEntry};
pub use error::{resolve_root, ScanError};
pub use limits::{MemoryProbe, ProcessMemory, ScanLimits, StopReason};
pub use page::{paginate, Batch, PaginationPlan, SortKey, SortOrder, SortSpec};
pub use scanner::{Increment, ScanOutcome, Scanner};
pub use walker::Walk;

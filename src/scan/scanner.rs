//! Bounded scans built on [`Walk`].

use std::path::Path;
use std::time::Duration;

use super::limits::ScanGuard;
use super::{
    paginate, resolve_root, Batch, EntryFilter, FileEntry, MemoryProbe, ProcessMemory, ScanError,
    ScanLimits, SortSpec, StopReason, Walk,
};

/// A complete (or ceiling-truncated) listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Collected entries. Sorted once [`ScanOutcome::sorted`] has run.
    pub entries: Vec<FileEntry>,
    /// Set when a ceiling ended the scan early.
    pub stop: Option<StopReason>,
    /// Entries skipped because they could not be read.
    pub skipped: usize,
    /// Time the walk took.
    pub elapsed: Duration,
}

impl ScanOutcome {
    /// Whether the listing is incomplete.
    #[must_use]
    pub const fn partial(&self) -> bool {
        self.stop.is_some()
    }

    /// Sorts the listing.
    #[must_use]
    pub fn sorted(mut self, sort: SortSpec) -> Self {
        sort.sort(&mut self.entries);
        self
    }

    /// Returns one page of the listing, carrying the partial flag.
    #[must_use]
    pub fn page(&self, offset: usize, limit: usize) -> Batch {
        let mut batch = paginate(&self.entries, offset, limit);
        batch.partial = self.partial();
        batch.stop_reason = self.stop;
        batch
    }
}

/// The next slice of a walk, for cursor-driven enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Increment {
    /// Entries in walk order.
    pub entries: Vec<FileEntry>,
    /// Whether at least one more entry follows.
    pub has_more: bool,
    /// Set when a ceiling cut this slice short.
    pub stop: Option<StopReason>,
}

/// Walks directories under [`ScanLimits`].
pub struct Scanner {
    limits: ScanLimits,
    probe: Box<dyn MemoryProbe>,
}

impl Scanner {
    /// Creates a scanner that samples this process's memory.
    #[must_use]
    pub fn new(limits: ScanLimits) -> Self {
        Self::with_probe(limits, Box::new(ProcessMemory::new()))
    }

    /// Creates a scanner with a custom memory probe.
    #[must_use]
    pub fn with_probe(limits: ScanLimits, probe: Box<dyn MemoryProbe>) -> Self {
        Self { limits, probe }
    }

    /// The limits applied to every scan.
    #[must_use]
    pub const fn limits(&self) -> &ScanLimits {
        &self.limits
    }

    /// Collects every entry below `root` that passes `filter`, stopping at
    /// the first breached ceiling.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is missing, not a directory, or unreadable,
    /// or if the filter's pattern is invalid.
    pub fn scan(&mut self, root: &Path, filter: &EntryFilter) -> Result<ScanOutcome, ScanError> {
        let root = resolve_root(root)?;
        let mut walk = Walk::new(&root, filter)?;
        let mut guard = ScanGuard::new(&self.limits, self.probe.as_mut());
        let mut entries = Vec::new();
        let mut stop = None;

        loop {
            let entry = match walk.next_within(&mut guard) {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(reason) => {
                    stop = Some(reason);
                    break;
                }
            };
            if let Err(reason) = guard.admit() {
                stop = Some(reason);
                break;
            }
            entries.push(entry);
        }

        let outcome = ScanOutcome {
            entries,
            stop,
            skipped: walk.skipped(),
            elapsed: guard.elapsed(),
        };

        tracing::debug!(
            root = %root.display(),
            entries = outcome.entries.len(),
            visited = guard.visited(),
            skipped = outcome.skipped,
            partial = outcome.partial(),
            elapsed_ms = u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Scan finished"
        );

        Ok(outcome)
    }

    /// Collects up to `take` entries following `cursor` in walk order.
    ///
    /// Walks one entry past the slice to decide `has_more` exactly.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Scanner::scan`].
    pub fn scan_after(
        &mut self,
        root: &Path,
        filter: &EntryFilter,
        cursor: Option<&Path>,
        take: usize,
    ) -> Result<Increment, ScanError> {
        let root = resolve_root(root)?;
        let mut walk = Walk::new(&root, filter)?;
        if let Some(cursor) = cursor {
            walk = walk.resume_after(cursor);
        }

        let mut guard = ScanGuard::new(&self.limits, self.probe.as_mut());
        let mut entries = Vec::with_capacity(take);
        let mut has_more = false;
        let mut stop = None;

        loop {
            let entry = match walk.next_within(&mut guard) {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(reason) => {
                    stop = Some(reason);
                    break;
                }
            };
            if entries.len() == take {
                has_more = true;
                break;
            }
            if let Err(reason) = guard.admit() {
                stop = Some(reason);
                break;
            }
            entries.push(entry);
        }

        // A ceiling leaves the rest unknown; resuming only helps if the cursor moved
        if stop.is_some() {
            has_more = !entries.is_empty();
        }

        Ok(Increment {
            entries,
            has_more,
            stop,
        })
    }
}

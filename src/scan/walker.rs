//! Lazy, depth-bounded tree walk.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::entry::{CompiledFilter, EntryFilter, FileEntry};
use super::limits::ScanGuard;
use super::{ScanError, StopReason};

/// Iterator over the entries below a root, in file-name order.
///
/// Entries that cannot be read (permission denied, vanished mid-walk) are
/// skipped and counted in [`Walk::skipped`].
pub struct Walk {
    root: PathBuf,
    inner: walkdir::IntoIter,
    filter: CompiledFilter,
    include_hidden: bool,
    resume_after: Option<PathBuf>,
    skipped: usize,
}

impl Walk {
    /// Starts a walk of `root` (assumed to be a resolved directory).
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidPattern`] if the filter's glob is invalid.
    pub fn new(root: &Path, filter: &EntryFilter) -> Result<Self, ScanError> {
        let inner = WalkDir::new(root)
            .min_depth(1)
            .max_depth(filter.max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        Ok(Self {
            root: root.to_path_buf(),
            inner,
            filter: filter.compile()?,
            include_hidden: filter.include_hidden,
            resume_after: None,
            skipped: 0,
        })
    }

    /// Skips everything up to and including `cursor` (a root-relative path).
    ///
    /// Subtrees that sort entirely before the cursor are not descended.
    #[must_use]
    pub fn resume_after(mut self, cursor: impl Into<PathBuf>) -> Self {
        self.resume_after = Some(cursor.into());
        self
    }

    /// Number of entries skipped because they could not be read.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

impl Walk {
    /// Next entry passing the filter, sampling `guard` on every walked entry.
    ///
    /// Entries the filter rejects, hidden entries, and entries before the
    /// resume cursor all count as visits, so a filter that matches nothing
    /// still ends at the time and memory ceilings.
    pub(crate) fn next_within(
        &mut self,
        guard: &mut ScanGuard<'_>,
    ) -> Result<Option<FileEntry>, StopReason> {
        self.advance(|| guard.visit())
    }

    fn advance(
        &mut self,
        mut visit: impl FnMut() -> Result<(), StopReason>,
    ) -> Result<Option<FileEntry>, StopReason> {
        loop {
            let Some(next) = self.inner.next() else {
                return Ok(None);
            };
            visit()?;

            let entry = match next {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(error = %err, "Skipping unreadable entry");
                    self.skipped += 1;
                    continue;
                }
            };

            let is_dir = entry.file_type().is_dir();

            if !self.include_hidden && is_hidden(entry.file_name()) {
                if is_dir {
                    self.inner.skip_current_dir();
                }
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };

            if let Some(cursor) = &self.resume_after {
                if relative <= cursor.as_path() {
                    if is_dir && !cursor.starts_with(relative) {
                        self.inner.skip_current_dir();
                    }
                    continue;
                }
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    tracing::debug!(path = %entry.path().display(), error = %err, "Skipping entry without metadata");
                    self.skipped += 1;
                    continue;
                }
            };

            let file_entry = FileEntry::from_metadata(relative, &metadata);
            if self.filter.matches(&file_entry) {
                return Ok(Some(file_entry));
            }
        }
    }
}

impl Iterator for Walk {
    type Item = FileEntry;

    fn next(&mut self) -> Option<FileEntry> {
        self.advance(|| Ok(())).ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/deep/deeper")).unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git/config"), "x").unwrap();
        fs::write(root.join(".env"), "x").unwrap();
        fs::write(root.join("a/one.rs"), "x").unwrap();
        fs::write(root.join("a/deep/two.rs"), "x").unwrap();
        fs::write(root.join("a/deep/deeper/three.rs"), "x").unwrap();
        fs::write(root.join("a.txt"), "x").unwrap();
        fs::write(root.join("b.md"), "x").unwrap();
        dir
    }

    fn paths(walk: Walk) -> Vec<String> {
        walk.map(|e| e.path).collect()
    }

    #[test]
    fn depth_one_lists_immediate_children() {
        let dir = tree();
        let walk = Walk::new(dir.path(), &EntryFilter::new(1)).unwrap();
        assert_eq!(paths(walk), vec!["a", "a.txt", "b.md"]);
    }

    #[test]
    fn walk_order_is_depth_first_by_name() {
        let dir = tree();
        let walk = Walk::new(dir.path(), &EntryFilter::new(8)).unwrap();
        assert_eq!(
            paths(walk),
            vec![
                "a",
                "a/deep",
                "a/deep/deeper",
                "a/deep/deeper/three.rs",
                "a/deep/two.rs",
                "a/one.rs",
                "a.txt",
                "b.md",
            ]
        );
    }

    #[test]
    fn depth_bound_is_respected() {
        let dir = tree();
        let walk = Walk::new(dir.path(), &EntryFilter::new(2)).unwrap();
        assert!(paths(walk).iter().all(|p| p.matches('/').count() < 2));
    }

    #[test]
    fn hidden_entries_are_opt_in() {
        let dir = tree();
        let hidden = EntryFilter::new(2).with_hidden(true);
        let all = paths(Walk::new(dir.path(), &hidden).unwrap());
        assert!(all.contains(&".env".to_string()));
        assert!(all.contains(&".git/config".to_string()));

        let visible = paths(Walk::new(dir.path(), &EntryFilter::new(2)).unwrap());
        assert!(visible.iter().all(|p| !p.starts_with('.')));
    }

    #[test]
    fn extension_filter_still_traverses_directories() {
        let dir = tree();
        let filter = EntryFilter::new(8).with_extensions(["rs"]);
        let walk = Walk::new(dir.path(), &filter).unwrap();
        assert_eq!(
            paths(walk),
            vec!["a/deep/deeper/three.rs", "a/deep/two.rs", "a/one.rs"]
        );
    }

    #[test]
    fn resume_after_cursor_continues_in_order() {
        let dir = tree();
        let filter = EntryFilter::new(8);
        let full = paths(Walk::new(dir.path(), &filter).unwrap());

        for (i, cursor) in full.iter().enumerate() {
            let rest = paths(Walk::new(dir.path(), &filter).unwrap().resume_after(cursor));
            assert_eq!(rest, full[i + 1..].to_vec(), "resuming after {cursor}");
        }
    }

    #[test]
    fn resume_after_vanished_cursor() {
        let dir = tree();
        let filter = EntryFilter::new(8);
        let rest = paths(
            Walk::new(dir.path(), &filter)
                .unwrap()
                .resume_after("a/deep/three.rs"),
        );
        assert_eq!(rest, vec!["a/deep/two.rs", "a/one.rs", "a.txt", "b.md"]);
    }
}

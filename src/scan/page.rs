//! Sorting and offset pagination of scan results.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use super::{FileEntry, StopReason};

/// Field a listing is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortKey {
    /// Entry name.
    #[default]
    Name,
    /// Size in bytes.
    Size,
    /// Modification time.
    Modified,
    /// Directories first, then files grouped by extension.
    Type,
}

impl SortKey {
    /// Every accepted wire name.
    pub const NAMES: &'static [&'static str] = &["name", "size", "modified", "type"];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Size => "size",
            Self::Modified => "modified",
            Self::Type => "type",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "size" => Ok(Self::Size),
            "modified" => Ok(Self::Modified),
            "type" => Ok(Self::Type),
            other => Err(format!("unknown sort key '{other}'")),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

impl SortOrder {
    /// Every accepted wire name.
    pub const NAMES: &'static [&'static str] = &["asc", "desc"];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order '{other}'")),
        }
    }
}

/// Sort key plus direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SortSpec {
    /// Field compared.
    pub key: SortKey,
    /// Direction.
    pub order: SortOrder,
}

impl SortSpec {
    /// Creates a sort spec.
    #[must_use]
    pub const fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// Sorts `entries` in place. Ties fall back to the relative path, so the
    /// order is total and repeatable.
    pub fn sort(self, entries: &mut [FileEntry]) {
        entries.sort_by(|a, b| {
            let ordering = self.compare(a, b);
            match self.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }

    fn compare(self, a: &FileEntry, b: &FileEntry) -> Ordering {
        let primary = match self.key {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Size => a.size_bytes.cmp(&b.size_bytes),
            SortKey::Modified => a.modified.cmp(&b.modified),
            SortKey::Type => type_rank(a)
                .cmp(&type_rank(b))
                .then_with(|| a.extension.cmp(&b.extension)),
        };
        primary
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.path.cmp(&b.path))
    }
}

const fn type_rank(entry: &FileEntry) -> u8 {
    if entry.is_dir {
        0
    } else if entry.is_file {
        1
    } else {
        2
    }
}

/// One page of a sorted listing.
///
/// `has_more` is derived from `next_offset`, so the two cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Entries in this page, in sort order.
    pub entries: Vec<FileEntry>,
    /// Index of the first entry within the full listing.
    pub offset: usize,
    /// Requested page size.
    pub limit: usize,
    /// Size of the full listing.
    pub total: usize,
    /// Offset of the next page, present only when more entries remain.
    pub next_offset: Option<usize>,
    /// Whether the listing was cut short by a ceiling.
    pub partial: bool,
    /// Which ceiling cut the listing short.
    pub stop_reason: Option<StopReason>,
}

impl Batch {
    /// Whether entries remain past this page.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.next_offset.is_some()
    }

    /// Wire form of this batch.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let entries: Vec<Value> = self.entries.iter().map(FileEntry::to_json).collect();
        let mut value = json!({
            "entries": entries,
            "offset": self.offset,
            "limit": self.limit,
            "total": self.total,
            "returned": self.entries.len(),
            "has_more": self.has_more(),
            "partial": self.partial,
        });
        if let Some(next) = self.next_offset {
            value["next_offset"] = json!(next);
        }
        if let Some(reason) = self.stop_reason {
            value["stop_reason"] = json!(reason.as_str());
        }
        value
    }
}

/// Slices an already sorted listing.
///
/// Returns `entries[offset..offset + limit]`, clamped to the listing. An
/// offset at or past the end yields an empty page at `offset = total` with
/// no `next_offset`, so `offset + entries.len() <= total` always holds.
#[must_use]
pub fn paginate(entries: &[FileEntry], offset: usize, limit: usize) -> Batch {
    let total = entries.len();
    let start = offset.min(total);
    let end = start.saturating_add(limit).min(total);

    Batch {
        entries: entries[start..end].to_vec(),
        offset: start,
        limit,
        total,
        next_offset: (end < total).then_some(end),
        partial: false,
        stop_reason: None,
    }
}

/// How a listing splits into pages of a fixed size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationPlan {
    /// Entries in the listing.
    pub total_entries: usize,
    /// Page size the plan was computed for.
    pub batch_size: usize,
    /// Number of pages.
    pub total_batches: usize,
    /// Offset of every page, in order.
    pub offsets: Vec<usize>,
}

impl PaginationPlan {
    /// Computes the plan for `total_entries` split into `batch_size` pages.
    ///
    /// A zero `batch_size` is treated as 1.
    #[must_use]
    pub fn new(total_entries: usize, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            total_entries,
            batch_size,
            total_batches: total_entries.div_ceil(batch_size),
            offsets: (0..total_entries).step_by(batch_size).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(name: &str, size: u64, is_dir: bool, minute: u32) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            path: name.to_string(),
            is_file: !is_dir,
            is_dir,
            size_bytes: size,
            modified: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, minute, 0).unwrap()),
            extension: name.rsplit_once('.').map(|(_, e)| e.to_string()),
        }
    }

    fn names(entries: &[FileEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn sample() -> Vec<FileEntry> {
        vec![
            entry("b.txt", 30, false, 3),
            entry("src", 0, true, 1),
            entry("a.rs", 10, false, 2),
            entry("c.rs", 20, false, 0),
        ]
    }

    #[test]
    fn sort_by_name() {
        let mut entries = sample();
        SortSpec::default().sort(&mut entries);
        assert_eq!(names(&entries), vec!["a.rs", "b.txt", "c.rs", "src"]);
    }

    #[test]
    fn sort_by_size_descending() {
        let mut entries = sample();
        SortSpec::new(SortKey::Size, SortOrder::Desc).sort(&mut entries);
        assert_eq!(names(&entries), vec!["b.txt", "c.rs", "a.rs", "src"]);
    }

    #[test]
    fn sort_by_modified() {
        let mut entries = sample();
        SortSpec::new(SortKey::Modified, SortOrder::Asc).sort(&mut entries);
        assert_eq!(names(&entries), vec!["c.rs", "src", "a.rs", "b.txt"]);
    }

    #[test]
    fn sort_by_type_puts_directories_first() {
        let mut entries = sample();
        SortSpec::new(SortKey::Type, SortOrder::Asc).sort(&mut entries);
        assert_eq!(names(&entries), vec!["src", "a.rs", "c.rs", "b.txt"]);
    }

    #[test]
    fn sort_keys_parse() {
        for name in SortKey::NAMES {
            assert_eq!(name.parse::<SortKey>().unwrap().as_str(), *name);
        }
        for name in SortOrder::NAMES {
            assert_eq!(name.parse::<SortOrder>().unwrap().as_str(), *name);
        }
        assert!("colour".parse::<SortKey>().is_err());
    }

    #[test]
    fn twenty_five_entries_in_pages_of_ten() {
        let entries: Vec<FileEntry> = (0..25)
            .map(|i| entry(&format!("f{i:02}"), 0, false, 0))
            .collect();

        let first = paginate(&entries, 0, 10);
        assert_eq!(first.entries.len(), 10);
        assert!(first.has_more());
        assert_eq!(first.next_offset, Some(10));

        let second = paginate(&entries, 10, 10);
        assert_eq!(second.entries.len(), 10);
        assert_eq!(second.next_offset, Some(20));

        let third = paginate(&entries, 20, 10);
        assert_eq!(third.entries.len(), 5);
        assert!(!third.has_more());
        assert_eq!(third.next_offset, None);
    }

    #[test]
    fn offset_past_end_is_empty() {
        let entries = sample();
        let batch = paginate(&entries, 4, 10);
        assert!(batch.entries.is_empty());
        assert!(!batch.has_more());

        let batch = paginate(&entries, 99, 10);
        assert!(batch.entries.is_empty());
        assert_eq!(batch.total, 4);
        assert_eq!(batch.offset, 4);
        assert!(batch.offset + batch.entries.len() <= batch.total);
    }

    #[test]
    fn batch_json_omits_next_offset_on_last_page() {
        let entries = sample();
        let last = paginate(&entries, 2, 2).to_json();
        assert_eq!(last["has_more"], false);
        assert!(last.get("next_offset").is_none());

        let first = paginate(&entries, 0, 2).to_json();
        assert_eq!(first["has_more"], true);
        assert_eq!(first["next_offset"], 2);
    }

    #[test]
    fn pagination_plan_offsets() {
        let plan = PaginationPlan::new(25, 10);
        assert_eq!(plan.total_batches, 3);
        assert_eq!(plan.offsets, vec![0, 10, 20]);

        let empty = PaginationPlan::new(0, 10);
        assert_eq!(empty.total_batches, 0);
        assert!(empty.offsets.is_empty());

        let exact = PaginationPlan::new(20, 10);
        assert_eq!(exact.total_batches, 2);
        assert_eq!(exact.offsets, vec![0, 10]);
    }
}

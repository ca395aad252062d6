//! Entry descriptors and the filters applied to them.

use std::fmt;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

use super::ScanError;

/// One file or directory produced by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Final path component.
    pub name: String,
    /// Path relative to the scan root, `/`-separated.
    pub path: String,
    /// Whether the entry is a regular file.
    pub is_file: bool,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Size in bytes (0 for directories).
    pub size_bytes: u64,
    /// Last modification time, when the platform reports one.
    pub modified: Option<DateTime<Utc>>,
    /// Lowercased extension without the dot.
    pub extension: Option<String>,
}

impl FileEntry {
    /// Builds an entry from its path relative to the scan root.
    #[must_use]
    pub fn from_metadata(relative: &Path, metadata: &Metadata) -> Self {
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let is_dir = metadata.is_dir();
        let extension = if is_dir {
            None
        } else {
            relative
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
        };

        Self {
            name,
            path,
            is_file: metadata.is_file(),
            is_dir,
            size_bytes: if is_dir { 0 } else { metadata.len() },
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            extension,
        }
    }

    /// The entry's path relative to the scan root.
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    /// Wire form of this entry.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "path": self.path,
            "is_file": self.is_file,
            "is_dir": self.is_dir,
            "size_bytes": self.size_bytes,
            "modified_time": self
                .modified
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            "extension": self.extension,
        })
    }
}

/// Which kinds of entry a listing reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Files and directories.
    #[default]
    All,
    /// Files only.
    File,
    /// Directories only.
    Dir,
}

impl EntryType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::File => "file",
            Self::Dir => "dir",
        }
    }

    /// Every accepted wire name.
    pub const NAMES: &'static [&'static str] = &["all", "file", "dir"];
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "file" => Ok(Self::File),
            "dir" => Ok(Self::Dir),
            other => Err(format!("unknown entry type '{other}'")),
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filters applied while walking.
///
/// Filters decide what is reported, not what is traversed, except for hidden
/// directories, which are never descended unless `include_hidden` is set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryFilter {
    /// Deepest level walked (1 = immediate children of the root).
    pub max_depth: usize,
    /// Report and descend dot-prefixed entries.
    pub include_hidden: bool,
    /// Extension allow-list (lowercase, no dot). When non-empty only files
    /// with a listed extension are reported.
    pub extensions: Vec<String>,
    /// Glob matched against the entry name.
    pub pattern: Option<String>,
    /// Kinds of entry reported.
    pub entry_type: EntryType,
}

impl EntryFilter {
    /// A filter reporting every visible entry down to `max_depth`.
    #[must_use]
    pub const fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            include_hidden: false,
            extensions: Vec::new(),
            pattern: None,
            entry_type: EntryType::All,
        }
    }

    /// Sets the extension allow-list, normalising case and leading dots.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalised: Vec<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        normalised.sort();
        normalised.dedup();
        self.extensions = normalised;
        self
    }

    /// Sets whether hidden entries are included.
    #[must_use]
    pub const fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Sets the name glob.
    #[must_use]
    pub fn with_pattern(mut self, pattern: Option<String>) -> Self {
        self.pattern = pattern;
        self
    }

    /// Sets which kinds of entry are reported.
    #[must_use]
    pub const fn with_entry_type(mut self, entry_type: EntryType) -> Self {
        self.entry_type = entry_type;
        self
    }

    /// Compiles the filter for matching.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidPattern`] if the name glob does not parse.
    pub fn compile(&self) -> Result<CompiledFilter, ScanError> {
        let pattern = self
            .pattern
            .as_deref()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| ScanError::InvalidPattern {
                    pattern: p.to_string(),
                    message: e.msg.to_string(),
                })
            })
            .transpose()?;

        Ok(CompiledFilter {
            extensions: self.extensions.clone(),
            pattern,
            entry_type: self.entry_type,
        })
    }
}

/// An [`EntryFilter`] ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    extensions: Vec<String>,
    pattern: Option<glob::Pattern>,
    entry_type: EntryType,
}

impl CompiledFilter {
    /// Whether `entry` should be reported.
    #[must_use]
    pub fn matches(&self, entry: &FileEntry) -> bool {
        let type_ok = match self.entry_type {
            EntryType::All => true,
            EntryType::File => entry.is_file,
            EntryType::Dir => entry.is_dir,
        };
        if !type_ok {
            return false;
        }

        if !self.extensions.is_empty() {
            let listed = entry.is_file
                && entry
                    .extension
                    .as_ref()
                    .is_some_and(|ext| self.extensions.contains(ext));
            if !listed {
                return false;
            }
        }

        self.pattern
            .as_ref()
            .map_or(true, |p| p.matches(&entry.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            path: name.to_string(),
            is_file: true,
            is_dir: false,
            size_bytes: 1,
            modified: None,
            extension: Path::new(name)
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase()),
        }
    }

    fn dir(name: &str) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            path: name.to_string(),
            is_file: false,
            is_dir: true,
            size_bytes: 0,
            modified: None,
            extension: None,
        }
    }

    #[test]
    fn extensions_are_normalised() {
        let filter = EntryFilter::new(1).with_extensions([".RS", "toml", "rs", ""]);
        assert_eq!(filter.extensions, vec!["rs".to_string(), "toml".to_string()]);
    }

    #[test]
    fn extension_filter_reports_files_only() {
        let filter = EntryFilter::new(1).with_extensions(["rs"]).compile().unwrap();
        assert!(filter.matches(&file("main.RS")));
        assert!(!filter.matches(&file("README.md")));
        assert!(!filter.matches(&dir("src")));
    }

    #[test]
    fn pattern_matches_name() {
        let filter = EntryFilter::new(1)
            .with_pattern(Some("test_*".to_string()))
            .compile()
            .unwrap();
        assert!(filter.matches(&file("test_scan.rs")));
        assert!(!filter.matches(&file("scan.rs")));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = EntryFilter::new(1)
            .with_pattern(Some("[".to_string()))
            .compile()
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidPattern { .. }));
    }

    #[test]
    fn entry_type_filter() {
        let dirs = EntryFilter::new(1)
            .with_entry_type(EntryType::Dir)
            .compile()
            .unwrap();
        assert!(dirs.matches(&dir("src")));
        assert!(!dirs.matches(&file("a.txt")));
    }

    #[test]
    fn entry_type_round_trips_through_wire_name() {
        for name in EntryType::NAMES {
            let parsed: EntryType = name.parse().unwrap();
            assert_eq!(parsed.as_str(), *name);
        }
        assert!("both".parse::<EntryType>().is_err());
    }

    #[test]
    fn entry_from_metadata() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("sub")).unwrap();
        let file_path = root.path().join("sub").join("Data.JSON");
        std::fs::write(&file_path, "{}").unwrap();

        let metadata = std::fs::metadata(&file_path).unwrap();
        let entry = FileEntry::from_metadata(Path::new("sub/Data.JSON"), &metadata);
        assert_eq!(entry.name, "Data.JSON");
        assert_eq!(entry.path, "sub/Data.JSON");
        assert!(entry.is_file);
        assert_eq!(entry.size_bytes, 2);
        assert_eq!(entry.extension.as_deref(), Some("json"));
        assert!(entry.modified.is_some());

        let json = entry.to_json();
        assert_eq!(json["path"], "sub/Data.JSON");
        assert!(json["modified_time"].is_string());
    }
}

//! Integration tests for the scanner, pagination, and stream sessions.
//!
//! These tests build real directory trees and check the properties callers
//! rely on: following `next_offset` reconstructs the listing exactly once,
//! and a stream yields the same entries as a single walk.

use std::path::Path;
use std::time::Duration;

use tempfile::tempdir;

use treewalk_mcp::scan::{
    EntryFilter, EntryType, ScanLimits, Scanner, SortKey, SortOrder, SortSpec,
};
use treewalk_mcp::session::{SessionManager, SessionState};

// =============================================================================
// Helpers
// =============================================================================

/// Builds a small nested tree:
///
/// ```text
/// a.txt  b.rs  .hidden/x.txt  src/{lib.rs, main.rs, nested/{deep.rs, notes.md}}  z/
/// ```
fn nested_tree() -> tempfile::TempDir {
    let dir = tempdir().expect("Failed to create temp dir");
    let root = dir.path();
    for dir in ["src/nested", ".hidden", "z"] {
        std::fs::create_dir_all(root.join(dir)).expect("Failed to create dir");
    }
    for (file, body) in [
        ("a.txt", "alpha"),
        ("b.rs", "fn b() {}"),
        (".hidden/x.txt", "x"),
        ("src/lib.rs", "pub mod nested;"),
        ("src/main.rs", "fn main() {}"),
        ("src/nested/deep.rs", "// deep"),
        ("src/nested/notes.md", "# notes"),
    ] {
        std::fs::write(root.join(file), body).expect("Failed to write file");
    }
    dir
}

fn paths(entries: &[treewalk_mcp::scan::FileEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.path.as_str()).collect()
}

fn scanner() -> Scanner {
    Scanner::new(ScanLimits::default())
}

// =============================================================================
// Walk and Filter Tests
// =============================================================================

#[test]
fn test_walk_order_is_depth_first_by_name() {
    let dir = nested_tree();
    let outcome = scanner()
        .scan(dir.path(), &EntryFilter::new(8))
        .expect("scan succeeds");
    assert_eq!(
        paths(&outcome.entries),
        [
            "a.txt",
            "b.rs",
            "src",
            "src/lib.rs",
            "src/main.rs",
            "src/nested",
            "src/nested/deep.rs",
            "src/nested/notes.md",
            "z",
        ]
    );
}

#[test]
fn test_hidden_entries_on_request() {
    let dir = nested_tree();
    let filter = EntryFilter::new(2).with_hidden(true);
    let outcome = scanner().scan(dir.path(), &filter).expect("scan succeeds");
    let found = paths(&outcome.entries);
    assert!(found.contains(&".hidden"));
    assert!(found.contains(&".hidden/x.txt"));
}

#[test]
fn test_extension_filter_still_descends() {
    let dir = nested_tree();
    let filter = EntryFilter::new(8).with_extensions([".RS"]);
    let outcome = scanner().scan(dir.path(), &filter).expect("scan succeeds");
    assert_eq!(
        paths(&outcome.entries),
        ["b.rs", "src/lib.rs", "src/main.rs", "src/nested/deep.rs"]
    );
}

#[test]
fn test_pattern_and_type_filters() {
    let dir = nested_tree();
    let dirs_only = EntryFilter::new(8).with_entry_type(EntryType::Dir);
    let outcome = scanner().scan(dir.path(), &dirs_only).expect("scan succeeds");
    assert_eq!(paths(&outcome.entries), ["src", "src/nested", "z"]);

    let mains = EntryFilter::new(8).with_pattern(Some("m*".to_string()));
    let outcome = scanner().scan(dir.path(), &mains).expect("scan succeeds");
    assert_eq!(paths(&outcome.entries), ["src/main.rs"]);
}

#[test]
fn test_file_root_is_rejected() {
    let dir = nested_tree();
    let err = scanner()
        .scan(&dir.path().join("a.txt"), &EntryFilter::new(1))
        .unwrap_err();
    assert_eq!(err.path(), Some(dir.path().join("a.txt").as_path()));
}

// =============================================================================
// Pagination Property Tests
// =============================================================================

#[test]
fn test_following_next_offset_reconstructs_listing() {
    let dir = nested_tree();
    let sorts = [
        SortSpec::default(),
        SortSpec::new(SortKey::Size, SortOrder::Desc),
        SortSpec::new(SortKey::Type, SortOrder::Asc),
        SortSpec::new(SortKey::Modified, SortOrder::Asc),
    ];

    for depth in 1..=3 {
        for sort in sorts {
            let full = scanner()
                .scan(dir.path(), &EntryFilter::new(depth))
                .expect("scan succeeds")
                .sorted(sort);

            for batch_size in 1..=4 {
                let mut offset = Some(0);
                let mut rebuilt = Vec::new();
                while let Some(current) = offset {
                    let batch = full.page(current, batch_size);
                    assert_eq!(batch.has_more(), batch.next_offset.is_some());
                    assert!(batch.offset + batch.entries.len() <= batch.total);
                    rebuilt.extend(batch.entries.iter().cloned());
                    offset = batch.next_offset;
                }
                assert_eq!(rebuilt, full.entries, "depth {depth} sort {sort:?} size {batch_size}");
            }
        }
    }
}

#[test]
fn test_entry_limit_yields_partial_listing() {
    let dir = nested_tree();
    let limits = ScanLimits {
        max_entries: 3,
        ..ScanLimits::default()
    };
    let outcome = Scanner::new(limits)
        .scan(dir.path(), &EntryFilter::new(8))
        .expect("scan succeeds");
    assert!(outcome.partial());
    assert_eq!(outcome.entries.len(), 3);
    let batch = outcome.page(0, 10);
    assert!(batch.partial);
    assert!(!batch.has_more());
}

#[test]
fn test_filter_matching_nothing_still_hits_time_budget() {
    let dir = tempdir().expect("Failed to create temp dir");
    for i in 0..500 {
        std::fs::write(dir.path().join(format!("f{i:04}.txt")), "x").expect("Failed to write");
    }
    let limits = ScanLimits {
        time_budget: Duration::ZERO,
        check_interval: 1,
        ..ScanLimits::default()
    };
    let filter = EntryFilter::new(1).with_extensions(["nomatch"]);
    let outcome = Scanner::new(limits)
        .scan(dir.path(), &filter)
        .expect("scan succeeds");
    assert!(outcome.entries.is_empty());
    assert!(outcome.partial());
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_is_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let dir = nested_tree();
    let locked = dir.path().join("src/nested");
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000))
        .expect("Failed to lock dir");

    // Permissions are not enforced for root
    if std::fs::read_dir(&locked).is_ok() {
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to unlock dir");
        return;
    }

    let outcome = Scanner::new(ScanLimits::default()).scan(dir.path(), &EntryFilter::new(3));
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to unlock dir");

    let outcome = outcome.expect("scan succeeds despite the unreadable directory");
    let paths: Vec<&str> = outcome.entries.iter().map(|e| e.path.as_str()).collect();
    assert!(!outcome.partial());
    assert!(outcome.skipped >= 1);
    assert!(paths.contains(&"src/nested"));
    assert!(paths.contains(&"src/lib.rs"));
    assert!(paths.contains(&"src/main.rs"));
    assert!(paths.contains(&"a.txt"));
    assert!(!paths.contains(&"src/nested/deep.rs"));
}

// =============================================================================
// Session Tests
// =============================================================================

fn drain(manager: &mut SessionManager, scanner: &mut Scanner, root: &Path, size: usize) -> Vec<String> {
    let first = manager
        .start(scanner, root.to_path_buf(), EntryFilter::new(8), size)
        .expect("stream starts");
    let id = first.session_id.clone();
    let mut seen: Vec<String> = first.entries.iter().map(|e| e.path.clone()).collect();
    let mut more = first.has_more;

    while more {
        let batch = manager.next(scanner, &id).expect("session is live");
        assert!(batch.entries.len() <= size);
        seen.extend(batch.entries.iter().map(|e| e.path.clone()));
        more = batch.has_more;
    }

    let last = manager.next(scanner, &id).expect("exhausted session still answers");
    assert_eq!(last.state, SessionState::Exhausted);
    assert!(last.complete());
    assert!(last.entries.is_empty());
    seen
}

#[test]
fn test_stream_matches_single_walk() {
    let dir = nested_tree();
    let mut scanner = scanner();
    let walk: Vec<String> = scanner
        .scan(dir.path(), &EntryFilter::new(8))
        .expect("scan succeeds")
        .entries
        .into_iter()
        .map(|e| e.path)
        .collect();

    for size in 1..=4 {
        let mut manager = SessionManager::new(Duration::from_secs(60), 4);
        assert_eq!(drain(&mut manager, &mut scanner, dir.path(), size), walk);
    }
}

#[test]
fn test_stream_is_live_after_cursor() {
    let dir = nested_tree();
    let mut scanner = scanner();
    let mut manager = SessionManager::new(Duration::from_secs(60), 4);

    let first = manager
        .start(&mut scanner, dir.path().to_path_buf(), EntryFilter::new(1), 2)
        .expect("stream starts");
    assert_eq!(paths(&first.entries), ["a.txt", "b.rs"]);

    // Created before the cursor: not reported. After the cursor: reported.
    std::fs::write(dir.path().join("0_early.txt"), "").expect("Failed to write file");
    std::fs::write(dir.path().join("y_late.txt"), "").expect("Failed to write file");

    let next = manager
        .next(&mut scanner, &first.session_id)
        .expect("session is live");
    assert_eq!(paths(&next.entries), ["src", "y_late.txt"]);
}

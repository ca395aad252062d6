//! Source metrics for a single file.

use std::io::{self, BufRead, BufReader};
use std::path::Path;

use serde::Serialize;

/// Line and complexity figures for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsReport {
    /// Number of lines.
    pub lines: usize,
    /// Cyclomatic-style estimate: 1 plus the number of branch points.
    pub complexity: usize,
}

/// Analyses a source file.
pub trait CodeMetrics {
    /// Computes metrics for the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn analyze(&self, path: &Path) -> io::Result<MetricsReport>;
}

/// Token-counting [`CodeMetrics`] that works on any C-like source text.
#[derive(Debug, Default)]
pub struct LineMetrics;

const BRANCH_KEYWORDS: &[&str] = &["if", "for", "while", "match", "case", "catch", "elif"];
const BRANCH_OPERATORS: &[&str] = &["&&", "||", "?"];

impl LineMetrics {
    fn branches(line: &str) -> usize {
        let keywords = line
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|word| BRANCH_KEYWORDS.contains(word))
            .count();
        let operators: usize = BRANCH_OPERATORS
            .iter()
            .map(|op| line.matches(op).count())
            .sum();
        keywords + operators
    }
}

impl CodeMetrics for LineMetrics {
    fn analyze(&self, path: &Path) -> io::Result<MetricsReport> {
        let reader = BufReader::new(std::fs::File::open(path)?);
        let mut lines = 0;
        let mut complexity = 1;

        for line in reader.lines() {
            let line = line?;
            lines += 1;
            complexity += Self::branches(&line);
        }

        Ok(MetricsReport { lines, complexity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_lines_and_branches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.rs");
        std::fs::write(
            &path,
            "fn f(x: i32) -> i32 {\n    if x > 0 && x < 10 {\n        1\n    } else {\n        0\n    }\n}\n",
        )
        .unwrap();

        let report = LineMetrics.analyze(&path).unwrap();
        assert_eq!(report.lines, 7);
        assert_eq!(report.complexity, 3);
    }

    #[test]
    fn identifiers_containing_keywords_do_not_count() {
        assert_eq!(LineMetrics::branches("let iffy = format_for(x);"), 0);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(LineMetrics.analyze(Path::new("/no/such/file.rs")).is_err());
    }
}

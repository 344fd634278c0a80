//! CLI output formatting.
//!
//! Output is information-first: each entry leads with its positional index
//! and title, with paths and details on indented context lines.
//!
//! ## Index
//!
//! ```text
//! Index gallery-20240501t120000
//!     Indexed: 8 documents in 4 batches
//!     Alias: gallery
//!     Removed: gallery-20240430t120000
//! ```
//!
//! ## Search
//!
//! ```text
//! 2 results for "beach"
//! 001 Second
//!     Path: trip/photo2.jpg
//!     Type: Image
//!     Score: 10.0
//! 002 (trip/beach)
//!     Path: trip/beach
//!     Type: Album
//!     Score: 10.0
//! ```
//!
//! Each output has a `format_*` function returning lines, and a `print_*`
//! wrapper that writes them to stdout.

use crate::search::{RebuildReport, SearchResults};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Titled entries show their title, untitled ones their path in parens.
fn entry_line(index: usize, title: Option<&str>, path: &str) -> String {
    match title {
        Some(t) if !t.trim().is_empty() => format!("{} {}", format_index(index), t),
        _ => format!("{} ({})", format_index(index), path),
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Index
// ============================================================================

pub fn format_rebuild_report(report: &RebuildReport, alias: &str) -> Vec<String> {
    let mut lines = vec![format!("Index {}", report.index)];
    lines.push(format!(
        "{}Indexed: {} in {}",
        indent(1),
        plural(report.indexed, "document", "documents"),
        plural(report.batches, "batch", "batches"),
    ));
    lines.push(format!("{}Alias: {}", indent(1), alias));
    for removed in &report.removed {
        lines.push(format!("{}Removed: {}", indent(1), removed));
    }
    lines
}

pub fn print_rebuild_report(report: &RebuildReport, alias: &str) {
    for line in format_rebuild_report(report, alias) {
        println!("{}", line);
    }
}

// ============================================================================
// Search
// ============================================================================

pub fn format_search_results(query: &str, results: &SearchResults) -> Vec<String> {
    let mut lines = vec![format!(
        "{} for {:?}",
        plural(results.total as usize, "result", "results"),
        query
    )];
    for (i, hit) in results.hits.iter().enumerate() {
        let doc = &hit.document;
        lines.push(entry_line(i + 1, doc.title.as_deref(), &doc.path));
        lines.push(format!("{}Path: {}", indent(1), doc.path));
        lines.push(format!("{}Type: {}", indent(1), doc.kind.label()));
        if let Some(date) = &doc.date {
            lines.push(format!("{}Date: {}", indent(1), date));
        }
        lines.push(format!("{}Score: {:.1}", indent(1), hit.score));
    }
    if (results.hits.len() as u64) < results.total {
        lines.push(format!(
            "Showing {} of {}",
            results.hits.len(),
            results.total
        ));
    }
    lines
}

pub fn print_search_results(query: &str, results: &SearchResults) {
    for line in format_search_results(query, results) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataRecord;
    use crate::search::{DocumentType, Hit, SearchDocument};

    fn hit(path: &str, title: &str, kind: DocumentType, score: f64) -> Hit {
        let mut meta = MetadataRecord::default();
        meta.set("title", title);
        let document = SearchDocument::from_record(path.to_string(), &meta, kind);
        Hit {
            id: document.id.clone(),
            score,
            document,
        }
    }

    #[test]
    fn format_index_pads_to_three() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn entry_line_falls_back_to_path() {
        assert_eq!(entry_line(1, Some("Sunset"), "a.jpg"), "001 Sunset");
        assert_eq!(entry_line(2, Some(" "), "a.jpg"), "002 (a.jpg)");
        assert_eq!(entry_line(3, None, "trip"), "003 (trip)");
    }

    #[test]
    fn rebuild_report_lists_removed_indices() {
        let report = RebuildReport {
            index: "gallery-20240501t120000".into(),
            indexed: 1,
            batches: 1,
            removed: vec!["gallery-20240430t120000".into()],
        };
        assert_eq!(
            format_rebuild_report(&report, "gallery"),
            vec![
                "Index gallery-20240501t120000",
                "    Indexed: 1 document in 1 batch",
                "    Alias: gallery",
                "    Removed: gallery-20240430t120000",
            ]
        );
    }

    #[test]
    fn search_results_show_each_hit() {
        let results = SearchResults {
            total: 2,
            hits: vec![
                hit("trip/photo2.jpg", "Second", DocumentType::Image, 10.0),
                hit("trip/beach", "", DocumentType::Album, 3.5),
            ],
        };
        let lines = format_search_results("beach", &results);
        assert_eq!(lines[0], r#"2 results for "beach""#);
        assert_eq!(lines[1], "001 Second");
        assert_eq!(lines[2], "    Path: trip/photo2.jpg");
        assert_eq!(lines[3], "    Type: Image");
        assert_eq!(lines[4], "    Score: 10.0");
        assert_eq!(lines[5], "002 (trip/beach)");
        assert_eq!(lines.last().unwrap(), "    Score: 3.5");
    }

    #[test]
    fn truncated_results_say_so() {
        let results = SearchResults {
            total: 5,
            hits: vec![hit("a.jpg", "A", DocumentType::Image, 1.0)],
        };
        let lines = format_search_results("a", &results);
        assert_eq!(lines.last().unwrap(), "Showing 1 of 5");
    }
}

//! Terminal presentation of solve results.

use std::fmt::Write as _;

use puzzle_core::PuzzleResult;

const SEPARATOR_WIDTH: usize = 60;

/// Renders a result as the human-readable report printed on stdout.
pub(crate) fn render_result(result: &PuzzleResult) -> String {
    let separator = "=".repeat(SEPARATOR_WIDTH);
    let stats = &result.stats;
    let mut out = String::new();

    if let Some(error) = &result.error {
        let _ = writeln!(out, "Failed to solve puzzle: {error}");
        let _ = writeln!(
            out,
            "Elapsed: {:.3}s | Requests: {}",
            result.elapsed_seconds, stats.total_requests
        );
        return out;
    }

    let _ = writeln!(out, "{separator}");
    let _ = writeln!(out, "{}", result.text);
    let _ = writeln!(out, "{separator}");
    let _ = writeln!(
        out,
        "Elapsed: {:.3}s | Fragments: {}",
        result.elapsed_seconds, stats.total_found
    );
    let _ = writeln!(out, "Throughput: {:.1} fragments/s", stats.fragments_per_second);
    let _ = writeln!(out, "Requests: {}", stats.total_requests);
    let _ = writeln!(
        out,
        "Completion: {:.1}% | Missing: {}",
        stats.completion_percentage, stats.missing_count
    );
    let _ = writeln!(
        out,
        "Status: {}",
        if stats.is_complete { "Complete" } else { "Incomplete" }
    );
    if !stats.missing_positions_sample.is_empty() {
        let _ = writeln!(
            out,
            "Missing positions (first {}): {:?}",
            stats.missing_positions_sample.len(),
            stats.missing_positions_sample
        );
    }
    let _ = writeln!(out, "{separator}");
    out
}

/// Renders a result as pretty-printed JSON.
pub(crate) fn render_json(result: &PuzzleResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

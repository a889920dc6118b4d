//! Field parser for the serial line protocol.
//!
//! One record is a newline-terminated, comma-separated row of numeric
//! fields. The parser only splits and validates shape; interpreting the
//! fields is the mapper's job.

use tracing::warn;

/// Split one decoded line into trimmed tokens.
///
/// Returns `None` for blank lines (silently skipped) and for lines whose
/// field count does not match `expected_fields` (logged as a shape
/// fault, whole line dropped - never a partial record).
pub fn parse_line(line: &str, expected_fields: usize) -> Option<Vec<String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let fields: Vec<String> = line.split(',').map(|f| f.trim().to_string()).collect();
    if fields.len() != expected_fields {
        warn!(
            "serial data has incorrect number of fields: received {} but expected {}",
            fields.len(),
            expected_fields
        );
        return None;
    }
    Some(fields)
}

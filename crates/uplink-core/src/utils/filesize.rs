//! Human-readable byte counts.

// Payload sizes are far below 2^52, so the f64 conversions here are exact enough
#![allow(clippy::cast_precision_loss)]

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Convert a byte count to MiB, rounded to two decimals.
#[must_use]
pub fn bytes_to_mib(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MIB * 100.0).round() / 100.0
}

/// Format a byte count with the largest unit whose tenth fits.
///
/// `base` is 1000 for SI-style units or 1024 for binary-style units. The
/// value is rounded to one decimal: `2_000_000` → `"2 MB"`,
/// `2 * 1024 * 1024` → `"2.1 MB"`, `0` → `"0 b"`.
#[must_use]
pub fn format_file_size(bytes: u64, base: u64) -> String {
    const UNITS: [(&str, i32); 5] = [("TB", 4), ("GB", 3), ("MB", 2), ("KB", 1), ("b", 0)];

    let size = bytes as f64;
    let base = base as f64;
    let mut selected = 0.0;
    let mut unit = "b";

    for (name, exponent) in UNITS {
        let scale = base.powi(exponent);
        if size >= scale / 10.0 {
            selected = size / scale;
            unit = name;
            break;
        }
    }

    let rounded = (selected * 10.0).round() / 10.0;
    format!("{rounded} {unit}")
}

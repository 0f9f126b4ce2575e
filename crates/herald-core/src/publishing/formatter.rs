//! Platform-specific content shaping.

use crate::domain::Platform;

/// Fit raw post content to the platform's length limit.
///
/// Truncates on character boundaries; platforms without a limit get the
/// content unchanged.
pub fn format_for_platform(platform: Platform, raw: &str) -> String {
    match platform.character_limit() {
        Some(limit) => truncate_chars(raw, limit),
        None => raw.to_string(),
    }
}

fn truncate_chars(raw: &str, limit: usize) -> String {
    match raw.char_indices().nth(limit) {
        Some((byte_idx, _)) => raw[..byte_idx].to_string(),
        None => raw.to_string(),
    }
}

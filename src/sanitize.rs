//! Filename sanitization for files staged into the container.
//!
//! Names are reduced to `[A-Za-z0-9_.-]` so they survive shell and tool quoting
//! inside the container. Spaces become underscores; every other character
//! outside the set is dropped. The package extension is kept even when the
//! character filter would otherwise break it.

/// Stem used when nothing usable survives sanitization
const FALLBACK_STEM: &str = "package";

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Sanitizes `file_name`, preserving `extension` (e.g. `.difypkg`) when the
/// original name carried it.
///
/// The result is never empty, only contains `[A-Za-z0-9_.-]`, and applying it
/// twice yields the same name as applying it once.
pub fn sanitize_file_name(file_name: &str, extension: &str) -> String {
    let mut cleaned: String = file_name
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if is_allowed(c) => Some(c),
            _ => None,
        })
        .collect();

    let wants_extension = file_name.contains(extension);
    if wants_extension && !cleaned.ends_with(extension) {
        cleaned.push_str(extension);
    }

    if cleaned.is_empty() || cleaned == extension {
        cleaned = if wants_extension {
            format!("{}{}", FALLBACK_STEM, extension)
        } else {
            FALLBACK_STEM.to_string()
        };
    }

    cleaned
}

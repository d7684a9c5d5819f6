/// Trim a user supplied name. Returns `None` when nothing but whitespace is
/// left, which every name-bearing entity treats as invalid.
pub fn normalize_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Like [`normalize_name`] but for optional free text such as notes.
pub fn normalize_note(raw: Option<&str>) -> Option<String> {
    raw.and_then(normalize_name)
}

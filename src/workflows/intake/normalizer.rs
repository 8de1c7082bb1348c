/// Canonical form used to compare spreadsheet headers with mapping keys.
pub(crate) fn normalize_header(value: &str) -> String {
    let cleaned = clean_cell(value);
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_ascii_lowercase()
}

/// Strips byte-order marks and zero-width spaces that spreadsheet exports leak.
pub(crate) fn clean_cell(value: &str) -> String {
    value.replace(['\u{feff}', '\u{200b}'], "").trim().to_string()
}

use console::strip_ansi_codes;

/// Extracts the pytest "short test summary info" section from job output.
///
/// Markers are matched with ANSI colour codes stripped, but the returned lines
/// keep their original colouring. Returns `None` unless both the section header
/// and the closing `=== ... in Xs ===` line are present.
pub fn try_extract_summary(output: &str) -> Option<String> {
    let lines: Vec<&str> = output.split('\n').collect();

    let start = lines.iter().position(|line| {
        let plain = strip_ansi_codes(line).to_lowercase();
        plain.starts_with('=') && plain.contains("short test summary info")
    })?;

    let end = start
        + 1
        + lines[start + 1..].iter().position(|line| {
            let plain = strip_ansi_codes(line).to_lowercase();
            plain.starts_with('=')
                && (plain.contains("passed") || plain.contains("failed"))
                && plain.contains("in ")
        })?;

    Some(lines[start..=end].join("\n"))
}

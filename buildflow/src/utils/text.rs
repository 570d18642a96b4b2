//! Text shaping helpers.

/// Lowercases `input` and collapses every run of non-alphanumerics into `-`.
///
/// ```
/// use buildflow::utils::slugify;
///
/// assert_eq!(slugify("Google Sheets API"), "google-sheets-api");
/// ```
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "service".to_string()
    } else {
        slug
    }
}

/// Truncates `input` to at most `max_chars` characters, appending `…` when cut.
#[must_use]
pub fn truncate_for_display(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let mut out: String = input.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("  Slack / Teams  "), "slack-teams");
        assert_eq!(slugify("CRM"), "crm");
    }

    #[test]
    fn test_slugify_empty_falls_back() {
        assert_eq!(slugify("!!!"), "service");
    }

    #[test]
    fn test_truncate_for_display() {
        assert_eq!(truncate_for_display("short", 10), "short");
        assert_eq!(truncate_for_display("abcdefghij", 4), "abcd…");
    }
}

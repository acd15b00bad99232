//! Subject identifiers (player Riot IDs such as `name#tag`).

use anyhow::Result;

/// Environment variable overriding the configured tracked subjects
/// (comma separated).
pub const SUBJECTS_ENV: &str = "TRACKR_SUBJECTS";

/// Percent-encode a subject for use inside a URL path or query.
///
/// Only the characters that break a tracker URL are escaped; `#` becomes
/// `%23` so `name#tag` stays one path segment.
pub fn encode_subject(subject: &str) -> String {
    let mut out = String::with_capacity(subject.len() + 4);
    for c in subject.chars() {
        match c {
            '%' => out.push_str("%25"),
            '#' => out.push_str("%23"),
            ' ' => out.push_str("%20"),
            '/' => out.push_str("%2F"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            '+' => out.push_str("%2B"),
            c => out.push(c),
        }
    }
    out
}

/// Split `name#tag` into its parts. A subject without a tag yields an empty tag.
pub fn split_subject(subject: &str) -> (&str, &str) {
    match subject.split_once('#') {
        Some((name, tag)) => (name, tag),
        None => (subject, ""),
    }
}

/// Normalise and validate a subject supplied by a caller.
pub fn validate_subject(subject: &str) -> Result<String> {
    let trimmed = subject.trim();
    if trimmed.is_empty() {
        anyhow::bail!("subject must not be empty");
    }
    if trimmed.chars().any(|c| c.is_control()) {
        anyhow::bail!("subject contains control characters: {trimmed:?}");
    }
    let (name, tag) = split_subject(trimmed);
    if name.is_empty() || (trimmed.contains('#') && tag.is_empty()) {
        anyhow::bail!("subject must look like name#tag: {trimmed:?}");
    }
    Ok(trimmed.to_string())
}

/// Parse a comma separated subject list, dropping blanks.
pub fn parse_subject_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

//! Glob matching for search-identifier patterns.
//!
//! Condition patterns such as `selection_*` are expanded against the rule's
//! search names at evaluation time. Patterns support `*` (any run of
//! characters) and `?` (any single character); everything else matches
//! literally.

use regex::Regex;

/// Compile a glob pattern into an anchored regex.
fn glob_regex(pattern: &str) -> Option<Regex> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            _ => translated.push_str(&regex::escape(&ch.to_string())),
        }
    }
    translated.push('$');
    Regex::new(&translated).ok()
}

/// Returns true when `name` matches the glob `pattern`.
///
/// Condition parsing guarantees patterns are well formed, so a failed regex
/// compilation is treated as a non-match rather than an error.
pub(crate) fn glob_match(pattern: &str, name: &str) -> bool {
    match glob_regex(pattern) {
        Some(re) => re.is_match(name),
        None => false,
    }
}

//! Ambiguous file specifier (AFSP) matching: `*` matches zero or more
//! characters, `#` matches exactly one.

/// Returns true if `pattern` (possibly containing `*`/`#` wildcards) matches
/// `name`. Matching is case-insensitive, as BBC filing systems are.
pub fn matches(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_uppercase()).collect();
    let name: Vec<char> = name.chars().map(|c| c.to_ascii_uppercase()).collect();
    matches_chars(&pattern, &name)
}

fn matches_chars(pattern: &[char], name: &[char]) -> bool {
    match pattern.first() {
        None => name.is_empty(),
        Some('*') => {
            // '*' matches any suffix length, including zero.
            (0..=name.len()).any(|split| matches_chars(&pattern[1..], &name[split..]))
        }
        Some('#') => !name.is_empty() && matches_chars(&pattern[1..], &name[1..]),
        Some(c) => !name.is_empty() && *c == name[0] && matches_chars(&pattern[1..], &name[1..]),
    }
}

/// Returns true if `pattern` contains AFSP wildcard characters.
pub fn is_wildcarded(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('#')
}

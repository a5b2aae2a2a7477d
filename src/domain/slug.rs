/// Maximum slug length used for post identity and output filenames.
pub const SLUG_MAX_LEN: usize = 120;

/// Replace anything outside `[A-Za-z0-9_-]` with `-` and truncate.
pub fn sanitize_slug(raw: &str, max_len: usize) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    if max_len > 0 {
        sanitized.chars().take(max_len).collect()
    } else {
        sanitized
    }
}

/// Lowercase ASCII-alphanumeric runs joined with `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for word in text.split(|c: char| !c.is_ascii_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&word.to_ascii_lowercase());
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_safe_chars() {
        assert_eq!(sanitize_slug("my-post_1a2b", SLUG_MAX_LEN), "my-post_1a2b");
    }

    #[test]
    fn test_sanitize_replaces_unsafe_chars() {
        assert_eq!(sanitize_slug("hello world!", SLUG_MAX_LEN), "hello-world-");
        assert_eq!(sanitize_slug("caf\u{e9}/latte", SLUG_MAX_LEN), "caf--latte");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "a".repeat(200);
        assert_eq!(sanitize_slug(&long, SLUG_MAX_LEN).len(), SLUG_MAX_LEN);
    }

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("Announcing Rust 1.75.0"), "announcing-rust-1-75-0");
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }
}

//! Small helpers shared by configuration, the HTTP client and the engine.

/// Trimmed text, or `None` when absent or blank.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

pub fn is_http_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.starts_with(scheme))
}

/// Server bodies quoted in error messages are cut to this many characters.
const QUOTED_BODY_CHARS: usize = 180;

pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(QUOTED_BODY_CHARS).collect()
}

/// `completed / total` as a whole percentage, rounded half up.
///
/// An empty task list counts as done.
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let scaled = (completed.min(total) * 200 + total) / (total * 2);
    u8::try_from(scaled).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_tokens_are_dropped() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some(" \t ".to_string())), None);
        assert_eq!(
            normalize_text_option(Some("  bearer-123\n".to_string())),
            Some("bearer-123".to_string())
        );
    }

    #[test]
    fn only_http_schemes_count_as_api_urls() {
        assert!(is_http_url("http://127.0.0.1:8080"));
        assert!(is_http_url("https://learn.example.com"));
        assert!(!is_http_url("ws://learn.example.com"));
        assert!(!is_http_url("learn.example.com"));
    }

    #[test]
    fn long_bodies_are_shortened() {
        let body = format!("  {}  ", "x".repeat(500));
        assert_eq!(compact_text(&body).len(), 180);
        assert_eq!(compact_text(" short "), "short");
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(0, 4), 0);
        assert_eq!(percent(1, 4), 25);
        assert_eq!(percent(3, 4), 75);
        assert_eq!(percent(4, 4), 100);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(9, 4), 100);
    }
}

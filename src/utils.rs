// Utility functions

/// Adds an `https://` scheme to bare host/path references.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    }
}

/// Display name from a product URL slug: `/drugs/dolo-650-tablet-81458` -> `Dolo 650 Tablet`.
pub fn slug_to_name(url: &str) -> String {
    let slug = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let slug = slug.split(['?', '#']).next().unwrap_or_default();
    let mut words: Vec<&str> = slug.split('-').filter(|w| !w.is_empty()).collect();
    // trailing numeric catalog id
    if words.len() > 1 && words.last().is_some_and(|w| w.chars().all(|c| c.is_ascii_digit())) {
        words.pop();
    }
    words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Caps a diagnostic message at `max` characters.
pub fn truncate_diagnostic(message: &str, max: usize) -> String {
    match message.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &message[..idx]),
        None => message.to_string(),
    }
}

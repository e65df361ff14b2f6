//! URL, text and time helpers shared by the pipeline stages.

/// URL utilities for feed entries
pub mod url {
    use url::Url;

    /// Network location (host plus explicit port) of a URL, if it has one.
    pub fn netloc(url_str: &str) -> Option<String> {
        let url = Url::parse(url_str.trim()).ok()?;
        let host = url.host_str().filter(|h| !h.is_empty())?;
        Some(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }

    /// Path component of a URL, ignoring scheme, host, query and fragment.
    /// Strings that are not absolute URLs are cut at the first `?` or `#`.
    pub fn path(url_str: &str) -> String {
        let trimmed = url_str.trim();
        match Url::parse(trimmed) {
            Ok(url) => url.path().to_string(),
            Err(_) => trimmed
                .split(|c: char| c == '?' || c == '#')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Validate feed URL format
    pub fn is_valid_rss_url(url_str: &str) -> bool {
        match Url::parse(url_str) {
            Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
            Err(_) => false,
        }
    }
}

/// Text utilities
pub mod text {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<.*?>").expect("valid tag regex"));

    /// Replace every markup tag with a single space.
    pub fn strip_html(html: &str) -> String {
        HTML_TAG.replace_all(html, " ").into_owned()
    }

    /// Case-insensitive substring test.
    pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// Time utilities for display
pub mod time {
    use chrono::{DateTime, Utc};

    /// Render as `YYYY-MM-DD HH:MM` by slicing the ISO-8601 form.
    pub fn format_display(timestamp: &DateTime<Utc>) -> String {
        let iso = timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        format!("{} {}", &iso[..10], &iso[11..16])
    }
}

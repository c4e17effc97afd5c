//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod progress;
pub mod time;

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static QUESTION_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"question-(\d+)").ok());

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Question number embedded in a discussion link (`...-question-12-...`).
///
/// Links without one yield 0 so they sort first.
pub fn question_number(link: &str) -> u64 {
    QUESTION_NUMBER
        .as_ref()
        .and_then(|re| re.captures(link))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Stable sort of links by their question number.
pub fn sort_by_question_number(links: &mut [String]) {
    links.sort_by_key(|link| question_number(link));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/discussions/servicenow/").unwrap();
        assert_eq!(
            resolve_url(&base, "/discussions/servicenow/view/1-exam-cad/"),
            "https://example.com/discussions/servicenow/view/1-exam-cad/"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_question_number() {
        assert_eq!(
            question_number("/view/81234-exam-cis-itsm-topic-1-question-17-discussion/"),
            17
        );
        assert_eq!(question_number("/view/81234-exam-cis-itsm-discussion/"), 0);
    }

    #[test]
    fn test_sort_by_question_number() {
        let mut links = vec![
            "/x-question-5/".to_string(),
            "/x-question-1/".to_string(),
            "/no-number-b/".to_string(),
            "/x-question-10/".to_string(),
            "/no-number-a/".to_string(),
        ];
        sort_by_question_number(&mut links);
        assert_eq!(
            links,
            vec![
                "/no-number-b/",
                "/no-number-a/",
                "/x-question-1/",
                "/x-question-5/",
                "/x-question-10/",
            ]
        );
    }
}

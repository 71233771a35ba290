//! Shared mirror rotation state.
//!
//! One [`MirrorRotation`] lives inside the provider instance and is shared by
//! every concurrent task. The lock is only held for list reads and pops, never
//! across a request.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use scraper::{Html, Selector};

/// Mirrors used when neither discovery nor configuration supplies any.
pub const DEFAULT_MIRRORS: [&str; 5] = [
    "https://sci-hub.se",
    "https://sci-hub.st",
    "https://sci-hub.ru",
    "https://sci-hub.wf",
    "https://sci-hub.do",
];

/// Page listing currently reachable mirrors.
pub const DEFAULT_MIRROR_DISCOVERY_URL: &str = "http://tool.yovisun.com/scihub/";

/// Ordered mirror list; the head is the current mirror.
#[derive(Debug)]
pub struct MirrorRotation {
    mirrors: Mutex<VecDeque<String>>,
}

impl MirrorRotation {
    /// Creates a rotation over `mirrors`, dropping blanks, trailing slashes, and duplicates.
    #[must_use]
    pub fn new<I, S>(mirrors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: VecDeque<String> = VecDeque::new();
        for mirror in mirrors {
            let mirror = normalize_mirror(mirror.as_ref());
            if !mirror.is_empty() && !list.contains(&mirror) {
                list.push_back(mirror);
            }
        }
        Self {
            mirrors: Mutex::new(list),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.mirrors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current mirror, if any remain.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.lock().front().cloned()
    }

    /// Number of mirrors left.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.lock().len()
    }

    /// Drops `failed` if it is still the current mirror and returns the new head.
    ///
    /// When another task already rotated past `failed` the list is left alone,
    /// so one bad mirror never costs two entries.
    pub fn advance_from(&self, failed: &str) -> Option<String> {
        let mut list = self.lock();
        if list.front().is_some_and(|head| head == failed) {
            list.pop_front();
        }
        list.front().cloned()
    }

    /// Copy of the current list, head first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }
}

fn normalize_mirror(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

/// Extracts mirror base URLs from a mirror-listing page.
///
/// Anchors whose `href` starts with `http` and mentions `sci-hub.` are taken in
/// document order, trailing slashes removed, duplicates dropped.
#[must_use]
pub fn parse_mirror_listing(html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut found: Vec<String> = Vec::new();
    for href in document
        .select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
    {
        let href = href.trim();
        if href.starts_with("http") && href.contains("sci-hub.") {
            let mirror = normalize_mirror(href);
            if !found.contains(&mirror) {
                found.push(mirror);
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_normalizes_and_dedupes() {
        let rotation = MirrorRotation::new(["https://a.se/", " https://a.se", "", "https://b.se"]);
        assert_eq!(rotation.snapshot(), vec!["https://a.se", "https://b.se"]);
        assert_eq!(rotation.current().as_deref(), Some("https://a.se"));
    }

    #[test]
    fn test_advance_pops_head_until_empty() {
        let rotation = MirrorRotation::new(["https://a.se", "https://b.se"]);
        assert_eq!(rotation.advance_from("https://a.se").as_deref(), Some("https://b.se"));
        assert_eq!(rotation.advance_from("https://b.se"), None);
        assert_eq!(rotation.remaining(), 0);
        assert_eq!(rotation.current(), None);
    }

    #[test]
    fn test_stale_advance_does_not_pop_new_head() {
        let rotation = MirrorRotation::new(["https://a.se", "https://b.se", "https://c.se"]);
        rotation.advance_from("https://a.se");
        // A second task that also saw a.se fail must not knock out b.se.
        assert_eq!(rotation.advance_from("https://a.se").as_deref(), Some("https://b.se"));
        assert_eq!(rotation.remaining(), 2);
    }

    #[test]
    fn test_concurrent_advances_pop_once() {
        let rotation = Arc::new(MirrorRotation::new(["https://a.se", "https://b.se"]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rotation = Arc::clone(&rotation);
                std::thread::spawn(move || {
                    rotation.advance_from("https://a.se");
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap_or_default();
        }
        assert_eq!(rotation.snapshot(), vec!["https://b.se"]);
    }

    #[test]
    fn test_parse_mirror_listing() {
        let html = r#"
            <ul>
              <li><a href="https://sci-hub.ru/">sci-hub.ru</a></li>
              <li><a href="https://sci-hub.st">sci-hub.st</a></li>
              <li><a href="https://sci-hub.ru">dup</a></li>
              <li><a href="/about">about</a></li>
              <li><a href="https://example.org">other</a></li>
            </ul>"#;
        assert_eq!(
            parse_mirror_listing(html),
            vec!["https://sci-hub.ru", "https://sci-hub.st"]
        );
    }

    #[test]
    fn test_parse_mirror_listing_empty_page() {
        assert!(parse_mirror_listing("<html></html>").is_empty());
    }
}

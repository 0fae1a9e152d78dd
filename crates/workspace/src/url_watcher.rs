//! URL detection in shell output.
//!
//! Each URL triggers its side action once per process lifetime of the
//! session that printed it.

use collections::{FxHashMap, FxHashSet};
use once_cell::sync::Lazy;
use platform::{Browser, Clipboard};
use regex::Regex;
use settings::constants::assistant::URL_HINTS;
use std::sync::Arc;
use terminal::SessionId;
use terminal_view::strip_ansi;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s)]+").unwrap());

/// URL-shaped substrings of `text`, in order.
pub fn find_urls(text: &str) -> impl Iterator<Item = &str> {
    URL_PATTERN.find_iter(text).map(|found| found.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// Login pages of the assistant, or its local dev server.
    Assistant,
    Generic,
}

impl UrlKind {
    pub fn of(url: &str) -> Self {
        if URL_HINTS.iter().any(|hint| url.contains(hint)) {
            UrlKind::Assistant
        } else {
            UrlKind::Generic
        }
    }
}

/// What to do with a newly seen URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UrlPolicy {
    /// Copy every URL to the clipboard.
    #[default]
    CopyToClipboard,
    /// Open assistant URLs in the browser, copy the rest. Falls back to the
    /// clipboard when the browser cannot be launched.
    OpenAssistantInBrowser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlAction {
    Copied,
    Opened,
    Failed,
}

/// A URL seen for the first time and what was done with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlNotice {
    pub url: String,
    pub kind: UrlKind,
    pub action: UrlAction,
}

impl UrlNotice {
    /// Line written back into the session's terminal. Only copies get one.
    pub fn status_line(&self) -> Option<String> {
        match (self.action, self.kind) {
            (UrlAction::Copied, UrlKind::Assistant) => Some(format!(
                "\r\n\x1b[32m✅ URL copied to clipboard: {}\x1b[0m\r\n",
                self.url
            )),
            (UrlAction::Copied, UrlKind::Generic) => Some(format!(
                "\r\n\x1b[36m📋 URL copied to clipboard: {}\x1b[0m\r\n",
                self.url
            )),
            _ => None,
        }
    }
}

/// Per-session URL deduplication plus the clipboard/browser side channel.
pub struct UrlWatcher {
    seen: FxHashMap<SessionId, FxHashSet<String>>,
    policy: UrlPolicy,
    clipboard: Arc<dyn Clipboard>,
    browser: Arc<dyn Browser>,
}

impl UrlWatcher {
    pub fn new(clipboard: Arc<dyn Clipboard>, browser: Arc<dyn Browser>) -> Self {
        Self {
            seen: FxHashMap::default(),
            policy: UrlPolicy::default(),
            clipboard,
            browser,
        }
    }

    pub fn with_policy(mut self, policy: UrlPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_policy(&mut self, policy: UrlPolicy) {
        self.policy = policy;
    }

    pub fn policy(&self) -> UrlPolicy {
        self.policy
    }

    /// Scan one output chunk from `id`. Returns a notice per URL not seen
    /// before in this process lifetime.
    ///
    /// URLs split across two chunks are not recognised.
    pub fn observe(&mut self, id: &SessionId, bytes: &[u8]) -> Vec<UrlNotice> {
        let text = String::from_utf8_lossy(bytes);
        if !text.contains("http") {
            return Vec::new();
        }
        let text = strip_ansi(&text);

        let mut notices = Vec::new();
        for url in find_urls(&text) {
            let seen = self.seen.entry(id.clone()).or_default();
            if !seen.insert(url.to_string()) {
                tracing::trace!(session = %id, url, "URL already handled");
                continue;
            }
            let kind = UrlKind::of(url);
            let action = self.act(id, url, kind);
            notices.push(UrlNotice {
                url: url.to_string(),
                kind,
                action,
            });
        }
        notices
    }

    fn act(&self, id: &SessionId, url: &str, kind: UrlKind) -> UrlAction {
        if kind == UrlKind::Assistant && self.policy == UrlPolicy::OpenAssistantInBrowser {
            match self.browser.open(url) {
                Ok(()) => return UrlAction::Opened,
                Err(e) => {
                    tracing::warn!(session = %id, url, "Opening URL failed, copying instead: {:#}", e)
                }
            }
        }

        match self.clipboard.write_text(url) {
            Ok(()) => {
                tracing::info!(session = %id, url, ?kind, "Copied URL to clipboard");
                UrlAction::Copied
            }
            Err(e) => {
                tracing::warn!(session = %id, url, "Copying URL failed: {:#}", e);
                UrlAction::Failed
            }
        }
    }

    /// Forget every URL seen for `id`. Called when its process goes away.
    pub fn reset(&mut self, id: &SessionId) {
        if let Some(seen) = self.seen.remove(id) {
            tracing::debug!(session = %id, count = seen.len(), "Cleared detected URLs");
        }
    }

    pub fn has_seen(&self, id: &SessionId, url: &str) -> bool {
        self.seen.get(id).is_some_and(|seen| seen.contains(url))
    }

    pub fn seen_count(&self, id: &SessionId) -> usize {
        self.seen.get(id).map_or(0, FxHashSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use platform::MemoryClipboard;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    mockall::mock! {
        Browser {}
        impl Browser for Browser {
            fn open(&self, url: &str) -> anyhow::Result<()>;
        }
    }

    fn watcher(clipboard: &MemoryClipboard, browser: MockBrowser) -> UrlWatcher {
        UrlWatcher::new(Arc::new(clipboard.clone()), Arc::new(browser))
    }

    fn no_browser() -> MockBrowser {
        let mut browser = MockBrowser::new();
        browser.expect_open().never();
        browser
    }

    #[test_case("see https://example.com/docs now", &["https://example.com/docs"] ; "plain")]
    #[test_case("(http://a.test/x) and http://b.test", &["http://a.test/x", "http://b.test"] ; "stops at paren")]
    #[test_case("ftp://nope and httpx://nope", &[] ; "other schemes")]
    fn finds_urls(text: &str, expected: &[&str]) {
        assert_eq!(find_urls(text).collect::<Vec<_>>(), expected);
    }

    #[test_case("https://claude.ai/oauth?code=1", UrlKind::Assistant ; "vendor login")]
    #[test_case("https://console.anthropic.com", UrlKind::Assistant ; "vendor console")]
    #[test_case("http://localhost:3000/", UrlKind::Assistant ; "dev server")]
    #[test_case("http://localhost:4000/", UrlKind::Generic ; "other port")]
    #[test_case("https://docs.rs", UrlKind::Generic ; "generic")]
    fn classifies(url: &str, expected: UrlKind) {
        assert_eq!(UrlKind::of(url), expected);
    }

    #[test]
    fn same_url_twice_acts_once() {
        let clipboard = MemoryClipboard::new();
        let mut watcher = watcher(&clipboard, no_browser());

        let first = watcher.observe(&SessionId::Exec, b"at http://localhost:4000/\r\n");
        let second = watcher.observe(&SessionId::Exec, b"again http://localhost:4000/\r\n");

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(clipboard.writes(), vec!["http://localhost:4000/".to_string()]);
    }

    #[test]
    fn sessions_have_separate_sets() {
        let clipboard = MemoryClipboard::new();
        let mut watcher = watcher(&clipboard, no_browser());

        watcher.observe(&SessionId::Main, b"https://example.com");
        assert!(watcher.has_seen(&SessionId::Main, "https://example.com"));
        assert_eq!(watcher.seen_count(&SessionId::Doctor), 0);

        let notices = watcher.observe(&SessionId::Doctor, b"https://example.com");
        assert_eq!(notices.len(), 1);
    }

    #[test]
    fn reset_lets_url_trigger_again() {
        let clipboard = MemoryClipboard::new();
        let mut watcher = watcher(&clipboard, no_browser());

        watcher.observe(&SessionId::Main, b"https://example.com");
        watcher.reset(&SessionId::Main);
        assert_eq!(watcher.seen_count(&SessionId::Main), 0);
        assert_eq!(watcher.observe(&SessionId::Main, b"https://example.com").len(), 1);
        assert_eq!(clipboard.writes().len(), 2);
    }

    #[test]
    fn color_codes_are_not_part_of_the_url() {
        let clipboard = MemoryClipboard::new();
        let mut watcher = watcher(&clipboard, no_browser());

        let notices = watcher.observe(
            &SessionId::Main,
            b"\x1b[36mhttps://example.com/login\x1b[0m\r\n",
        );
        assert_eq!(notices[0].url, "https://example.com/login");
    }

    #[test]
    fn status_lines_differ_by_kind() {
        let clipboard = MemoryClipboard::new();
        let mut watcher = watcher(&clipboard, no_browser());

        let notices = watcher.observe(
            &SessionId::Doctor,
            b"open https://claude.ai/login or https://example.com",
        );

        let lines: Vec<_> = notices.iter().filter_map(UrlNotice::status_line).collect();
        assert_eq!(
            lines,
            vec![
                "\r\n\x1b[32m✅ URL copied to clipboard: https://claude.ai/login\x1b[0m\r\n".to_string(),
                "\r\n\x1b[36m📋 URL copied to clipboard: https://example.com\x1b[0m\r\n".to_string(),
            ]
        );
    }

    #[test]
    fn browser_policy_opens_assistant_urls() {
        let clipboard = MemoryClipboard::new();
        let mut browser = MockBrowser::new();
        browser
            .expect_open()
            .withf(|url| url == "https://claude.ai/login")
            .times(1)
            .returning(|_| Ok(()));
        let mut watcher =
            watcher(&clipboard, browser).with_policy(UrlPolicy::OpenAssistantInBrowser);

        let notices = watcher.observe(&SessionId::Doctor, b"https://claude.ai/login https://x.test");

        assert_eq!(notices[0].action, UrlAction::Opened);
        assert_eq!(notices[0].status_line(), None);
        assert_eq!(notices[1].action, UrlAction::Copied);
        assert_eq!(clipboard.writes(), vec!["https://x.test".to_string()]);
    }

    #[test]
    fn browser_failure_falls_back_to_clipboard() {
        let clipboard = MemoryClipboard::new();
        let mut browser = MockBrowser::new();
        browser
            .expect_open()
            .returning(|_| Err(anyhow!("no display")));
        let mut watcher =
            watcher(&clipboard, browser).with_policy(UrlPolicy::OpenAssistantInBrowser);

        let notices = watcher.observe(&SessionId::Doctor, b"https://claude.ai/login");

        assert_eq!(notices[0].action, UrlAction::Copied);
        assert!(notices[0].status_line().is_some());
    }

    #[test]
    fn default_policy_never_opens_browser() {
        let clipboard = MemoryClipboard::new();
        let mut watcher = watcher(&clipboard, no_browser());
        assert_eq!(watcher.policy(), UrlPolicy::CopyToClipboard);

        let notices = watcher.observe(&SessionId::Doctor, b"https://claude.ai/login");
        assert_eq!(notices[0].action, UrlAction::Copied);
    }
}

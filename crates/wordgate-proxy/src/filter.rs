//! Request screening against the denylist.
//!
//! A pure rewrite step: no IO, no store mutation. The worker calls it once
//! for the URL check and a second time with `force` set when deep
//! inspection finds a denylisted word in a fetched HTML body.

use wordgate_core::PolicySnapshot;

use crate::error::{ProxyError, Result};
use crate::http::HttpRequest;

/// Outcome of screening a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// The request was left untouched.
    Forwarded,
    /// The target URL was replaced with the error-page URL.
    Rewritten,
}

/// Screens `request` against the snapshot, replacing its target with
/// `error_url` when a denylisted word occurs in the URL or when `force` is
/// set.
///
/// Headers and body are untouched, so the rewritten request differs from
/// the original only in the URL token. A request already targeting the
/// error page is left alone unless forced, which makes screening
/// idempotent. Rewriting anything but a GET is refused with
/// [`ProxyError::UnsupportedMethod`]; such a connection is torn down
/// without contacting the origin.
pub fn screen_request(
    request: &mut HttpRequest,
    policy: &PolicySnapshot,
    error_url: &str,
    force: bool,
) -> Result<FilterOutcome> {
    if !force {
        if request.target() == error_url {
            return Ok(FilterOutcome::Forwarded);
        }
        if !policy.matches(request.target()) {
            return Ok(FilterOutcome::Forwarded);
        }
    }

    if request.method() != "GET" {
        return Err(ProxyError::UnsupportedMethod(request.method().to_string()));
    }

    request.set_target(error_url);
    Ok(FilterOutcome::Rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordgate_core::PolicyStore;

    const ERROR_URL: &str = "http://blocked.example/error.html";

    fn snapshot_with(words: &[&str]) -> PolicySnapshot {
        let mut store = PolicyStore::new();
        for word in words {
            store.add(word).unwrap();
        }
        store.snapshot()
    }

    fn request(raw: &[u8]) -> HttpRequest {
        HttpRequest::parse(raw).unwrap()
    }

    #[test]
    fn clean_url_is_forwarded_unchanged() {
        let raw = b"GET http://example.test/open-page HTTP/1.1\r\nHost: example.test\r\n\r\n";
        let mut req = request(raw);
        let policy = snapshot_with(&["blocked"]);

        let outcome = screen_request(&mut req, &policy, ERROR_URL, false).unwrap();
        assert_eq!(outcome, FilterOutcome::Forwarded);
        assert_eq!(req.to_bytes(), raw);
    }

    #[test]
    fn denylisted_url_is_rewritten_to_error_page() {
        let mut req =
            request(b"GET http://example.test/blocked-page HTTP/1.1\r\nHost: example.test\r\n\r\n");
        let policy = snapshot_with(&["blocked"]);

        let outcome = screen_request(&mut req, &policy, ERROR_URL, false).unwrap();
        assert_eq!(outcome, FilterOutcome::Rewritten);
        assert_eq!(req.target(), ERROR_URL);
    }

    #[test]
    fn rewrite_preserves_method_version_and_headers() {
        let mut req = request(
            b"GET http://example.test/blocked HTTP/1.1\r\nHost: example.test\r\nAccept: */*\r\n\r\n",
        );
        let policy = snapshot_with(&["blocked"]);

        screen_request(&mut req, &policy, ERROR_URL, false).unwrap();
        let expected: Vec<u8> = format!(
            "GET {} HTTP/1.1\r\nHost: example.test\r\nAccept: */*\r\n\r\n",
            ERROR_URL
        )
        .into_bytes();
        assert_eq!(req.to_bytes(), expected);
    }

    #[test]
    fn screening_is_idempotent() {
        let mut req =
            request(b"GET http://example.test/blocked HTTP/1.1\r\nHost: example.test\r\n\r\n");
        let policy = snapshot_with(&["blocked"]);

        screen_request(&mut req, &policy, ERROR_URL, false).unwrap();
        let once = req.to_bytes();

        let outcome = screen_request(&mut req, &policy, ERROR_URL, false).unwrap();
        assert_eq!(outcome, FilterOutcome::Forwarded);
        assert_eq!(req.to_bytes(), once);
    }

    #[test]
    fn force_rewrites_a_clean_url() {
        let mut req =
            request(b"GET http://example.test/clean HTTP/1.1\r\nHost: example.test\r\n\r\n");
        let policy = snapshot_with(&["blocked"]);

        let outcome = screen_request(&mut req, &policy, ERROR_URL, true).unwrap();
        assert_eq!(outcome, FilterOutcome::Rewritten);
        assert_eq!(req.target(), ERROR_URL);
    }

    #[test]
    fn empty_policy_forwards_everything() {
        let mut req =
            request(b"GET http://example.test/anything HTTP/1.1\r\nHost: example.test\r\n\r\n");
        let policy = PolicySnapshot::default();

        let outcome = screen_request(&mut req, &policy, ERROR_URL, false).unwrap();
        assert_eq!(outcome, FilterOutcome::Forwarded);
    }

    #[test]
    fn rewriting_non_get_is_refused() {
        let mut req =
            request(b"POST http://example.test/blocked HTTP/1.1\r\nHost: example.test\r\n\r\n");
        let policy = snapshot_with(&["blocked"]);

        let err = screen_request(&mut req, &policy, ERROR_URL, false).unwrap_err();
        assert!(matches!(err, ProxyError::UnsupportedMethod(m) if m == "POST"));
    }

    #[test]
    fn clean_non_get_passes_screening() {
        // The method gate for unfiltered requests lives in the worker; the
        // filter itself only refuses to rewrite.
        let mut req =
            request(b"POST http://example.test/form HTTP/1.1\r\nHost: example.test\r\n\r\n");
        let policy = snapshot_with(&["blocked"]);

        let outcome = screen_request(&mut req, &policy, ERROR_URL, false).unwrap();
        assert_eq!(outcome, FilterOutcome::Forwarded);
    }
}

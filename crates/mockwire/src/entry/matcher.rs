//! Payload predicates deciding whether an entry answers a request.

/// Decides whether an entry can answer a given outbound payload.
///
/// This is the extension point for protocol-aware matching. Closures of
/// the form `Fn(&[u8]) -> bool` implement it directly.
pub trait Matcher: Send + Sync {
    fn matches(&self, payload: &[u8]) -> bool;
}

/// Accepts every payload sent to the entry's location.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Matcher for AcceptAll {
    fn matches(&self, _payload: &[u8]) -> bool {
        true
    }
}

impl<F> Matcher for F
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    fn matches(&self, payload: &[u8]) -> bool {
        self(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_all() {
        assert!(AcceptAll.matches(b""));
        assert!(AcceptAll.matches(b"GET / HTTP/1.1\r\n\r\n"));
    }

    #[test]
    fn test_closure_matcher() {
        let only_posts = |payload: &[u8]| payload.starts_with(b"POST ");
        assert!(only_posts.matches(b"POST /items HTTP/1.1\r\n"));
        assert!(!only_posts.matches(b"GET /items HTTP/1.1\r\n"));
    }
}

//! Registered expectations.
//!
//! An [`Entry`] binds a [`Location`] to an ordered sequence of canned
//! [`Response`]s and a [`Matcher`] deciding which payloads it answers.
//!
//! ## Module Structure
//!
//! - `types`: `Location`, `Response` and the `ResponseSpec` input forms
//! - `cursor`: sticky-last response cursor
//! - `matcher`: payload predicates

mod cursor;
mod matcher;
mod types;

pub use cursor::ResponseCursor;
pub use matcher::{AcceptAll, Matcher};
pub use types::{Location, Response, ResponseSpec};

use crate::registry::Registry;
use std::fmt;

/// An addressable expectation: where it applies, what it answers, and when.
pub struct Entry {
    location: Location,
    responses: Vec<Response>,
    cursor: ResponseCursor,
    matcher: Box<dyn Matcher>,
}

impl Entry {
    /// Create an entry answering with `responses` in order.
    ///
    /// An empty sequence normalizes to a single empty response.
    pub fn new<I, R>(location: impl Into<Location>, responses: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ResponseSpec>,
    {
        let mut responses: Vec<Response> = responses
            .into_iter()
            .map(|r| Response::from(r.into()))
            .collect();
        if responses.is_empty() {
            responses.push(Response::empty());
        }

        Self {
            location: location.into(),
            responses,
            cursor: ResponseCursor::new(),
            matcher: Box::new(AcceptAll),
        }
    }

    /// Create an entry with a single response.
    pub fn single(location: impl Into<Location>, response: impl Into<ResponseSpec>) -> Self {
        Self::new(location, [response])
    }

    /// Replace the default accept-all predicate.
    pub fn with_matcher(mut self, matcher: impl Matcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    pub fn can_handle(&self, payload: &[u8]) -> bool {
        self.matcher.matches(payload)
    }

    /// Add the payload to the registry's request history
    pub fn collect(&self, registry: &Registry, payload: &[u8]) {
        registry.record_request(self.location.clone(), payload);
    }

    /// Response at the cursor. The cursor stays on the last response once reached.
    pub fn next_response(&self) -> Response {
        let index = self.cursor.advance(self.responses.len());
        self.responses[index].clone()
    }

    /// Rewind to the first response
    pub fn rewind(&self) {
        self.cursor.reset();
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("location", &self.location)
            .field("responses", &self.responses.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_entry_cycles_then_sticks() {
        let entry = Entry::new(("api.example.com", 443), ["OK", "RETRY", "DONE"]);
        assert_eq!(entry.next_response().data(), b"OK");
        assert_eq!(entry.next_response().data(), b"RETRY");
        assert_eq!(entry.next_response().data(), b"DONE");
        assert_eq!(entry.next_response().data(), b"DONE");
    }

    #[test]
    fn test_entry_without_responses_yields_empty() {
        let entry = Entry::new(("localhost", 80), Vec::<String>::new());
        assert_eq!(entry.responses().len(), 1);
        assert!(entry.next_response().is_empty());
        assert!(entry.next_response().is_empty());
    }

    #[test]
    fn test_entry_single_mixed_forms() {
        let text = Entry::single(("localhost", 80), "hello");
        assert_eq!(text.next_response().data(), b"hello");

        let raw = Entry::single(("localhost", 80), vec![0xffu8, 0x00]);
        assert_eq!(raw.next_response().data(), &[0xff, 0x00]);
    }

    #[test]
    fn test_default_matcher_accepts_everything() {
        let entry = Entry::single(("localhost", 80), "x");
        assert!(entry.can_handle(b""));
        assert!(entry.can_handle(b"anything at all"));
    }

    #[test]
    fn test_custom_matcher() {
        let entry = Entry::single(("localhost", 80), "pong")
            .with_matcher(|payload: &[u8]| payload == b"ping");
        assert!(entry.can_handle(b"ping"));
        assert!(!entry.can_handle(b"pong"));
    }

    #[test]
    fn test_collect_records_into_registry() {
        let registry = Registry::new();
        let entry = Entry::single(("localhost", 80), "x");
        entry.collect(&registry, b"payload");

        let last = registry.last_request().unwrap();
        assert_eq!(last.payload.as_ref(), b"payload");
        assert_eq!(last.location, Location::new("localhost", 80));
    }

    #[test]
    fn test_rewind() {
        let entry = Entry::new(("localhost", 80), ["a", "b"]);
        let _ = entry.next_response();
        let _ = entry.next_response();
        entry.rewind();
        assert_eq!(entry.next_response().data(), b"a");
    }

    proptest! {
        #[test]
        fn prop_next_response_sticky_last(
            bodies in proptest::collection::vec("[a-z]{0,8}", 1..8),
            extra in 0usize..8,
        ) {
            let entry = Entry::new(("localhost", 80), bodies.clone());
            let n = bodies.len();
            for i in 0..n + extra {
                let expected = &bodies[i.min(n - 1)];
                let response = entry.next_response();
                prop_assert_eq!(response.data(), expected.as_bytes());
            }
        }
    }
}

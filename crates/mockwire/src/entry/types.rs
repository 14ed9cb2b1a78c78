//! Location and response payload types.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address an entry applies to. Identity key for entries and recorded sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub host: String,
    pub port: u16,
}

impl Location {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl From<(&str, u16)> for Location {
    fn from((host, port): (&str, u16)) -> Self {
        Self::new(host, port)
    }
}

impl From<(String, u16)> for Location {
    fn from((host, port): (String, u16)) -> Self {
        Self::new(host, port)
    }
}

/// Immutable byte payload returned to the caller for one matched request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Response(Bytes);

impl Response {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Raw bytes of the response
    pub fn data(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Accepted forms of a canned response, normalized to [`Response`] at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSpec {
    /// UTF-8 text, encoded to bytes
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Already a byte payload, taken as-is
    Response(Response),
}

impl From<ResponseSpec> for Response {
    fn from(spec: ResponseSpec) -> Self {
        match spec {
            ResponseSpec::Text(text) => Response::new(text.into_bytes()),
            ResponseSpec::Bytes(bytes) => Response::new(bytes),
            ResponseSpec::Response(response) => response,
        }
    }
}

impl From<&str> for ResponseSpec {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for ResponseSpec {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for ResponseSpec {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for ResponseSpec {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for ResponseSpec {
    fn from(bytes: &[u8; N]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<Response> for ResponseSpec {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display_and_conversions() {
        let loc = Location::from(("api.example.com", 443));
        assert_eq!(loc.to_string(), "api.example.com:443");
        assert_eq!(loc, Location::from(("api.example.com".to_string(), 443)));
    }

    #[test]
    fn test_response_spec_normalization() {
        assert_eq!(Response::from(ResponseSpec::from("OK")).data(), b"OK");
        assert_eq!(Response::from(ResponseSpec::from(vec![0u8, 1, 2])).data(), &[0, 1, 2]);
        assert_eq!(Response::from(ResponseSpec::from(b"raw")).data(), b"raw");

        let prebuilt = Response::new(&b"as-is"[..]);
        assert_eq!(Response::from(ResponseSpec::from(prebuilt.clone())), prebuilt);
    }

    #[test]
    fn test_empty_response() {
        let response = Response::empty();
        assert!(response.is_empty());
        assert_eq!(response.len(), 0);
    }
}

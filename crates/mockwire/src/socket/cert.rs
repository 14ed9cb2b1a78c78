//! Synthetic peer certificate for mocked TLS peers.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

const NOT_AFTER_FORMAT: &str = "%b %d %H:%M:%S %Y GMT";
const VALIDITY_DAYS: i64 = 30 * 12;

/// Certificate-like mapping with the fields hostname and expiry checks inspect.
///
/// Not a real certificate: nothing here is signed or verifiable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerCertificate {
    pub not_after: String,
    pub subject_alt_name: Vec<(String, String)>,
    pub subject: Vec<Vec<(String, String)>>,
}

impl PeerCertificate {
    pub fn for_host(host: &str) -> Self {
        Self::for_host_at(host, Utc::now())
    }

    pub fn for_host_at(host: &str, now: DateTime<Utc>) -> Self {
        let expiry = now + chrono::Duration::days(VALIDITY_DAYS);
        let wildcard = format!("*.{host}");
        Self {
            not_after: expiry.format(NOT_AFTER_FORMAT).to_string(),
            subject_alt_name: vec![
                ("DNS".to_string(), format!("*{host}")),
                ("DNS".to_string(), host.to_string()),
                ("DNS".to_string(), "*".to_string()),
            ],
            subject: vec![
                vec![("organizationName".to_string(), wildcard.clone())],
                vec![(
                    "organizationalUnitName".to_string(),
                    "Domain Control Validated".to_string(),
                )],
                vec![("commonName".to_string(), wildcard)],
            ],
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.not_after, NOT_AFTER_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Whether any DNS alt name covers `host`
    pub fn matches_host(&self, host: &str) -> bool {
        self.subject_alt_name
            .iter()
            .filter(|(kind, _)| kind == "DNS")
            .any(|(_, name)| match name.strip_prefix('*') {
                Some(suffix) => host.ends_with(suffix),
                None => name == host,
            })
    }

    pub fn common_name(&self) -> Option<&str> {
        self.subject
            .iter()
            .flatten()
            .find(|(key, _)| key == "commonName")
            .map(|(_, value)| value.as_str())
    }
}

//! Inbound request parsing.
//!
//! Everything here is pure extraction from transport headers and the query
//! string; no backend or store is consulted.

mod credentials;
mod query;

pub use credentials::Credentials;
pub use query::QueryParams;

use activesync_types::ProtocolError;
use axum::http::{header, HeaderMap};

/// Protocol version requested by the client.
pub const HEADER_PROTOCOL_VERSION: &str = "ms-asprotocolversion";
/// Policy key presented by the client.
pub const HEADER_POLICY_KEY: &str = "x-ms-policykey";
/// Multipart response negotiation.
pub const HEADER_ACCEPT_MULTIPART: &str = "ms-asacceptmultipart";

/// The ActiveSync-relevant subset of the request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    /// `MS-ASProtocolVersion`
    pub protocol_version: Option<String>,
    /// `X-MS-PolicyKey`
    pub policy_key: Option<u32>,
    /// `User-Agent`
    pub user_agent: Option<String>,
    /// `MS-ASAcceptMultiPart: T`
    pub accept_multipart: bool,
}

impl RequestHeaders {
    /// Extract the headers the core cares about.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ProtocolError> {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let policy_key = match text(HEADER_POLICY_KEY) {
            Some(raw) => Some(parse_policy_key(&raw)?),
            None => None,
        };

        Ok(Self {
            protocol_version: text(HEADER_PROTOCOL_VERSION),
            policy_key,
            user_agent: text(header::USER_AGENT.as_str()),
            accept_multipart: text(HEADER_ACCEPT_MULTIPART)
                .is_some_and(|v| v.eq_ignore_ascii_case("T")),
        })
    }
}

/// Parse a decimal policy key as sent in headers and plain query strings.
pub(crate) fn parse_policy_key(raw: &str) -> Result<u32, ProtocolError> {
    raw.trim().parse::<u32>().map_err(|_| ProtocolError::MalformedQuery {
        reason: format!("policy key '{}' is not a 32-bit integer", raw),
    })
}

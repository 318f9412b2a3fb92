//! Authentication material carried by the request.

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::QueryParams;

/// Username and password presented by the client. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login as sent, possibly `DOMAIN\user` or an email address
    pub username: String,
    /// Password; empty for certificate-authenticated clients
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Pull credentials from `Authorization: Basic`, falling back to the
    /// `User` query parameter. `None` when neither is usable.
    pub fn extract(headers: &HeaderMap, query: &QueryParams) -> Option<Self> {
        if let Some(creds) = Self::from_basic_auth(headers) {
            return Some(creds);
        }
        query
            .user
            .as_ref()
            .filter(|u| !u.is_empty())
            .map(|u| Self { username: u.clone(), password: String::new() })
    }

    fn from_basic_auth(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
        let (scheme, encoded) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let text = String::from_utf8(decoded).ok()?;
        let (username, password) = text.split_once(':')?;
        if username.is_empty() {
            return None;
        }
        Some(Self { username: username.to_string(), password: password.to_string() })
    }

    /// Split a `DOMAIN\user` login at the last backslash.
    pub fn split_domain(login: &str) -> (Option<&str>, &str) {
        match login.rfind('\\') {
            Some(pos) => (Some(&login[..pos]), &login[pos + 1..]),
            None => (None, login),
        }
    }
}

//! Protocol-mandated response headers.
//!
//! All of these are fixed before a handler writes any body bytes; handlers
//! that stream large payloads cannot prepend headers afterwards.

use axum::http::header::{HeaderName, HeaderValue, ALLOW, CACHE_CONTROL, CONTENT_TYPE, SERVER, WWW_AUTHENTICATE};
use axum::http::HeaderMap;

use activesync_types::ConfigError;

use crate::version::VersionResolver;

pub const HEADER_PUBLIC: &str = "public";
pub const HEADER_SERVER_ACTIVESYNC: &str = "ms-server-activesync";
pub const HEADER_PROTOCOL_VERSIONS: &str = "ms-asprotocolversions";
pub const HEADER_PROTOCOL_COMMANDS: &str = "ms-asprotocolcommands";
pub const HEADER_RP: &str = "x-ms-rp";

pub const CONTENT_TYPE_WBXML: &str = "application/vnd.ms-sync.wbxml";
pub const CONTENT_TYPE_MULTIPART: &str = "application/vnd.ms-sync.multipart";

const ALLOWED_METHODS: &str = "OPTIONS,POST";

/// Builds the capability, version and command headers for one request.
pub struct ResponseHeaderBuilder<'a> {
    product: &'a str,
    library_version: &'a str,
    versions: &'a VersionResolver,
}

impl<'a> ResponseHeaderBuilder<'a> {
    pub fn new(product: &'a str, library_version: &'a str, versions: &'a VersionResolver) -> Self {
        Self { product, library_version, versions }
    }

    /// `Allow`, `Server`, `Public` and `MS-Server-ActiveSync`, in that order.
    pub fn capability_headers(&self, headers: &mut HeaderMap) -> Result<(), ConfigError> {
        headers.insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        headers.insert(
            SERVER,
            value(&format!("{} Library v{}", self.product, self.library_version), "product_name")?,
        );
        headers.insert(HeaderName::from_static(HEADER_PUBLIC), HeaderValue::from_static(ALLOWED_METHODS));
        headers.insert(
            HeaderName::from_static(HEADER_SERVER_ACTIVESYNC),
            HeaderValue::from_static(self.versions.max_version().server_banner()),
        );
        Ok(())
    }

    /// `MS-ASProtocolVersions`.
    pub fn version_header(&self, headers: &mut HeaderMap) -> Result<(), ConfigError> {
        headers.insert(
            HeaderName::from_static(HEADER_PROTOCOL_VERSIONS),
            value(&self.versions.supported_versions(), "max_version")?,
        );
        Ok(())
    }

    /// `MS-ASProtocolCommands`.
    pub fn commands_header(&self, headers: &mut HeaderMap) -> Result<(), ConfigError> {
        headers.insert(
            HeaderName::from_static(HEADER_PROTOCOL_COMMANDS),
            value(&self.versions.supported_commands(), "max_version")?,
        );
        Ok(())
    }

    /// The three header groups an `OPTIONS` answer consists of.
    pub fn options_headers(&self) -> Result<HeaderMap, ConfigError> {
        let mut headers = HeaderMap::new();
        self.capability_headers(&mut headers)?;
        self.version_header(&mut headers)?;
        self.commands_header(&mut headers)?;
        Ok(headers)
    }

    /// `X-MS-RP`, announcing that newer versions are available.
    pub fn upgrade_header(&self, headers: &mut HeaderMap) -> Result<(), ConfigError> {
        headers.insert(
            HeaderName::from_static(HEADER_RP),
            value(&self.versions.supported_versions(), "max_version")?,
        );
        Ok(())
    }

    /// Headers of an authentication challenge.
    pub fn unauthorized_headers(&self, realm: &str) -> Result<HeaderMap, ConfigError> {
        let mut headers = self.options_headers()?;
        headers.insert(WWW_AUTHENTICATE, value(&format!("Basic realm=\"{}\"", realm), "realm")?);
        Ok(headers)
    }

    /// Headers of the "retry after provisioning" answer.
    pub fn provisioning_required_headers(&self) -> Result<HeaderMap, ConfigError> {
        let mut headers = self.options_headers()?;
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("private"));
        Ok(headers)
    }

    /// Default body content type.
    pub fn content_type(headers: &mut HeaderMap, multipart: bool) {
        let ct = if multipart { CONTENT_TYPE_MULTIPART } else { CONTENT_TYPE_WBXML };
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
    }

    /// Content type chosen by a handler.
    pub fn override_content_type(headers: &mut HeaderMap, content_type: &str) -> Result<(), ConfigError> {
        headers.insert(CONTENT_TYPE, value(content_type, "content_type")?);
        Ok(())
    }
}

fn value(raw: &str, field: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(raw).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("not a valid header value: {}", e),
    })
}

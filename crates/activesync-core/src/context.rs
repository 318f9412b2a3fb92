//! Per-request state.

use activesync_types::{Command, Device, GlobalStatus, ProtocolError, ProtocolVersion, ProvisioningMode};
use uuid::Uuid;

use crate::request::{QueryParams, RequestHeaders};
use crate::version::VersionResolver;
use crate::wbxml::WbxmlHeader;

/// Everything the dispatcher learns about one request, passed explicitly to
/// the registry, the gate and the command handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Short id used as the `[request_id]` log prefix
    pub request_id: String,
    pub headers: RequestHeaders,
    pub query: QueryParams,
    pub command: Option<Command>,
    /// Advertised ceiling for this request
    pub versions: VersionResolver,
    /// Authenticated backend user
    pub user: Option<String>,
    /// Login domain, if the client sent `DOMAIN\user`
    pub domain: Option<String>,
    /// Device resolved for (`device_id`, `user`)
    pub device: Option<Device>,
    /// Sticky status that command handlers report in their response body
    pub global_error: Option<GlobalStatus>,
    /// The device should be told about newer protocol versions (`X-MS-RP`)
    pub announce_upgrade: bool,
    pub provisioning: ProvisioningMode,
    /// Parsed preamble of the request body
    pub wbxml: Option<WbxmlHeader>,
    version: Option<ProtocolVersion>,
}

impl RequestContext {
    pub fn new(headers: RequestHeaders, query: QueryParams, max_version: ProtocolVersion) -> Self {
        let request_id = Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            request_id,
            headers,
            query,
            command: None,
            versions: VersionResolver::new(max_version),
            user: None,
            domain: None,
            device: None,
            global_error: None,
            announce_upgrade: false,
            provisioning: ProvisioningMode::default(),
            wbxml: None,
            version: None,
        }
    }

    /// Negotiated protocol version, resolved on first use.
    pub fn protocol_version(&mut self) -> Result<ProtocolVersion, ProtocolError> {
        if let Some(version) = self.version {
            return Ok(version);
        }
        let version = VersionResolver::resolve(&self.headers, &self.query)?;
        self.version = Some(version);
        Ok(version)
    }

    /// Version already negotiated by [`Self::protocol_version`].
    pub fn negotiated_version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    pub fn device_id(&self) -> Option<&str> {
        self.query.device_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers.user_agent.as_deref()
    }

    /// Normalized device type from the query, empty when the client sent none.
    pub fn device_type(&self) -> &str {
        self.query.device_type.as_deref().unwrap_or_default()
    }

    /// Policy key presented by the client: header first, then query.
    pub fn presented_policy_key(&self) -> Option<u32> {
        self.headers.policy_key.or(self.query.policy_key)
    }

    /// Multipart responses were negotiated by header or query.
    pub fn multipart(&self) -> bool {
        self.headers.accept_multipart || self.query.accept_multipart
    }

    /// Record a global status; the first one set wins.
    pub fn set_global_error(&mut self, status: GlobalStatus) {
        if self.global_error.is_none() {
            self.global_error = Some(status);
        }
    }
}

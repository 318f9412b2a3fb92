//! Protocol version resolution and the advertised ceiling.

use activesync_types::{Command, ProtocolError, ProtocolVersion};

use crate::request::{QueryParams, RequestHeaders};

/// Per-request view of which versions and commands the server offers.
///
/// The ceiling starts at the administrator's `max_version` and may only be
/// lowered (by the backend's version callback), never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionResolver {
    max_version: ProtocolVersion,
}

impl VersionResolver {
    pub fn new(max_version: ProtocolVersion) -> Self {
        Self { max_version }
    }

    /// Version requested by the client: header first, then `ProtVer`, else 1.0.
    pub fn resolve(
        headers: &RequestHeaders,
        query: &QueryParams,
    ) -> Result<ProtocolVersion, ProtocolError> {
        match headers.protocol_version.as_deref().or(query.protocol_version.as_deref()) {
            Some(raw) => raw.parse(),
            None => Ok(ProtocolVersion::LOWEST),
        }
    }

    pub fn max_version(&self) -> ProtocolVersion {
        self.max_version
    }

    /// Apply a backend-imposed ceiling. Values above the current ceiling or
    /// below the oldest advertisable version are ignored.
    pub fn lower_ceiling(&mut self, ceiling: ProtocolVersion) -> bool {
        if ceiling < self.max_version && ceiling >= ProtocolVersion::V2_5 {
            self.max_version = ceiling;
            return true;
        }
        false
    }

    /// `MS-ASProtocolVersions` value.
    pub fn supported_versions(&self) -> String {
        ProtocolVersion::advertised_header(self.max_version)
    }

    /// `MS-ASProtocolCommands` value.
    pub fn supported_commands(&self) -> String {
        Command::supported_header(self.max_version)
    }
}

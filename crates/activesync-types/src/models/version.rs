//! EAS protocol versions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Exchange ActiveSync protocol version.
///
/// Variants are declared in ascending order so the derived `Ord` is the
/// protocol order: `V2_5 < V12_0 < V14_1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "2.0")]
    V2_0,
    #[serde(rename = "2.1")]
    V2_1,
    #[serde(rename = "2.5")]
    V2_5,
    #[serde(rename = "12.0")]
    V12_0,
    #[serde(rename = "12.1")]
    V12_1,
    #[serde(rename = "14.0")]
    V14_0,
    #[serde(rename = "14.1")]
    V14_1,
}

impl ProtocolVersion {
    /// Every version the parser understands, ascending.
    pub const ALL: [Self; 8] = [
        Self::V1_0,
        Self::V2_0,
        Self::V2_1,
        Self::V2_5,
        Self::V12_0,
        Self::V12_1,
        Self::V14_0,
        Self::V14_1,
    ];

    /// Versions the server may advertise in `MS-ASProtocolVersions`, ascending.
    pub const ADVERTISED: [Self; 5] =
        [Self::V2_5, Self::V12_0, Self::V12_1, Self::V14_0, Self::V14_1];

    /// Assumed when the client names no version.
    pub const LOWEST: Self = Self::V1_0;

    /// Newest version this server implements.
    pub const LATEST: Self = Self::V14_1;

    /// Versions at or below this one cannot carry a soft global status code.
    pub const GRACEFUL_ERROR_CUTOFF: Self = Self::V12_1;

    /// Wire representation, e.g. `"12.1"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1_0 => "1.0",
            Self::V2_0 => "2.0",
            Self::V2_1 => "2.1",
            Self::V2_5 => "2.5",
            Self::V12_0 => "12.0",
            Self::V12_1 => "12.1",
            Self::V14_0 => "14.0",
            Self::V14_1 => "14.1",
        }
    }

    /// Decode the version byte of a base64 encoded query (version times ten).
    pub const fn from_encoded(byte: u8) -> Option<Self> {
        match byte {
            10 => Some(Self::V1_0),
            20 => Some(Self::V2_0),
            21 => Some(Self::V2_1),
            25 => Some(Self::V2_5),
            120 => Some(Self::V12_0),
            121 => Some(Self::V12_1),
            140 => Some(Self::V14_0),
            141 => Some(Self::V14_1),
            _ => None,
        }
    }

    /// Whether a policy denial can be reported through a global status code
    /// instead of aborting the exchange.
    pub fn supports_global_status(self) -> bool {
        self > Self::GRACEFUL_ERROR_CUTOFF
    }

    /// Value of the `MS-Server-ActiveSync` banner when this is the configured maximum.
    pub const fn server_banner(self) -> &'static str {
        match self {
            Self::V1_0 | Self::V2_0 | Self::V2_1 | Self::V2_5 => "6.5.7638.1",
            Self::V12_0 => "12.0",
            Self::V12_1 => "12.1",
            Self::V14_0 => "14.0",
            Self::V14_1 => "14.2",
        }
    }

    /// Advertised versions up to and including `max`, ascending.
    pub fn advertised_up_to(max: Self) -> Vec<Self> {
        Self::ADVERTISED.into_iter().filter(|v| *v <= max).collect()
    }

    /// Comma-joined advertised versions, ready for header emission.
    pub fn advertised_header(max: Self) -> String {
        Self::advertised_up_to(max).iter().map(|v| v.as_str()).collect::<Vec<_>>().join(",")
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::LATEST
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolVersion {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == trimmed)
            .ok_or_else(|| ProtocolError::UnsupportedVersion { value: trimmed.to_string() })
    }
}

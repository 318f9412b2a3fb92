//! Per-device, per-user protocol state.
//!
//! A `Device` is addressed by the pair (`id`, `user`): one handset may hold
//! independent state for several accounts. The descriptive fields
//! (`user_agent`, `device_type`, `rwstatus`, `blocked`) belong to the handset,
//! while `policykey`, `version` and `last_seen` belong to the account binding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProtocolVersion;

/// Remote-wipe state of a handset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteWipeStatus {
    /// Device does not take part in remote wipe
    #[default]
    NotApplicable,
    /// Device acknowledged provisioning, no wipe requested
    Ok,
    /// Administrator requested a wipe that has not been delivered yet
    Pending,
    /// Device confirmed the wipe
    Wiped,
}

impl RemoteWipeStatus {
    /// Storage code of the status.
    pub const fn code(self) -> i64 {
        match self {
            Self::NotApplicable => 0,
            Self::Ok => 1,
            Self::Pending => 2,
            Self::Wiped => 4,
        }
    }

    /// Inverse of [`Self::code`]; unknown codes read as not applicable.
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Ok,
            2 => Self::Pending,
            4 => Self::Wiped,
            _ => Self::NotApplicable,
        }
    }
}

/// Normalize a client-supplied device type token.
///
/// `PPC` becomes `PocketPC`, `WP`/`WP8` become `WindowsPhone` and anything
/// starting with `android` becomes `android`. Matching ignores case; other
/// tokens pass through unchanged.
pub fn normalize_device_type(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    match lower.as_str() {
        "ppc" => "PocketPC".to_string(),
        "wp" | "wp8" => "WindowsPhone".to_string(),
        _ if lower.starts_with("android") => "android".to_string(),
        _ => raw.to_string(),
    }
}

/// One client binding to one backend account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device identifier, always uppercase
    pub id: String,

    /// Backend username owning this binding
    pub user: String,

    /// Protocol version last negotiated, if any
    pub version: Option<ProtocolVersion>,

    /// Acknowledged policy key; 0 means no policy applied yet
    pub policykey: u32,

    /// Remote-wipe status of the handset
    pub rwstatus: RemoteWipeStatus,

    /// `User-Agent` of the client; `None` once state was purged externally
    pub user_agent: Option<String>,

    /// Normalized device type
    pub device_type: String,

    /// Administrator block flag
    pub blocked: bool,

    /// Supported-versions list last announced to this device
    pub announced_versions: Option<String>,

    /// Time the binding was last saved
    pub last_seen: Option<DateTime<Utc>>,
}

impl Device {
    /// Creates an empty binding with a normalized id.
    pub fn new(id: &str, user: &str) -> Self {
        Self {
            id: Self::normalize_id(id),
            user: user.to_string(),
            version: None,
            policykey: 0,
            rwstatus: RemoteWipeStatus::NotApplicable,
            user_agent: None,
            device_type: String::new(),
            blocked: false,
            announced_versions: None,
            last_seen: None,
        }
    }

    /// Device ids are case-insensitive on the wire; state is keyed on uppercase.
    pub fn normalize_id(id: &str) -> String {
        id.trim().to_ascii_uppercase()
    }

    /// Whether the stored state still carries a user agent.
    ///
    /// A missing agent means the state was removed behind our back.
    pub fn has_user_agent(&self) -> bool {
        self.user_agent.as_deref().is_some_and(|ua| !ua.is_empty())
    }

    /// Whether an administrator requested a wipe that is not delivered yet.
    pub fn is_wipe_pending(&self) -> bool {
        self.rwstatus == RemoteWipeStatus::Pending
    }

    /// Records `supported` as announced and reports whether it differs from
    /// the list announced last time.
    ///
    /// The first announcement only records the list.
    pub fn needs_version_update(&mut self, supported: &str) -> bool {
        match self.announced_versions.as_deref() {
            None | Some("") => {
                self.announced_versions = Some(supported.to_string());
                false
            },
            Some(previous) if previous != supported => {
                self.announced_versions = Some(supported.to_string());
                true
            },
            Some(_) => false,
        }
    }
}

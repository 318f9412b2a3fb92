//! EAS command names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ProtocolVersion;
use crate::error::ProtocolError;

/// A command a device can issue against the ActiveSync endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Sync,
    SendMail,
    SmartForward,
    SmartReply,
    GetAttachment,
    GetHierarchy,
    CreateCollection,
    DeleteCollection,
    MoveCollection,
    FolderSync,
    FolderCreate,
    FolderDelete,
    FolderUpdate,
    MoveItems,
    GetItemEstimate,
    MeetingResponse,
    Search,
    Settings,
    Ping,
    ItemOperations,
    Provision,
    ResolveRecipients,
    ValidateCert,
    Options,
    Autodiscover,
}

/// Commands advertised when the configured maximum is 2.5 or lower.
const LEGACY_COMMANDS: &[Command] = &[
    Command::Sync,
    Command::SendMail,
    Command::SmartForward,
    Command::SmartReply,
    Command::GetAttachment,
    Command::GetHierarchy,
    Command::CreateCollection,
    Command::DeleteCollection,
    Command::MoveCollection,
    Command::FolderSync,
    Command::FolderCreate,
    Command::FolderDelete,
    Command::FolderUpdate,
    Command::MoveItems,
    Command::GetItemEstimate,
    Command::MeetingResponse,
    Command::ResolveRecipients,
    Command::ValidateCert,
    Command::Provision,
    Command::Search,
    Command::Ping,
];

/// Commands advertised for 12.0 and every newer maximum.
const CURRENT_COMMANDS: &[Command] = &[
    Command::Sync,
    Command::SendMail,
    Command::SmartForward,
    Command::SmartReply,
    Command::GetAttachment,
    Command::GetHierarchy,
    Command::CreateCollection,
    Command::DeleteCollection,
    Command::MoveCollection,
    Command::FolderSync,
    Command::FolderCreate,
    Command::FolderDelete,
    Command::FolderUpdate,
    Command::MoveItems,
    Command::GetItemEstimate,
    Command::MeetingResponse,
    Command::Search,
    Command::Settings,
    Command::Ping,
    Command::ItemOperations,
    Command::Provision,
    Command::ResolveRecipients,
    Command::ValidateCert,
];

impl Command {
    const ALL: [Self; 25] = [
        Self::Sync,
        Self::SendMail,
        Self::SmartForward,
        Self::SmartReply,
        Self::GetAttachment,
        Self::GetHierarchy,
        Self::CreateCollection,
        Self::DeleteCollection,
        Self::MoveCollection,
        Self::FolderSync,
        Self::FolderCreate,
        Self::FolderDelete,
        Self::FolderUpdate,
        Self::MoveItems,
        Self::GetItemEstimate,
        Self::MeetingResponse,
        Self::Search,
        Self::Settings,
        Self::Ping,
        Self::ItemOperations,
        Self::Provision,
        Self::ResolveRecipients,
        Self::ValidateCert,
        Self::Options,
        Self::Autodiscover,
    ];

    /// Wire name of the command.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "Sync",
            Self::SendMail => "SendMail",
            Self::SmartForward => "SmartForward",
            Self::SmartReply => "SmartReply",
            Self::GetAttachment => "GetAttachment",
            Self::GetHierarchy => "GetHierarchy",
            Self::CreateCollection => "CreateCollection",
            Self::DeleteCollection => "DeleteCollection",
            Self::MoveCollection => "MoveCollection",
            Self::FolderSync => "FolderSync",
            Self::FolderCreate => "FolderCreate",
            Self::FolderDelete => "FolderDelete",
            Self::FolderUpdate => "FolderUpdate",
            Self::MoveItems => "MoveItems",
            Self::GetItemEstimate => "GetItemEstimate",
            Self::MeetingResponse => "MeetingResponse",
            Self::Search => "Search",
            Self::Settings => "Settings",
            Self::Ping => "Ping",
            Self::ItemOperations => "ItemOperations",
            Self::Provision => "Provision",
            Self::ResolveRecipients => "ResolveRecipients",
            Self::ValidateCert => "ValidateCert",
            Self::Options => "Options",
            Self::Autodiscover => "Autodiscover",
        }
    }

    /// Decode the command byte of a base64 encoded query.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Sync),
            1 => Some(Self::SendMail),
            2 => Some(Self::SmartForward),
            3 => Some(Self::SmartReply),
            4 => Some(Self::GetAttachment),
            5 => Some(Self::GetHierarchy),
            6 => Some(Self::CreateCollection),
            7 => Some(Self::DeleteCollection),
            8 => Some(Self::MoveCollection),
            9 => Some(Self::FolderSync),
            10 => Some(Self::FolderCreate),
            11 => Some(Self::FolderDelete),
            12 => Some(Self::FolderUpdate),
            13 => Some(Self::MoveItems),
            14 => Some(Self::GetItemEstimate),
            15 => Some(Self::MeetingResponse),
            16 => Some(Self::Search),
            17 => Some(Self::Settings),
            18 => Some(Self::Ping),
            19 => Some(Self::ItemOperations),
            20 => Some(Self::Provision),
            21 => Some(Self::ResolveRecipients),
            22 => Some(Self::ValidateCert),
            _ => None,
        }
    }

    /// The command whose handler serves this one.
    ///
    /// FolderCreate's handler implements create, update and delete of a folder.
    pub const fn handler_family(self) -> Self {
        match self {
            Self::FolderDelete | Self::FolderUpdate => Self::FolderCreate,
            other => other,
        }
    }

    /// Commands that may run before the device has acknowledged the current policy.
    pub const fn is_provisioning_exempt(self) -> bool {
        matches!(self, Self::Provision | Self::Autodiscover | Self::Options)
    }

    /// Commands advertised for the given configured maximum version.
    pub fn supported_for(max: ProtocolVersion) -> &'static [Self] {
        if max < ProtocolVersion::V12_0 {
            LEGACY_COMMANDS
        } else {
            CURRENT_COMMANDS
        }
    }

    /// Comma-joined command list, ready for header emission.
    pub fn supported_header(max: ProtocolVersion) -> String {
        Self::supported_for(max).iter().map(|c| c.as_str()).collect::<Vec<_>>().join(",")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProtocolError::UnknownCommand { name: s.to_string() })
    }
}

//! Request malformation errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a client request cannot be interpreted.
///
/// All of these abort the exchange with an "invalid request" style response.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ProtocolError {
    /// A command other than Options arrived without a device id
    #[error("Device failed to send device id: device id is required")]
    MissingDeviceId,

    /// No command name was supplied at all
    #[error("No command was specified")]
    MissingCommand,

    /// Command name is not part of the protocol
    #[error("{name} not supported")]
    UnknownCommand {
        /// Command name as sent by the client
        name: String,
    },

    /// Command is known but no handler is registered for it
    #[error("{command} is not implemented by this server")]
    NotImplemented {
        /// Wire name of the command
        command: String,
    },

    /// Protocol version string did not match any known version
    #[error("Unsupported protocol version: {value}")]
    UnsupportedVersion {
        /// Raw version string
        value: String,
    },

    /// The base64 encoded query blob was truncated or invalid
    #[error("Malformed encoded query: {reason}")]
    MalformedQuery {
        /// What was wrong with the blob
        reason: String,
    },

    /// The WBXML framing header could not be parsed
    #[error("Malformed WBXML header: {reason}")]
    MalformedWbxml {
        /// What was wrong with the header
        reason: String,
    },
}

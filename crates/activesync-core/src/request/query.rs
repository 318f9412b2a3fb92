//! Query-string parameters, plain or base64 encoded.
//!
//! Clients either send readable parameters (`?Cmd=Sync&DeviceId=...`) or a
//! single base64 blob packing the same fields in binary form:
//!
//! ```text
//! u8  protocol version * 10
//! u8  command code
//! u16 locale (little endian)
//! u8  len, [len] device id (raw bytes, hex encoded here)
//! u8  len, [len] policy key (u32 little endian when len == 4)
//! u8  len, [len] device type
//! ( u8 tag, u8 len, [len] value )*   command parameters
//! ```

use activesync_types::{normalize_device_type, Command, ProtocolError, ProtocolVersion};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use std::fmt::Write;

use super::parse_policy_key;

/// Keys that mark a query string as the readable form.
const PLAIN_KEYS: &[&str] = &["Cmd", "DeviceId", "DeviceType", "User", "ProtVer", "PolicyKey"];

const TAG_ATTACHMENT_NAME: u8 = 0;
const TAG_COLLECTION_ID: u8 = 1;
const TAG_ITEM_ID: u8 = 3;
const TAG_LONG_ID: u8 = 4;
const TAG_OCCURRENCE: u8 = 6;
const TAG_OPTIONS: u8 = 7;
const TAG_USER: u8 = 8;

const OPTION_SAVE_IN_SENT: u8 = 0x01;
const OPTION_ACCEPT_MULTIPART: u8 = 0x02;

/// Decoded request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// Command name as sent
    pub cmd: Option<String>,
    /// Device id, uppercase
    pub device_id: Option<String>,
    /// Normalized device type
    pub device_type: Option<String>,
    /// Protocol version string
    pub protocol_version: Option<String>,
    /// Presented policy key
    pub policy_key: Option<u32>,
    /// Multipart response requested
    pub accept_multipart: bool,
    /// User name for certificate-authenticated clients
    pub user: Option<String>,
    /// Client locale (encoded form only)
    pub locale: Option<u16>,
    pub attachment_name: Option<String>,
    pub collection_id: Option<String>,
    pub item_id: Option<String>,
    pub long_id: Option<String>,
    pub occurrence: Option<String>,
    /// Keep a copy of sent mail
    pub save_in_sent: bool,
    /// Whether the parameters came from the base64 form
    pub encoded: bool,
}

impl QueryParams {
    /// Parse a raw query string (without the leading `?`).
    pub fn parse(raw: Option<&str>) -> Result<Self, ProtocolError> {
        let raw = match raw.map(str::trim) {
            Some(r) if !r.is_empty() => r,
            _ => return Ok(Self::default()),
        };

        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(raw.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if pairs.iter().any(|(k, _)| PLAIN_KEYS.contains(&k.as_str())) {
            Self::from_pairs(pairs)
        } else {
            Self::decode_base64(raw)
        }
    }

    fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, ProtocolError> {
        let mut params = Self::default();
        for (key, value) in pairs {
            let value = value.trim().to_string();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "Cmd" => params.cmd = Some(value),
                "DeviceId" => params.device_id = Some(value.to_ascii_uppercase()),
                "DeviceType" => params.device_type = Some(normalize_device_type(&value)),
                "ProtVer" => params.protocol_version = Some(value),
                "PolicyKey" => params.policy_key = Some(parse_policy_key(&value)?),
                "AcceptMultiPart" => params.accept_multipart = true,
                "User" => params.user = Some(value),
                "AttachmentName" => params.attachment_name = Some(value),
                "CollectionId" => params.collection_id = Some(value),
                "ItemId" => params.item_id = Some(value),
                "LongId" => params.long_id = Some(value),
                "Occurrence" => params.occurrence = Some(value),
                "SaveInSent" => params.save_in_sent = value.eq_ignore_ascii_case("T"),
                _ => {},
            }
        }
        Ok(params)
    }

    fn decode_base64(raw: &str) -> Result<Self, ProtocolError> {
        let text = percent_decode(raw)?;
        let bytes = STANDARD
            .decode(text.as_bytes())
            .or_else(|_| STANDARD_NO_PAD.decode(text.trim_end_matches('=').as_bytes()))
            .map_err(|e| malformed(format!("invalid base64: {}", e)))?;

        let mut cursor = Cursor { bytes: &bytes, pos: 0 };
        let mut params = Self { encoded: true, ..Self::default() };

        let version = cursor.byte("protocol version")?;
        params.protocol_version = Some(
            ProtocolVersion::from_encoded(version)
                .map(|v| v.as_str().to_string())
                .ok_or_else(|| malformed(format!("unknown protocol version byte {}", version)))?,
        );

        let code = cursor.byte("command code")?;
        let command =
            Command::from_code(code).ok_or_else(|| malformed(format!("unknown command code {}", code)))?;
        params.cmd = Some(command.as_str().to_string());

        let locale = cursor.take(2, "locale")?;
        params.locale = Some(u16::from_le_bytes([locale[0], locale[1]]));

        let device_id = cursor.length_prefixed("device id")?;
        if !device_id.is_empty() {
            params.device_id = Some(hex_upper(device_id));
        }

        let policy_key = cursor.length_prefixed("policy key")?;
        params.policy_key = match policy_key.len() {
            0 => None,
            4 => Some(u32::from_le_bytes([policy_key[0], policy_key[1], policy_key[2], policy_key[3]])),
            n => return Err(malformed(format!("policy key length {}", n))),
        };

        let device_type = cursor.length_prefixed("device type")?;
        if !device_type.is_empty() {
            params.device_type = Some(normalize_device_type(&String::from_utf8_lossy(device_type)));
        }

        while !cursor.is_empty() {
            let tag = cursor.byte("parameter tag")?;
            let value = cursor.length_prefixed("parameter value")?;
            let text = || String::from_utf8_lossy(value).into_owned();
            match tag {
                TAG_ATTACHMENT_NAME => params.attachment_name = Some(text()),
                TAG_COLLECTION_ID => params.collection_id = Some(text()),
                TAG_ITEM_ID => params.item_id = Some(text()),
                TAG_LONG_ID => params.long_id = Some(text()),
                TAG_OCCURRENCE => params.occurrence = Some(text()),
                TAG_OPTIONS => {
                    let flags = value.first().copied().unwrap_or(0);
                    params.save_in_sent = flags & OPTION_SAVE_IN_SENT != 0;
                    params.accept_multipart = flags & OPTION_ACCEPT_MULTIPART != 0;
                },
                TAG_USER => params.user = Some(text()),
                other => tracing::debug!("Ignoring unknown encoded query tag {}", other),
            }
        }

        Ok(params)
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn byte(&mut self, what: &str) -> Result<u8, ProtocolError> {
        let slice = self.take(1, what)?;
        Ok(slice[0])
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos + len;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| malformed(format!("truncated before {}", what)))?;
        self.pos = end;
        Ok(slice)
    }

    fn length_prefixed(&mut self, what: &str) -> Result<&'a [u8], ProtocolError> {
        let len = self.byte(what)? as usize;
        self.take(len, what)
    }
}

fn malformed(reason: String) -> ProtocolError {
    ProtocolError::MalformedQuery { reason }
}

fn hex_upper(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02X}", b);
    }
    out
}

/// Undo `%XX` escapes; `+` is a base64 character here, not a space.
fn percent_decode(raw: &str) -> Result<String, ProtocolError> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = raw
                .get(i + 1..i + 3)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| malformed("invalid percent escape".to_string()))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| malformed("query is not UTF-8".to_string()))
}

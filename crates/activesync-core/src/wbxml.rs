//! WBXML document header.
//!
//! Only the preamble is decoded here so the dispatcher can reject garbage
//! bodies early; element decoding belongs to the command handlers.

use activesync_types::ProtocolError;

/// Longest legal multi-byte integer (five 7-bit groups fit a u32).
const MB_UINT32_MAX_BYTES: usize = 5;

/// Decoded WBXML preamble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WbxmlHeader {
    pub version: u8,
    pub public_id: u32,
    /// Set when the public id refers into the string table
    pub public_string_id: Option<u32>,
    pub charset: u32,
    pub string_table: Vec<u8>,
    /// Offset of the first body token
    pub body_offset: usize,
}

/// Read the header of a WBXML document. An empty body yields `None`.
pub fn read_wbxml_header(body: &[u8]) -> Result<Option<WbxmlHeader>, ProtocolError> {
    if body.is_empty() {
        return Ok(None);
    }

    let mut reader = Reader { buf: body, pos: 0 };
    let version = reader.byte()?;

    // A zero public id means the actual id follows as a string table index.
    let public_id = reader.mb_u_int32()?;
    let public_string_id = if public_id == 0 { Some(reader.mb_u_int32()?) } else { None };

    let charset = reader.mb_u_int32()?;
    let table_len = reader.mb_u_int32()? as usize;
    let string_table = reader.take(table_len)?.to_vec();

    Ok(Some(WbxmlHeader {
        version,
        public_id,
        public_string_id,
        charset,
        string_table,
        body_offset: reader.pos,
    }))
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Result<u8, ProtocolError> {
        let b = *self.buf.get(self.pos).ok_or_else(|| truncated("header"))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.buf.len());
        let end = end.ok_or_else(|| truncated("string table"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn mb_u_int32(&mut self) -> Result<u32, ProtocolError> {
        let mut value: u32 = 0;
        for _ in 0..MB_UINT32_MAX_BYTES {
            let b = self.byte()?;
            value = (value << 7) | u32::from(b & 0x7f);
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ProtocolError::MalformedWbxml {
            reason: "multi-byte integer longer than 5 bytes".to_string(),
        })
    }
}

fn truncated(part: &str) -> ProtocolError {
    ProtocolError::MalformedWbxml { reason: format!("truncated {}", part) }
}

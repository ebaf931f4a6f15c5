//! Inbound frame decoding
//!
//! Reads exactly one command from a connection: a space-terminated verb,
//! a space-terminated `room:client-id` header, and the rest of the stream
//! as the body.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::warn;

use crate::error::ProtocolError;
use crate::message::{Command, Header, Verb};

/// Upper bound for a space-terminated field (verb or header)
pub const FIELD_LIMIT: u64 = 64 * 1024;

/// Worst-case UTF-8 width, used to bound the body read in bytes
const MAX_UTF8_WIDTH: u64 = 4;

/// Decode one command from `reader`
///
/// `max_len` is measured in characters. The body is read to end-of-input,
/// so the peer must half-close its side before a command is complete.
pub async fn read_command<R>(reader: &mut R, max_len: usize) -> Result<Command, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let verb = match read_field(reader).await? {
        Some(raw) => Verb::parse(&String::from_utf8_lossy(&raw))?,
        None => return Err(ProtocolError::IncompleteFrame),
    };

    let header = match read_field(reader).await? {
        Some(raw) => Header::parse(&String::from_utf8_lossy(&raw)),
        None => return Err(ProtocolError::MalformedHeader),
    };
    if header.defaulted {
        warn!("Invalid room:client format, using {}:{}", header.room, header.client);
    }

    let byte_cap = max_len as u64 * MAX_UTF8_WIDTH;
    let mut raw_body = Vec::new();
    (&mut *reader)
        .take(byte_cap + 1)
        .read_to_end(&mut raw_body)
        .await?;
    if raw_body.len() as u64 > byte_cap {
        return Err(ProtocolError::MessageTooLong { max: max_len });
    }

    let body = String::from_utf8(raw_body).map_err(|_| ProtocolError::Encoding)?;
    if body.chars().count() > max_len {
        return Err(ProtocolError::MessageTooLong { max: max_len });
    }

    Ok(Command {
        verb,
        room: header.room,
        client: header.client,
        body,
    })
}

/// Read up to and including the next space
///
/// Returns `None` if the stream ends first.
async fn read_field<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    (&mut *reader)
        .take(FIELD_LIMIT)
        .read_until(b' ', &mut buf)
        .await?;

    if buf.last() == Some(&b' ') {
        Ok(Some(buf))
    } else if buf.len() as u64 >= FIELD_LIMIT {
        Err(ProtocolError::FieldTooLong)
    } else {
        Ok(None)
    }
}

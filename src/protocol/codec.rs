//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol. Frame lengths
//! are big-endian `u32`.
//!
//! ### Payload by Command Type
//! - GET:  key_len (4 bytes) + key
//! - PUT:  key_len (4 bytes) + key + value
//! - PING: empty

use std::io::{Read, Write};

use crate::error::{Result, SegKvError};

use super::{Command, CommandType, Response, Status};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (17 MB: a maximal key plus a maximal value)
pub const MAX_PAYLOAD_SIZE: u32 = 17 * 1024 * 1024;

// =============================================================================
// Framing
// =============================================================================

fn frame(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(tag);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(payload);
    message
}

/// Split a complete frame into its tag and payload
fn unframe(bytes: &[u8]) -> Result<(u8, &[u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(SegKvError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let payload_len = check_len(u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]))?;
    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(SegKvError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    Ok((bytes[0], &bytes[HEADER_SIZE..total_len]))
}

fn check_len(payload_len: u32) -> Result<usize> {
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(SegKvError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(payload_len as usize)
}

/// Read one frame (header + payload) from a stream
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = check_len(u32::from_be_bytes([header[1], header[2], header[3], header[4]]))?;

    let mut message = vec![0u8; HEADER_SIZE + payload_len];
    message[..HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut message[HEADER_SIZE..])?;
    Ok(message)
}

fn utf8(bytes: &[u8], what: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| SegKvError::Protocol(format!("{} is not valid UTF-8", what)))
}

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + payload
pub fn encode_command(command: &Command) -> Vec<u8> {
    let payload = match command {
        Command::Get { key } => {
            let mut payload = Vec::with_capacity(4 + key.len());
            payload.extend_from_slice(&(key.len() as u32).to_be_bytes());
            payload.extend_from_slice(key.as_bytes());
            payload
        }
        Command::Put { key, value } => {
            let mut payload = Vec::with_capacity(4 + key.len() + value.len());
            payload.extend_from_slice(&(key.len() as u32).to_be_bytes());
            payload.extend_from_slice(key.as_bytes());
            payload.extend_from_slice(value.as_bytes());
            payload
        }
        Command::Ping => Vec::new(),
    };

    frame(command.command_type() as u8, &payload)
}

/// Decode a command from a complete frame
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (tag, payload) = unframe(bytes)?;

    let cmd_type = CommandType::from_byte(tag).ok_or_else(|| {
        SegKvError::Protocol(format!("Unknown command type: 0x{:02x}", tag))
    })?;

    match cmd_type {
        CommandType::Get => {
            let (key, rest) = split_key(payload, "GET")?;
            if !rest.is_empty() {
                return Err(SegKvError::Protocol(format!(
                    "GET command: {} trailing bytes",
                    rest.len()
                )));
            }
            Ok(Command::Get { key })
        }
        CommandType::Put => {
            let (key, rest) = split_key(payload, "PUT")?;
            let value = utf8(rest, "PUT value")?;
            Ok(Command::Put { key, value })
        }
        CommandType::Ping => {
            if !payload.is_empty() {
                return Err(SegKvError::Protocol(format!(
                    "PING command: unexpected payload of {} bytes",
                    payload.len()
                )));
            }
            Ok(Command::Ping)
        }
    }
}

/// Parse `key_len (4) + key` off the front of a payload
fn split_key<'a>(payload: &'a [u8], name: &str) -> Result<(String, &'a [u8])> {
    if payload.len() < 4 {
        return Err(SegKvError::Protocol(format!(
            "{} command: missing key length",
            name
        )));
    }

    let key_len = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    let rest = &payload[4..];
    if rest.len() < key_len {
        return Err(SegKvError::Protocol(format!(
            "{} command: incomplete key (expected {}, got {})",
            name,
            key_len,
            rest.len()
        )));
    }

    let key = utf8(&rest[..key_len], "key")?;
    Ok((key, &rest[key_len..]))
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    frame(response.status as u8, &response.payload)
}

/// Decode a response from a complete frame
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (tag, payload) = unframe(bytes)?;

    let status = Status::from_byte(tag).ok_or_else(|| {
        SegKvError::Protocol(format!("Unknown response status: 0x{:02x}", tag))
    })?;

    Ok(Response {
        status,
        payload: payload.to_vec(),
    })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    decode_command(&read_frame(reader)?)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    writer.write_all(&encode_command(command))?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    decode_response(&read_frame(reader)?)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response))?;
    writer.flush()?;
    Ok(())
}

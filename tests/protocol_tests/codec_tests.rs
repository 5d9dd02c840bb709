//! Codec Tests
//!
//! Tests for command and response framing.

use std::io::Cursor;

use segkv::protocol::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, Command, CommandType, Response, Status,
    HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
use segkv::SegKvError;

// =============================================================================
// Commands
// =============================================================================

#[test]
fn test_get_layout() {
    let encoded = encode_command(&Command::Get {
        key: "hi".to_string(),
    });

    assert_eq!(encoded[0], CommandType::Get as u8);
    assert_eq!(&encoded[1..5], &6u32.to_be_bytes());
    assert_eq!(&encoded[5..9], &2u32.to_be_bytes());
    assert_eq!(&encoded[9..], b"hi");
}

#[test]
fn test_commands_decode() {
    let commands = [
        Command::Get {
            key: "user:1".to_string(),
        },
        Command::Put {
            key: "k\nwith:delims".to_string(),
            value: "v:1\n".to_string(),
        },
        Command::Put {
            key: "empty".to_string(),
            value: String::new(),
        },
        Command::Ping,
    ];

    for command in commands {
        assert_eq!(decode_command(&encode_command(&command)).unwrap(), command);
    }
}

#[test]
fn test_unknown_command_type() {
    let bytes = [0x7F, 0, 0, 0, 0];
    assert!(matches!(
        decode_command(&bytes).unwrap_err(),
        SegKvError::Protocol(_)
    ));
}

#[test]
fn test_incomplete_header() {
    assert!(decode_command(&[CommandType::Get as u8, 0, 0]).is_err());
}

#[test]
fn test_incomplete_payload() {
    let mut encoded = encode_command(&Command::Get {
        key: "abcdef".to_string(),
    });
    encoded.truncate(encoded.len() - 2);

    assert!(decode_command(&encoded).is_err());
}

#[test]
fn test_get_with_trailing_bytes() {
    let mut payload = 1u32.to_be_bytes().to_vec();
    payload.extend_from_slice(b"kX");
    let mut bytes = vec![CommandType::Get as u8];
    bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&payload);

    assert!(decode_command(&bytes).is_err());
}

#[test]
fn test_key_length_past_payload() {
    let mut payload = 50u32.to_be_bytes().to_vec();
    payload.extend_from_slice(b"short");
    let mut bytes = vec![CommandType::Put as u8];
    bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&payload);

    assert!(decode_command(&bytes).is_err());
}

#[test]
fn test_ping_with_payload() {
    let bytes = [CommandType::Ping as u8, 0, 0, 0, 1, 0xAA];
    assert!(decode_command(&bytes).is_err());
}

#[test]
fn test_non_utf8_key() {
    let mut payload = 2u32.to_be_bytes().to_vec();
    payload.extend_from_slice(&[0xFF, 0xFE]);
    let mut bytes = vec![CommandType::Get as u8];
    bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&payload);

    assert!(decode_command(&bytes).is_err());
}

#[test]
fn test_oversized_payload_rejected_before_allocation() {
    let mut bytes = vec![CommandType::Put as u8];
    bytes.extend_from_slice(&(MAX_PAYLOAD_SIZE + 1).to_be_bytes());

    let err = read_command(&mut Cursor::new(bytes)).unwrap_err();
    assert!(matches!(err, SegKvError::Protocol(_)));
}

// =============================================================================
// Responses
// =============================================================================

#[test]
fn test_response_layout() {
    let encoded = encode_response(&Response::value("abc"));

    assert_eq!(encoded.len(), HEADER_SIZE + 3);
    assert_eq!(encoded[0], Status::Ok as u8);
    assert_eq!(&encoded[HEADER_SIZE..], b"abc");
}

#[test]
fn test_responses_decode() {
    let responses = [
        Response::value("v"),
        Response::value(""),
        Response::ok(),
        Response::not_found(),
        Response::error("boom"),
    ];

    for response in responses {
        assert_eq!(decode_response(&encode_response(&response)).unwrap(), response);
    }
}

#[test]
fn test_unknown_status() {
    assert!(decode_response(&[0x09, 0, 0, 0, 0]).is_err());
}

#[test]
fn test_error_payload_str() {
    assert_eq!(Response::error("bad key").payload_str(), "bad key");
}

// =============================================================================
// Streams
// =============================================================================

#[test]
fn test_stream_pipelined_commands() {
    let mut buffer = Vec::new();
    write_command(
        &mut buffer,
        &Command::Put {
            key: "a".to_string(),
            value: "1".to_string(),
        },
    )
    .unwrap();
    write_command(&mut buffer, &Command::Ping).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert!(matches!(
        read_command(&mut cursor).unwrap(),
        Command::Put { .. }
    ));
    assert_eq!(read_command(&mut cursor).unwrap(), Command::Ping);

    // Clean EOF surfaces as an I/O error the server treats as disconnect
    assert!(matches!(
        read_command(&mut cursor).unwrap_err(),
        SegKvError::Io(_)
    ));
}

#[test]
fn test_stream_response() {
    let mut buffer = Vec::new();
    write_response(&mut buffer, &Response::not_found()).unwrap();

    let response = read_response(&mut Cursor::new(buffer)).unwrap();
    assert_eq!(response.status, Status::NotFound);
    assert!(response.payload.is_empty());
}

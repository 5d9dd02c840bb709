//! Response definitions
//!
//! Represents responses to clients.

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
}

impl Status {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Status::Ok),
            0x01 => Some(Status::NotFound),
            0x02 => Some(Status::Error),
            _ => None,
        }
    }
}

/// A response to send to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Payload: the value for GET, the message for ERROR, empty otherwise
    pub payload: Vec<u8>,
}

impl Response {
    /// Create an OK response carrying a value
    pub fn value(value: &str) -> Self {
        Self {
            status: Status::Ok,
            payload: value.as_bytes().to_vec(),
        }
    }

    /// Create an OK response with no payload
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            payload: Vec::new(),
        }
    }

    /// Create a NOT_FOUND response
    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            payload: Vec::new(),
        }
    }

    /// Create an ERROR response
    pub fn error(message: &str) -> Self {
        Self {
            status: Status::Error,
            payload: message.as_bytes().to_vec(),
        }
    }

    /// Payload as text (lossy)
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

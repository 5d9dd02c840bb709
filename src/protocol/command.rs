//! Command definitions
//!
//! Represents requests from clients.

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Get = 0x01,
    Put = 0x02,
    Ping = 0x04,
}

impl CommandType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(CommandType::Get),
            0x02 => Some(CommandType::Put),
            0x04 => Some(CommandType::Ping),
            _ => None,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { key: String },

    /// Store a value under a key
    Put { key: String, value: String },

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Put { .. } => CommandType::Put,
            Command::Ping => CommandType::Ping,
        }
    }
}

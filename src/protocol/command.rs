//! Slash-separated command types

use crate::error::ProtocolError;
use std::str::FromStr;

/// Maximum accepted command line length in bytes, matching the per-connection
/// read buffer.
pub const MAX_COMMAND_LENGTH: usize = 4096;

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `get/<key>`
    Get { key: String },

    /// `set/<field>/<key>/<value>`
    Set {
        field: Field,
        key: String,
        value: String,
    },
}

/// Mutable fields of a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Phone,
    Cash,
}

impl FromStr for Field {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Field::Name),
            "email" => Ok(Field::Email),
            "phone" => Ok(Field::Phone),
            "cash" => Ok(Field::Cash),
            _ => Err(ProtocolError::InvalidField),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_from_str() {
        assert_eq!("name".parse::<Field>().unwrap(), Field::Name);
        assert_eq!("email".parse::<Field>().unwrap(), Field::Email);
        assert_eq!("phone".parse::<Field>().unwrap(), Field::Phone);
        assert_eq!("cash".parse::<Field>().unwrap(), Field::Cash);
        assert_eq!(
            "balance".parse::<Field>().unwrap_err(),
            ProtocolError::InvalidField
        );
        // Exact match only; no case folding.
        assert!("Name".parse::<Field>().is_err());
    }
}

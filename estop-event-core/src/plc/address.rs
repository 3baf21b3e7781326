//! S7 data block addresses
//!
//! Parses addresses such as `DB1.DBX0.3` (bit 3 of byte 0), `DB1.DBB4` (byte),
//! `DB1.DBW2` (16-bit word) and `DB1.DBD6` (32-bit double word or real), and
//! decodes the big-endian bytes read from that location.

use crate::types::{EventLogError, Result, SignalType, SignalValue};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;
use std::str::FromStr;

/// Width of the addressed area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    /// Single bit (0-7) inside the byte
    Bit(u8),
    Byte,
    Word,
    DWord,
}

impl AddressKind {
    /// Number of bytes to read for this kind
    pub fn byte_len(&self) -> usize {
        match self {
            AddressKind::Bit(_) | AddressKind::Byte => 1,
            AddressKind::Word => 2,
            AddressKind::DWord => 4,
        }
    }
}

/// A parsed data block address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub db_number: u16,
    pub byte_offset: usize,
    pub kind: AddressKind,
}

impl Address {
    pub fn byte_len(&self) -> usize {
        self.kind.byte_len()
    }

    /// Check that a signal of `signal_type` can live at this address
    pub fn check_type(&self, signal_type: SignalType) -> Result<()> {
        let fits = match (signal_type, self.kind) {
            (SignalType::Bit, AddressKind::Bit(_)) => true,
            (SignalType::Byte, AddressKind::Byte) => true,
            (SignalType::Word, AddressKind::Word) => true,
            (SignalType::DWord | SignalType::Real, AddressKind::DWord) => true,
            _ => false,
        };
        if fits {
            Ok(())
        } else {
            Err(invalid(&self.to_string(), format!("does not hold a {} value", signal_type)))
        }
    }

    /// Decode `data` (the bytes starting at `byte_offset`) as `signal_type`
    pub fn decode(&self, data: &[u8], signal_type: SignalType, scale_factor: Option<f64>) -> Result<SignalValue> {
        let needed = self.byte_len().max(signal_type.byte_len());
        if data.len() < needed {
            return Err(EventLogError::InvalidData(format!(
                "{} needs {} bytes, got {}",
                self,
                needed,
                data.len()
            )));
        }

        let raw = match (signal_type, self.kind) {
            (SignalType::Bit, AddressKind::Bit(bit)) => {
                return Ok(SignalValue::Boolean((data[0] >> bit) & 0x01 != 0));
            }
            (SignalType::Real, _) => {
                let value = f64::from(BigEndian::read_f32(data));
                return Ok(SignalValue::Float(value * scale_factor.unwrap_or(1.0)));
            }
            (SignalType::Byte, _) => i64::from(data[0]),
            (SignalType::Word, _) => i64::from(BigEndian::read_i16(data)),
            (SignalType::DWord, _) => i64::from(BigEndian::read_u32(data)),
            (SignalType::Bit, _) => {
                return Err(EventLogError::InvalidData(format!("{} is not a bit address", self)));
            }
        };

        Ok(match scale_factor {
            Some(factor) => SignalValue::Float(raw as f64 * factor),
            None => SignalValue::Integer(raw),
        })
    }
}

impl FromStr for Address {
    type Err = EventLogError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(invalid(s, "expected DB<n>.DB<type><offset>[.<bit>]"));
        }

        let db_number = parts[0]
            .strip_prefix("DB")
            .and_then(|n| n.parse::<u16>().ok())
            .ok_or_else(|| invalid(s, format!("invalid data block '{}'", parts[0])))?;

        let area = parts[1];
        let (prefix, offset) = match (area.get(..3), area.get(3..)) {
            (Some(prefix), Some(offset)) => (prefix, offset),
            _ => return Err(invalid(s, format!("invalid area '{}'", area))),
        };
        // data blocks are at most 64 KiB
        let byte_offset = offset
            .parse::<u16>()
            .map(usize::from)
            .map_err(|_| invalid(s, format!("invalid byte offset '{}'", offset)))?;

        let kind = match (prefix, parts.get(2)) {
            ("DBX", Some(bit)) => match bit.parse::<u8>() {
                Ok(bit) if bit <= 7 => AddressKind::Bit(bit),
                _ => return Err(invalid(s, format!("invalid bit '{}'", bit))),
            },
            ("DBX", None) => return Err(invalid(s, "bit address needs a bit number")),
            ("DBB", None) => AddressKind::Byte,
            ("DBW", None) => AddressKind::Word,
            ("DBD", None) => AddressKind::DWord,
            ("DBB" | "DBW" | "DBD", Some(_)) => {
                return Err(invalid(s, "only bit addresses take a bit number"));
            }
            _ => return Err(invalid(s, format!("unknown data type '{}'", prefix))),
        };

        Ok(Address { db_number, byte_offset, kind })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AddressKind::Bit(bit) => write!(f, "DB{}.DBX{}.{}", self.db_number, self.byte_offset, bit),
            AddressKind::Byte => write!(f, "DB{}.DBB{}", self.db_number, self.byte_offset),
            AddressKind::Word => write!(f, "DB{}.DBW{}", self.db_number, self.byte_offset),
            AddressKind::DWord => write!(f, "DB{}.DBD{}", self.db_number, self.byte_offset),
        }
    }
}

fn invalid(address: &str, reason: impl Into<String>) -> EventLogError {
    EventLogError::InvalidAddress {
        address: address.to_string(),
        reason: reason.into(),
    }
}

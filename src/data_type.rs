use crate::prelude::*;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum DataType {
    Unknown = 0x0,
    Boolean = 0x1,
    Integer8 = 0x2,
    Integer16 = 0x3,
    Integer32 = 0x4,
    Unsigned8 = 0x5,
    Unsigned16 = 0x6,
    Unsigned32 = 0x7,
    Real32 = 0x8,
    VisibleString = 0x9,
    OctetString = 0xA,
    UnicodeString = 0xB,
    Domain = 0xF,
    Real64 = 0x11,
    Integer64 = 0x15,
    Unsigned64 = 0x1B,
}

/// Width of an object as seen by the PDO codec. Only byte, word and long
/// sized objects can travel in a receive PDO.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ObjectWidth {
    Byte,
    Word,
    Long,
}

impl ObjectWidth {
    pub fn bytes(&self) -> usize {
        match self {
            ObjectWidth::Byte => 1,
            ObjectWidth::Word => 2,
            ObjectWidth::Long => 4,
        }
    }

    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(ObjectWidth::Byte),
            2 => Some(ObjectWidth::Word),
            4 => Some(ObjectWidth::Long),
            _ => None,
        }
    }
}

impl DataType {
    pub(crate) fn from_u32(value: u32) -> Self {
        match value {
            0x1 => DataType::Boolean,
            0x2 => DataType::Integer8,
            0x3 => DataType::Integer16,
            0x4 => DataType::Integer32,
            0x5 => DataType::Unsigned8,
            0x6 => DataType::Unsigned16,
            0x7 => DataType::Unsigned32,
            0x8 => DataType::Real32,
            0x9 => DataType::VisibleString,
            0xA => DataType::OctetString,
            0xB => DataType::UnicodeString,
            0xF => DataType::Domain,
            0x11 => DataType::Real64,
            0x15 => DataType::Integer64,
            0x1B => DataType::Unsigned64,
            _ => DataType::Unknown,
        }
    }

    // Size 0 means variable length.
    pub(crate) fn size(&self) -> usize {
        match self {
            DataType::Unknown => 0,
            DataType::Boolean | DataType::Integer8 | DataType::Unsigned8 => 1,
            DataType::Integer16 | DataType::Unsigned16 => 2,
            DataType::Integer32 | DataType::Unsigned32 | DataType::Real32 | DataType::Domain => 4,
            DataType::Real64 | DataType::Integer64 | DataType::Unsigned64 => 8,
            DataType::VisibleString | DataType::OctetString | DataType::UnicodeString => 0,
        }
    }

    pub(crate) fn width(&self) -> Option<ObjectWidth> {
        ObjectWidth::from_bytes(self.size())
    }

    pub(crate) fn default_value(&self) -> Vec<u8> {
        match self.size() {
            0 => vec![],
            n => vec![0u8; n],
        }
    }
}

use core::fmt::Formatter;

use crate::data_type::DataType;
use crate::nmt::NmtState;
use crate::prelude::*;

#[derive(Clone, Eq, PartialEq)]
pub enum ErrorCode {
    InvalidArgument { more_info: String },
    InvalidState { state: NmtState },
    NotFound { index: u16, sub_index: u8 },
    ReadOnly { index: u16, sub_index: u8 },
    WriteOnly { index: u16, sub_index: u8 },
    LengthMismatch { index: u16, sub_index: u8, expected: usize, actual: usize },
    InvalidSize { bytes: usize },
    MappingInvalid { slot: usize, cause: Box<ErrorCode> },
    LockTimeout,
    LockFailure,
    IoFailure,
    InvalidStandardId { cob_id: u16 },
    FrameCreationFailed { data: Vec<u8> },
    StringToValueFailed { data_type: DataType, str: String },
    SectionParseFailed { section_name: String, more_info: String },
}

impl ErrorCode {
    pub(crate) fn invalid_argument(more_info: &str) -> Self {
        ErrorCode::InvalidArgument { more_info: more_info.to_string() }
    }
}

impl Debug for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::InvalidArgument { more_info } => write!(f, "Invalid argument: {}", more_info),
            ErrorCode::InvalidState { state } => write!(f, "Operation not allowed in state {:?}", state),
            ErrorCode::NotFound { index, sub_index } =>
                write!(f, "No object on ({:#06x}, {:#04x})", index, sub_index),
            ErrorCode::ReadOnly { index, sub_index } =>
                write!(f, "Object ({:#06x}, {:#04x}) is read only", index, sub_index),
            ErrorCode::WriteOnly { index, sub_index } =>
                write!(f, "Object ({:#06x}, {:#04x}) is write only", index, sub_index),
            ErrorCode::LengthMismatch { index, sub_index, expected, actual } =>
                write!(f, "Object ({:#06x}, {:#04x}) has {} bytes, requested {}",
                       index, sub_index, actual, expected),
            ErrorCode::InvalidSize { bytes } => write!(f, "Mapping needs {} bytes, frame holds 8", bytes),
            ErrorCode::MappingInvalid { slot, cause } =>
                write!(f, "Mapping of rpdo slot {} is invalid: {:?}", slot, cause),
            ErrorCode::LockTimeout => write!(f, "Timed out waiting for the object lock"),
            ErrorCode::LockFailure => write!(f, "Failed to acquire the object lock"),
            ErrorCode::IoFailure => write!(f, "CAN transmit failed"),
            ErrorCode::InvalidStandardId { cob_id } => write!(f, "Invalid Standard ID: {:#x}", cob_id),
            ErrorCode::FrameCreationFailed { data } => write!(f, "Frame creation failed, data: {:x?}", data),
            ErrorCode::StringToValueFailed { data_type, str } =>
                write!(f, "String conversion failed, data_type = {:?}, str = '{:?}'", data_type, str),
            ErrorCode::SectionParseFailed { section_name, more_info } =>
                write!(f, "Processed section failed, section_name: {:?}, more info: {:?}",
                       section_name, more_info),
        }
    }
}

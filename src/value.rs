use crate::data_type::DataType;
use crate::error::ErrorCode;
use crate::prelude::*;
use crate::{error, util};

/// Raw little-endian object content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Value {
    data: Vec<u8>,
}

impl Value {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Encode the low `bytes` bytes of `raw`.
    pub fn from_u32(raw: u32, bytes: usize) -> Self {
        Self::new(raw.to_le_bytes()[..bytes.min(4)].to_vec())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Zero-extends values shorter than 4 bytes; longer values are truncated.
    pub fn to_u32(&self) -> u32 {
        let mut arr = [0u8; 4];
        let n = self.data.len().min(4);
        arr[..n].copy_from_slice(&self.data[..n]);
        u32::from_le_bytes(arr)
    }
}

fn make_error(data_type: DataType, data_string: &str) -> ErrorCode {
    ErrorCode::StringToValueFailed {
        data_type,
        str: data_string.to_string(),
    }
}

macro_rules! parsed {
    ($t:ty, $s:expr) => {{
        let val: $t = util::parse_number($s);
        Ok(Value::new(val.to_le_bytes().to_vec()))
    }};
}

fn string_to_value(data_type: &DataType, data_string: &str) -> Result<Value, ErrorCode> {
    match data_type {
        DataType::Unknown => Err(make_error(*data_type, data_string)),
        DataType::Boolean => match data_string.to_lowercase().as_str() {
            "true" | "1" => Ok(Value::new(vec![1])),
            "false" | "0" => Ok(Value::new(vec![0])),
            _ => Err(make_error(*data_type, data_string)),
        },
        DataType::Integer8 => parsed!(i8, data_string),
        DataType::Integer16 => parsed!(i16, data_string),
        DataType::Integer32 => parsed!(i32, data_string),
        DataType::Integer64 => parsed!(i64, data_string),
        DataType::Unsigned8 => parsed!(u8, data_string),
        DataType::Unsigned16 => parsed!(u16, data_string),
        DataType::Unsigned32 | DataType::Domain => parsed!(u32, data_string),
        DataType::Unsigned64 => parsed!(u64, data_string),
        DataType::Real32 => {
            let val: f32 = data_string.parse().map_err(|_| make_error(*data_type, data_string))?;
            Ok(Value::new(val.to_le_bytes().to_vec()))
        }
        DataType::Real64 => {
            let val: f64 = data_string.parse().map_err(|_| make_error(*data_type, data_string))?;
            Ok(Value::new(val.to_le_bytes().to_vec()))
        }
        DataType::VisibleString | DataType::OctetString | DataType::UnicodeString => {
            Ok(Value::new(data_string.as_bytes().to_vec()))
        }
    }
}

pub(crate) fn depends_on_node_id(raw: &str) -> bool {
    raw.contains("$NODEID")
}

/// Evaluates "$NODEID+0x200"-style sums found in EDS values.
fn evaluate_expression_with_node_id(node_id: u8, expression: &str) -> String {
    let modified_expression = expression.replace("$NODEID", &node_id.to_string());
    modified_expression
        .split('+')
        .map(|s| s.trim())
        .filter_map(|s| {
            if s.starts_with("0x") || s.starts_with("0X") {
                i64::from_str_radix(&s[2..], 16).ok()
            } else {
                s.parse::<i64>().ok()
            }
        })
        .sum::<i64>()
        .to_string()
}

pub(crate) fn get_value(
    properties: &HashMap<String, String>,
    property_name: &str,
    node_id: u8,
    data_type: &DataType,
) -> Option<Value> {
    match properties.get(property_name) {
        Some(raw) if !raw.is_empty() => parse_value(raw, node_id, data_type),
        _ => None,
    }
}

/// Parse an EDS value, resolving `$NODEID` against `node_id`.
pub(crate) fn parse_value(raw: &str, node_id: u8, data_type: &DataType) -> Option<Value> {
    let modified_raw = if depends_on_node_id(raw) {
        evaluate_expression_with_node_id(node_id, raw)
    } else {
        raw.to_string()
    };

    match string_to_value(data_type, &modified_raw) {
        Ok(val) => Some(val),
        Err(e) => {
            error!("Error converting string to value: {:?}", e);
            None
        }
    }
}

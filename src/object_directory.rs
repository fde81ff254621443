use core::ops::RangeInclusive;

use ini_core as ini;

use crate::data_type::{DataType, ObjectWidth};
use crate::error::ErrorCode;
use crate::prelude::*;
use crate::util;
use crate::value::{depends_on_node_id, get_value, parse_value, Value};

/// Handle to one dictionary entry, as produced by [`ObjectAccess::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    index: u16,
    sub_index: u8,
}

impl ObjectRef {
    pub fn index(&self) -> u16 {
        self.index
    }
    pub fn sub_index(&self) -> u8 {
        self.sub_index
    }
}

/// Accessor surface of an object dictionary.
///
/// The NMT controller and the RPDO engine only see the dictionary through
/// this trait, so any storage can back a [`Node`](crate::node::Node).
pub trait ObjectAccess {
    fn read_u8(&self, index: u16, sub_index: u8) -> Result<u8, ErrorCode>;
    fn read_u16(&self, index: u16, sub_index: u8) -> Result<u16, ErrorCode>;
    fn read_u32(&self, index: u16, sub_index: u8) -> Result<u32, ErrorCode>;

    fn find(&self, index: u16, sub_index: u8) -> Result<ObjectRef, ErrorCode>;
    fn width(&self, obj: ObjectRef) -> Result<ObjectWidth, ErrorCode>;
    fn is_read_only(&self, obj: ObjectRef) -> bool;

    /// `writer` is the node id on whose behalf the value is written.
    fn write(&mut self, obj: ObjectRef, value: u32, writer: u8) -> Result<(), ErrorCode>;

    /// Reload every entry with an index in `range` from its default.
    fn restore_defaults(&mut self, range: RangeInclusive<u16>) -> Result<(), ErrorCode>;

    /// Defaults derived from the node id follow `node_id` from the next
    /// [`restore_defaults`](ObjectAccess::restore_defaults) on.
    fn set_node_id(&mut self, _node_id: u8) {}
}

#[derive(Clone, Debug, PartialEq)]
pub struct AccessType {
    read_access: bool,
    write_access: bool,
}

impl AccessType {
    pub fn new(read: bool, write: bool) -> Self {
        AccessType {
            read_access: read,
            write_access: write,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "rw" | "rww" | "rwr" => AccessType::new(true, true),
            "ro" | "const" => AccessType::new(true, false),
            "wo" => AccessType::new(false, true),
            _ => AccessType::new(false, false),
        }
    }

    pub fn is_readable(&self) -> bool {
        self.read_access
    }
    pub fn is_writable(&self) -> bool {
        self.write_access
    }
}

#[derive(Clone, Debug)]
pub struct Variable {
    name: String,
    data_type: DataType,
    default_value: Value,
    // Raw EDS default, kept when it has to follow the node id.
    default_expression: Option<String>,
    value: Value,
    pdo_mappable: bool,
    access_type: AccessType,
    last_writer: Option<u8>,
    index: u16,
    sub_index: u8,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn data_type(&self) -> DataType {
        self.data_type
    }
    pub fn default_value(&self) -> &Value {
        &self.default_value
    }
    pub fn value(&self) -> &Value {
        &self.value
    }
    pub fn access_type(&self) -> &AccessType {
        &self.access_type
    }
    pub fn pdo_mappable(&self) -> bool {
        self.pdo_mappable
    }
    pub fn last_writer(&self) -> Option<u8> {
        self.last_writer
    }
    pub fn index(&self) -> u16 {
        self.index
    }
    pub fn sub_index(&self) -> u8 {
        self.sub_index
    }

    fn rebase_default(&mut self, node_id: u8) {
        let rebased = self.default_expression.as_deref()
            .and_then(|raw| parse_value(raw, node_id, &self.data_type));
        if let Some(value) = rebased {
            self.default_value = value;
        }
    }

    fn restore_default(&mut self) {
        self.value = self.default_value.clone();
        self.last_writer = None;
    }
}

/// Arrays and records share storage; only the EDS object type differs.
#[derive(Clone, Debug)]
pub struct Container {
    name: String,
    index: u16,
    index_to_variable: HashMap<u8, Variable>,
}

impl Container {
    fn new(name: &str, index: u16) -> Self {
        Container { name: name.to_string(), index, index_to_variable: HashMap::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn index(&self) -> u16 {
        self.index
    }

    fn add_member(&mut self, var: Variable) {
        self.index_to_variable.insert(var.sub_index, var);
    }
}

#[derive(Clone, Debug)]
pub enum ObjectType {
    Variable(Variable),
    Array(Container),
    Record(Container),
}

impl ObjectType {
    fn variables_mut(&mut self) -> Vec<&mut Variable> {
        match self {
            ObjectType::Variable(var) => vec![var],
            ObjectType::Array(c) | ObjectType::Record(c) => c.index_to_variable.values_mut().collect(),
        }
    }
}

/// EDS backed object dictionary.
#[derive(Clone, Debug)]
pub struct ObjectDirectory {
    node_id: u8,
    index_to_object: HashMap<u16, ObjectType>,
    name_to_index: HashMap<String, u16>,
}

impl ObjectDirectory {
    pub fn new(node_id: u8, eds_content: &str) -> Result<Self, ErrorCode> {
        let mut od = ObjectDirectory {
            node_id,
            index_to_object: HashMap::new(),
            name_to_index: HashMap::new(),
        };
        od.load_from_content(eds_content)?;
        Ok(od)
    }

    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    pub fn get_variable(&self, index: u16, sub_index: u8) -> Result<&Variable, ErrorCode> {
        let not_found = ErrorCode::NotFound { index, sub_index };
        match self.index_to_object.get(&index) {
            Some(ObjectType::Variable(var)) if sub_index == 0 => Ok(var),
            Some(ObjectType::Array(c)) | Some(ObjectType::Record(c)) => {
                c.index_to_variable.get(&sub_index).ok_or(not_found)
            }
            _ => Err(not_found),
        }
    }

    fn get_mut_variable(&mut self, index: u16, sub_index: u8) -> Result<&mut Variable, ErrorCode> {
        let not_found = ErrorCode::NotFound { index, sub_index };
        match self.index_to_object.get_mut(&index) {
            Some(ObjectType::Variable(var)) if sub_index == 0 => Ok(var),
            Some(ObjectType::Array(c)) | Some(ObjectType::Record(c)) => {
                c.index_to_variable.get_mut(&sub_index).ok_or(not_found)
            }
            _ => Err(not_found),
        }
    }

    pub fn get_object_by_name(&self, name: &str) -> Option<&ObjectType> {
        self.name_to_index.get(name).and_then(|id| self.index_to_object.get(id))
    }

    /// Store raw bytes without access checks. Used by local configuration,
    /// never by the bus-facing paths.
    pub fn set_value(&mut self, index: u16, sub_index: u8, data: &[u8]) -> Result<(), ErrorCode> {
        let var = self.get_mut_variable(index, sub_index)?;
        let size = var.data_type.size();
        if size != 0 && size != data.len() {
            return Err(ErrorCode::LengthMismatch { index, sub_index, expected: data.len(), actual: size });
        }
        var.value = Value::new(data.to_vec());
        Ok(())
    }

    fn read_sized(&self, index: u16, sub_index: u8, expected: usize) -> Result<u32, ErrorCode> {
        let var = self.get_variable(index, sub_index)?;
        if !var.access_type.is_readable() {
            return Err(ErrorCode::WriteOnly { index, sub_index });
        }
        let actual = var.data_type.size();
        if actual != expected {
            return Err(ErrorCode::LengthMismatch { index, sub_index, expected, actual });
        }
        Ok(var.value.to_u32())
    }

    fn add_sub_member(&mut self, index: u16, var: Variable) -> Result<(), ErrorCode> {
        match self.index_to_object.get_mut(&index) {
            Some(ObjectType::Record(c)) | Some(ObjectType::Array(c)) => {
                c.add_member(var);
                Ok(())
            }
            _ => Err(ErrorCode::SectionParseFailed {
                section_name: format!("{:04X}sub{:X}", index, var.sub_index),
                more_info: "no array or record to hold the sub-index".to_string(),
            }),
        }
    }

    fn process_section(
        &mut self,
        section_name: &str,
        properties: &HashMap<String, String>,
    ) -> Result<(), ErrorCode> {
        let missing = |key: &str| ErrorCode::SectionParseFailed {
            section_name: section_name.to_string(),
            more_info: format!("No '{}'", key),
        };
        if util::is_top(section_name) {
            let index: u16 = util::parse_number(&format!("0x{}", section_name));
            let name = properties.get("ParameterName").ok_or_else(|| missing("ParameterName"))?;
            let object_type: u8 = properties.get("ObjectType")
                .map(|s| util::parse_number(s))
                .unwrap_or(7);
            let object = match object_type {
                7 => ObjectType::Variable(build_variable(properties, self.node_id, name, index, 0)),
                8 => {
                    let mut array = Container::new(name, index);
                    if properties.contains_key("CompactSubObj") {
                        let count: u8 = util::parse_number(&properties["CompactSubObj"]);
                        let mut highest = build_variable(properties, self.node_id, "Highest sub-index", index, 0);
                        highest.data_type = DataType::Unsigned8;
                        highest.access_type = AccessType::new(true, false);
                        highest.default_value = Value::new(vec![count]);
                        highest.default_expression = None;
                        highest.value = highest.default_value.clone();
                        array.add_member(highest);
                        for sub in 1..=count {
                            let entry_name = format!("{}{}", name, sub);
                            array.add_member(build_variable(properties, self.node_id, &entry_name, index, sub));
                        }
                    }
                    ObjectType::Array(array)
                }
                9 => ObjectType::Record(Container::new(name, index)),
                _ => return Ok(()),
            };
            self.name_to_index.insert(name.clone(), index);
            self.index_to_object.insert(index, object);
        } else if let Some((index, sub_index)) = util::is_sub(section_name) {
            let name = properties.get("ParameterName").ok_or_else(|| missing("ParameterName"))?;
            let variable = build_variable(properties, self.node_id, name, index, sub_index);
            self.add_sub_member(index, variable)?;
        } else if let Some(index) = util::is_name(section_name) {
            // Names for compact array entries.
            if let Some(ObjectType::Array(arr)) = self.index_to_object.get_mut(&index) {
                for (sub_index, var) in arr.index_to_variable.iter_mut() {
                    if let Some(name) = properties.get(&sub_index.to_string()) {
                        var.name = name.clone();
                    }
                }
            }
        }

        Ok(())
    }

    pub fn load_from_content(&mut self, content: &str) -> Result<(), ErrorCode> {
        let mut current_section_name: Option<String> = None;
        let mut current_properties: HashMap<String, String> = HashMap::new();

        for item in ini::Parser::new(content) {
            match item {
                ini::Item::Section(name) => {
                    if let Some(section_name) = current_section_name.take() {
                        self.process_section(&section_name, &current_properties)?;
                        current_properties.clear();
                    }
                    current_section_name = Some(String::from(name));
                }
                ini::Item::Property(key, maybe_value) => {
                    let value = String::from(maybe_value.unwrap_or_default());
                    current_properties.insert(String::from(key), value);
                }
                _ => {}
            }
        }

        if let Some(section_name) = current_section_name {
            self.process_section(&section_name, &current_properties)?
        }

        Ok(())
    }
}

impl ObjectAccess for ObjectDirectory {
    fn read_u8(&self, index: u16, sub_index: u8) -> Result<u8, ErrorCode> {
        Ok(self.read_sized(index, sub_index, 1)? as u8)
    }

    fn read_u16(&self, index: u16, sub_index: u8) -> Result<u16, ErrorCode> {
        Ok(self.read_sized(index, sub_index, 2)? as u16)
    }

    fn read_u32(&self, index: u16, sub_index: u8) -> Result<u32, ErrorCode> {
        self.read_sized(index, sub_index, 4)
    }

    fn find(&self, index: u16, sub_index: u8) -> Result<ObjectRef, ErrorCode> {
        self.get_variable(index, sub_index)?;
        Ok(ObjectRef { index, sub_index })
    }

    fn width(&self, obj: ObjectRef) -> Result<ObjectWidth, ErrorCode> {
        let var = self.get_variable(obj.index, obj.sub_index)?;
        var.data_type.width().ok_or(ErrorCode::LengthMismatch {
            index: obj.index,
            sub_index: obj.sub_index,
            expected: 4,
            actual: var.data_type.size(),
        })
    }

    fn is_read_only(&self, obj: ObjectRef) -> bool {
        self.get_variable(obj.index, obj.sub_index)
            .map(|var| !var.access_type.is_writable())
            .unwrap_or(true)
    }

    fn write(&mut self, obj: ObjectRef, value: u32, writer: u8) -> Result<(), ErrorCode> {
        let width = self.width(obj)?;
        let var = self.get_mut_variable(obj.index, obj.sub_index)?;
        if !var.access_type.is_writable() {
            return Err(ErrorCode::ReadOnly { index: obj.index, sub_index: obj.sub_index });
        }
        var.value = Value::from_u32(value, width.bytes());
        var.last_writer = Some(writer);
        Ok(())
    }

    fn restore_defaults(&mut self, range: RangeInclusive<u16>) -> Result<(), ErrorCode> {
        for (index, object) in self.index_to_object.iter_mut() {
            if range.contains(index) {
                object.variables_mut().into_iter().for_each(Variable::restore_default);
            }
        }
        Ok(())
    }

    fn set_node_id(&mut self, node_id: u8) {
        self.node_id = node_id;
        for object in self.index_to_object.values_mut() {
            object.variables_mut().into_iter().for_each(|var| var.rebase_default(node_id));
        }
    }
}

fn build_variable(
    properties: &HashMap<String, String>,
    node_id: u8,
    name: &str,
    index: u16,
    sub_index: u8,
) -> Variable {
    let access_type = AccessType::parse(
        &properties.get("AccessType").map(|s| s.to_lowercase()).unwrap_or_else(|| "rw".to_string()),
    );
    let pdo_mappable = properties
        .get("PDOMapping")
        .map(|s| s.trim().parse::<i32>().unwrap_or(0) != 0)
        .unwrap_or(false);
    let data_type = DataType::from_u32(util::parse_number(
        properties.get("DataType").map(String::as_str).unwrap_or(""),
    ));
    let default_value = get_value(properties, "DefaultValue", node_id, &data_type)
        .unwrap_or_else(|| Value::new(data_type.default_value()));
    let default_expression = properties
        .get("DefaultValue")
        .filter(|raw| depends_on_node_id(raw))
        .cloned();

    Variable {
        name: name.to_string(),
        data_type,
        value: default_value.clone(),
        default_value,
        default_expression,
        pdo_mappable,
        access_type,
        last_writer: None,
        index,
        sub_index,
    }
}

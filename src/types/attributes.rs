//! User-defined attributes (`BA_DEF_` / `BA_DEF_DEF_` / `BA_`) and the
//! other DBC-only records kept for lossless round trips.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::conversion::Choices;

/// Attribute definition pairing the declared type with its default value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeDefinition {
    /// Attribute name.
    pub name: String,
    /// Entity kind the attribute applies to.
    pub object: AttrObject,
    pub value_type: AttrValueType,
    // numeric bounds, interpreted after `value_type`
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    // labels of an ENUM attribute, by index
    pub enum_values: Vec<String>,
    /// From `BA_DEF_DEF_`.
    pub default: Option<AttributeValue>,
}

impl AttributeDefinition {
    pub fn new(name: impl Into<String>, object: AttrObject, value_type: AttrValueType) -> Self {
        AttributeDefinition {
            name: name.into(),
            object,
            value_type,
            ..Default::default()
        }
    }

    /// Creates an ENUM definition over `labels`.
    pub fn new_enum(name: impl Into<String>, object: AttrObject, labels: &[&str]) -> Self {
        AttributeDefinition {
            enum_values: labels.iter().map(|l| l.to_string()).collect(),
            ..AttributeDefinition::new(name, object, AttrValueType::Enum)
        }
    }

    /// Types a value read from DBC text according to this definition.
    ///
    /// ENUM values may be given by index or by label.
    pub fn typed_value(&self, raw: &RawAttributeValue) -> AttributeValue {
        match (self.value_type, raw) {
            (AttrValueType::Enum, RawAttributeValue::Number(n)) => n
                .parse::<f64>()
                .ok()
                .and_then(|idx| self.enum_values.get(idx as usize))
                .map(|label| AttributeValue::Enum(label.clone()))
                .unwrap_or_else(|| raw.untyped()),
            (AttrValueType::Enum, RawAttributeValue::Str(s)) => AttributeValue::Enum(s.clone()),
            (AttrValueType::String, RawAttributeValue::Str(s)) => AttributeValue::Str(s.clone()),
            (AttrValueType::String, RawAttributeValue::Number(n)) => AttributeValue::Str(n.clone()),
            (AttrValueType::Int, r) => r
                .as_f64()
                .map(|v| AttributeValue::Int(v as i64))
                .unwrap_or_else(|| raw.untyped()),
            (AttrValueType::Hex, r) => r
                .as_f64()
                .map(|v| AttributeValue::Hex(v as u64))
                .unwrap_or_else(|| raw.untyped()),
            (AttrValueType::Float, r) => r
                .as_f64()
                .map(AttributeValue::Float)
                .unwrap_or_else(|| raw.untyped()),
        }
    }

    /// Index of an ENUM label.
    pub fn enum_index(&self, label: &str) -> Option<usize> {
        self.enum_values.iter().position(|v| v == label)
    }
}

/// Attribute value types as declared by `BA_DEF_` lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AttrValueType {
    #[default]
    String,
    Int,
    Hex,
    Float,
    Enum,
}

impl fmt::Display for AttrValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttrValueType::String => "STRING",
            AttrValueType::Int => "INT",
            AttrValueType::Hex => "HEX",
            AttrValueType::Float => "FLOAT",
            AttrValueType::Enum => "ENUM",
        })
    }
}

/// Concrete attribute value stored on database/node/message/signal entities.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Hex(u64),
    Float(f64),
    Enum(String),
}

impl Default for AttributeValue {
    fn default() -> Self {
        AttributeValue::Str(String::new())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Str(s) | AttributeValue::Enum(s) => f.write_str(s),
            AttributeValue::Int(i) => write!(f, "{i}"),
            AttributeValue::Hex(h) => write!(f, "0x{h:X}"),
            AttributeValue::Float(x) => write!(f, "{x}"),
        }
    }
}

impl AttributeValue {
    /// Numeric view for INT/HEX/FLOAT values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(i) => Some(*i as f64),
            AttributeValue::Hex(h) => Some(*h as f64),
            AttributeValue::Float(x) => Some(*x),
            AttributeValue::Str(s) | AttributeValue::Enum(s) => s.parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) | AttributeValue::Enum(s) => Some(s),
            _ => None,
        }
    }
}

/// Attribute value as written in the file, before its definition types it.
#[derive(Clone, Debug, PartialEq)]
pub enum RawAttributeValue {
    /// Numeric literal, kept as text.
    Number(String),
    Str(String),
}

impl RawAttributeValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            RawAttributeValue::Number(n) | RawAttributeValue::Str(n) => n.parse().ok(),
        }
    }

    /// Value typed without a definition.
    pub fn untyped(&self) -> AttributeValue {
        match self {
            RawAttributeValue::Str(s) => AttributeValue::Str(s.clone()),
            RawAttributeValue::Number(n) => match n.parse::<i64>() {
                Ok(i) => AttributeValue::Int(i),
                Err(_) => n
                    .parse::<f64>()
                    .map(AttributeValue::Float)
                    .unwrap_or_else(|_| AttributeValue::Str(n.clone())),
            },
        }
    }
}

/// Entity kind an attribute definition targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttrObject {
    #[default]
    Database,
    Node,
    Message,
    Signal,
    EnvironmentVariable,
    /// `BU_BO_REL_`
    NodeMessage,
    /// `BU_SG_REL_`
    NodeSignal,
    /// `BU_EV_REL_`
    NodeEnvironmentVariable,
}

impl AttrObject {
    /// DBC object keyword, empty for database attributes.
    pub fn keyword(&self) -> &'static str {
        match self {
            AttrObject::Database => "",
            AttrObject::Node => "BU_",
            AttrObject::Message => "BO_",
            AttrObject::Signal => "SG_",
            AttrObject::EnvironmentVariable => "EV_",
            AttrObject::NodeMessage => "BU_BO_REL_",
            AttrObject::NodeSignal => "BU_SG_REL_",
            AttrObject::NodeEnvironmentVariable => "BU_EV_REL_",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "BU_" => AttrObject::Node,
            "BO_" => AttrObject::Message,
            "SG_" => AttrObject::Signal,
            "EV_" => AttrObject::EnvironmentVariable,
            "BU_BO_REL_" => AttrObject::NodeMessage,
            "BU_SG_REL_" => AttrObject::NodeSignal,
            "BU_EV_REL_" => AttrObject::NodeEnvironmentVariable,
            _ => return None,
        })
    }

    pub fn is_relation(&self) -> bool {
        matches!(
            self,
            AttrObject::NodeMessage | AttrObject::NodeSignal | AttrObject::NodeEnvironmentVariable
        )
    }
}

impl fmt::Display for AttrObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttrObject::Database => "Database",
            AttrObject::Node => "Node",
            AttrObject::Message => "Message",
            AttrObject::Signal => "Signal",
            AttrObject::EnvironmentVariable => "EnvironmentVariable",
            AttrObject::NodeMessage => "NodeMessage",
            AttrObject::NodeSignal => "NodeSignal",
            AttrObject::NodeEnvironmentVariable => "NodeEnvironmentVariable",
        })
    }
}

/// What a relation attribute (`BA_REL_`) is attached to.
///
/// `frame_id` keeps the DBC encoding: bit 31 flags an extended frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationTarget {
    NodeMessage {
        node: String,
        frame_id: u32,
    },
    NodeSignal {
        node: String,
        frame_id: u32,
        signal: String,
    },
    NodeEnvironmentVariable {
        node: String,
        variable: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RelationAttribute {
    pub name: String,
    pub target: RelationTarget,
    pub value: AttributeValue,
}

/// Environment variable (`EV_`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvironmentVariable {
    pub name: String,
    /// 0 integer, 1 float, 2 string.
    pub env_type: u8,
    pub minimum: f64,
    pub maximum: f64,
    pub unit: String,
    pub initial_value: f64,
    pub env_id: u32,
    pub access_type: String,
    pub access_nodes: Vec<String>,
    pub comment: Option<String>,
    pub choices: Option<Choices>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

/// DBC-only data of a database that has no home in the format-neutral model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DbcSpecifics {
    /// Attribute definitions by name.
    pub attribute_definitions: BTreeMap<String, AttributeDefinition>,
    /// Relation attribute definitions (`BA_DEF_REL_`) by name.
    pub relation_definitions: BTreeMap<String, AttributeDefinition>,
    /// Database-level attribute values.
    pub attributes: BTreeMap<String, AttributeValue>,
    pub relation_attributes: Vec<RelationAttribute>,
    /// `VAL_TABLE_` entries by name.
    pub value_tables: BTreeMap<String, Choices>,
    pub environment_variables: BTreeMap<String, EnvironmentVariable>,
}

impl DbcSpecifics {
    /// Returns the definition of `name`, relation or plain.
    pub fn definition(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attribute_definitions
            .get(name)
            .or_else(|| self.relation_definitions.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_enum_value() {
        let def = AttributeDefinition::new_enum(
            "VFrameFormat",
            AttrObject::Message,
            &["StandardCAN", "ExtendedCAN"],
        );
        assert_eq!(
            def.typed_value(&RawAttributeValue::Number("1".into())),
            AttributeValue::Enum("ExtendedCAN".into())
        );
        assert_eq!(
            def.typed_value(&RawAttributeValue::Str("StandardCAN".into())),
            AttributeValue::Enum("StandardCAN".into())
        );
        // index outside the label list stays numeric
        assert_eq!(
            def.typed_value(&RawAttributeValue::Number("7".into())),
            AttributeValue::Int(7)
        );
        assert_eq!(def.enum_index("ExtendedCAN"), Some(1));
    }

    #[test]
    fn test_typed_numeric_values() {
        let int = AttributeDefinition::new("GenMsgCycleTime", AttrObject::Message, AttrValueType::Int);
        assert_eq!(
            int.typed_value(&RawAttributeValue::Number("100".into())),
            AttributeValue::Int(100)
        );
        let float = AttributeDefinition::new("GenSigStartValue", AttrObject::Signal, AttrValueType::Float);
        assert_eq!(
            float.typed_value(&RawAttributeValue::Number("2.5".into())),
            AttributeValue::Float(2.5)
        );
        assert_eq!(
            RawAttributeValue::Number("1.5".into()).untyped(),
            AttributeValue::Float(1.5)
        );
    }

    #[test]
    fn test_object_keywords() {
        for obj in [
            AttrObject::Node,
            AttrObject::Message,
            AttrObject::Signal,
            AttrObject::EnvironmentVariable,
            AttrObject::NodeMessage,
            AttrObject::NodeSignal,
            AttrObject::NodeEnvironmentVariable,
        ] {
            assert_eq!(AttrObject::from_keyword(obj.keyword()), Some(obj));
        }
        assert!(AttrObject::NodeSignal.is_relation());
        assert!(!AttrObject::Signal.is_relation());
    }
}

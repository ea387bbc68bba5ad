//! Wire type tags.

use std::fmt;
use std::str::FromStr;

use crate::BinaryError;

/// The closed set of type tags a binary record can carry.
///
/// The discriminants are the byte values written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum OType {
    Boolean = 0,
    Integer = 1,
    Short = 2,
    Long = 3,
    Float = 4,
    Double = 5,
    DateTime = 6,
    String = 7,
    Binary = 8,
    Embedded = 9,
    EmbeddedList = 10,
    EmbeddedSet = 11,
    EmbeddedMap = 12,
    Link = 13,
    LinkList = 14,
    LinkSet = 15,
    LinkMap = 16,
    Byte = 17,
    Transient = 18,
    Date = 19,
    Custom = 20,
    Decimal = 21,
    LinkBag = 22,
    Any = 23,
    /// Placeholder for a tag byte this codec does not know. Never written.
    Unknown = 0xff,
}

const ALL: [OType; 24] = [
    OType::Boolean,
    OType::Integer,
    OType::Short,
    OType::Long,
    OType::Float,
    OType::Double,
    OType::DateTime,
    OType::String,
    OType::Binary,
    OType::Embedded,
    OType::EmbeddedList,
    OType::EmbeddedSet,
    OType::EmbeddedMap,
    OType::Link,
    OType::LinkList,
    OType::LinkSet,
    OType::LinkMap,
    OType::Byte,
    OType::Transient,
    OType::Date,
    OType::Custom,
    OType::Decimal,
    OType::LinkBag,
    OType::Any,
];

impl OType {
    /// Map a wire byte to its type. Unassigned bytes map to [`OType::Unknown`].
    pub fn from_tag(tag: u8) -> OType {
        ALL.get(usize::from(tag)).copied().unwrap_or(OType::Unknown)
    }

    /// Map a wire byte to its type, rejecting unassigned bytes.
    pub fn try_from_tag(tag: u8) -> Result<OType, BinaryError> {
        match OType::from_tag(tag) {
            OType::Unknown => Err(BinaryError::UnsupportedType(format!("type tag {tag}"))),
            t => Ok(t),
        }
    }

    /// The byte written on the wire for this type.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Upper-case name as used by the server schema.
    pub fn name(self) -> &'static str {
        match self {
            OType::Boolean => "BOOLEAN",
            OType::Integer => "INTEGER",
            OType::Short => "SHORT",
            OType::Long => "LONG",
            OType::Float => "FLOAT",
            OType::Double => "DOUBLE",
            OType::DateTime => "DATETIME",
            OType::String => "STRING",
            OType::Binary => "BINARY",
            OType::Embedded => "EMBEDDED",
            OType::EmbeddedList => "EMBEDDEDLIST",
            OType::EmbeddedSet => "EMBEDDEDSET",
            OType::EmbeddedMap => "EMBEDDEDMAP",
            OType::Link => "LINK",
            OType::LinkList => "LINKLIST",
            OType::LinkSet => "LINKSET",
            OType::LinkMap => "LINKMAP",
            OType::Byte => "BYTE",
            OType::Transient => "TRANSIENT",
            OType::Date => "DATE",
            OType::Custom => "CUSTOM",
            OType::Decimal => "DECIMAL",
            OType::LinkBag => "LINKBAG",
            OType::Any => "ANY",
            OType::Unknown => "UNKNOWN",
        }
    }

    /// Types whose values reference other records.
    pub fn is_link(self) -> bool {
        matches!(
            self,
            OType::Link | OType::LinkList | OType::LinkSet | OType::LinkMap | OType::LinkBag
        )
    }

    /// Embedded list, set and map.
    pub fn is_embedded_collection(self) -> bool {
        matches!(
            self,
            OType::EmbeddedList | OType::EmbeddedSet | OType::EmbeddedMap
        )
    }
}

impl fmt::Display for OType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown type name '{0}'")]
pub struct ParseOTypeError(String);

impl FromStr for OType {
    type Err = ParseOTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        ALL.iter()
            .copied()
            .find(|t| t.name() == upper)
            .ok_or_else(|| ParseOTypeError(s.to_string()))
    }
}

#[cfg(feature = "config")]
impl<'de> serde::Deserialize<'de> for OType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

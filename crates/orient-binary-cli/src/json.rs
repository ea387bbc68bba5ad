//! JSON view of documents.
//!
//! A document is written as
//!
//! ```json
//! {"class": "Person", "fields": [{"name": "age", "type": "INTEGER", "value": 36}]}
//! ```
//!
//! Collection elements and map values carry their own type the same way:
//! `{"type": "STRING", "value": "x"}`, or `null` when absent.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, NaiveDate, Utc};
use orient_binary::ridbag::BagRepr;
use orient_binary::{
    BagPolicy, BinaryError, Decimal, Document, OType, ParseDecimalError, ParseOTypeError,
    ParseRidError, Rid, RidBag, Value,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json, json};
use thiserror::Error;

/// Error building a [`Value`] from JSON.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("{0}")]
    UnknownType(#[from] ParseOTypeError),

    #[error("expected {expected} for {otype}, got {got}")]
    Shape {
        otype: OType,
        expected: &'static str,
        got: String,
    },

    #[error("{0}")]
    Decimal(#[from] ParseDecimalError),

    #[error("{0}")]
    Rid(#[from] ParseRidError),

    #[error("invalid {otype} '{text}'")]
    Time { otype: OType, text: String },

    #[error("{0}")]
    Hex(String),

    #[error("{0} values cannot be built from JSON")]
    Unsupported(OType),

    #[error("{0}")]
    Bag(#[source] BinaryError),

    #[error("in '{name}': {source}")]
    Field {
        name: String,
        #[source]
        source: Box<ConvertError>,
    },
}

impl ConvertError {
    fn shape(otype: OType, expected: &'static str, got: &Json) -> Self {
        Self::Shape {
            otype,
            expected,
            got: got.to_string(),
        }
    }

    fn in_field(self, name: &str) -> Self {
        Self::Field {
            name: name.to_string(),
            source: Box::new(self),
        }
    }

    /// The error beneath any field wrappers.
    pub fn root_cause(&self) -> &ConvertError {
        match self {
            Self::Field { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DocumentJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldJson>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FieldJson {
    pub name: String,
    #[serde(rename = "type")]
    pub otype: String,
    #[serde(default)]
    pub value: Json,
}

#[derive(Debug, Serialize, Deserialize)]
struct TypedJson {
    #[serde(rename = "type")]
    otype: String,
    #[serde(default)]
    value: Json,
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Parse hex digits, ignoring whitespace and an optional `0x` prefix.
pub fn hex_to_bytes(text: &str) -> Result<Vec<u8>, String> {
    let text = text.trim();
    let text = text.strip_prefix("0x").unwrap_or(text);
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{text}'"));
    }
    digits
        .chunks_exact(2)
        .map(|pair| match pair {
            [hi, lo] => match (hex_digit(*hi), hex_digit(*lo)) {
                (Some(hi), Some(lo)) => Ok((hi << 4) | lo),
                _ => Err(format!("invalid hex digits '{}{}'", *hi as char, *lo as char)),
            },
            _ => Err("incomplete hex pair".to_string()),
        })
        .collect()
}

// =============================================================================
// Document -> JSON
// =============================================================================

pub fn document_to_json(doc: &Document) -> DocumentJson {
    DocumentJson {
        class: doc.classname().map(str::to_string),
        rid: doc.rid().map(|rid| rid.to_string()),
        fields: doc
            .iter()
            .map(|entry| FieldJson {
                name: entry.name.clone(),
                otype: entry.otype.to_string(),
                value: entry.value.as_ref().map_or(Json::Null, value_to_json),
            })
            .collect(),
    }
}

fn typed_to_json(value: Option<&Value>) -> Json {
    match value {
        None => Json::Null,
        Some(value) => json!({
            "type": value.otype().to_string(),
            "value": value_to_json(value),
        }),
    }
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Boolean(v) => json!(v),
        Value::Byte(v) => json!(v),
        Value::Short(v) => json!(v),
        Value::Integer(v) => json!(v),
        Value::Long(v) => json!(v),
        Value::Float(v) => json!(v),
        Value::Double(v) => json!(v),
        Value::DateTime(v) => json!(v.to_rfc3339()),
        Value::Date(v) => json!(v.to_string()),
        Value::String(v) => json!(v),
        Value::Binary(v) | Value::Custom(v) => json!(bytes_to_hex(v)),
        Value::Decimal(v) => json!(v.to_string()),
        Value::Embedded(doc) => serde_json::to_value(document_to_json(doc)).unwrap_or(Json::Null),
        Value::EmbeddedList(items) | Value::EmbeddedSet(items) => {
            Json::Array(items.iter().map(|item| typed_to_json(item.as_ref())).collect())
        }
        Value::EmbeddedMap(map) => Json::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), typed_to_json(v.as_ref())))
                .collect(),
        ),
        Value::Link(rid) => json!(rid.to_string()),
        Value::LinkList(links) | Value::LinkSet(links) => {
            Json::Array(links.iter().map(|rid| json!(rid.to_string())).collect())
        }
        Value::LinkMap(map) => Json::Object(
            map.iter()
                .map(|(k, rid)| (k.clone(), json!(rid.to_string())))
                .collect(),
        ),
        Value::LinkBag(bag) => bag_to_json(bag),
    }
}

fn bag_to_json(bag: &RidBag) -> Json {
    match bag.repr() {
        BagRepr::Embedded(links) => json!({
            "embedded": links.iter().map(Rid::to_string).collect::<Vec<_>>(),
        }),
        BagRepr::Remote(_) => {
            let mut remote = Map::new();
            if let Some(pointer) = bag.pointer() {
                remote.insert("file_id".into(), json!(pointer.file_id));
                remote.insert("page_index".into(), json!(pointer.page_index));
                remote.insert("page_offset".into(), json!(pointer.page_offset));
            }
            if let Some(len) = bag.len() {
                remote.insert("size".into(), json!(len));
            }
            let changes = bag.pending_changes().map_or(0, |c| c.len());
            if changes > 0 {
                remote.insert("pending_changes".into(), json!(changes));
            }
            json!({ "remote": remote })
        }
    }
}

// =============================================================================
// JSON -> Document
// =============================================================================

/// Build a document. Link bags are sized against `bags`.
pub fn document_from_json(
    input: &DocumentJson,
    bags: &BagPolicy,
) -> Result<Document, ConvertError> {
    let mut doc = Document::new();
    if let Some(class) = &input.class {
        doc.set_classname(class.as_str());
    }
    if let Some(rid) = &input.rid {
        doc.set_rid(rid.parse()?);
    }
    for field in &input.fields {
        let otype: OType = field
            .otype
            .parse()
            .map_err(|e: ParseOTypeError| ConvertError::from(e).in_field(&field.name))?;
        let value = value_from_json(otype, &field.value, bags).map_err(|e| e.in_field(&field.name))?;
        doc.set_typed(field.name.as_str(), otype, value);
    }
    Ok(doc)
}

fn typed_from_json(json: &Json, bags: &BagPolicy) -> Result<Option<Value>, ConvertError> {
    if json.is_null() {
        return Ok(None);
    }
    let typed: TypedJson = serde_json::from_value(json.clone())
        .map_err(|_| ConvertError::shape(OType::Any, "{\"type\", \"value\"}", json))?;
    let otype: OType = typed.otype.parse()?;
    value_from_json(otype, &typed.value, bags)
}

fn int_from_json<T: TryFrom<i64>>(otype: OType, json: &Json) -> Result<T, ConvertError> {
    json.as_i64()
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| ConvertError::shape(otype, "an integer in range", json))
}

fn str_from_json(otype: OType, json: &Json) -> Result<&str, ConvertError> {
    json.as_str()
        .ok_or_else(|| ConvertError::shape(otype, "a string", json))
}

fn array_from_json(otype: OType, json: &Json) -> Result<&Vec<Json>, ConvertError> {
    json.as_array()
        .ok_or_else(|| ConvertError::shape(otype, "an array", json))
}

fn object_from_json(otype: OType, json: &Json) -> Result<&Map<String, Json>, ConvertError> {
    json.as_object()
        .ok_or_else(|| ConvertError::shape(otype, "an object", json))
}

fn links_from_json(otype: OType, json: &Json) -> Result<Vec<Rid>, ConvertError> {
    array_from_json(otype, json)?
        .iter()
        .map(|item| -> Result<Rid, ConvertError> { Ok(str_from_json(otype, item)?.parse()?) })
        .collect()
}

/// Build a value of type `otype`. JSON `null` is an absent value.
pub fn value_from_json(
    otype: OType,
    json: &Json,
    bags: &BagPolicy,
) -> Result<Option<Value>, ConvertError> {
    if json.is_null() {
        return Ok(None);
    }
    let value = match otype {
        OType::Boolean => Value::Boolean(
            json.as_bool()
                .ok_or_else(|| ConvertError::shape(otype, "a boolean", json))?,
        ),
        OType::Byte => Value::Byte(int_from_json(otype, json)?),
        OType::Short => Value::Short(int_from_json(otype, json)?),
        OType::Integer => Value::Integer(int_from_json(otype, json)?),
        OType::Long => Value::Long(int_from_json(otype, json)?),
        OType::Float => Value::Float(
            json.as_f64()
                .ok_or_else(|| ConvertError::shape(otype, "a number", json))? as f32,
        ),
        OType::Double => Value::Double(
            json.as_f64()
                .ok_or_else(|| ConvertError::shape(otype, "a number", json))?,
        ),
        OType::DateTime => {
            let text = str_from_json(otype, json)?;
            let parsed = DateTime::parse_from_rfc3339(text).map_err(|_| ConvertError::Time {
                otype,
                text: text.to_string(),
            })?;
            Value::DateTime(parsed.with_timezone(&Utc))
        }
        OType::Date => {
            let text = str_from_json(otype, json)?;
            Value::Date(
                text.parse::<NaiveDate>()
                    .map_err(|_| ConvertError::Time {
                        otype,
                        text: text.to_string(),
                    })?,
            )
        }
        OType::String => Value::String(str_from_json(otype, json)?.to_string()),
        OType::Binary => {
            Value::Binary(hex_to_bytes(str_from_json(otype, json)?).map_err(ConvertError::Hex)?)
        }
        OType::Decimal => {
            let decimal: Decimal = match json {
                Json::Number(n) => n.to_string().parse()?,
                _ => str_from_json(otype, json)?.parse()?,
            };
            Value::Decimal(decimal)
        }
        OType::Embedded => {
            let nested: DocumentJson = serde_json::from_value(json.clone())
                .map_err(|_| ConvertError::shape(otype, "a document object", json))?;
            Value::Embedded(Box::new(document_from_json(&nested, bags)?))
        }
        OType::EmbeddedList | OType::EmbeddedSet => {
            let items = array_from_json(otype, json)?
                .iter()
                .map(|item| typed_from_json(item, bags))
                .collect::<Result<Vec<_>, _>>()?;
            if otype == OType::EmbeddedList {
                Value::EmbeddedList(items)
            } else {
                Value::EmbeddedSet(items)
            }
        }
        OType::EmbeddedMap => {
            let mut map = BTreeMap::new();
            for (key, item) in object_from_json(otype, json)? {
                let item = typed_from_json(item, bags).map_err(|e| e.in_field(key))?;
                map.insert(key.clone(), item);
            }
            Value::EmbeddedMap(map)
        }
        OType::Link => Value::Link(str_from_json(otype, json)?.parse::<Rid>()?),
        OType::LinkList => Value::LinkList(links_from_json(otype, json)?),
        OType::LinkSet => Value::LinkSet(links_from_json(otype, json)?),
        OType::LinkMap => {
            let mut map = BTreeMap::new();
            for (key, item) in object_from_json(otype, json)? {
                map.insert(key.clone(), str_from_json(otype, item)?.parse::<Rid>()?);
            }
            Value::LinkMap(map)
        }
        OType::LinkBag => {
            let links = object_from_json(otype, json)?
                .get("embedded")
                .ok_or_else(|| ConvertError::shape(otype, "{\"embedded\": [...]}", json))?;
            let bag = RidBag::from_links(links_from_json(otype, links)?, bags)
                .map_err(ConvertError::Bag)?;
            Value::LinkBag(bag)
        }
        OType::Transient | OType::Any => return Ok(None),
        OType::Custom | OType::Unknown => return Err(ConvertError::Unsupported(otype)),
    };
    Ok(Some(value))
}

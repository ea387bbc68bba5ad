//! Field values.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use num_bigint::BigInt;
use thiserror::Error;

use crate::{Document, OType, Rid, RidBag};

/// Arbitrary-precision decimal: `unscaled * 10^-scale`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub scale: i32,
    pub unscaled: BigInt,
}

impl Decimal {
    pub fn new(unscaled: impl Into<BigInt>, scale: i32) -> Self {
        Self {
            scale,
            unscaled: unscaled.into(),
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.unscaled.magnitude().to_string();
        let sign = if self.unscaled.sign() == num_bigint::Sign::Minus {
            "-"
        } else {
            ""
        };
        let Ok(scale) = usize::try_from(self.scale) else {
            return write!(f, "{}E{}", self.unscaled, -i64::from(self.scale));
        };
        if scale == 0 {
            write!(f, "{sign}{digits}")
        } else if digits.len() > scale {
            let (int, frac) = digits.split_at(digits.len() - scale);
            write!(f, "{sign}{int}.{frac}")
        } else {
            write!(f, "{sign}0.{}{digits}", "0".repeat(scale - digits.len()))
        }
    }
}

/// Error parsing a [`Decimal`] from text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid decimal '{0}'")]
pub struct ParseDecimalError(pub String);

/// Parses the forms written by `Display`: `-12.50`, `0.005`, `7E2`.
impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDecimalError(s.to_string());
        let (mantissa, exponent) = match s.split_once(['E', 'e']) {
            Some((m, e)) => (m, e.parse::<i32>().map_err(|_| err())?),
            None => (s, 0),
        };
        let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let unscaled: BigInt = format!("{int}{frac}").parse().map_err(|_| err())?;
        let frac_len = i32::try_from(frac.len()).map_err(|_| err())?;
        let scale = frac_len.checked_sub(exponent).ok_or_else(err)?;
        Ok(Decimal::new(unscaled, scale))
    }
}

/// A decoded or to-be-encoded field value.
///
/// Each variant corresponds to one wire type; [`Value::otype`] gives it.
/// Absent values are represented by `None` at the container level (document
/// fields, collection elements, map values), never by a variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Byte(u8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    String(String),
    Binary(Vec<u8>),
    Decimal(Decimal),
    Embedded(Box<Document>),
    EmbeddedList(Vec<Option<Value>>),
    EmbeddedSet(Vec<Option<Value>>),
    EmbeddedMap(BTreeMap<String, Option<Value>>),
    Link(Rid),
    LinkList(Vec<Rid>),
    LinkSet(Vec<Rid>),
    LinkMap(BTreeMap<String, Rid>),
    LinkBag(RidBag),
    /// Raw bytes of a CUSTOM value. Carried for callers only; the codec
    /// rejects it in both directions.
    Custom(Vec<u8>),
}

impl Value {
    /// The wire type this value is naturally written as.
    pub fn otype(&self) -> OType {
        match self {
            Value::Boolean(_) => OType::Boolean,
            Value::Byte(_) => OType::Byte,
            Value::Short(_) => OType::Short,
            Value::Integer(_) => OType::Integer,
            Value::Long(_) => OType::Long,
            Value::Float(_) => OType::Float,
            Value::Double(_) => OType::Double,
            Value::DateTime(_) => OType::DateTime,
            Value::Date(_) => OType::Date,
            Value::String(_) => OType::String,
            Value::Binary(_) => OType::Binary,
            Value::Decimal(_) => OType::Decimal,
            Value::Embedded(_) => OType::Embedded,
            Value::EmbeddedList(_) => OType::EmbeddedList,
            Value::EmbeddedSet(_) => OType::EmbeddedSet,
            Value::EmbeddedMap(_) => OType::EmbeddedMap,
            Value::Link(_) => OType::Link,
            Value::LinkList(_) => OType::LinkList,
            Value::LinkSet(_) => OType::LinkSet,
            Value::LinkMap(_) => OType::LinkMap,
            Value::LinkBag(_) => OType::LinkBag,
            Value::Custom(_) => OType::Custom,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Integral value widened to `i64` (BYTE, SHORT, INTEGER, LONG).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(i64::from(*v)),
            Value::Short(v) => Some(i64::from(*v)),
            Value::Integer(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Embedded(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_rid(&self) -> Option<Rid> {
        match self {
            Value::Link(rid) => Some(*rid),
            _ => None,
        }
    }

    /// RIDs of a LINKLIST or LINKSET.
    pub fn as_links(&self) -> Option<&[Rid]> {
        match self {
            Value::LinkList(links) | Value::LinkSet(links) => Some(links),
            _ => None,
        }
    }

    /// Elements of an EMBEDDEDLIST or EMBEDDEDSET.
    pub fn as_list(&self) -> Option<&[Option<Value>]> {
        match self {
            Value::EmbeddedList(items) | Value::EmbeddedSet(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_link_bag(&self) -> Option<&RidBag> {
        match self {
            Value::LinkBag(bag) => Some(bag),
            _ => None,
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_for_value!(
    bool => Boolean,
    u8 => Byte,
    i16 => Short,
    i32 => Integer,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    DateTime<Utc> => DateTime,
    NaiveDate => Date,
    String => String,
    Vec<u8> => Binary,
    Decimal => Decimal,
    Rid => Link,
    RidBag => LinkBag,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Embedded(Box::new(doc))
    }
}

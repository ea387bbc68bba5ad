//! Document and value decoding.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::{DateTime, Days, NaiveDate};
use num_bigint::BigInt;

use crate::logging::{debug, trace};
use crate::serialize::{SERIALIZATION_VERSION, unix_epoch};
use crate::stream::Reader;
use crate::{BinaryError, DocEntry, Document, OType, RecordSerializer, Rid, RidBag, Value};

/// A header entry waiting for its value.
struct PendingField {
    name: String,
    otype: OType,
    pointer: usize,
}

/// Validate a header pointer. Zero means "no value".
fn check_pointer(pointer: i32, len: usize) -> Result<usize, BinaryError> {
    usize::try_from(pointer)
        .ok()
        .filter(|&p| p < len)
        .ok_or_else(|| {
            BinaryError::malformed(format!("pointer {pointer} outside buffer of {len} bytes"))
        })
}

/// A DATE travels as whole days since the epoch.
fn date_from_days(days: i64) -> Result<NaiveDate, BinaryError> {
    let epoch = unix_epoch();
    let date = match u64::try_from(days) {
        Ok(d) => epoch.checked_add_days(Days::new(d)),
        Err(_) => epoch.checked_sub_days(Days::new(days.unsigned_abs())),
    };
    date.ok_or_else(|| BinaryError::malformed(format!("date {days} days from epoch out of range")))
}

impl RecordSerializer<'_> {
    /// Decode a document without a version byte into `target`.
    ///
    /// Pointers in `bytes` are taken as absolute offsets into `bytes`. Fields
    /// already present on `target` keep their current values.
    pub fn deserialize_document(
        &self,
        bytes: &[u8],
        target: &mut Document,
    ) -> Result<(), BinaryError> {
        self.deserialize_document_at(bytes, 0, target).map(|_| ())
    }

    /// Decode a document starting at `offset` inside `bytes`, the counterpart
    /// of serializing with a non-zero outer offset. Returns the position just
    /// past the furthest byte the document occupies.
    pub fn deserialize_document_at(
        &self,
        bytes: &[u8],
        offset: usize,
        target: &mut Document,
    ) -> Result<usize, BinaryError> {
        let mut r = Reader::new(bytes);
        r.seek(offset)?;
        self.read_document(&mut r, target, 0)?;
        Ok(r.position())
    }

    /// Decode a top-level record (version byte plus document) into `target`.
    pub fn deserialize_record(
        &self,
        bytes: &[u8],
        target: &mut Document,
    ) -> Result<(), BinaryError> {
        let mut r = Reader::new(bytes);
        let version = r.read_byte()?;
        if version != SERIALIZATION_VERSION {
            return Err(BinaryError::UnsupportedVersion(version));
        }
        self.read_document(&mut r, target, 0)
    }

    /// Read a header and its values, leaving the reader after the furthest
    /// byte consumed by any value.
    pub(crate) fn read_document(
        &self,
        r: &mut Reader<'_>,
        target: &mut Document,
        depth: usize,
    ) -> Result<(), BinaryError> {
        self.check_depth(depth)?;
        let classname = r.read_string()?;
        if target.classname().is_none() && !classname.is_empty() {
            target.set_classname(classname);
        }

        let fields = self.read_header(r)?;
        let mut furthest = r.position();
        let owner = target.rid();

        for field in &fields {
            let value = if field.pointer == 0 {
                None
            } else {
                r.seek(field.pointer)?;
                let value = self
                    .read_value(r, field.otype, depth)
                    .map_err(|e| e.in_field(&field.name))?;
                furthest = furthest.max(r.position());
                value
            };
            let value = match value {
                Some(Value::LinkBag(mut bag)) => {
                    bag.set_owner(owner);
                    Some(Value::LinkBag(bag))
                }
                other => other,
            };
            if !target.insert_if_absent(DocEntry::new(field.name.clone(), field.otype, value)) {
                trace!(field = %field.name, "keeping existing field");
            }
        }

        r.seek(furthest)?;
        debug!(
            class = target.classname().unwrap_or_default(),
            fields = fields.len(),
            depth,
            "decoded document"
        );
        Ok(())
    }

    fn read_header(&self, r: &mut Reader<'_>) -> Result<Vec<PendingField>, BinaryError> {
        let mut fields = Vec::new();
        loop {
            let len = r.read_varint32()?;
            if len == 0 {
                break;
            }
            let (name, pointer, otype) = if len > 0 {
                let raw = r.read_bytes(len.unsigned_abs() as usize)?;
                let name = std::str::from_utf8(raw)
                    .map_err(|_| BinaryError::InvalidUtf8)?
                    .to_string();
                let pointer = r.read_i32()?;
                let otype = OType::try_from_tag(r.read_byte()?).map_err(|e| e.in_field(&name))?;
                (name, pointer, otype)
            } else {
                let id = -(len + 1);
                let property = self
                    .properties
                    .resolve(id)
                    .ok_or(BinaryError::GlobalPropertyNotFound(id))?;
                trace!(id, name = %property.name, otype = %property.otype, "resolved global property");
                let pointer = r.read_i32()?;
                let otype = if property.otype == OType::Any {
                    OType::try_from_tag(r.read_byte()?).map_err(|e| e.in_field(&property.name))?
                } else {
                    property.otype
                };
                (property.name, pointer, otype)
            };
            let pointer = if pointer == 0 {
                0
            } else {
                check_pointer(pointer, r.len()).map_err(|e| e.in_field(&name))?
            };
            fields.push(PendingField {
                name,
                otype,
                pointer,
            });
        }
        Ok(fields)
    }

    /// Read one value of type `otype` at the cursor. `None` is an absent
    /// value: a null link, or a type that carries no bytes.
    pub(crate) fn read_value(
        &self,
        r: &mut Reader<'_>,
        otype: OType,
        depth: usize,
    ) -> Result<Option<Value>, BinaryError> {
        let value = match otype {
            OType::Boolean => Value::Boolean(r.read_bool()?),
            OType::Byte => Value::Byte(r.read_byte()?),
            OType::Short => {
                let v = r.read_varint32()?;
                Value::Short(
                    i16::try_from(v)
                        .map_err(|_| BinaryError::malformed(format!("SHORT value {v} out of range")))?,
                )
            }
            OType::Integer => Value::Integer(r.read_varint32()?),
            OType::Long => Value::Long(r.read_varint64()?),
            OType::Float => Value::Float(r.read_f32()?),
            OType::Double => Value::Double(r.read_f64()?),
            OType::DateTime => {
                let millis = r.read_varint64()?;
                Value::DateTime(DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                    BinaryError::malformed(format!("datetime {millis}ms out of range"))
                })?)
            }
            OType::Date => Value::Date(date_from_days(r.read_varint64()?)?),
            OType::String => Value::String(r.read_string()?),
            OType::Binary => Value::Binary(r.read_binary()?.to_vec()),
            OType::Decimal => {
                let scale = r.read_i32()?;
                let len = r.read_i32()?;
                let len = usize::try_from(len).map_err(|_| {
                    BinaryError::malformed(format!("negative decimal length {len}"))
                })?;
                let magnitude = r.read_bytes(len)?;
                Value::Decimal(crate::Decimal {
                    scale,
                    unscaled: BigInt::from_signed_bytes_be(magnitude),
                })
            }
            OType::Embedded => {
                let mut doc = Document::new();
                self.read_document(r, &mut doc, depth + 1)?;
                Value::Embedded(Box::new(doc))
            }
            OType::EmbeddedList => Value::EmbeddedList(self.read_embedded_collection(r, depth + 1)?),
            OType::EmbeddedSet => Value::EmbeddedSet(self.read_embedded_collection(r, depth + 1)?),
            OType::EmbeddedMap => Value::EmbeddedMap(self.read_embedded_map(r, depth + 1)?),
            OType::Link => {
                let rid = Rid::read_link(r)?;
                if rid == Rid::NULL_LINK {
                    return Ok(None);
                }
                Value::Link(rid)
            }
            OType::LinkList => Value::LinkList(read_links(r)?),
            OType::LinkSet => Value::LinkSet(read_links(r)?),
            OType::LinkMap => {
                let count = read_count(r)?;
                let mut map = BTreeMap::new();
                for _ in 0..count {
                    read_string_key_tag(r)?;
                    let key = r.read_string()?;
                    let rid = Rid::read_link(r)?;
                    insert_unique(&mut map, key, rid)?;
                }
                Value::LinkMap(map)
            }
            OType::LinkBag => Value::LinkBag(RidBag::read(r)?),
            OType::Transient | OType::Any => return Ok(None),
            OType::Custom | OType::Unknown => {
                return Err(BinaryError::UnsupportedType(otype.to_string()));
            }
        };
        Ok(Some(value))
    }

    fn read_embedded_collection(
        &self,
        r: &mut Reader<'_>,
        depth: usize,
    ) -> Result<Vec<Option<Value>>, BinaryError> {
        self.check_depth(depth)?;
        let count = read_count(r)?;
        let element_type = OType::try_from_tag(r.read_byte()?)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let item = if element_type == OType::Any {
                match OType::try_from_tag(r.read_byte()?)? {
                    OType::Any => None,
                    item_type => self.read_value(r, item_type, depth)?,
                }
            } else {
                self.read_value(r, element_type, depth)?
            };
            items.push(item);
        }
        Ok(items)
    }

    /// Map header (key, pointer, type per entry) followed by out-of-line values,
    /// decoded like a document's header and data section.
    fn read_embedded_map(
        &self,
        r: &mut Reader<'_>,
        depth: usize,
    ) -> Result<BTreeMap<String, Option<Value>>, BinaryError> {
        self.check_depth(depth)?;
        let count = read_count(r)?;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            read_string_key_tag(r)?;
            let key = r.read_string()?;
            let pointer = r.read_i32()?;
            let tag = r.read_byte()?;
            entries.push((key, pointer, tag));
        }

        let mut furthest = r.position();
        let mut map = BTreeMap::new();
        for (key, pointer, tag) in entries {
            let value = if pointer == 0 {
                None
            } else {
                let pointer = check_pointer(pointer, r.len()).map_err(|e| e.in_field(&key))?;
                let item_type = OType::try_from_tag(tag).map_err(|e| e.in_field(&key))?;
                r.seek(pointer)?;
                let value = self
                    .read_value(r, item_type, depth)
                    .map_err(|e| e.in_field(&key))?;
                furthest = furthest.max(r.position());
                value
            };
            insert_unique(&mut map, key, value)?;
        }
        r.seek(furthest)?;
        Ok(map)
    }
}

/// Read a collection count, rejecting counts larger than the bytes left.
fn read_count(r: &mut Reader<'_>) -> Result<usize, BinaryError> {
    let count = r.read_len()?;
    if count > r.remaining() {
        return Err(BinaryError::malformed(format!(
            "collection of {count} entries with {} bytes left",
            r.remaining()
        )));
    }
    Ok(count)
}

/// Map keys are unique on the wire; a repeat means a corrupt record.
fn insert_unique<V>(
    map: &mut BTreeMap<String, V>,
    key: String,
    value: V,
) -> Result<(), BinaryError> {
    match map.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(value);
            Ok(())
        }
        Entry::Occupied(slot) => Err(BinaryError::malformed(format!(
            "duplicate map key '{}'",
            slot.key()
        ))),
    }
}

fn read_links(r: &mut Reader<'_>) -> Result<Vec<Rid>, BinaryError> {
    let count = read_count(r)?;
    (0..count).map(|_| Rid::read_link(r)).collect()
}

fn read_string_key_tag(r: &mut Reader<'_>) -> Result<(), BinaryError> {
    let tag = r.read_byte()?;
    match OType::from_tag(tag) {
        OType::String => Ok(()),
        other => Err(BinaryError::UnsupportedType(format!(
            "map key of type {other} (tag {tag})"
        ))),
    }
}

//! Document and value encoding.

use chrono::NaiveDate;

use crate::logging::trace;
use crate::stream::{PointerSlot, Writer};
use crate::{BinaryError, DocEntry, Document, OType, RecordSerializer, Value};

/// Version byte written in front of a top-level record.
pub const SERIALIZATION_VERSION: u8 = 0;

pub(crate) fn unix_epoch() -> NaiveDate {
    NaiveDate::default()
}

/// Convert a writer position into an on-wire pointer.
fn pointer_at(base: usize, pos: usize) -> Result<i32, BinaryError> {
    base.checked_add(pos)
        .and_then(|p| i32::try_from(p).ok())
        .ok_or_else(|| BinaryError::malformed(format!("offset {base}+{pos} exceeds i32 range")))
}

/// Type written in the header for an entry: ANY resolves to the value's own type.
fn resolved_type(entry: &DocEntry) -> OType {
    match (&entry.otype, &entry.value) {
        (OType::Any, Some(value)) => value.otype(),
        (otype, _) => *otype,
    }
}

impl RecordSerializer<'_> {
    /// Encode a document without a version byte.
    ///
    /// `outer_offset` is the absolute position the first byte will occupy in
    /// the final buffer; all value pointers are relative to that buffer.
    pub fn serialize_document(
        &self,
        doc: &Document,
        outer_offset: usize,
    ) -> Result<Vec<u8>, BinaryError> {
        let mut w = Writer::with_capacity(64);
        self.write_document(&mut w, doc, outer_offset, 0)?;
        Ok(w.into_bytes())
    }

    /// Encode a top-level record: version byte followed by the document.
    pub fn serialize_record(&self, doc: &Document) -> Result<Vec<u8>, BinaryError> {
        let mut w = Writer::with_capacity(64);
        w.write_byte(SERIALIZATION_VERSION);
        self.write_document(&mut w, doc, 0, 0)?;
        Ok(w.into_bytes())
    }

    /// Write header then data section. `base` is the absolute offset of the
    /// writer's position 0.
    pub(crate) fn write_document(
        &self,
        w: &mut Writer,
        doc: &Document,
        base: usize,
        depth: usize,
    ) -> Result<(), BinaryError> {
        self.check_depth(depth)?;
        w.write_string(doc.classname().unwrap_or_default())?;

        let mut slots: Vec<(&DocEntry, OType, PointerSlot)> = Vec::with_capacity(doc.len());
        for entry in doc {
            let otype = resolved_type(entry);
            if otype == OType::Unknown {
                return Err(BinaryError::UnsupportedType(otype.to_string()).in_field(&entry.name));
            }
            w.write_string(&entry.name)?;
            let slot = w.reserve_pointer();
            w.write_byte(otype.tag());
            slots.push((entry, otype, slot));
        }
        w.write_varint32(0);

        let mut patches: Vec<(PointerSlot, i32)> = Vec::with_capacity(slots.len());
        for (entry, otype, slot) in slots {
            let Some(value) = &entry.value else {
                continue;
            };
            let pos = w.position();
            self.write_value(w, value, otype, base, depth)
                .map_err(|e| e.in_field(&entry.name))?;
            if w.position() > pos {
                patches.push((slot, pointer_at(base, pos)?));
            }
        }
        for (slot, pointer) in patches {
            w.patch_pointer(slot, pointer)?;
        }
        Ok(())
    }

    /// Write one value as `otype`, failing with a type mismatch if the value
    /// has a different shape.
    pub(crate) fn write_value(
        &self,
        w: &mut Writer,
        value: &Value,
        otype: OType,
        base: usize,
        depth: usize,
    ) -> Result<(), BinaryError> {
        match (otype, value) {
            (OType::Boolean, Value::Boolean(v)) => w.write_bool(*v),
            (OType::Byte, Value::Byte(v)) => w.write_byte(*v),
            (OType::Short, Value::Short(v)) => w.write_varint32(i32::from(*v)),
            (OType::Integer, Value::Integer(v)) => w.write_varint32(*v),
            (OType::Long, Value::Long(v)) => w.write_varint64(*v),
            (OType::Float, Value::Float(v)) => w.write_f32(*v),
            (OType::Double, Value::Double(v)) => w.write_f64(*v),
            (OType::DateTime, Value::DateTime(v)) => w.write_varint64(v.timestamp_millis()),
            (OType::Date, Value::Date(v)) => {
                w.write_varint64(v.signed_duration_since(unix_epoch()).num_days());
            }
            (OType::String, Value::String(v)) => w.write_string(v)?,
            (OType::Binary, Value::Binary(v)) => w.write_binary(v)?,
            (OType::Decimal, Value::Decimal(v)) => {
                let bytes = v.unscaled.to_signed_bytes_be();
                w.write_i32(v.scale);
                let len = i32::try_from(bytes.len())
                    .map_err(|_| BinaryError::malformed("decimal magnitude too large"))?;
                w.write_i32(len);
                w.write_bytes(&bytes);
            }
            (OType::Embedded, Value::Embedded(doc)) => {
                self.write_document(w, doc, base, depth + 1)?;
            }
            (OType::EmbeddedList, Value::EmbeddedList(items))
            | (OType::EmbeddedSet, Value::EmbeddedSet(items)) => {
                self.write_embedded_collection(w, items, base, depth + 1)?;
            }
            (OType::EmbeddedMap, Value::EmbeddedMap(map)) => {
                self.check_depth(depth + 1)?;
                w.write_len(map.len())?;
                let mut slots = Vec::with_capacity(map.len());
                for (key, item) in map {
                    w.write_byte(OType::String.tag());
                    w.write_string(key)?;
                    let slot = w.reserve_pointer();
                    let item_type = item.as_ref().map_or(OType::Any, Value::otype);
                    w.write_byte(item_type.tag());
                    slots.push((key, item, item_type, slot));
                }
                let mut patches = Vec::with_capacity(slots.len());
                for (key, item, item_type, slot) in slots {
                    let Some(item) = item else {
                        continue;
                    };
                    let pos = w.position();
                    self.write_value(w, item, item_type, base, depth + 1)
                        .map_err(|e| e.in_field(key))?;
                    if w.position() > pos {
                        patches.push((slot, pointer_at(base, pos)?));
                    }
                }
                for (slot, pointer) in patches {
                    w.patch_pointer(slot, pointer)?;
                }
            }
            (OType::Link, Value::Link(rid)) => rid.write_link(w),
            (OType::LinkList, Value::LinkList(links))
            | (OType::LinkSet, Value::LinkSet(links)) => {
                w.write_len(links.len())?;
                for rid in links {
                    rid.write_link(w);
                }
            }
            (OType::LinkMap, Value::LinkMap(map)) => {
                w.write_len(map.len())?;
                for (key, rid) in map {
                    w.write_byte(OType::String.tag());
                    w.write_string(key)?;
                    rid.write_link(w);
                }
            }
            (OType::LinkBag, Value::LinkBag(bag)) => bag.write(w)?,
            (OType::Transient | OType::Any, _) => {
                trace!(%otype, "value not written");
            }
            (OType::Custom | OType::Unknown, _) => {
                return Err(BinaryError::UnsupportedType(otype.to_string()));
            }
            (expected, value) => {
                return Err(BinaryError::mismatch(
                    expected.name(),
                    value.otype().name(),
                ));
            }
        }
        Ok(())
    }

    /// Count, element type ANY, then a type byte and value per element.
    /// An absent element is the ANY byte alone.
    fn write_embedded_collection(
        &self,
        w: &mut Writer,
        items: &[Option<Value>],
        base: usize,
        depth: usize,
    ) -> Result<(), BinaryError> {
        self.check_depth(depth)?;
        w.write_len(items.len())?;
        w.write_byte(OType::Any.tag());
        for item in items {
            match item {
                None => w.write_byte(OType::Any.tag()),
                Some(item) => {
                    let item_type = item.otype();
                    w.write_byte(item_type.tag());
                    self.write_value(w, item, item_type, base, depth)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn check_depth(&self, depth: usize) -> Result<(), BinaryError> {
        if depth > self.config.max_depth {
            return Err(BinaryError::DepthLimitExceeded(self.config.max_depth));
        }
        Ok(())
    }
}

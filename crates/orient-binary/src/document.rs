//! Documents: named, typed fields with an optional class.

use crate::{OType, Rid, Value};

/// One field of a document.
///
/// `value` is `None` for a field that is declared but absent; such a field
/// is still written to the record header, with a zero value pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct DocEntry {
    pub name: String,
    pub otype: OType,
    pub value: Option<Value>,
}

impl DocEntry {
    pub fn new(name: impl Into<String>, otype: OType, value: Option<Value>) -> Self {
        Self {
            name: name.into(),
            otype,
            value,
        }
    }
}

/// A semi-structured record: ordered fields keyed by unique name.
///
/// Field order is preserved for enumeration and encoding; the wire format
/// itself does not depend on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    classname: Option<String>,
    rid: Option<Rid>,
    version: i32,
    entries: Vec<DocEntry>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(classname: impl Into<String>) -> Self {
        Self {
            classname: Some(classname.into()),
            ..Self::default()
        }
    }

    pub fn classname(&self) -> Option<&str> {
        self.classname.as_deref()
    }

    /// Set the class name; an empty name clears it.
    pub fn set_classname(&mut self, classname: impl Into<String>) {
        let name = classname.into();
        self.classname = (!name.is_empty()).then_some(name);
    }

    /// Identity assigned by the server, if the record was loaded or saved.
    pub fn rid(&self) -> Option<Rid> {
        self.rid
    }

    pub fn set_rid(&mut self, rid: Rid) {
        self.rid = Some(rid);
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    /// Set a field to a value written as its natural type.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        let otype = value.otype();
        self.put(DocEntry::new(name, otype, Some(value)))
    }

    /// Set a field with an explicit wire type.
    pub fn set_typed(
        &mut self,
        name: impl Into<String>,
        otype: OType,
        value: Option<Value>,
    ) -> &mut Self {
        self.put(DocEntry::new(name, otype, value))
    }

    /// Declare a field without a value.
    pub fn set_null(&mut self, name: impl Into<String>, otype: OType) -> &mut Self {
        self.put(DocEntry::new(name, otype, None))
    }

    /// Insert or replace an entry. A replaced entry keeps its position.
    pub fn put(&mut self, entry: DocEntry) -> &mut Self {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    /// Insert an entry only if no field of that name exists.
    /// Returns `true` if the entry was inserted.
    pub fn insert_if_absent(&mut self, entry: DocEntry) -> bool {
        if self.contains(&entry.name) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<DocEntry> {
        let idx = self.entries.iter().position(|e| e.name == name)?;
        Some(self.entries.remove(idx))
    }

    pub fn entry(&self, name: &str) -> Option<&DocEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entry_mut(&mut self, name: &str) -> Option<&mut DocEntry> {
        self.entries.iter_mut().find(|e| e.name == name)
    }

    /// Value of a field, `None` if the field is missing or absent.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entry(name).and_then(|e| e.value.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocEntry> {
        self.entries.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = &'a DocEntry;
    type IntoIter = std::slice::Iter<'a, DocEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut doc = Document::with_class("Cat");
        doc.set("name", "Tom").set("age", 3i32).set("name", "Jerry");
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.field_names().collect::<Vec<_>>(), vec!["name", "age"]);
        assert_eq!(doc.get("name").and_then(Value::as_str), Some("Jerry"));
        assert_eq!(doc.classname(), Some("Cat"));
    }

    #[test]
    fn test_null_fields() {
        let mut doc = Document::new();
        doc.set_null("nickname", OType::String);
        assert!(doc.contains("nickname"));
        assert!(doc.get("nickname").is_none());
        assert_eq!(doc.entry("nickname").map(|e| e.otype), Some(OType::String));
    }

    #[test]
    fn test_insert_if_absent() {
        let mut doc = Document::new();
        doc.set("a", 1i32);
        assert!(!doc.insert_if_absent(DocEntry::new("a", OType::Integer, Some(Value::Integer(2)))));
        assert!(doc.insert_if_absent(DocEntry::new("b", OType::Integer, None)));
        assert_eq!(doc.get("a"), Some(&Value::Integer(1)));
        assert_eq!(doc.remove("a").map(|e| e.name), Some("a".to_string()));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_empty_classname_clears() {
        let mut doc = Document::with_class("V");
        doc.set_classname("");
        assert_eq!(doc.classname(), None);
    }
}

//! Binary record serialization for the OrientDB network protocol.
//!
//! This crate implements the client side of the server's schema-optional
//! record format: documents made of named, typed fields, encoded as a header
//! of `(name, pointer, type)` entries followed by a data section that the
//! pointers index into.
//!
//! # Module Organization
//!
//! - [`varint`]: Zigzag varint integer codec
//! - [`rid`]: Record identifiers
//! - [`otype`]: Wire type tags
//! - [`stream`]: Seekable reader and patchable writer
//! - [`schema`]: Global property resolution
//! - [`value`] / [`document`]: The value model
//! - [`ridbag`]: Embedded and tree-based link bags
//! - [`config`]: Codec limits and policies
//! - `serialize` / `deserialize`: The document and value codec
//!
//! # Example
//!
//! ```ignore
//! use orient_binary::prelude::*;
//!
//! let mut doc = Document::with_class("Cat");
//! doc.set("name", "Winston").set("age", 7i32);
//!
//! let bytes = serialize_record(&doc)?;
//!
//! let mut decoded = Document::new();
//! deserialize_record(&bytes, &mut decoded, &NoGlobalProperties)?;
//! assert_eq!(decoded.get("age"), Some(&Value::Integer(7)));
//! ```
//!
//! # Feature Flags
//!
//! - `config` (default): Load [`CodecConfig`] and global property tables from TOML
//! - `logging`: Enable library-level tracing (consumers provide their own subscriber)

#[macro_use]
mod logging;

pub mod config;
mod deserialize;
pub mod document;
mod error;
pub mod otype;
pub mod prelude;
pub mod rid;
pub mod ridbag;
pub mod schema;
mod serialize;
pub mod stream;
pub mod value;
pub mod varint;

pub use config::CodecConfig;
#[cfg(feature = "config")]
pub use config::{ConfigError, SchemaFile};
pub use document::{DocEntry, Document};
pub use error::BinaryError;
pub use otype::{OType, ParseOTypeError};
pub use rid::{ParseRidError, Rid};
pub use ridbag::{
    BagKind, BagPolicy, BagRepr, BonsaiPointer, Change, ChangeKind, RemoteBagFetcher, RidBag,
};
pub use schema::{GlobalProperties, GlobalProperty, GlobalPropertyResolver, NoGlobalProperties};
pub use serialize::SERIALIZATION_VERSION;
pub use value::{Decimal, ParseDecimalError, Value};

/// Record serializer bound to a global property table and codec limits.
///
/// The serializer holds no mutable state: one instance can serve any number
/// of concurrent encodes and decodes on independent buffers.
///
/// # Example
///
/// ```ignore
/// use orient_binary::{CodecConfig, Document, GlobalProperties, RecordSerializer};
///
/// let schema = GlobalProperties::new(properties);
/// let serializer = RecordSerializer::with_config(&schema, CodecConfig::default());
///
/// let bytes = serializer.serialize_record(&doc)?;
/// let mut decoded = Document::new();
/// serializer.deserialize_record(&bytes, &mut decoded)?;
/// ```
#[derive(Clone, Copy)]
pub struct RecordSerializer<'a> {
    pub(crate) properties: &'a dyn GlobalPropertyResolver,
    pub(crate) config: CodecConfig,
}

impl<'a> RecordSerializer<'a> {
    /// Create a serializer with the default [`CodecConfig`].
    pub fn new(properties: &'a dyn GlobalPropertyResolver) -> Self {
        Self::with_config(properties, CodecConfig::default())
    }

    pub fn with_config(properties: &'a dyn GlobalPropertyResolver, config: CodecConfig) -> Self {
        Self { properties, config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }
}

impl std::fmt::Debug for RecordSerializer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSerializer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Encode a document (no version byte) whose first byte will sit at
/// `outer_offset` in the enclosing buffer.
pub fn serialize_document(doc: &Document, outer_offset: usize) -> Result<Vec<u8>, BinaryError> {
    RecordSerializer::new(&NoGlobalProperties).serialize_document(doc, outer_offset)
}

/// Decode a document (no version byte) into `target`, keeping fields it already has.
pub fn deserialize_document(
    bytes: &[u8],
    target: &mut Document,
    properties: &dyn GlobalPropertyResolver,
) -> Result<(), BinaryError> {
    RecordSerializer::new(properties).deserialize_document(bytes, target)
}

/// Encode a top-level record: version byte plus document.
pub fn serialize_record(doc: &Document) -> Result<Vec<u8>, BinaryError> {
    RecordSerializer::new(&NoGlobalProperties).serialize_record(doc)
}

/// Decode a top-level record into `target`, keeping fields it already has.
pub fn deserialize_record(
    bytes: &[u8],
    target: &mut Document,
    properties: &dyn GlobalPropertyResolver,
) -> Result<(), BinaryError> {
    RecordSerializer::new(properties).deserialize_record(bytes, target)
}

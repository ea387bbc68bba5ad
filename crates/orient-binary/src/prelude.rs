//! Convenient re-exports for common usage patterns.
//!
//! This module provides a single import to bring all commonly used types
//! into scope.
//!
//! # Example
//!
//! ```ignore
//! use orient_binary::prelude::*;
//!
//! let mut doc = Document::with_class("Person");
//! doc.set("name", "Ada");
//! let bytes = serialize_record(&doc)?;
//! ```

// Unified error handling
pub use crate::BinaryError;

// Value model
pub use crate::{Decimal, DocEntry, Document, OType, Rid, Value};

// Link bags
pub use crate::{BagPolicy, BonsaiPointer, RemoteBagFetcher, RidBag};

// Codec
pub use crate::{CodecConfig, RecordSerializer};
pub use crate::{deserialize_document, deserialize_record, serialize_document, serialize_record};

// Schema
pub use crate::{GlobalProperties, GlobalProperty, GlobalPropertyResolver, NoGlobalProperties};

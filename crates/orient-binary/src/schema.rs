//! Global property resolution.
//!
//! The server may replace a field's inline name and type with a small
//! integer id pointing into its schema's global property table. The decoder
//! consults a [`GlobalPropertyResolver`] for those ids. The table itself is
//! owned by the session layer; this module only defines the lookup seam and
//! an immutable snapshot implementation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::OType;

/// A schema-wide property: id, field name and declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
pub struct GlobalProperty {
    pub id: i32,
    pub name: String,
    #[cfg_attr(feature = "config", serde(rename = "type"))]
    pub otype: OType,
}

impl GlobalProperty {
    pub fn new(id: i32, name: impl Into<String>, otype: OType) -> Self {
        Self {
            id,
            name: name.into(),
            otype,
        }
    }
}

/// Lookup of global properties by id.
///
/// Implementations are shared by concurrent decodes and must be safe for
/// concurrent reads.
pub trait GlobalPropertyResolver: Send + Sync {
    fn resolve(&self, id: i32) -> Option<GlobalProperty>;
}

impl<F> GlobalPropertyResolver for F
where
    F: Fn(i32) -> Option<GlobalProperty> + Send + Sync,
{
    fn resolve(&self, id: i32) -> Option<GlobalProperty> {
        self(id)
    }
}

/// Resolver for sessions without a loaded schema: every id is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGlobalProperties;

impl GlobalPropertyResolver for NoGlobalProperties {
    fn resolve(&self, _id: i32) -> Option<GlobalProperty> {
        None
    }
}

/// Immutable snapshot of a schema's global property table.
///
/// Cloning is cheap; clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct GlobalProperties {
    by_id: Arc<HashMap<i32, GlobalProperty>>,
}

impl GlobalProperties {
    pub fn new(properties: impl IntoIterator<Item = GlobalProperty>) -> Self {
        let by_id = properties.into_iter().map(|p| (p.id, p)).collect();
        Self {
            by_id: Arc::new(by_id),
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: i32) -> Option<&GlobalProperty> {
        self.by_id.get(&id)
    }
}

impl GlobalPropertyResolver for GlobalProperties {
    fn resolve(&self, id: i32) -> Option<GlobalProperty> {
        self.by_id.get(&id).cloned()
    }
}

impl FromIterator<GlobalProperty> for GlobalProperties {
    fn from_iter<I: IntoIterator<Item = GlobalProperty>>(iter: I) -> Self {
        Self::new(iter)
    }
}

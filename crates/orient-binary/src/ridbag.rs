//! Link bags: RID collections with an embedded and a tree-based form.
//!
//! Small bags travel inline as a list of RIDs. Large bags live on the server
//! in a bonsai tree and only a pointer to it crosses the wire; their content
//! is fetched on demand through a [`RemoteBagFetcher`] supplied by the
//! connection layer.
//!
//! # Wire layout
//!
//! ```text
//! control: u8           bit 0 = embedded, bit 1 = 16-byte id follows
//! [id: 16 bytes]
//! embedded: count: varint, count * (cluster: varint, position: varint)
//! tree:     file_id: i64, page_index: i64, page_offset: i32,
//!           size: i32 (always -1 when written),
//!           changes: i32, changes * (rid: 2 varints, value: varint, kind: u8)
//! ```
//!
//! The change log of a tree bag is read and kept, but never applied to a
//! base count, and is always written as empty.

use std::collections::BTreeMap;

use crate::logging::{debug, trace, warn};
use crate::stream::{Reader, Writer};
use crate::{BinaryError, Document, Rid};

const EMBEDDED_FLAG: u8 = 0x01;
const UUID_FLAG: u8 = 0x02;

/// Location of a tree-based bag on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BonsaiPointer {
    pub file_id: i64,
    pub page_index: i64,
    pub page_offset: i32,
}

impl BonsaiPointer {
    /// Wire encoding of an absent pointer.
    pub const NULL: BonsaiPointer = BonsaiPointer::new(-1, -1, -1);

    pub const fn new(file_id: i64, page_index: i64, page_offset: i32) -> Self {
        Self {
            file_id,
            page_index,
            page_offset,
        }
    }

    pub fn is_null(&self) -> bool {
        self.file_id < 0 || self.page_index < 0 || self.page_offset < 0
    }
}

/// How a pending change's value is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Added to the stored count.
    Relative,
    /// Replaces the stored count.
    Absolute,
}

/// One entry of a tree bag's change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub value: i32,
}

/// Tree-based bag state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteBag {
    pointer: Option<BonsaiPointer>,
    size: Option<usize>,
    links: Option<Vec<Rid>>,
    changes: BTreeMap<Rid, Vec<Change>>,
}

/// The active representation of a [`RidBag`].
#[derive(Debug, Clone, PartialEq)]
pub enum BagRepr {
    Embedded(Vec<Rid>),
    Remote(RemoteBag),
}

/// Which representation a writer picks for a bag of a given size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BagKind {
    Embedded,
    Remote,
}

/// Size policy for choosing a bag representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct BagPolicy {
    /// Largest bag still written inline.
    pub embedded_threshold: usize,
}

impl Default for BagPolicy {
    fn default() -> Self {
        Self {
            embedded_threshold: 40,
        }
    }
}

impl BagPolicy {
    pub fn select(&self, len: usize) -> BagKind {
        if len <= self.embedded_threshold {
            BagKind::Embedded
        } else {
            BagKind::Remote
        }
    }
}

/// Remote operations on tree-based bags, implemented by the connection layer.
///
/// Calls are blocking network round-trips; timeouts and cancellation belong
/// to the implementation. A failed call leaves the bag unresolved.
pub trait RemoteBagFetcher {
    /// Number of entries in the tree.
    fn fetch_remote_size(&self, pointer: &BonsaiPointer) -> Result<usize, BinaryError>;

    /// Entries in key order starting at `from` (the first key when `None`).
    /// `from` itself is included only if `inclusive` is set. Implementations
    /// may return a partial page; an empty page means no more entries.
    fn fetch_remote_entries(
        &self,
        pointer: &BonsaiPointer,
        from: Option<Rid>,
        inclusive: bool,
    ) -> Result<Vec<Rid>, BinaryError>;

    /// Load the records behind `rids`, in the same order.
    fn resolve_links(&self, rids: &[Rid]) -> Result<Vec<Document>, BinaryError>;
}

/// A link bag.
#[derive(Debug, Clone, PartialEq)]
pub struct RidBag {
    repr: BagRepr,
    id: Option<[u8; 16]>,
    owner: Option<Rid>,
    records: Vec<Document>,
}

impl RidBag {
    /// An inline bag holding `links`.
    pub fn embedded(links: Vec<Rid>) -> Self {
        Self::with_repr(BagRepr::Embedded(links))
    }

    /// A tree-based bag referring to server-side storage.
    pub fn remote(pointer: BonsaiPointer) -> Self {
        Self::with_repr(BagRepr::Remote(RemoteBag {
            pointer: (!pointer.is_null()).then_some(pointer),
            ..RemoteBag::default()
        }))
    }

    /// Build a bag for `links` following `policy`.
    ///
    /// Trees are allocated by the server, so a bag over the threshold cannot
    /// be created here and fails with [`BinaryError::RemoteBagRequired`].
    pub fn from_links(links: Vec<Rid>, policy: &BagPolicy) -> Result<Self, BinaryError> {
        match policy.select(links.len()) {
            BagKind::Embedded => Ok(Self::embedded(links)),
            BagKind::Remote => Err(BinaryError::RemoteBagRequired {
                len: links.len(),
                threshold: policy.embedded_threshold,
            }),
        }
    }

    fn with_repr(repr: BagRepr) -> Self {
        Self {
            repr,
            id: None,
            owner: None,
            records: Vec::new(),
        }
    }

    pub fn repr(&self) -> &BagRepr {
        &self.repr
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.repr, BagRepr::Embedded(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.repr, BagRepr::Remote(_))
    }

    /// Tree location of a remote bag with a non-null pointer.
    pub fn pointer(&self) -> Option<BonsaiPointer> {
        match &self.repr {
            BagRepr::Remote(remote) => remote.pointer,
            BagRepr::Embedded(_) => None,
        }
    }

    /// RID of the document holding this bag, if known.
    pub fn owner(&self) -> Option<Rid> {
        self.owner
    }

    pub fn set_owner(&mut self, owner: Option<Rid>) {
        self.owner = owner;
    }

    /// Append a link to an embedded bag.
    pub fn append(&mut self, rid: Rid) -> Result<(), BinaryError> {
        match &mut self.repr {
            BagRepr::Embedded(links) => {
                links.push(rid);
                Ok(())
            }
            BagRepr::Remote(_) => Err(BinaryError::UnsupportedType(
                "client-side changes to a tree-based link bag".to_string(),
            )),
        }
    }

    /// Links held by the bag: always available when embedded, available
    /// after [`RidBag::resolve_entries`] when remote.
    pub fn links(&self) -> Option<&[Rid]> {
        match &self.repr {
            BagRepr::Embedded(links) => Some(links),
            BagRepr::Remote(remote) => remote.links.as_deref(),
        }
    }

    /// Number of links, if known without a server call.
    pub fn len(&self) -> Option<usize> {
        match &self.repr {
            BagRepr::Embedded(links) => Some(links.len()),
            BagRepr::Remote(remote) => remote
                .links
                .as_ref()
                .map(Vec::len)
                .or(remote.size),
        }
    }

    /// Returns `true` only if the bag is known to be empty.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Change log read from the wire for a tree bag, keyed by RID.
    pub fn pending_changes(&self) -> Option<&BTreeMap<Rid, Vec<Change>>> {
        match &self.repr {
            BagRepr::Remote(remote) => Some(&remote.changes),
            BagRepr::Embedded(_) => None,
        }
    }

    fn remote_pointer(&self) -> Result<BonsaiPointer, BinaryError> {
        match &self.repr {
            BagRepr::Remote(RemoteBag {
                pointer: Some(pointer),
                ..
            }) => Ok(*pointer),
            BagRepr::Remote(_) => Err(BinaryError::Remote(
                "tree-based link bag has no pointer".to_string(),
            )),
            BagRepr::Embedded(_) => Err(BinaryError::Remote(
                "link bag is embedded".to_string(),
            )),
        }
    }

    /// Number of links, asking the server for tree bags. The answer is cached.
    pub fn resolve_size(&mut self, fetcher: &dyn RemoteBagFetcher) -> Result<usize, BinaryError> {
        if let Some(len) = self.len() {
            return Ok(len);
        }
        let pointer = self.remote_pointer()?;
        debug!(?pointer, "fetching remote link bag size");
        let size = fetcher.fetch_remote_size(&pointer)?;
        if let BagRepr::Remote(remote) = &mut self.repr {
            remote.size = Some(size);
        }
        Ok(size)
    }

    /// Fetch every link of a tree bag, page by page.
    ///
    /// The first page starts at the tree's first key inclusively; each later
    /// page starts after the last key already received, so an entry that is
    /// also a page bound is returned once.
    pub fn resolve_entries(
        &mut self,
        fetcher: &dyn RemoteBagFetcher,
    ) -> Result<&[Rid], BinaryError> {
        if self.links().is_none() {
            let pointer = self.remote_pointer()?;
            let mut links: Vec<Rid> = Vec::new();
            let mut from: Option<Rid> = None;
            loop {
                let inclusive = from.is_none();
                let page = fetcher.fetch_remote_entries(&pointer, from, inclusive)?;
                let Some(&last) = page.last() else {
                    break;
                };
                if from.is_some_and(|bound| last <= bound) {
                    return Err(BinaryError::Remote(format!(
                        "entry page ending at {last} does not advance past {}",
                        from.unwrap_or(last)
                    )));
                }
                trace!(count = page.len(), %last, "received link bag page");
                links.extend(page);
                from = Some(last);
            }
            debug!(?pointer, count = links.len(), "resolved remote link bag");
            if let BagRepr::Remote(remote) = &mut self.repr {
                remote.size = Some(links.len());
                remote.links = Some(links);
            }
        }
        Ok(self.links().unwrap_or_default())
    }

    /// Load the records behind the bag's links and keep them alongside it.
    pub fn hydrate(&mut self, fetcher: &dyn RemoteBagFetcher) -> Result<&[Document], BinaryError> {
        let rids = self.resolve_entries(fetcher)?.to_vec();
        let records = fetcher.resolve_links(&rids)?;
        if records.len() != rids.len() {
            return Err(BinaryError::Remote(format!(
                "requested {} records, received {}",
                rids.len(),
                records.len()
            )));
        }
        self.records = records
            .into_iter()
            .zip(rids)
            .map(|(mut doc, rid)| {
                if doc.rid().is_none() {
                    doc.set_rid(rid);
                }
                doc
            })
            .collect();
        Ok(&self.records)
    }

    /// A record loaded by [`RidBag::hydrate`].
    pub fn record(&self, rid: &Rid) -> Option<&Document> {
        self.records.iter().find(|d| d.rid().as_ref() == Some(rid))
    }

    /// Write the bag in its current representation.
    pub fn write(&self, w: &mut Writer) -> Result<(), BinaryError> {
        match &self.repr {
            BagRepr::Embedded(links) => {
                w.write_byte(EMBEDDED_FLAG);
                w.write_len(links.len())?;
                for rid in links {
                    rid.write_link(w);
                }
            }
            BagRepr::Remote(remote) => {
                w.write_byte(0);
                let pointer = remote.pointer.unwrap_or(BonsaiPointer::NULL);
                w.write_i64(pointer.file_id);
                w.write_i64(pointer.page_index);
                w.write_i32(pointer.page_offset);
                w.write_i32(-1);
                w.write_i32(0);
                if !remote.changes.is_empty() {
                    debug!(
                        count = remote.changes.len(),
                        "dropping unapplied link bag changes on write"
                    );
                }
            }
        }
        Ok(())
    }

    /// Read a bag written by [`RidBag::write`] or by the server.
    pub fn read(r: &mut Reader<'_>) -> Result<RidBag, BinaryError> {
        let control = r.read_byte()?;
        if control & !(EMBEDDED_FLAG | UUID_FLAG) != 0 {
            warn!(control, "unknown link bag control bits");
        }
        let id = if control & UUID_FLAG != 0 {
            let mut id = [0u8; 16];
            id.copy_from_slice(r.read_bytes(16)?);
            Some(id)
        } else {
            None
        };

        let repr = if control & EMBEDDED_FLAG != 0 {
            let count = r.read_len()?;
            // every link takes at least two bytes
            if count > r.remaining() / 2 {
                return Err(BinaryError::malformed(format!(
                    "link bag claims {count} entries with {} bytes left",
                    r.remaining()
                )));
            }
            let links = (0..count)
                .map(|_| Rid::read_link(r))
                .collect::<Result<Vec<_>, _>>()?;
            BagRepr::Embedded(links)
        } else {
            BagRepr::Remote(read_remote(r)?)
        };

        Ok(RidBag {
            id,
            ..RidBag::with_repr(repr)
        })
    }
}

fn read_remote(r: &mut Reader<'_>) -> Result<RemoteBag, BinaryError> {
    let pointer = BonsaiPointer::new(r.read_i64()?, r.read_i64()?, r.read_i32()?);
    let size = r.read_i32()?;
    let change_count = r.read_i32()?;
    let change_count = usize::try_from(change_count).map_err(|_| {
        BinaryError::malformed(format!("negative link bag change count {change_count}"))
    })?;

    let mut changes: BTreeMap<Rid, Vec<Change>> = BTreeMap::new();
    for _ in 0..change_count {
        let rid = Rid::read_link(r)?;
        let value = r.read_varint32()?;
        let kind = match r.read_byte()? {
            0 => ChangeKind::Relative,
            1 => ChangeKind::Absolute,
            other => {
                return Err(BinaryError::malformed(format!(
                    "unknown link bag change kind {other}"
                )));
            }
        };
        changes.entry(rid).or_default().push(Change { kind, value });
    }
    debug!(?pointer, size, changes = changes.len(), "read tree-based link bag");

    Ok(RemoteBag {
        pointer: (!pointer.is_null()).then_some(pointer),
        size: usize::try_from(size).ok(),
        links: None,
        changes,
    })
}

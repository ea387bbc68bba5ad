//! Record identifiers.

use std::fmt;
use std::str::FromStr;

use crate::BinaryError;
use crate::stream::{Reader, Writer};

/// Record identifier: the cluster a record lives in and its position there.
///
/// Inside documents a RID is written as two zigzag varints (an "optimized
/// link"). Protocol slots outside documents use the fixed 10-byte form of
/// [`Rid::to_stream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub cluster_id: i16,
    pub cluster_pos: i64,
}

impl Rid {
    /// Identifier of a record that has not been persisted yet.
    pub const NEW: Rid = Rid::new(-1, -1);

    /// Sentinel written in place of an absent link.
    pub const NULL_LINK: Rid = Rid::new(-2, -1);

    /// Width of the fixed wire form in bytes.
    pub const FIXED_LEN: usize = 10;

    pub const fn new(cluster_id: i16, cluster_pos: i64) -> Self {
        Self {
            cluster_id,
            cluster_pos,
        }
    }

    /// Returns `true` if both components are valid server-assigned values.
    pub fn is_persistent(&self) -> bool {
        self.cluster_id >= 0 && self.cluster_pos >= 0
    }

    /// Returns `true` if the record has not been assigned an identity yet.
    pub fn is_new(&self) -> bool {
        self.cluster_pos < 0
    }

    /// Write the fixed form: 2-byte cluster id, 8-byte position, both big-endian.
    pub fn to_stream(&self, w: &mut Writer) {
        w.write_i16(self.cluster_id);
        w.write_i64(self.cluster_pos);
    }

    /// Read the fixed form written by [`Rid::to_stream`].
    /// A short read leaves `r` where it was.
    pub fn from_stream(r: &mut Reader<'_>) -> Result<Rid, BinaryError> {
        let mut ahead = r.clone();
        let cluster_id = ahead.read_i16()?;
        let cluster_pos = ahead.read_i64()?;
        *r = ahead;
        Ok(Rid::new(cluster_id, cluster_pos))
    }

    /// Write the optimized form: two zigzag varints.
    pub fn write_link(&self, w: &mut Writer) {
        w.write_varint64(i64::from(self.cluster_id));
        w.write_varint64(self.cluster_pos);
    }

    /// Read the optimized form written by [`Rid::write_link`].
    pub fn read_link(r: &mut Reader<'_>) -> Result<Rid, BinaryError> {
        let cluster_id = r.read_varint64()?;
        let cluster_id = i16::try_from(cluster_id).map_err(|_| {
            BinaryError::malformed(format!("cluster id {cluster_id} out of range"))
        })?;
        let cluster_pos = r.read_varint64()?;
        Ok(Rid::new(cluster_id, cluster_pos))
    }
}

impl Default for Rid {
    fn default() -> Self {
        Rid::NEW
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.cluster_id, self.cluster_pos)
    }
}

/// Error returned when parsing a RID from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid RID '{input}': {reason}")]
pub struct ParseRidError {
    input: String,
    reason: &'static str,
}

impl FromStr for Rid {
    type Err = ParseRidError;

    /// Parse `#<cluster>:<position>`; the leading `#` is optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParseRidError {
            input: s.to_string(),
            reason,
        };
        let body = s.trim();
        let body = body.strip_prefix('#').unwrap_or(body);
        let (cluster, pos) = body.split_once(':').ok_or_else(|| err("missing ':'"))?;
        let cluster_id = cluster
            .parse::<i16>()
            .map_err(|_| err("invalid cluster id"))?;
        let cluster_pos = pos
            .parse::<i64>()
            .map_err(|_| err("invalid cluster position"))?;
        Ok(Rid::new(cluster_id, cluster_pos))
    }
}

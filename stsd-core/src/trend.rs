//! Trend catalog (spec §3 "Trend", §4.6 step 3): maps trend names to
//! stable integer ids, assigned at first write and never reused.

use std::collections::HashMap;

use binrw::binrw;

use crate::error::{Error, Result};

/// On-disk trend name field width in bytes (spec §9's canonical value).
pub const TREND_NAME_SIZE_BYTES: usize = 124;

/// A single on-disk trend record: `(trend_id: u32, name: [u8; 124])`.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy)]
pub struct TrendRecord {
    pub trend_id: u32,
    #[br(count = TREND_NAME_SIZE_BYTES)]
    #[bw(pad_size_to = TREND_NAME_SIZE_BYTES)]
    pub name: Vec<u8>,
}

impl TrendRecord {
    pub fn new(trend_id: u32, name: &str) -> Result<Self> {
        if name.len() > TREND_NAME_SIZE_BYTES {
            return Err(Error::TrendNameTooLong(name.to_string()));
        }
        Ok(Self {
            trend_id,
            name: name.as_bytes().to_vec(),
        })
    }

    pub fn name(&self) -> Result<String> {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        std::str::from_utf8(&self.name[..end])
            .map(str::to_string)
            .map_err(|e| Error::Corruption(e.to_string()))
    }
}

/// Size of one trend record on disk.
pub const TREND_RECORD_SIZE: usize = 4 + TREND_NAME_SIZE_BYTES;

/// Either an existing trend's id, or the id that should be assigned to a
/// brand-new trend name (spec §4.6 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendResolution {
    Existing(u32),
    New(u32),
}

/// In-memory view of the Trend region, built by scanning its pages.
#[derive(Debug, Default, Clone)]
pub struct TrendCatalog {
    name_to_id: HashMap<String, u32>,
    next_id: u32,
}

impl TrendCatalog {
    pub fn from_records(records: Vec<TrendRecord>) -> Result<Self> {
        let mut name_to_id = HashMap::new();
        let mut max_id = 0u32;
        for record in &records {
            let name = record.name()?;
            max_id = max_id.max(record.trend_id);
            name_to_id.insert(name, record.trend_id);
        }
        Ok(Self {
            name_to_id,
            next_id: max_id + 1,
        })
    }

    pub fn len(&self) -> usize {
        self.name_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_id.is_empty()
    }

    /// Resolves `name` against the catalog without mutating it: the caller
    /// commits a `New` id only once the Trend region has room (spec §4.6
    /// step 3's capacity-error-then-retry dance lives one layer up, in the
    /// paged file manager). Named for what it does: either hands back an
    /// existing id, or stages the id a not-yet-committed name would get.
    pub fn resolve_or_stage(&self, name: &str) -> Result<TrendResolution> {
        if name.len() > TREND_NAME_SIZE_BYTES {
            return Err(Error::TrendNameTooLong(name.to_string()));
        }
        Ok(match self.name_to_id.get(name) {
            Some(&id) => TrendResolution::Existing(id),
            None => TrendResolution::New(self.next_id),
        })
    }
}

//! Index table (spec §3 "Index record", §4.6 step 5f/5g): maps
//! (trend_id, day range) to a data page index.

use binrw::binrw;

/// Size of one index record on disk.
pub const INDEX_RECORD_SIZE: usize = 12;

/// `(trend_id: 4, page_index: 4, start_day_id: 2, end_day_id: 2)`, inclusive range.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub trend_id: u32,
    pub page_index: u32,
    pub start_day: u16,
    pub end_day: u16,
}

impl IndexRecord {
    pub fn contains(&self, day_id: u16) -> bool {
        (self.start_day..=self.end_day).contains(&day_id)
    }
}

/// In-memory view of every index record in the file.
#[derive(Debug, Default, Clone)]
pub struct IndexTable {
    records: Vec<IndexRecord>,
}

impl IndexTable {
    pub fn from_records(records: Vec<IndexRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[IndexRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: IndexRecord) {
        self.records.push(record);
    }

    /// Every record belonging to `trend_id`, in file order.
    pub fn for_trend(&self, trend_id: u32) -> impl Iterator<Item = &IndexRecord> {
        self.records.iter().filter(move |r| r.trend_id == trend_id)
    }

    /// The index record for `trend_id` whose `[start_day, end_day]` contains
    /// `day_id`, if any (an in-range hit; spec §4.6 step 5f's first branch,
    /// which this engine does not support writing into — see
    /// `Error::InRangeOverwriteUnsupported`).
    pub fn containing(&self, trend_id: u32, day_id: u16) -> Option<&IndexRecord> {
        self.for_trend(trend_id).find(|r| r.contains(day_id))
    }

    /// The record for `trend_id` with the largest `end_day` strictly less
    /// than `day_id` — the "latest" data page a new day can be appended to
    /// (spec §4.6 step 5f's second branch) — paired with its position in
    /// the region so the caller can patch it in place without re-deriving
    /// that position with a second lookup.
    pub fn latest_before(&self, trend_id: u32, day_id: u16) -> Option<(usize, &IndexRecord)> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.trend_id == trend_id && r.end_day < day_id)
            .max_by_key(|(_, r)| r.end_day)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(trend_id: u32, page_index: u32, start: u16, end: u16) -> IndexRecord {
        IndexRecord {
            trend_id,
            page_index,
            start_day: start,
            end_day: end,
        }
    }

    #[test]
    fn containing_finds_the_overlapping_range() {
        let table = IndexTable::from_records(vec![rec(1, 0, 10, 20)]);
        assert_eq!(table.containing(1, 15), Some(&rec(1, 0, 10, 20)));
        assert_eq!(table.containing(1, 25), None);
        assert_eq!(table.containing(2, 15), None);
    }

    #[test]
    fn latest_before_picks_the_nearest_preceding_range() {
        let table = IndexTable::from_records(vec![rec(1, 0, 1, 5), rec(1, 1, 10, 12)]);
        assert_eq!(table.latest_before(1, 20), Some((1, &rec(1, 1, 10, 12))));
        assert_eq!(table.latest_before(1, 6), Some((0, &rec(1, 0, 1, 5))));
        assert_eq!(table.latest_before(1, 1), None);
    }
}

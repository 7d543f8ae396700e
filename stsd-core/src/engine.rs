//! Write path and read path (spec §4.6, §4.5's `write_data`/`read_range`).
//!
//! Region growth (spec §4.5 `insert_blank_pages`, §9 "Region splicing vs.
//! tail-recursion") is modeled as a bounded outer loop: each day's commit
//! retries once per region kind after growing it, instead of restarting
//! the whole call from scratch the way the original recursive
//! implementation did — see DESIGN.md for why (re-running already-committed
//! days would hit the unimplemented in-range-overwrite branch). A region
//! still too small after one growth raises its `*TableFull` error rather
//! than looping forever.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use binrw::{binrw, BinRead, BinWrite};
use time::{Date, OffsetDateTime, Time};

use crate::bits::unpack_bits;
use crate::calendar;
use crate::day_values;
use crate::error::{Error, Result};
use crate::index::{IndexRecord, IndexTable, INDEX_RECORD_SIZE};
use crate::page::{self, Header, PAGE_SIZE};
use crate::template::{self, TemplateTable, TEMPLATE_LEN};
use crate::trend::{TrendCatalog, TrendRecord, TrendResolution, TREND_RECORD_SIZE};

const TEMPLATE_RECORD_SIZE: usize = 1 + TEMPLATE_LEN;

#[binrw]
#[brw(big)]
struct TemplateRecord {
    marker: u8,
    #[br(count = TEMPLATE_LEN)]
    #[bw(pad_size_to = TEMPLATE_LEN)]
    bitmap: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionKind {
    Template,
    Trend,
    Index,
    Data,
}

fn grow_region(path: &Path, kind: RegionKind, header: &Header) -> Result<()> {
    let offs = header.region_offsets();
    match kind {
        RegionKind::Template => {
            page::insert_blank_pages(path, offs.trends_start, 1)?;
            page::update_num_template_pages(path, header.num_template_pages + 1)
        }
        RegionKind::Trend => {
            page::insert_blank_pages(path, offs.indexes_start, 1)?;
            page::update_num_trend_pages(path, header.num_trend_pages + 1)
        }
        RegionKind::Index => {
            page::insert_blank_pages(path, offs.data_start, 1)?;
            page::update_num_index_pages(path, header.num_index_pages + 1)
        }
        RegionKind::Data => {
            page::insert_blank_pages(path, offs.data_start + header.num_data_pages, 1)?;
            page::update_num_data_pages(path, header.num_data_pages + 1)
        }
    }
}

fn read_flat_region(path: &Path, start_page: u32, num_pages: u32) -> Result<Vec<u8>> {
    if num_pages == 0 {
        return Ok(Vec::new());
    }
    page::read_pages(path, start_page, num_pages)
}

fn parse_trend_records(bytes: &[u8]) -> Result<Vec<TrendRecord>> {
    let mut cursor = Cursor::new(bytes);
    let mut out = Vec::new();
    while cursor.position() as usize + TREND_RECORD_SIZE <= bytes.len() {
        let record = TrendRecord::read(&mut cursor)?;
        if record.trend_id == 0 {
            break;
        }
        out.push(record);
    }
    Ok(out)
}

fn parse_index_records(bytes: &[u8]) -> Result<Vec<IndexRecord>> {
    let mut cursor = Cursor::new(bytes);
    let mut out = Vec::new();
    while cursor.position() as usize + INDEX_RECORD_SIZE <= bytes.len() {
        let record = IndexRecord::read(&mut cursor)?;
        if record.trend_id == 0 {
            break;
        }
        out.push(record);
    }
    Ok(out)
}

fn parse_templates(bytes: &[u8]) -> Result<Vec<[u8; TEMPLATE_LEN]>> {
    let mut cursor = Cursor::new(bytes);
    let mut out = Vec::new();
    while cursor.position() as usize + TEMPLATE_RECORD_SIZE <= bytes.len() {
        let record = TemplateRecord::read(&mut cursor)?;
        if record.marker == 0 {
            break;
        }
        let mut bitmap = [0u8; TEMPLATE_LEN];
        bitmap.copy_from_slice(&record.bitmap);
        out.push(bitmap);
    }
    Ok(out)
}

fn write_at(path: &Path, abs_offset: u64, bytes: &[u8]) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io::{Seek, SeekFrom, Write};

    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(abs_offset))?;
    file.write_all(bytes)?;
    Ok(())
}

fn write_trend_record(path: &Path, abs_offset: u64, record: &TrendRecord) -> Result<()> {
    let mut buf = Cursor::new(Vec::with_capacity(TREND_RECORD_SIZE));
    record.write(&mut buf)?;
    write_at(path, abs_offset, buf.get_ref())
}

fn write_template_record(path: &Path, abs_offset: u64, template: &[u8; TEMPLATE_LEN]) -> Result<()> {
    let record = TemplateRecord {
        marker: 0xFF,
        bitmap: template.to_vec(),
    };
    let mut buf = Cursor::new(Vec::with_capacity(TEMPLATE_RECORD_SIZE));
    record.write(&mut buf)?;
    write_at(path, abs_offset, buf.get_ref())
}

fn write_index_record(path: &Path, abs_offset: u64, record: &IndexRecord) -> Result<()> {
    let mut buf = Cursor::new(Vec::with_capacity(INDEX_RECORD_SIZE));
    record.write(&mut buf)?;
    write_at(path, abs_offset, buf.get_ref())
}

/// Resolves `trend_name` to its stable id, assigning and committing a new
/// one if needed, growing the Trend region as many times as necessary
/// (spec §4.6 step 3).
fn ensure_trend(path: &Path, trend_name: &str) -> Result<u32> {
    let mut grown = false;
    loop {
        let header = page::read_header(path)?;
        let offs = header.region_offsets();

        let trend_bytes = read_flat_region(path, offs.trends_start, header.num_trend_pages)?;
        let records = parse_trend_records(&trend_bytes)?;
        let catalog = TrendCatalog::from_records(records.clone())?;

        match catalog.resolve_or_stage(trend_name)? {
            TrendResolution::Existing(id) => return Ok(id),
            TrendResolution::New(id) => {
                let used = records.len() * TREND_RECORD_SIZE;
                let capacity = header.num_trend_pages as usize * PAGE_SIZE;
                if used + TREND_RECORD_SIZE > capacity {
                    if grown {
                        return Err(Error::TrendTableFull);
                    }
                    grow_region(path, RegionKind::Trend, &header)?;
                    grown = true;
                    continue;
                }

                let record = TrendRecord::new(id, trend_name)?;
                let abs_offset = offs.trends_start as u64 * PAGE_SIZE as u64 + used as u64;
                write_trend_record(path, abs_offset, &record)?;
                return Ok(id);
            }
        }
    }
}

/// Commits one day's observations for `trend_id`, growing whichever region
/// is out of room and retrying until the commit succeeds (spec §4.6 steps
/// 5a-5g).
fn write_one_day(
    path: &Path,
    trend_id: u32,
    date: Date,
    values_with_ts: &[(OffsetDateTime, String)],
) -> Result<()> {
    let mut template_grown = false;
    let mut index_grown = false;
    loop {
        let header = page::read_header(path)?;
        let offs = header.region_offsets();

        let template_bytes = read_flat_region(path, offs.templates_start, header.num_template_pages)?;
        let templates = parse_templates(&template_bytes)?;
        let mut table = TemplateTable::from_id_order(templates.clone());

        let minutes: Vec<u16> = values_with_ts
            .iter()
            .map(|(dt, _)| calendar::minute_of_day(*dt))
            .collect();
        let tmpl = template::to_day_template(&minutes);

        let template_id = match table.match_template(&tmpl) {
            Some(id) => id,
            None => {
                let used = templates.len() * TEMPLATE_RECORD_SIZE;
                let capacity = header.num_template_pages as usize * PAGE_SIZE;
                if used + TEMPLATE_RECORD_SIZE > capacity {
                    if template_grown {
                        return Err(Error::TemplateTableFull);
                    }
                    grow_region(path, RegionKind::Template, &header)?;
                    template_grown = true;
                    continue;
                }
                let abs_offset = offs.templates_start as u64 * PAGE_SIZE as u64 + used as u64;
                write_template_record(path, abs_offset, &tmpl)?;
                table.intern(tmpl)
            }
        };
        let template_id: u16 = template_id
            .try_into()
            .map_err(|_| Error::Corruption("template id exceeds u16".into()))?;

        let day_id = calendar::day_id(date, header.initial_year)?;

        let values: Vec<String> = values_with_ts.iter().map(|(_, v)| v.clone()).collect();
        let block = day_values::encode(&values)?;
        let max_block = PAGE_SIZE - 2;
        if block.len() > max_block {
            return Err(Error::EncodedBlockTooLarge {
                got: block.len(),
                max: max_block,
            });
        }

        let index_bytes = read_flat_region(path, offs.indexes_start, header.num_index_pages)?;
        let records = parse_index_records(&index_bytes)?;
        let index_table = IndexTable::from_records(records.clone());

        if index_table.containing(trend_id, day_id).is_some() {
            return Err(Error::InRangeOverwriteUnsupported);
        }

        if let Some((pos, latest)) = index_table.latest_before(trend_id, day_id) {
            let data_page_abs = offs.data_start + latest.page_index;
            let mut page_bytes = page::read_page(path, data_page_abs)?;
            let used = u16::from_be_bytes([page_bytes[0], page_bytes[1]]) as usize;
            let needed = 4 + block.len();

            if used + needed <= PAGE_SIZE {
                page_bytes[used..used + 2].copy_from_slice(&day_id.to_be_bytes());
                page_bytes[used + 2..used + 4].copy_from_slice(&template_id.to_be_bytes());
                page_bytes[used + 4..used + 4 + block.len()].copy_from_slice(&block);

                let new_used = (used + needed) as u16;
                page_bytes[0..2].copy_from_slice(&new_used.to_be_bytes());
                page::write_page(path, data_page_abs, &page_bytes)?;

                let rec_abs_offset =
                    offs.indexes_start as u64 * PAGE_SIZE as u64 + pos as u64 * INDEX_RECORD_SIZE as u64;
                page::write_int(path, day_id as u64, rec_abs_offset + 10, 2)?;
                return Ok(());
            }
        }

        // Allocate a new index record and a new data page for it.
        let index_used = records.len() * INDEX_RECORD_SIZE;
        let index_capacity = header.num_index_pages as usize * PAGE_SIZE;
        if index_used + INDEX_RECORD_SIZE > index_capacity {
            if index_grown {
                return Err(Error::IndexTableFull);
            }
            grow_region(path, RegionKind::Index, &header)?;
            index_grown = true;
            continue;
        }

        let new_slot = header.num_data_pages;
        let new_record = IndexRecord {
            trend_id,
            page_index: new_slot,
            start_day: day_id,
            end_day: day_id,
        };
        let rec_abs_offset = offs.indexes_start as u64 * PAGE_SIZE as u64 + index_used as u64;
        write_index_record(path, rec_abs_offset, &new_record)?;

        grow_region(path, RegionKind::Data, &header)?;

        let mut page_bytes = vec![0u8; PAGE_SIZE];
        let used = 2 + 4 + block.len();
        page_bytes[0..2].copy_from_slice(&(used as u16).to_be_bytes());
        page_bytes[2..4].copy_from_slice(&day_id.to_be_bytes());
        page_bytes[4..6].copy_from_slice(&template_id.to_be_bytes());
        page_bytes[6..6 + block.len()].copy_from_slice(&block);

        let refreshed = page::read_header(path)?;
        let data_page_abs = refreshed.region_offsets().data_start + new_slot;
        page::write_page(path, data_page_abs, &page_bytes)?;
        return Ok(());
    }
}

/// Writes a trend's observations, grouping by local date and committing
/// one day block at a time (spec §4.6).
pub fn write_data(path: &Path, trend_name: &str, observations: &[(OffsetDateTime, String)]) -> Result<()> {
    let trend_id = ensure_trend(path, trend_name)?;

    let mut by_date: BTreeMap<Date, Vec<(OffsetDateTime, String)>> = BTreeMap::new();
    for (dt, value) in observations {
        by_date.entry(dt.date()).or_default().push((*dt, value.clone()));
    }

    for (date, mut values) in by_date {
        values.sort_by_key(|(dt, _)| *dt);
        write_one_day(path, trend_id, date, &values)?;
    }

    Ok(())
}

fn minutes_from_template(template: &[u8; TEMPLATE_LEN]) -> Vec<u16> {
    unpack_bits(template)
        .into_iter()
        .enumerate()
        .filter_map(|(i, set)| if set { Some(i as u16) } else { None })
        .collect()
}

fn offset_datetime_at(date: Date, minute_of_day: u16) -> Result<OffsetDateTime> {
    let hour = (minute_of_day / 60) as u8;
    let minute = (minute_of_day % 60) as u8;
    let time = Time::from_hms(hour, minute, 0)
        .map_err(|e| Error::Corruption(format!("bad minute-of-day {minute_of_day}: {e}")))?;
    Ok(time::PrimitiveDateTime::new(date, time).assume_utc())
}

/// Reads every observation for `trend_name` whose day falls in
/// `[start, end]` inclusive, reconstructed in chronological order.
pub fn read_range(
    path: &Path,
    trend_name: &str,
    start: Date,
    end: Date,
) -> Result<Vec<(OffsetDateTime, String)>> {
    let header = page::read_header(path)?;
    let offs = header.region_offsets();

    let trend_bytes = read_flat_region(path, offs.trends_start, header.num_trend_pages)?;
    let trend_records = parse_trend_records(&trend_bytes)?;
    let catalog = TrendCatalog::from_records(trend_records)?;
    let trend_id = match catalog.resolve_or_stage(trend_name)? {
        TrendResolution::Existing(id) => id,
        TrendResolution::New(_) => return Err(Error::UnknownTrend(trend_name.to_string())),
    };

    let template_bytes = read_flat_region(path, offs.templates_start, header.num_template_pages)?;
    let templates = parse_templates(&template_bytes)?;

    let index_bytes = read_flat_region(path, offs.indexes_start, header.num_index_pages)?;
    let index_records = parse_index_records(&index_bytes)?;

    let start_day = calendar::day_id(start, header.initial_year)?;
    let end_day = calendar::day_id(end, header.initial_year)?;

    let mut out = Vec::new();
    for rec in index_records
        .iter()
        .filter(|r| r.trend_id == trend_id && r.start_day <= end_day && r.end_day >= start_day)
    {
        let page_bytes = page::read_page(path, offs.data_start + rec.page_index)?;
        let used = u16::from_be_bytes([page_bytes[0], page_bytes[1]]) as usize;
        if used > PAGE_SIZE {
            return Err(Error::Corruption("page byte-count exceeds page size".into()));
        }

        let mut pos = 2;
        while pos < used {
            let day_id = u16::from_be_bytes([page_bytes[pos], page_bytes[pos + 1]]);
            if day_id == 0 {
                return Err(Error::Corruption("zero day_id in populated data page".into()));
            }
            let template_id = u16::from_be_bytes([page_bytes[pos + 2], page_bytes[pos + 3]]);
            pos += 4;

            let (values, consumed) = day_values::decode(&page_bytes[pos..])?;
            pos += consumed;

            if day_id < start_day || day_id > end_day {
                continue;
            }

            let template = templates
                .get(template_id as usize)
                .ok_or_else(|| Error::Corruption(format!("unknown template id {template_id}")))?;
            let date = calendar::date_of_day_id(day_id, header.initial_year)?;
            let minutes = minutes_from_template(template);

            if minutes.len() != values.len() {
                return Err(Error::Corruption(format!(
                    "template/value count mismatch for day {day_id}"
                )));
            }

            for (minute, value) in minutes.into_iter().zip(values) {
                out.push((offset_datetime_at(date, minute)?, value));
            }
        }
    }

    out.sort_by_key(|(dt, _)| *dt);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use time::Month;

    fn dt(y: i32, m: Month, d: u8, h: u8, min: u8) -> OffsetDateTime {
        time::PrimitiveDateTime::new(
            Date::from_calendar_date(y, m, d).unwrap(),
            Time::from_hms(h, min, 0).unwrap(),
        )
        .assume_utc()
    }

    #[test]
    fn s1_init_and_summary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.db");
        page::init(&path).unwrap();

        let summary = page::summary(&path).unwrap();
        assert_eq!(summary.version, 1);
        assert_eq!(summary.page_size, PAGE_SIZE as u16);
        assert_eq!(summary.initial_year, 2000);
        assert_eq!(summary.num_trend_pages, 0);
        assert_eq!(summary.num_template_pages, 0);
        assert_eq!(summary.num_index_pages, 0);
        assert_eq!(summary.num_data_pages, 0);
        assert_eq!(summary.total_pages, 1);
    }

    #[test]
    fn s2_single_day_binary_trend_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.db");
        page::init(&path).unwrap();

        let mut observations = Vec::new();
        for hour in 0..24u8 {
            let value = if hour % 2 == 0 { "On" } else { "Off" };
            observations.push((dt(2024, Month::March, 21, hour, 0), value.to_string()));
        }

        write_data(&path, "Valve", &observations).unwrap();

        let header = page::read_header(&path).unwrap();
        assert_eq!(header.num_trend_pages, 1);
        assert_eq!(header.num_template_pages, 1);
        assert_eq!(header.num_index_pages, 1);
        assert_eq!(header.num_data_pages, 1);

        let result = read_range(
            &path,
            "Valve",
            Date::from_calendar_date(2024, Month::March, 21).unwrap(),
            Date::from_calendar_date(2024, Month::March, 21).unwrap(),
        )
        .unwrap();
        assert_eq!(result, observations);
    }

    #[test]
    fn s3_two_days_same_trend_share_one_data_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.db");
        page::init(&path).unwrap();

        let day1 = vec![
            (dt(2024, Month::March, 21, 8, 0), "On".to_string()),
            (dt(2024, Month::March, 21, 20, 0), "Off".to_string()),
        ];
        let day2 = vec![
            (dt(2024, Month::March, 22, 9, 0), "On".to_string()),
            (dt(2024, Month::March, 22, 10, 0), "On".to_string()),
            (dt(2024, Month::March, 22, 21, 0), "Off".to_string()),
        ];

        write_data(&path, "Valve", &day1).unwrap();
        write_data(&path, "Valve", &day2).unwrap();

        let header = page::read_header(&path).unwrap();
        assert_eq!(header.num_data_pages, 1, "both days should share one data page");
        assert_eq!(header.num_template_pages, 1, "two templates still fit in one page");

        let offs = header.region_offsets();
        let template_bytes = read_flat_region(&path, offs.templates_start, header.num_template_pages).unwrap();
        assert_eq!(
            parse_templates(&template_bytes).unwrap().len(),
            2,
            "the two days have different templates"
        );

        let result = read_range(
            &path,
            "Valve",
            Date::from_calendar_date(2024, Month::March, 21).unwrap(),
            Date::from_calendar_date(2024, Month::March, 22).unwrap(),
        )
        .unwrap();

        let mut expected = day1;
        expected.extend(day2);
        assert_eq!(result, expected);
    }

    #[test]
    fn s4_many_trends_force_trend_region_growth() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.db");
        page::init(&path).unwrap();

        // A trend record is 128 bytes; one page holds exactly 32.
        let trend_count = 40;
        for i in 0..trend_count {
            let name = format!("Trend{i:03}");
            let obs = vec![(dt(2024, Month::January, 1, 0, 0), format!("v{i}"))];
            write_data(&path, &name, &obs).unwrap();
        }

        let header = page::read_header(&path).unwrap();
        assert_eq!(header.num_trend_pages, 2);

        for i in 0..trend_count {
            let name = format!("Trend{i:03}");
            let result = read_range(
                &path,
                &name,
                Date::from_calendar_date(2024, Month::January, 1).unwrap(),
                Date::from_calendar_date(2024, Month::January, 1).unwrap(),
            )
            .unwrap();
            assert_eq!(result.len(), 1);
            assert_eq!(result[0].1, format!("v{i}"));
        }
    }

    #[test]
    fn s5_huffman_round_trip_on_high_cardinality_day() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.db");
        page::init(&path).unwrap();

        let readings = [
            "905.428", "909.646", "906.272", "913.865", "902.897", "900.366", "895.305",
            "904.585", "913.865", "878.432", "903.741", "895.305", "914.708", "905.428",
        ];
        let observations: Vec<_> = readings
            .iter()
            .enumerate()
            .map(|(i, v)| (dt(2024, Month::June, 1, (i as u8) % 24, 0), v.to_string()))
            .collect();

        write_data(&path, "Sensor", &observations).unwrap();

        let result = read_range(
            &path,
            "Sensor",
            Date::from_calendar_date(2024, Month::June, 1).unwrap(),
            Date::from_calendar_date(2024, Month::June, 1).unwrap(),
        )
        .unwrap();
        assert_eq!(result, observations);
    }

    #[test]
    fn s6_oversize_block_is_rejected_without_touching_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.db");
        page::init(&path).unwrap();

        let before = std::fs::metadata(&path).unwrap().len();

        // 300 distinct 40-hex-char values: forces the Huffman branch (100%
        // cardinality) over a small, near-uniform alphabet, landing the
        // packed data bitstream comfortably past one page's worth of bytes
        // while staying well under the 65536-bit Huffman bitstream cap.
        let observations: Vec<_> = (0..300u16)
            .map(|i| {
                let minute = i * 3;
                dt(2024, Month::January, 1, (minute / 60) as u8, (minute % 60) as u8)
            })
            .zip((0..300u32).map(|i| format!("{i:040x}")))
            .collect();

        let err = write_data(&path, "Overflow", &observations).unwrap_err();
        assert!(matches!(err, Error::EncodedBlockTooLarge { .. }));

        let after = std::fs::metadata(&path).unwrap().len();
        assert_eq!(before, after, "a rejected write must not grow the file");
    }

    #[test]
    fn in_range_overwrite_is_a_fatal_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.db");
        page::init(&path).unwrap();

        let day = vec![(dt(2024, Month::May, 1, 12, 0), "A".to_string())];
        write_data(&path, "Trend", &day).unwrap();

        let overwrite = vec![(dt(2024, Month::May, 1, 13, 0), "B".to_string())];
        let err = write_data(&path, "Trend", &overwrite).unwrap_err();
        assert!(matches!(err, Error::InRangeOverwriteUnsupported));
    }
}

//! Paged file manager (spec §3, §4.5): owns the file, header region,
//! region sizing, and the page-splicing growth primitive. Data page
//! contents (day blocks) are interpreted one layer up, in `engine`.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use binrw::{BinRead, BinWrite};

use crate::error::{Error, Result};

/// Page size in bytes — declared in the header too, but every region
/// calculation in this implementation uses the constant.
pub const PAGE_SIZE: usize = 4096;

/// Byte length of the populated prefix of page 0; the remainder is zero-filled.
const HEADER_LEN: usize = 22;

const OFFSET_NUM_TEMPLATE_PAGES: u64 = 6;
const OFFSET_NUM_TREND_PAGES: u64 = 10;
const OFFSET_NUM_INDEX_PAGES: u64 = 14;
const OFFSET_NUM_DATA_PAGES: u64 = 18;

const CURRENT_VERSION: u16 = 1;
const DEFAULT_INITIAL_YEAR: u16 = 2000;

/// The 22-byte header at the front of page 0 (spec §3's header table).
#[derive(Debug, Clone, Copy, BinRead, BinWrite)]
#[brw(big)]
pub struct Header {
    pub version: u16,
    pub page_size: u16,
    pub initial_year: u16,
    pub num_template_pages: u32,
    pub num_trend_pages: u32,
    pub num_index_pages: u32,
    pub num_data_pages: u32,
}

/// 1-based page indices where each region begins, derived from the header's
/// region page counts. Region order is fixed: Day-Templates, Trends,
/// Indexes, Data (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOffsets {
    pub templates_start: u32,
    pub trends_start: u32,
    pub indexes_start: u32,
    pub data_start: u32,
}

impl Header {
    pub fn region_offsets(&self) -> RegionOffsets {
        let templates_start = 1;
        let trends_start = templates_start + self.num_template_pages;
        let indexes_start = trends_start + self.num_trend_pages;
        let data_start = indexes_start + self.num_index_pages;
        RegionOffsets {
            templates_start,
            trends_start,
            indexes_start,
            data_start,
        }
    }

    pub fn total_region_pages(&self) -> u32 {
        self.num_template_pages + self.num_trend_pages + self.num_index_pages + self.num_data_pages
    }
}

/// Human-readable summary of a database file (spec §4.5's `summary`).
#[derive(Debug, Clone)]
pub struct Summary {
    pub version: u16,
    pub page_size: u16,
    pub initial_year: u16,
    pub num_template_pages: u32,
    pub num_trend_pages: u32,
    pub num_index_pages: u32,
    pub num_data_pages: u32,
    pub total_pages: u64,
    pub file_size_bytes: u64,
}

/// Creates an empty database file. Fails if `path` already exists.
pub fn init(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(Error::FileExists);
    }

    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;

    let header = Header {
        version: CURRENT_VERSION,
        page_size: PAGE_SIZE as u16,
        initial_year: DEFAULT_INITIAL_YEAR,
        num_template_pages: 0,
        num_trend_pages: 0,
        num_index_pages: 0,
        num_data_pages: 0,
    };

    let mut buf = std::io::Cursor::new(Vec::with_capacity(HEADER_LEN));
    header.write(&mut buf)?;
    let mut page = vec![0u8; PAGE_SIZE];
    page[..HEADER_LEN].copy_from_slice(buf.get_ref());

    file.write_all(&page)?;
    Ok(())
}

/// Reads the header (page 0's first 22 bytes).
pub fn read_header(path: &Path) -> Result<Header> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; HEADER_LEN];
    file.read_exact(&mut buf)?;
    let mut cursor = std::io::Cursor::new(buf);
    Ok(Header::read(&mut cursor)?)
}

/// Reports header fields, region page counts, total pages, and file size.
pub fn summary(path: &Path) -> Result<Summary> {
    let header = read_header(path)?;
    let file_size_bytes = fs::metadata(path)?.len();
    let total_pages = file_size_bytes / PAGE_SIZE as u64;

    Ok(Summary {
        version: header.version,
        page_size: header.page_size,
        initial_year: header.initial_year,
        num_template_pages: header.num_template_pages,
        num_trend_pages: header.num_trend_pages,
        num_index_pages: header.num_index_pages,
        num_data_pages: header.num_data_pages,
        total_pages,
        file_size_bytes,
    })
}

/// Overwrites `num_bytes` big-endian bytes of `value` at `offset` in place.
pub fn write_int(path: &Path, value: u64, offset: u64, num_bytes: usize) -> Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let full = value.to_be_bytes();
    file.write_all(&full[full.len() - num_bytes..])?;
    Ok(())
}

pub fn update_num_template_pages(path: &Path, n: u32) -> Result<()> {
    write_int(path, n as u64, OFFSET_NUM_TEMPLATE_PAGES, 4)
}

pub fn update_num_trend_pages(path: &Path, n: u32) -> Result<()> {
    write_int(path, n as u64, OFFSET_NUM_TREND_PAGES, 4)
}

pub fn update_num_index_pages(path: &Path, n: u32) -> Result<()> {
    write_int(path, n as u64, OFFSET_NUM_INDEX_PAGES, 4)
}

pub fn update_num_data_pages(path: &Path, n: u32) -> Result<()> {
    write_int(path, n as u64, OFFSET_NUM_DATA_PAGES, 4)
}

/// Splices `n` blank pages into the file starting at `at_page_index`, via a
/// temp-file copy-then-rename (spec §4.5). All file handles are closed
/// before the rename so the replace can proceed on platforms that require
/// the target closed (spec §5).
pub fn insert_blank_pages(path: &Path, at_page_index: u32, n: u32) -> Result<()> {
    let temp_path = {
        let mut p = path.to_path_buf();
        let mut name = p.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        p.set_file_name(name);
        p
    };

    {
        let mut source = File::open(path)?;
        let mut temp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;

        let prefix_bytes = at_page_index as u64 * PAGE_SIZE as u64;
        let mut remaining = prefix_bytes;
        let mut buf = [0u8; 64 * 1024];
        while remaining > 0 {
            let chunk = remaining.min(buf.len() as u64) as usize;
            source.read_exact(&mut buf[..chunk])?;
            temp.write_all(&buf[..chunk])?;
            remaining -= chunk as u64;
        }

        let blanks = vec![0u8; PAGE_SIZE * n as usize];
        temp.write_all(&blanks)?;

        std::io::copy(&mut source, &mut temp)?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Reads one page's raw bytes.
pub fn read_page(path: &Path, page_index: u32) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(page_index as u64 * PAGE_SIZE as u64))?;
    let mut buf = vec![0u8; PAGE_SIZE];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Reads `count` consecutive pages starting at `start_page_index`.
pub fn read_pages(path: &Path, start_page_index: u32, count: u32) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(start_page_index as u64 * PAGE_SIZE as u64))?;
    let mut buf = vec![0u8; PAGE_SIZE * count as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Writes one page's raw bytes (must be exactly `PAGE_SIZE` long).
pub fn write_page(path: &Path, page_index: u32, data: &[u8]) -> Result<()> {
    assert_eq!(data.len(), PAGE_SIZE, "write_page requires a full page");
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(page_index as u64 * PAGE_SIZE as u64))?;
    file.write_all(data)?;
    Ok(())
}

//! Error types for stsd-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("binary format error: {0}")]
    BinRw(String),

    #[error("file already exists")]
    FileExists,

    #[error("unknown day-values encoding tag: {0}")]
    UnknownEncodingTag(u8),

    #[error("encoded day-values block ({got} bytes) exceeds page capacity ({max} bytes)")]
    EncodedBlockTooLarge { got: usize, max: usize },

    #[error("day-template table region is full")]
    TemplateTableFull,

    #[error("trend table region is full")]
    TrendTableFull,

    #[error("index region is full")]
    IndexTableFull,

    #[error("trend name exceeds 124 UTF-8 bytes: {0:?}")]
    TrendNameTooLong(String),

    #[error("too many distinct values in one day: {0} (max 255)")]
    TooManyDistinctValues(usize),

    #[error("Huffman code exceeds 255 bits")]
    CodeTooLong,

    #[error("Huffman data bitstream exceeds 65535 bits: {0}")]
    DataBitstreamTooLarge(usize),

    #[error("writing inside an existing index record's day range is not implemented")]
    InRangeOverwriteUnsupported,

    #[error("trend {0:?} not found")]
    UnknownTrend(String),

    #[error("corrupt database: {0}")]
    Corruption(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<binrw::Error> for Error {
    fn from(e: binrw::Error) -> Self {
        Error::BinRw(e.to_string())
    }
}

//! Day-values codec (spec §4.4): encodes one day's ordered list of
//! string values into a self-describing byte block, choosing between
//! dictionary + run-length encoding and canonicalized Huffman coding
//! based on a cardinality test.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::huffman;

const TAG_DICT_RLE: u8 = 0x00;
const TAG_HUFFMAN: u8 = 0x01;

/// Record Separator, used to delimit values inside the Huffman symbol stream.
const RECORD_SEPARATOR: char = '\u{1E}';

/// `percent_unique < CARDINALITY_THRESHOLD` selects dictionary/RLE; otherwise Huffman.
const CARDINALITY_THRESHOLD: f64 = 0.2;

/// Encodes an ordered, non-empty list of values into a self-describing block.
pub fn encode(values: &[String]) -> Result<Vec<u8>> {
    assert!(!values.is_empty(), "day_values::encode requires a non-empty list");

    let mut first_seen: Vec<String> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for v in values {
        if seen.insert(v.clone()) {
            first_seen.push(v.clone());
        }
    }

    let percent_unique = first_seen.len() as f64 / values.len() as f64;

    if percent_unique < CARDINALITY_THRESHOLD {
        encode_dict_rle(values, &first_seen)
    } else {
        encode_huffman(values)
    }
}

fn encode_dict_rle(values: &[String], dict: &[String]) -> Result<Vec<u8>> {
    if dict.len() >= 256 {
        return Err(Error::TooManyDistinctValues(dict.len()));
    }

    let index_of: HashMap<&str, u8> = dict
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i as u8))
        .collect();

    let mut runs: Vec<(u8, usize)> = Vec::new();
    for v in values {
        let idx = index_of[v.as_str()];
        match runs.last_mut() {
            Some((last_idx, len)) if *last_idx == idx => *len += 1,
            _ => runs.push((idx, 1)),
        }
    }

    // R counts physical (length, value_index) pairs after 255-splitting, not
    // logical runs before it — a run whose length is an exact multiple of 255
    // would otherwise make its final chunk indistinguishable from a
    // continuation chunk on decode.
    let mut chunks: Vec<(u8, u8)> = Vec::new();
    for (idx, mut len) in runs {
        while len > 255 {
            chunks.push((255, idx));
            len -= 255;
        }
        chunks.push((len as u8, idx));
    }

    if chunks.len() >= 256 {
        return Err(Error::TooManyDistinctValues(chunks.len()));
    }

    let mut out = vec![TAG_DICT_RLE, dict.len() as u8];
    for value in dict {
        let bytes = value.as_bytes();
        out.push(bytes.len() as u8);
        out.extend_from_slice(bytes);
    }

    out.push(chunks.len() as u8);
    for (len, idx) in chunks {
        out.push(len);
        out.push(idx);
    }

    Ok(out)
}

fn encode_huffman(values: &[String]) -> Result<Vec<u8>> {
    let joined = values.join(&RECORD_SEPARATOR.to_string());

    let mut counts: HashMap<char, u32> = HashMap::new();
    for c in joined.chars() {
        *counts.entry(c).or_insert(0) += 1;
    }

    if counts.len() >= 256 {
        return Err(Error::TooManyDistinctValues(counts.len()));
    }

    let codes = huffman::build(&counts)?;

    let mut out = vec![TAG_HUFFMAN, codes.len() as u8];

    // Table order drives both the header and the concatenated code bits below.
    let symbols: Vec<char> = codes.keys().copied().collect();
    let mut code_bits = String::new();
    for &symbol in &symbols {
        let mut buf = [0u8; 4];
        let encoded = symbol.encode_utf8(&mut buf);
        out.push(encoded.len() as u8);
        out.extend_from_slice(encoded.as_bytes());

        let code = &codes[&symbol];
        if code.len() > 255 {
            return Err(Error::CodeTooLong);
        }
        out.push(code.len() as u8);
        code_bits.push_str(code);
    }

    out.extend(pack_bit_string(&code_bits));

    let data_bits: String = joined.chars().map(|c| codes[&c].clone()).collect();
    if data_bits.len() >= 65536 {
        return Err(Error::DataBitstreamTooLarge(data_bits.len()));
    }

    out.extend_from_slice(&(data_bits.len() as u16).to_be_bytes());
    out.extend(pack_bit_string(&data_bits));

    Ok(out)
}

fn pack_bit_string(bits: &str) -> Vec<u8> {
    let as_bools: Vec<bool> = bits.chars().map(|c| c == '1').collect();
    crate::bits::pack_bits(&as_bools)
}

/// Decodes a day-values block, returning the reconstructed list and the
/// number of input bytes consumed — so a caller walking a data page full
/// of day blocks can continue from where this block ended.
pub fn decode(bytes: &[u8]) -> Result<(Vec<String>, usize)> {
    match bytes.first().copied() {
        Some(TAG_DICT_RLE) => decode_dict_rle(bytes),
        Some(TAG_HUFFMAN) => decode_huffman(bytes),
        Some(other) => Err(Error::UnknownEncodingTag(other)),
        None => Err(Error::Corruption("empty day-values block".into())),
    }
}

fn decode_dict_rle(bytes: &[u8]) -> Result<(Vec<String>, usize)> {
    let mut pos = 1usize;
    let dict_len = bytes[pos] as usize;
    pos += 1;

    let mut dict = Vec::with_capacity(dict_len);
    for _ in 0..dict_len {
        let len = bytes[pos] as usize;
        pos += 1;
        let value = std::str::from_utf8(&bytes[pos..pos + len])
            .map_err(|e| Error::Corruption(e.to_string()))?
            .to_string();
        pos += len;
        dict.push(value);
    }

    let run_count = bytes[pos] as usize;
    pos += 1;

    let mut values = Vec::new();
    for _ in 0..run_count {
        let len = bytes[pos] as usize;
        pos += 1;
        let idx = bytes[pos] as usize;
        pos += 1;
        for _ in 0..len {
            values.push(dict[idx].clone());
        }
    }

    Ok((values, pos))
}

fn decode_huffman(bytes: &[u8]) -> Result<(Vec<String>, usize)> {
    let mut pos = 1usize;
    let symbol_count = bytes[pos] as usize;
    pos += 1;

    let mut symbols = Vec::with_capacity(symbol_count);
    let mut code_lengths = Vec::with_capacity(symbol_count);
    for _ in 0..symbol_count {
        let len = bytes[pos] as usize;
        pos += 1;
        let symbol = std::str::from_utf8(&bytes[pos..pos + len])
            .map_err(|e| Error::Corruption(e.to_string()))?
            .chars()
            .next()
            .ok_or_else(|| Error::Corruption("empty Huffman symbol".into()))?;
        pos += len;
        let code_len = bytes[pos] as usize;
        pos += 1;
        symbols.push(symbol);
        code_lengths.push(code_len);
    }

    let total_code_bits: usize = code_lengths.iter().sum();
    let code_byte_len = total_code_bits.div_ceil(8);
    let code_bits = crate::bits::unpack_bits(&bytes[pos..pos + code_byte_len]);
    pos += code_byte_len;

    let mut table: HashMap<String, char> = HashMap::new();
    let mut cursor = 0usize;
    for (i, &symbol) in symbols.iter().enumerate() {
        let len = code_lengths[i];
        let code: String = code_bits[cursor..cursor + len]
            .iter()
            .map(|&b| if b { '1' } else { '0' })
            .collect();
        table.insert(code, symbol);
        cursor += len;
    }

    let num_bits = u16::from_be_bytes([bytes[pos], bytes[pos + 1]]) as usize;
    pos += 2;

    let data_byte_len = num_bits.div_ceil(8);
    let all_data_bits = crate::bits::unpack_bits(&bytes[pos..pos + data_byte_len]);
    pos += data_byte_len;

    let chars = huffman::decode(&table, &all_data_bits[..num_bits]);
    let joined: String = chars.into_iter().collect();
    let values = joined.split(RECORD_SEPARATOR).map(str::to_string).collect();

    Ok((values, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_dict_rle_for_low_cardinality() {
        let values: Vec<String> = ["On", "Off"]
            .iter()
            .cycle()
            .take(14)
            .map(|s| s.to_string())
            .collect();
        let block = encode(&values).unwrap();
        assert_eq!(block[0], TAG_DICT_RLE);
    }

    #[test]
    fn selects_huffman_for_high_cardinality() {
        let values: Vec<String> = [
            "905.428", "909.646", "906.272", "913.865", "902.897", "900.366", "895.305",
            "904.585", "913.865", "878.432", "903.741", "895.305", "914.708", "905.428",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let block = encode(&values).unwrap();
        assert_eq!(block[0], TAG_HUFFMAN);
    }

    #[test]
    fn round_trips_dict_rle() {
        let values: Vec<String> = ["On", "Off", "On", "On", "On", "On", "On", "On", "On", "On",
            "On", "On", "On", "On"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let block = encode(&values).unwrap();
        let (decoded, consumed) = decode(&block).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(consumed, block.len());
    }

    #[test]
    fn round_trips_huffman() {
        let values: Vec<String> = [
            "905.428", "909.646", "906.272", "913.865", "902.897", "900.366", "895.305",
            "904.585", "913.865", "878.432", "903.741", "895.305", "914.708", "905.428",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let block = encode(&values).unwrap();
        let (decoded, consumed) = decode(&block).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(consumed, block.len());
    }

    #[test]
    fn round_trips_single_value() {
        let values = vec!["only".to_string()];
        let block = encode(&values).unwrap();
        let (decoded, consumed) = decode(&block).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(consumed, block.len());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = decode(&[0x02, 0, 0]).unwrap_err();
        assert!(matches!(err, Error::UnknownEncodingTag(2)));
    }

    #[test]
    fn too_many_rle_chunks_is_rejected_instead_of_wrapping() {
        // 256 alternating values: percent_unique ~= 0.0078 picks dict/RLE,
        // and alternation means 256 single-element runs, none individually
        // long enough to 255-split. chunks.len() == 256 must not silently
        // wrap to 0 in the u8 length prefix.
        let values: Vec<String> = (0..256)
            .map(|i| if i % 2 == 0 { "On" } else { "Off" }.to_string())
            .collect();
        let err = encode(&values).unwrap_err();
        assert!(matches!(err, Error::TooManyDistinctValues(256)));
    }
}

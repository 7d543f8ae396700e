//! Canonical-shaped Huffman codec over `char` symbols.
//!
//! Tree as a tagged variant (spec §9): no back-pointers, build-and-walk.
//! Priority is by frequency; ties are broken by a monotonically
//! increasing sequence number so heap order is deterministic.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Tree {
    Leaf { symbol: char },
    Internal { left: Box<Tree>, right: Box<Tree> },
}

struct HeapEntry {
    freq: u32,
    seq: u32,
    tree: Tree,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.freq == other.freq && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.freq, self.seq).cmp(&(other.freq, other.seq))
    }
}

/// Builds a prefix-free code table from a symbol frequency map.
///
/// A single-symbol alphabet is special-cased to code `"0"` (spec §4.2,
/// §9): the natural algorithm produces an empty code, which no bit
/// stream can represent.
pub fn build(counts: &HashMap<char, u32>) -> Result<HashMap<char, String>> {
    if counts.is_empty() {
        return Ok(HashMap::new());
    }

    if counts.len() == 1 {
        let symbol = *counts.keys().next().unwrap();
        return Ok(HashMap::from([(symbol, "0".to_string())]));
    }

    let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::new();
    let mut seq = 0u32;
    for (&symbol, &freq) in counts {
        heap.push(Reverse(HeapEntry {
            freq,
            seq,
            tree: Tree::Leaf { symbol },
        }));
        seq += 1;
    }

    while heap.len() > 1 {
        let Reverse(a) = heap.pop().unwrap();
        let Reverse(b) = heap.pop().unwrap();
        heap.push(Reverse(HeapEntry {
            freq: a.freq + b.freq,
            seq,
            tree: Tree::Internal {
                left: Box::new(a.tree),
                right: Box::new(b.tree),
            },
        }));
        seq += 1;
    }

    let Reverse(root) = heap.pop().unwrap();
    let mut codes = HashMap::new();
    walk(&root.tree, String::new(), &mut codes);

    for code in codes.values() {
        if code.len() > 255 {
            return Err(Error::CodeTooLong);
        }
    }

    Ok(codes)
}

fn walk(tree: &Tree, prefix: String, codes: &mut HashMap<char, String>) {
    match tree {
        Tree::Leaf { symbol } => {
            codes.insert(*symbol, prefix);
        }
        Tree::Internal { left, right } => {
            walk(left, format!("{prefix}0"), codes);
            walk(right, format!("{prefix}1"), codes);
        }
    }
}

/// Decodes a bit sequence against a `code -> symbol` table built from
/// [`build`]'s output (inverted by the caller).
pub fn decode(table: &HashMap<String, char>, bits: &[bool]) -> Vec<char> {
    let mut out = Vec::new();
    let mut buf = String::new();
    for &bit in bits {
        buf.push(if bit { '1' } else { '0' });
        if let Some(&symbol) = table.get(&buf) {
            out.push(symbol);
            buf.clear();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(codes: &HashMap<char, String>, text: &str) -> String {
        text.chars().map(|c| codes[&c].clone()).collect()
    }

    fn str_to_bits(s: &str) -> Vec<bool> {
        s.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn single_symbol_gets_code_zero() {
        let counts = HashMap::from([('a', 5)]);
        let codes = build(&counts).unwrap();
        assert_eq!(codes[&'a'], "0");
    }

    #[test]
    fn no_code_is_a_prefix_of_another() {
        let counts = HashMap::from([('a', 5), ('b', 9), ('c', 12), ('d', 13), ('e', 16), ('f', 45)]);
        let codes = build(&counts).unwrap();
        let values: Vec<&String> = codes.values().collect();
        for (i, a) in values.iter().enumerate() {
            for (j, b) in values.iter().enumerate() {
                if i != j {
                    assert!(!b.starts_with(a.as_str()), "{a} is a prefix of {b}");
                }
            }
        }
    }

    #[test]
    fn round_trips_arbitrary_text() {
        let text = "abracadabra";
        let mut counts = HashMap::new();
        for c in text.chars() {
            *counts.entry(c).or_insert(0) += 1;
        }
        let codes = build(&counts).unwrap();
        let encoded = encode(&codes, text);

        let table: HashMap<String, char> = codes.into_iter().map(|(s, c)| (c, s)).collect();
        let decoded: String = decode(&table, &str_to_bits(&encoded)).into_iter().collect();
        assert_eq!(decoded, text);
    }
}

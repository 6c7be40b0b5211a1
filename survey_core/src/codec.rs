//! Text encoding of coverage layers.
//!
//! Grammar, checked in this order when decoding:
//!
//! 1. `[01]{width*height}`: legacy literal, one character per cell.
//! 2. `X`: every cell set.
//! 3. Run-length: `count,char(,count,char)*` where `count` is hex and `char`
//!    is one hex nibble. Written without a trailing delimiter.
//! 4. Anything else: flat hex, one nibble per four cells.
//!
//! Nibbles pack cells row-major, most significant bit first. The final nibble
//! is zero-padded and its pad bits are ignored on decode.
//!
//! Decoding never fails. Problems are collected as [`CodecIssue`]s and every
//! cell that could not be read stays cleared.

use thiserror::Error;

use crate::cell_map::CellMap;

pub const FULL_SENTINEL: &str = "X";
const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Which branch of the grammar an input matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedForm {
    Empty,
    Legacy,
    Sentinel,
    RunLength,
    FlatHex,
}

impl EncodedForm {
    pub fn label(self) -> &'static str {
        match self {
            EncodedForm::Empty => "empty",
            EncodedForm::Legacy => "legacy",
            EncodedForm::Sentinel => "sentinel",
            EncodedForm::RunLength => "run-length",
            EncodedForm::FlatHex => "flat-hex",
        }
    }
}

/// Non-fatal decode diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecIssue {
    #[error("encoded layer is empty")]
    Empty,
    #[error("encoded layer stops after {found} of {expected} nibbles")]
    Truncated { expected: usize, found: usize },
    #[error("invalid hex character {found:?} at nibble {position}, read as 0")]
    InvalidChar { position: usize, found: char },
    #[error("run-length data has an unpaired trailing token")]
    OddTokenCount,
    #[error("run {run} has an unreadable token {token:?}")]
    BadCount { run: usize, token: String },
    #[error("runs expand past {expected} nibbles, extra data ignored")]
    Overflow { expected: usize },
    #[error("{extra} trailing characters ignored")]
    TrailingData { extra: usize },
}

/// Result of [`decode`]: the map, the grammar branch that matched and any
/// problems met along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub map: CellMap,
    pub form: EncodedForm,
    pub issues: Vec<CodecIssue>,
}

impl Decoded {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

fn nibble_count(width: u32, height: u32) -> usize {
    (width as usize * height as usize).div_ceil(4)
}

/// Encode a layer. A full layer becomes [`FULL_SENTINEL`].
pub fn encode(map: &CellMap) -> String {
    if map.is_full() {
        return FULL_SENTINEL.to_string();
    }
    run_length(&pack_nibbles(map.as_slice()))
}

fn pack_nibbles(cells: &[bool]) -> Vec<u8> {
    cells
        .chunks(4)
        .map(|chunk| {
            let value = chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (bit, set)| acc | (u8::from(*set) << (3 - bit)));
            HEX_DIGITS[value as usize]
        })
        .collect()
}

fn run_length(nibbles: &[u8]) -> String {
    let mut out = String::new();
    let mut iter = nibbles.iter().copied().peekable();
    while let Some(digit) = iter.next() {
        let mut count = 1usize;
        while iter.peek() == Some(&digit) {
            iter.next();
            count += 1;
        }
        if !out.is_empty() {
            out.push(',');
        }
        out.push_str(&format!("{count:X},{}", digit as char));
    }
    out
}

/// Decode a layer of `width x height` cells.
pub fn decode(encoded: &str, width: u32, height: u32) -> Decoded {
    let text = encoded.trim();
    let mut map = CellMap::new(width, height);
    let mut issues = Vec::new();
    let cell_total = width as usize * height as usize;

    if text.is_empty() {
        issues.push(CodecIssue::Empty);
        return Decoded {
            map,
            form: EncodedForm::Empty,
            issues,
        };
    }

    if text.len() == cell_total && text.bytes().all(|b| b == b'0' || b == b'1') {
        let cells = text.bytes().map(|b| b == b'1').collect();
        let map = CellMap::from_row_major(width, height, cells).unwrap_or(map);
        return Decoded {
            map,
            form: EncodedForm::Legacy,
            issues,
        };
    }

    if text == FULL_SENTINEL {
        map.fill(true);
        return Decoded {
            map,
            form: EncodedForm::Sentinel,
            issues,
        };
    }

    let expected = nibble_count(width, height);
    let (digits, form) = if text.contains(',') {
        (expand_runs(text, expected, &mut issues), EncodedForm::RunLength)
    } else {
        let mut digits: Vec<char> = text.chars().collect();
        if digits.len() > expected {
            issues.push(CodecIssue::TrailingData {
                extra: digits.len() - expected,
            });
            digits.truncate(expected);
        }
        (digits, EncodedForm::FlatHex)
    };

    if digits.len() < expected {
        issues.push(CodecIssue::Truncated {
            expected,
            found: digits.len(),
        });
    }

    unpack_nibbles(&digits, &mut map, &mut issues);
    Decoded { map, form, issues }
}

/// Expand `count,char` pairs into at most `expected` nibble characters.
fn expand_runs(text: &str, expected: usize, issues: &mut Vec<CodecIssue>) -> Vec<char> {
    let mut tokens: Vec<&str> = text.split(',').map(str::trim).collect();
    // tolerate a delimiter after the final run
    if tokens.last() == Some(&"") {
        tokens.pop();
    }
    if tokens.len() % 2 != 0 {
        issues.push(CodecIssue::OddTokenCount);
    }

    let mut digits = Vec::with_capacity(expected);
    for (run, pair) in tokens.chunks_exact(2).enumerate() {
        let Ok(count) = usize::from_str_radix(pair[0], 16) else {
            issues.push(CodecIssue::BadCount {
                run,
                token: pair[0].to_string(),
            });
            continue;
        };
        let mut chars = pair[1].chars();
        let digit = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                issues.push(CodecIssue::BadCount {
                    run,
                    token: pair[1].to_string(),
                });
                continue;
            }
        };
        let room = expected - digits.len();
        if count > room {
            digits.extend(std::iter::repeat(digit).take(room));
            issues.push(CodecIssue::Overflow { expected });
            break;
        }
        digits.extend(std::iter::repeat(digit).take(count));
    }
    digits
}

fn unpack_nibbles(digits: &[char], map: &mut CellMap, issues: &mut Vec<CodecIssue>) {
    let width = map.width().max(1) as usize;
    let cell_total = map.cell_count();
    for (position, digit) in digits.iter().enumerate() {
        let value = match digit.to_digit(16) {
            Some(value) => value,
            None => {
                issues.push(CodecIssue::InvalidChar {
                    position,
                    found: *digit,
                });
                0
            }
        };
        for bit in 0..4 {
            let idx = position * 4 + bit;
            if idx >= cell_total {
                break;
            }
            if value & (1 << (3 - bit)) != 0 {
                map.set((idx % width) as u32, (idx / width) as u32, true);
            }
        }
    }
}

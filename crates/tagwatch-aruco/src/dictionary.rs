//! Tag families and their code tables.
//!
//! The 16h5 and 36h11 tables ship inside the crate (see [`Dictionary::builtin`]).
//! Any family can also be read from a JSON file named `tag<family>.json` inside
//! a dictionary directory:
//!
//! ```json
//! {
//!   "name": "tag36h11",
//!   "marker_size": 6,
//!   "max_correction_bits": 5,
//!   "bit_order": "msb",
//!   "codes": ["0xd5d628584", 38038371714]
//! }
//! ```
//!
//! Codes may be JSON integers or `0x`-prefixed hex strings.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Tag families accepted on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagFamily {
    Tag16h5,
    Tag25h7,
    Tag25h9,
    Tag36h9,
    Tag36h11,
}

impl TagFamily {
    pub const ALL: [TagFamily; 5] = [
        TagFamily::Tag16h5,
        TagFamily::Tag25h7,
        TagFamily::Tag25h9,
        TagFamily::Tag36h9,
        TagFamily::Tag36h11,
    ];

    /// Short name as typed on the command line, e.g. `36h11`.
    pub fn as_str(self) -> &'static str {
        match self {
            TagFamily::Tag16h5 => "16h5",
            TagFamily::Tag25h7 => "25h7",
            TagFamily::Tag25h9 => "25h9",
            TagFamily::Tag36h9 => "36h9",
            TagFamily::Tag36h11 => "36h11",
        }
    }

    /// Inner bits per side.
    pub fn marker_size(self) -> usize {
        match self {
            TagFamily::Tag16h5 => 4,
            TagFamily::Tag25h7 | TagFamily::Tag25h9 => 5,
            TagFamily::Tag36h9 | TagFamily::Tag36h11 => 6,
        }
    }

    /// `<dir>/tag<family>.json`.
    pub fn file_in(self, dir: &Path) -> PathBuf {
        dir.join(format!("tag{}.json", self.as_str()))
    }
}

impl fmt::Display for TagFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagFamily {
    type Err = DictionaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TagFamily::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| DictionaryError::UnknownFamily(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("Invalid tag family specified: {0}")]
    UnknownFamily(String),
    #[error("no built-in code table for tag family {0}, pass a dictionary directory")]
    NotBundled(TagFamily),
    #[error("failed to read dictionary {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse dictionary {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("marker_size {0} implies more than 64 bits")]
    TooManyBits(usize),
    #[error("dictionary has no codes")]
    Empty,
    #[error("code #{index} ({value}) is not a valid code")]
    BadCode { index: usize, value: String },
    #[error("dictionary {name} has marker_size {found}, family {family} needs {expected}")]
    SizeMismatch {
        name: String,
        family: TagFamily,
        expected: usize,
        found: usize,
    },
}

/// Bit layout of codes in a dictionary file.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BitOrder {
    /// Row-major, bit index `y * n + x`, black = 1.
    #[default]
    Lsb,
    /// AprilTag native: the first cell is the most significant bit and
    /// white = 1.
    Msb,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CodeRepr {
    Int(u64),
    Text(String),
}

#[derive(Deserialize)]
struct DictionaryFile {
    name: String,
    marker_size: usize,
    max_correction_bits: u8,
    #[serde(default)]
    bit_order: BitOrder,
    codes: Vec<CodeRepr>,
}

/// A tag dictionary with codes normalised to row-major, black = 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dictionary {
    pub name: String,
    /// Inner bits per side.
    pub marker_size: usize,
    /// Largest Hamming distance the family can correct.
    pub max_correction_bits: u8,
    /// One code per id; bit `y * marker_size + x` is set for a black cell.
    pub codes: Vec<u64>,
}

impl Dictionary {
    /// Build from already normalised codes.
    pub fn new(
        name: impl Into<String>,
        marker_size: usize,
        max_correction_bits: u8,
        codes: Vec<u64>,
    ) -> Result<Self, DictionaryError> {
        let bits = marker_size * marker_size;
        if marker_size == 0 || bits > 64 {
            return Err(DictionaryError::TooManyBits(marker_size));
        }
        if codes.is_empty() {
            return Err(DictionaryError::Empty);
        }
        if let Some(index) = codes.iter().position(|c| bits < 64 && c >> bits != 0) {
            return Err(DictionaryError::BadCode {
                index,
                value: format!("{:#x}", codes[index]),
            });
        }
        Ok(Self {
            name: name.into(),
            marker_size,
            max_correction_bits,
            codes,
        })
    }

    /// Total number of inner bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    /// Parse a dictionary from JSON text. `origin` is only used in errors.
    pub fn from_json_str(text: &str, origin: &Path) -> Result<Self, DictionaryError> {
        let file: DictionaryFile =
            serde_json::from_str(text).map_err(|source| DictionaryError::Json {
                path: origin.to_path_buf(),
                source,
            })?;

        let n = file.marker_size;
        let bits = n * n;
        if n == 0 || bits > 64 {
            return Err(DictionaryError::TooManyBits(n));
        }

        let mut codes = Vec::with_capacity(file.codes.len());
        for (index, repr) in file.codes.iter().enumerate() {
            let raw = match repr {
                CodeRepr::Int(v) => *v,
                CodeRepr::Text(s) => parse_hex(s).ok_or_else(|| DictionaryError::BadCode {
                    index,
                    value: s.clone(),
                })?,
            };
            let code = match file.bit_order {
                BitOrder::Lsb => raw,
                BitOrder::Msb => apriltag_to_row_major(raw, bits),
            };
            codes.push(code);
        }

        Self::new(file.name, n, file.max_correction_bits, codes)
    }

    /// Code table compiled into the crate.
    pub fn builtin(family: TagFamily) -> Result<Self, DictionaryError> {
        let text = match family {
            TagFamily::Tag16h5 => TAG16H5_JSON,
            TagFamily::Tag36h11 => TAG36H11_JSON,
            TagFamily::Tag25h7 | TagFamily::Tag25h9 | TagFamily::Tag36h9 => {
                return Err(DictionaryError::NotBundled(family))
            }
        };
        let origin = PathBuf::from(format!("<builtin>/tag{family}.json"));
        let dict = Self::from_json_str(text, &origin)?.checked_for(family)?;
        log::debug!("using built-in {} ({} codes)", dict.name, dict.codes.len());
        Ok(dict)
    }

    /// Load `tag<family>.json` from `dir`.
    pub fn load(dir: &Path, family: TagFamily) -> Result<Self, DictionaryError> {
        let path = family.file_in(dir);
        let text = std::fs::read_to_string(&path).map_err(|source| DictionaryError::Io {
            path: path.clone(),
            source,
        })?;
        let dict = Self::from_json_str(&text, &path)?.checked_for(family)?;
        log::debug!(
            "loaded {} ({} codes) from {}",
            dict.name,
            dict.codes.len(),
            path.display()
        );
        Ok(dict)
    }

    fn checked_for(self, family: TagFamily) -> Result<Self, DictionaryError> {
        if self.marker_size != family.marker_size() {
            return Err(DictionaryError::SizeMismatch {
                name: self.name,
                family,
                expected: family.marker_size(),
                found: self.marker_size,
            });
        }
        Ok(self)
    }
}

const TAG16H5_JSON: &str = include_str!("../data/tag16h5.json");
const TAG36H11_JSON: &str = include_str!("../data/tag36h11.json");

fn parse_hex(s: &str) -> Option<u64> {
    let s = s.trim();
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    u64::from_str_radix(&digits.replace('_', ""), 16).ok()
}

/// Reverse the bit order over `bits` bits and flip polarity.
fn apriltag_to_row_major(code: u64, bits: usize) -> u64 {
    let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
    let reversed = (code & mask).reverse_bits() >> (64 - bits);
    !reversed & mask
}

//! Hexagram Table
//!
//! The 8x8 name matrix and the process-wide name index derived from it.
//! The index is built once on first use and never mutated afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::trigram::{Line, Trigram};

/// Names indexed by `[upper ordinal - 1][lower ordinal - 1]`
const NAME_MATRIX: [[&str; 8]; 8] = [
    ["乾", "履", "同人", "无妄", "姤", "讼", "遁", "否"],
    ["夬", "兑", "革", "随", "大过", "困", "咸", "萃"],
    ["大有", "睽", "离", "噬嗑", "鼎", "未济", "旅", "晋"],
    ["大壮", "归妹", "丰", "震", "恒", "解", "小过", "豫"],
    ["小畜", "中孚", "家人", "益", "巽", "涣", "渐", "观"],
    ["需", "节", "既济", "屯", "井", "坎", "蹇", "比"],
    ["大畜", "损", "贲", "颐", "蛊", "蒙", "艮", "剥"],
    ["泰", "临", "明夷", "复", "升", "师", "谦", "坤"],
];

/// Number of hexagrams
pub const HEXAGRAM_COUNT: usize = 64;

static NAME_INDEX: LazyLock<HashMap<&'static str, Hexagram>> = LazyLock::new(build_name_index);

fn build_name_index() -> HashMap<&'static str, Hexagram> {
    let mut index = HashMap::with_capacity(HEXAGRAM_COUNT);
    for hexagram in Hexagram::all() {
        let previous = index.insert(hexagram.name(), hexagram);
        debug_assert!(
            previous.is_none(),
            "duplicate hexagram name {}",
            hexagram.name()
        );
    }
    index
}

/// The name was not one of the 64 classical hexagram names
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown hexagram: {name:?}")]
pub struct UnknownHexagram {
    /// The input that failed to resolve, verbatim
    pub name: String,
}

/// Six lines, top to bottom: the upper trigram's lines then the lower's
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineSequence([Line; 6]);

impl LineSequence {
    /// Build from six lines, top first
    #[must_use]
    pub const fn from_lines(lines: [Line; 6]) -> Self {
        Self(lines)
    }

    /// Stack an upper trigram over a lower one
    #[must_use]
    pub const fn from_trigrams(upper: Trigram, lower: Trigram) -> Self {
        let u = upper.lines();
        let l = lower.lines();
        Self([u[0], u[1], u[2], l[0], l[1], l[2]])
    }

    /// Build from a 6-bit pattern; bit 5 is the top line
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self::from_trigrams(Trigram::from_bits(bits >> 3), Trigram::from_bits(bits))
    }

    /// 6-bit pattern; bit 5 is the top line
    #[must_use]
    pub fn to_bits(&self) -> u8 {
        self.0.iter().fold(0, |acc, line| (acc << 1) | line.bit())
    }

    /// Lines, top first
    #[must_use]
    pub const fn lines(&self) -> &[Line; 6] {
        &self.0
    }

    /// Iterate lines top to bottom
    pub fn iter(&self) -> impl Iterator<Item = Line> + '_ {
        self.0.iter().copied()
    }

    /// The trigram formed by the top three lines
    #[must_use]
    pub const fn upper(&self) -> Trigram {
        Trigram::from_lines([self.0[0], self.0[1], self.0[2]])
    }

    /// The trigram formed by the bottom three lines
    #[must_use]
    pub const fn lower(&self) -> Trigram {
        Trigram::from_lines([self.0[3], self.0[4], self.0[5]])
    }
}

impl fmt::Display for LineSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.iter() {
            write!(f, "{}", line.bit())?;
        }
        Ok(())
    }
}

/// A hexagram: an upper trigram stacked over a lower one
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Hexagram {
    upper: Trigram,
    lower: Trigram,
}

impl Hexagram {
    /// Compose from upper and lower trigrams
    #[must_use]
    pub const fn from_trigrams(upper: Trigram, lower: Trigram) -> Self {
        Self { upper, lower }
    }

    /// Resolve a classical name
    ///
    /// # Errors
    ///
    /// Returns [`UnknownHexagram`] if `name` is not exactly one of the 64 names.
    pub fn from_name(name: &str) -> Result<Self, UnknownHexagram> {
        NAME_INDEX.get(name).copied().ok_or_else(|| UnknownHexagram {
            name: name.to_string(),
        })
    }

    /// The hexagram drawn by a line sequence
    #[must_use]
    pub const fn from_lines(lines: &LineSequence) -> Self {
        Self::from_trigrams(lines.upper(), lines.lower())
    }

    /// Classical name
    #[must_use]
    pub const fn name(self) -> &'static str {
        NAME_MATRIX[self.upper.index()][self.lower.index()]
    }

    /// Upper trigram
    #[must_use]
    pub const fn upper(self) -> Trigram {
        self.upper
    }

    /// Lower trigram
    #[must_use]
    pub const fn lower(self) -> Trigram {
        self.lower
    }

    /// Six lines, top to bottom
    #[must_use]
    pub const fn lines(self) -> LineSequence {
        LineSequence::from_trigrams(self.upper, self.lower)
    }

    /// All 64 hexagrams in matrix order (row = upper, column = lower)
    pub fn all() -> impl Iterator<Item = Self> {
        Trigram::ALL.into_iter().flat_map(|upper| {
            Trigram::ALL
                .into_iter()
                .map(move |lower| Self::from_trigrams(upper, lower))
        })
    }
}

impl fmt::Display for Hexagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Line structure for a hexagram name
///
/// # Errors
///
/// Returns [`UnknownHexagram`] for anything outside the 64 names. No trimming,
/// case folding or fuzzy matching is applied.
pub fn structure_for_name(name: &str) -> Result<LineSequence, UnknownHexagram> {
    Hexagram::from_name(name).map(Hexagram::lines)
}

/// Name for a line structure (every structure has exactly one)
#[must_use]
pub fn name_for_structure(lines: &LineSequence) -> &'static str {
    Hexagram::from_lines(lines).name()
}

/// Number of entries in the name index
#[must_use]
pub fn indexed_name_count() -> usize {
    NAME_INDEX.len()
}

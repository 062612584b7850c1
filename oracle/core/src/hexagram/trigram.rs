//! Lines and Trigrams
//!
//! The eight three-line figures in canonical order:
//! Qian, Dui, Li, Zhen, Xun, Kan, Gen, Kun (ordinals 1-8).
//!
//! The ordinal order is the traditional sequence, not binary counting, so the
//! line table below is written out by hand rather than derived.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single line of a trigram or hexagram
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Line {
    /// Yin, drawn as two bars with a gap (bit value 0)
    Broken,
    /// Yang, drawn as one unbroken bar (bit value 1)
    Solid,
}

impl Line {
    /// Line for a bit value (only the lowest bit is considered)
    #[must_use]
    pub const fn from_bit(bit: u8) -> Self {
        if bit & 1 == 1 {
            Self::Solid
        } else {
            Self::Broken
        }
    }

    /// Bit value of this line (1 = solid, 0 = broken)
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Solid => 1,
            Self::Broken => 0,
        }
    }

    /// Whether this is a solid (yang) line
    #[must_use]
    pub const fn is_solid(self) -> bool {
        matches!(self, Self::Solid)
    }
}

/// Ordinal 1..=8 -> (top, middle, bottom), 1 = solid
const TRIGRAM_LINES: [[u8; 3]; 8] = [
    [1, 1, 1], // 1: Qian
    [0, 1, 1], // 2: Dui
    [1, 0, 1], // 3: Li
    [0, 0, 1], // 4: Zhen
    [1, 1, 0], // 5: Xun
    [0, 1, 0], // 6: Kan
    [1, 0, 0], // 7: Gen
    [0, 0, 0], // 8: Kun
];

const TRIGRAM_NAMES: [&str; 8] = ["乾", "兑", "离", "震", "巽", "坎", "艮", "坤"];

const TRIGRAM_PINYIN: [&str; 8] = ["Qian", "Dui", "Li", "Zhen", "Xun", "Kan", "Gen", "Kun"];

/// One of the eight trigrams, identified by its canonical ordinal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Trigram(u8);

impl Trigram {
    /// Qian, heaven
    pub const QIAN: Self = Self(1);
    /// Dui, lake
    pub const DUI: Self = Self(2);
    /// Li, fire
    pub const LI: Self = Self(3);
    /// Zhen, thunder
    pub const ZHEN: Self = Self(4);
    /// Xun, wind
    pub const XUN: Self = Self(5);
    /// Kan, water
    pub const KAN: Self = Self(6);
    /// Gen, mountain
    pub const GEN: Self = Self(7);
    /// Kun, earth
    pub const KUN: Self = Self(8);

    /// All trigrams in canonical order
    pub const ALL: [Self; 8] = [
        Self::QIAN,
        Self::DUI,
        Self::LI,
        Self::ZHEN,
        Self::XUN,
        Self::KAN,
        Self::GEN,
        Self::KUN,
    ];

    /// Look up a trigram by its 1-based canonical ordinal
    #[must_use]
    pub const fn from_ordinal(ordinal: u8) -> Option<Self> {
        if matches!(ordinal, 1..=8) {
            Some(Self(ordinal))
        } else {
            None
        }
    }

    /// Trigram drawn by a 3-bit pattern (bit 2 = top line, bit 0 = bottom)
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b111 => Self::QIAN,
            0b011 => Self::DUI,
            0b101 => Self::LI,
            0b001 => Self::ZHEN,
            0b110 => Self::XUN,
            0b010 => Self::KAN,
            0b100 => Self::GEN,
            // 0b000
            _ => Self::KUN,
        }
    }

    /// Trigram drawn by the given lines (top, middle, bottom)
    #[must_use]
    pub const fn from_lines(lines: [Line; 3]) -> Self {
        Self::from_bits((lines[0].bit() << 2) | (lines[1].bit() << 1) | lines[2].bit())
    }

    /// Canonical 1-based ordinal
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self.0
    }

    /// Zero-based index into the fixed tables
    pub(crate) const fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// Lines from top to bottom
    #[must_use]
    pub const fn lines(self) -> [Line; 3] {
        let bits = TRIGRAM_LINES[self.index()];
        [
            Line::from_bit(bits[0]),
            Line::from_bit(bits[1]),
            Line::from_bit(bits[2]),
        ]
    }

    /// 3-bit pattern (bit 2 = top line)
    #[must_use]
    pub const fn bits(self) -> u8 {
        let bits = TRIGRAM_LINES[self.index()];
        (bits[0] << 2) | (bits[1] << 1) | bits[2]
    }

    /// Classical single-character name
    #[must_use]
    pub const fn name(self) -> &'static str {
        TRIGRAM_NAMES[self.index()]
    }

    /// Romanized name
    #[must_use]
    pub const fn pinyin(self) -> &'static str {
        TRIGRAM_PINYIN[self.index()]
    }
}

impl fmt::Display for Trigram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.pinyin())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_ordinal_bounds() {
        assert!(Trigram::from_ordinal(0).is_none());
        assert!(Trigram::from_ordinal(9).is_none());
        for ordinal in 1..=8 {
            let trigram = Trigram::from_ordinal(ordinal).unwrap();
            assert_eq!(trigram.ordinal(), ordinal);
        }
    }

    #[test]
    fn test_triples_are_a_bijection() {
        let patterns: HashSet<u8> = Trigram::ALL.iter().map(|t| t.bits()).collect();
        assert_eq!(patterns.len(), 8);
        assert_eq!(patterns, (0u8..8).collect());
    }

    #[test]
    fn test_bits_and_lines_agree() {
        for trigram in Trigram::ALL {
            assert_eq!(Trigram::from_bits(trigram.bits()), trigram);
            assert_eq!(Trigram::from_lines(trigram.lines()), trigram);
        }
    }

    #[test]
    fn test_canonical_reference_values() {
        use Line::{Broken as B, Solid as S};

        assert_eq!(Trigram::QIAN.lines(), [S, S, S]);
        assert_eq!(Trigram::DUI.lines(), [B, S, S]);
        assert_eq!(Trigram::LI.lines(), [S, B, S]);
        assert_eq!(Trigram::ZHEN.lines(), [B, B, S]);
        assert_eq!(Trigram::XUN.lines(), [S, S, B]);
        assert_eq!(Trigram::KAN.lines(), [B, S, B]);
        assert_eq!(Trigram::GEN.lines(), [S, B, B]);
        assert_eq!(Trigram::KUN.lines(), [B, B, B]);
    }

    #[test]
    fn test_canonical_order_is_not_binary_counting() {
        let bits: Vec<u8> = Trigram::ALL.iter().map(|t| t.bits()).collect();
        assert_eq!(bits, vec![7, 3, 5, 1, 6, 2, 4, 0]);
    }

    #[test]
    fn test_display() {
        assert_eq!(Trigram::KAN.to_string(), "坎 (Kan)");
    }
}

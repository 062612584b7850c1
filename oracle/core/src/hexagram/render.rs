//! Line Glyph Rendering
//!
//! Turns a [`LineSequence`] into bars a surface can draw. A solid line is one
//! bar across the full width; a broken line is two equal bars with a gap
//! centered on the horizontal midpoint.
//!
//! Geometry is measured in abstract cells (terminal columns/rows for the CLI,
//! any unit for other surfaces). Size only scales geometry; the solid/broken
//! pattern is identical at every size.

use serde::{Deserialize, Serialize};

use super::table::{Hexagram, LineSequence};
use super::trigram::Line;

/// Placeholder shown for names outside the table
pub const UNKNOWN_PLACEHOLDER: &str = "Unknown Hexagram";

/// Width of one bar segment as a percentage of the full width
const SEGMENT_PERCENT: u16 = 42;

/// Base width in cells at scale 1
const BASE_WIDTH: u16 = 9;

/// Visual size of a rendered hexagram
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlyphSize {
    /// Inline, list rows
    Small,
    /// Result cards (default)
    #[default]
    Medium,
    /// Detail view, share image
    Large,
}

impl GlyphSize {
    /// Nominal scale factor
    #[must_use]
    pub const fn scale(self) -> u16 {
        match self {
            Self::Small => 1,
            Self::Medium => 2,
            Self::Large => 3,
        }
    }

    /// Bar geometry at this size
    #[must_use]
    pub const fn geometry(self) -> BarGeometry {
        let scale = self.scale();
        let width = BASE_WIDTH * scale;
        let segment = width * SEGMENT_PERCENT / 100;
        BarGeometry {
            width,
            height: scale,
            segment,
            gap: width - 2 * segment,
            line_spacing: scale,
        }
    }

    /// Parse the short forms used by surfaces (`sm`, `md`, `lg`)
    #[must_use]
    pub fn from_short(value: &str) -> Option<Self> {
        match value {
            "sm" | "small" => Some(Self::Small),
            "md" | "medium" => Some(Self::Medium),
            "lg" | "large" => Some(Self::Large),
            _ => None,
        }
    }
}

/// Dimensions of one line and the spacing between lines
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarGeometry {
    /// Full line width
    pub width: u16,
    /// Bar thickness
    pub height: u16,
    /// Width of each half of a broken line
    pub segment: u16,
    /// Gap between the halves of a broken line
    pub gap: u16,
    /// Empty space between consecutive lines
    pub line_spacing: u16,
}

/// A horizontal bar span within a row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bar {
    /// Left edge
    pub x: u16,
    /// Span width
    pub width: u16,
}

impl Bar {
    /// Whether cell column `x` is covered by this bar
    #[must_use]
    pub const fn covers(&self, x: u16) -> bool {
        x >= self.x && x < self.x + self.width
    }
}

/// One drawn line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlyphRow {
    /// The line this row draws
    pub line: Line,
    /// One bar for solid, two for broken
    pub bars: Vec<Bar>,
}

/// A hexagram laid out as six rows of bars, top first
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Glyph {
    /// Size this glyph was laid out at
    pub size: GlyphSize,
    /// Geometry used
    pub geometry: BarGeometry,
    /// Rows, top to bottom
    pub rows: Vec<GlyphRow>,
}

impl Glyph {
    /// The solid/broken pattern as drawn (one bar = solid, two = broken)
    #[must_use]
    pub fn pattern(&self) -> Vec<Line> {
        self.rows
            .iter()
            .map(|row| {
                if row.bars.len() == 1 {
                    Line::Solid
                } else {
                    Line::Broken
                }
            })
            .collect()
    }

    /// Draw with block characters, one text line per cell row
    #[must_use]
    pub fn to_text(&self) -> String {
        let geometry = self.geometry;
        let mut out = String::new();

        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                out.push('\n');
                for _ in 0..geometry.line_spacing {
                    out.push('\n');
                }
            }
            let cells: String = (0..geometry.width)
                .map(|x| {
                    if row.bars.iter().any(|bar| bar.covers(x)) {
                        '█'
                    } else {
                        ' '
                    }
                })
                .collect();
            for h in 0..geometry.height {
                if h > 0 {
                    out.push('\n');
                }
                out.push_str(cells.trim_end());
            }
        }

        out
    }
}

/// Lay out a line sequence at the given size
#[must_use]
pub fn render(lines: &LineSequence, size: GlyphSize) -> Glyph {
    let geometry = size.geometry();
    let rows = lines
        .iter()
        .map(|line| GlyphRow {
            line,
            bars: bars_for(line, &geometry),
        })
        .collect();

    Glyph {
        size,
        geometry,
        rows,
    }
}

fn bars_for(line: Line, geometry: &BarGeometry) -> Vec<Bar> {
    match line {
        Line::Solid => vec![Bar {
            x: 0,
            width: geometry.width,
        }],
        Line::Broken => vec![
            Bar {
                x: 0,
                width: geometry.segment,
            },
            Bar {
                x: geometry.segment + geometry.gap,
                width: geometry.segment,
            },
        ],
    }
}

/// Result of rendering by name
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderedHexagram {
    /// A known hexagram, laid out
    Drawn {
        /// The resolved hexagram
        hexagram: Hexagram,
        /// Its glyph
        glyph: Glyph,
    },
    /// The name was not recognized; show a placeholder instead
    Unrecognized {
        /// The name as received
        name: String,
    },
}

impl RenderedHexagram {
    /// Text form: the glyph, or [`UNKNOWN_PLACEHOLDER`]
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Drawn { glyph, .. } => glyph.to_text(),
            Self::Unrecognized { .. } => UNKNOWN_PLACEHOLDER.to_string(),
        }
    }
}

/// Resolve and lay out a hexagram by name; never fails
#[must_use]
pub fn render_name(name: &str, size: GlyphSize) -> RenderedHexagram {
    match Hexagram::from_name(name) {
        Ok(hexagram) => RenderedHexagram::Drawn {
            hexagram,
            glyph: render(&hexagram.lines(), size),
        },
        Err(err) => RenderedHexagram::Unrecognized { name: err.name },
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::hexagram::structure_for_name;

    #[test]
    fn test_geometry_scales() {
        let small = GlyphSize::Small.geometry();
        let large = GlyphSize::Large.geometry();
        assert_eq!(small.width, 9);
        assert_eq!(large.width, 27);
        assert!(large.height > small.height);
        assert_eq!(small.segment * 2 + small.gap, small.width);
    }

    #[test]
    fn test_gap_is_centered() {
        for size in [GlyphSize::Small, GlyphSize::Medium, GlyphSize::Large] {
            let g = size.geometry();
            let left_end = g.segment;
            let right_start = g.segment + g.gap;
            // Midpoint (width / 2) falls inside the gap, and the halves mirror
            assert!(left_end * 2 <= g.width);
            assert!(right_start * 2 >= g.width);
            assert_eq!(g.width - right_start, left_end);
        }
    }

    #[test]
    fn test_broken_row_has_two_bars() {
        let glyph = render(&structure_for_name("坤").unwrap(), GlyphSize::Medium);
        assert_eq!(glyph.rows.len(), 6);
        assert!(glyph.rows.iter().all(|row| row.bars.len() == 2));
    }

    #[test]
    fn test_small_text() {
        let glyph = render(&structure_for_name("否").unwrap(), GlyphSize::Small);
        let expected = [
            "█████████",
            "",
            "█████████",
            "",
            "█████████",
            "",
            "███   ███",
            "",
            "███   ███",
            "",
            "███   ███",
        ]
        .join("\n");
        assert_eq!(glyph.to_text(), expected);
    }

    #[test]
    fn test_unrecognized_placeholder() {
        let rendered = render_name("Qian", GlyphSize::Large);
        assert_eq!(
            rendered,
            RenderedHexagram::Unrecognized {
                name: "Qian".to_string()
            }
        );
        assert_eq!(rendered.to_text(), UNKNOWN_PLACEHOLDER);
    }

    #[test]
    fn test_size_from_short() {
        assert_eq!(GlyphSize::from_short("sm"), Some(GlyphSize::Small));
        assert_eq!(GlyphSize::from_short("lg"), Some(GlyphSize::Large));
        assert_eq!(GlyphSize::from_short("xl"), None);
    }
}

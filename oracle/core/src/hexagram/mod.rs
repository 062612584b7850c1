//! Trigram/Hexagram Codec
//!
//! Pure, synchronous translation between a hexagram's classical name and its
//! six-line structure, plus layout of that structure as line glyphs.
//!
//! ```text
//!   name ──structure_for_name──▶ LineSequence ──render──▶ Glyph
//!     ▲                              │
//!     └─────name_for_structure───────┘
//! ```
//!
//! The lookup table is process-wide and read-only; any number of surfaces may
//! read it concurrently. Unknown names are reported as [`UnknownHexagram`],
//! which surfaces turn into a visible placeholder via [`render_name`].
//!
//! # Usage
//!
//! ```
//! use oracle_core::hexagram::{render_name, structure_for_name, GlyphSize};
//!
//! let lines = structure_for_name("泰").unwrap();
//! assert_eq!(lines.to_string(), "000111");
//!
//! let drawn = render_name("泰", GlyphSize::Small);
//! println!("{}", drawn.to_text());
//! ```

mod render;
mod table;
mod trigram;

pub use render::{
    render, render_name, Bar, BarGeometry, Glyph, GlyphRow, GlyphSize, RenderedHexagram,
    UNKNOWN_PLACEHOLDER,
};
pub use table::{
    indexed_name_count, name_for_structure, structure_for_name, Hexagram, LineSequence,
    UnknownHexagram, HEXAGRAM_COUNT,
};
pub use trigram::{Line, Trigram};

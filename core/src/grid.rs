use std::collections::HashSet;
use std::sync::OnceLock;

use crate::tile::{tile_key, TileKey, TILE_KEY_SEPARATOR};

pub const GLYPH_SIZE: usize = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlyphPattern {
    pub glyph: char,
    pub cells: [[bool; GLYPH_SIZE]; GLYPH_SIZE],
}

include!(concat!(env!("OUT_DIR"), "/glyph_layout.rs"));

impl GlyphPattern {
    pub fn is_active(&self, row: usize, col: usize) -> bool {
        self.cells
            .get(row)
            .and_then(|cells| cells.get(col))
            .copied()
            .unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        self.cells
            .iter()
            .map(|row| row.iter().filter(|cell| **cell).count())
            .sum()
    }

    pub fn active_keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        (0..GLYPH_SIZE).flat_map(move |row| {
            (0..GLYPH_SIZE)
                .filter(move |col| self.cells[row][*col])
                .map(move |col| tile_key(self.glyph, row as u8, col as u8))
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("layout has no glyphs")]
    Empty,
    #[error("glyph '{0}' cannot be whitespace or the key separator")]
    InvalidGlyph(char),
    #[error("glyph '{0}' appears more than once")]
    DuplicateGlyph(char),
    #[error("glyph '{0}' has no active cells")]
    NoActiveCells(char),
}

/// Static table of glyph patterns with the active-cell total precomputed.
#[derive(Clone, Debug)]
pub struct GridLayout {
    glyphs: Vec<GlyphPattern>,
    total_active: usize,
}

impl GridLayout {
    pub fn from_patterns(glyphs: Vec<GlyphPattern>) -> Result<Self, LayoutError> {
        if glyphs.is_empty() {
            return Err(LayoutError::Empty);
        }
        let mut seen = HashSet::new();
        for pattern in &glyphs {
            if pattern.glyph.is_whitespace() || pattern.glyph == TILE_KEY_SEPARATOR {
                return Err(LayoutError::InvalidGlyph(pattern.glyph));
            }
            if !seen.insert(pattern.glyph) {
                return Err(LayoutError::DuplicateGlyph(pattern.glyph));
            }
            if pattern.active_count() == 0 {
                return Err(LayoutError::NoActiveCells(pattern.glyph));
            }
        }
        Ok(Self::with_total(glyphs))
    }

    /// The layout compiled in from `glyphs/monad.toml`. Validated at build time.
    pub fn standard() -> &'static GridLayout {
        static STANDARD: OnceLock<GridLayout> = OnceLock::new();
        STANDARD.get_or_init(|| Self::with_total(GLYPH_LAYOUT.to_vec()))
    }

    fn with_total(glyphs: Vec<GlyphPattern>) -> Self {
        let total_active = glyphs.iter().map(GlyphPattern::active_count).sum();
        Self {
            glyphs,
            total_active,
        }
    }

    pub fn glyphs(&self) -> &[GlyphPattern] {
        &self.glyphs
    }

    pub fn glyph(&self, glyph: char) -> Option<&GlyphPattern> {
        self.glyphs.iter().find(|pattern| pattern.glyph == glyph)
    }

    pub fn word(&self) -> String {
        self.glyphs.iter().map(|pattern| pattern.glyph).collect()
    }

    pub fn total_active_tiles(&self) -> usize {
        self.total_active
    }

    pub fn is_active(&self, key: &TileKey) -> bool {
        self.glyph(key.glyph)
            .is_some_and(|pattern| pattern.is_active(key.row as usize, key.col as usize))
    }

    pub fn active_keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        self.glyphs.iter().flat_map(GlyphPattern::active_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_cell(glyph: char) -> GlyphPattern {
        let mut cells = [[false; GLYPH_SIZE]; GLYPH_SIZE];
        cells[0][0] = true;
        GlyphPattern { glyph, cells }
    }

    #[test]
    fn standard_layout_spells_monad() {
        let layout = GridLayout::standard();
        assert_eq!(layout.word(), LAYOUT_WORD);
        assert_eq!(layout.word(), "MONAD");
        assert_eq!(layout.glyphs().len(), 5);
        assert_eq!(layout.total_active_tiles(), 100);
        assert_eq!(layout.active_keys().count(), layout.total_active_tiles());
    }

    #[test]
    fn is_active_follows_pattern() {
        let layout = GridLayout::standard();
        assert!(layout.is_active(&tile_key('M', 0, 0)));
        assert!(!layout.is_active(&tile_key('M', 0, 1)));
        assert!(!layout.is_active(&tile_key('O', 0, 0)));
        assert!(!layout.is_active(&tile_key('Z', 0, 0)));
        assert!(!layout.is_active(&tile_key('M', 7, 0)));
    }

    #[test]
    fn from_patterns_validates() {
        assert_eq!(GridLayout::from_patterns(Vec::new()).err(), Some(LayoutError::Empty));
        assert_eq!(
            GridLayout::from_patterns(vec![single_cell('A'), single_cell('A')]).err(),
            Some(LayoutError::DuplicateGlyph('A'))
        );
        let blank = GlyphPattern {
            glyph: 'B',
            cells: [[false; GLYPH_SIZE]; GLYPH_SIZE],
        };
        assert_eq!(
            GridLayout::from_patterns(vec![blank]).err(),
            Some(LayoutError::NoActiveCells('B'))
        );
        assert_eq!(
            GridLayout::from_patterns(vec![single_cell('-')]).err(),
            Some(LayoutError::InvalidGlyph('-'))
        );
        assert_eq!(
            GridLayout::from_patterns(vec![single_cell('A'), single_cell(' ')]).err(),
            Some(LayoutError::InvalidGlyph(' '))
        );
        let layout = GridLayout::from_patterns(vec![single_cell('H'), single_cell('I')])
            .expect("valid layout");
        assert_eq!(layout.total_active_tiles(), 2);
        assert_eq!(layout.word(), "HI");
        for key in layout.active_keys() {
            assert_eq!(key.to_string().parse::<TileKey>(), Ok(key));
        }
    }
}

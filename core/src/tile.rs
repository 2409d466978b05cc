use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

use crate::grid::GridLayout;

pub const TILE_KEY_SEPARATOR: char = '-';

/// One cell of one glyph. Keys are only meaningful against a [`GridLayout`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Archive, Serialize, Deserialize,
)]
pub struct TileKey {
    pub glyph: char,
    pub row: u8,
    pub col: u8,
}

pub fn tile_key(glyph: char, row: u8, col: u8) -> TileKey {
    TileKey { glyph, row, col }
}

impl TileKey {
    pub fn parse(value: &str) -> Result<Self, TileKeyError> {
        let mut parts = value.split(TILE_KEY_SEPARATOR);
        let (Some(glyph), Some(row), Some(col), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TileKeyError::Malformed(value.to_string()));
        };
        let mut glyph_chars = glyph.chars();
        let glyph = match (glyph_chars.next(), glyph_chars.next()) {
            (Some(ch), None) => ch,
            _ => return Err(TileKeyError::InvalidGlyph(glyph.to_string())),
        };
        let row = row
            .parse::<u8>()
            .map_err(|_| TileKeyError::InvalidIndex(row.to_string()))?;
        let col = col
            .parse::<u8>()
            .map_err(|_| TileKeyError::InvalidIndex(col.to_string()))?;
        Ok(Self { glyph, row, col })
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{TILE_KEY_SEPARATOR}{}{TILE_KEY_SEPARATOR}{}",
            self.glyph, self.row, self.col
        )
    }
}

impl std::str::FromStr for TileKey {
    type Err = TileKeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileKeyError {
    Malformed(String),
    InvalidGlyph(String),
    InvalidIndex(String),
}

impl fmt::Display for TileKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileKeyError::Malformed(value) => {
                write!(f, "tile key '{value}' must look like GLYPH-ROW-COL")
            }
            TileKeyError::InvalidGlyph(value) => {
                write!(f, "glyph '{value}' must be a single character")
            }
            TileKeyError::InvalidIndex(value) => {
                write!(f, "invalid row/column index '{value}'")
            }
        }
    }
}

impl std::error::Error for TileKeyError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct TileEntry {
    pub key: TileKey,
    pub flipped: bool,
}

/// Shared flip state. Absent keys read as unflipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct TileState {
    entries: Vec<TileEntry>,
}

impl TileState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_flipped(&self, key: &TileKey) -> bool {
        self.entries
            .iter()
            .find(|entry| entry.key == *key)
            .is_some_and(|entry| entry.flipped)
    }

    pub fn set(&mut self, key: TileKey, flipped: bool) {
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => entry.flipped = flipped,
            None => self.entries.push(TileEntry { key, flipped }),
        }
    }

    /// Flips one key and returns its new value.
    pub fn toggle(&mut self, key: TileKey) -> bool {
        let next = !self.is_flipped(&key);
        self.set(key, next);
        next
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|entry| !entry.flipped)
    }

    pub fn entries(&self) -> &[TileEntry] {
        &self.entries
    }

    pub fn flipped_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.flipped).count()
    }

    /// Counts flipped keys that are active cells of `layout`; foreign keys
    /// written by other clients never count toward completion.
    pub fn flipped_active_count(&self, layout: &GridLayout) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.flipped && layout.is_active(&entry.key))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_text_round_trip() {
        let key = tile_key('M', 3, 6);
        assert_eq!(key.to_string(), "M-3-6");
        assert_eq!("M-3-6".parse::<TileKey>(), Ok(key));
    }

    #[test]
    fn parse_rejects_bad_keys() {
        assert_eq!(
            TileKey::parse("M-1"),
            Err(TileKeyError::Malformed("M-1".to_string()))
        );
        assert_eq!(
            TileKey::parse("MO-1-1"),
            Err(TileKeyError::InvalidGlyph("MO".to_string()))
        );
        assert_eq!(
            TileKey::parse("M-x-1"),
            Err(TileKeyError::InvalidIndex("x".to_string()))
        );
    }

    #[test]
    fn toggle_twice_restores_value() {
        let mut state = TileState::new();
        let key = tile_key('O', 0, 1);
        assert!(state.toggle(key));
        assert!(!state.toggle(key));
        assert!(!state.is_flipped(&key));
        assert_eq!(state.flipped_count(), 0);
        assert!(state.is_empty());
    }

    #[test]
    fn set_keeps_one_entry_per_key() {
        let mut state = TileState::new();
        let key = tile_key('D', 6, 0);
        state.set(key, true);
        state.set(key, true);
        assert_eq!(state.entries().len(), 1);
        assert_eq!(state.flipped_count(), 1);
    }
}

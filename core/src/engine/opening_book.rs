//! A precomputed table of exact scores for shallow positions, loaded from a byte-exact file.

use crate::utils::next_prime;
use crate::Position;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};

/// The byte-width used to store each partial key, chosen based on `log_size` so that the key
/// array stays as small as possible while keeping the false-positive rate acceptable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum KeyWidth {
    One,
    Two,
    Four,
}

impl KeyWidth {
    fn from_byte(byte: u8) -> Option<KeyWidth> {
        match byte {
            1 => Some(KeyWidth::One),
            2 => Some(KeyWidth::Two),
            4 => Some(KeyWidth::Four),
            _ => None,
        }
    }

    fn as_byte(self) -> u8 {
        match self {
            KeyWidth::One => 1,
            KeyWidth::Two => 2,
            KeyWidth::Four => 4,
        }
    }

    fn bytes(self) -> usize {
        self.as_byte() as usize
    }
}

/// Errors that can occur while loading an opening book from disk.
#[derive(Debug)]
pub enum OpeningBookError {
    Io(std::io::Error),
    /// The file's WIDTH or HEIGHT header byte does not match the solver's board dimensions.
    DimensionMismatch { expected: (u8, u8), found: (u8, u8) },
    /// The depth header byte exceeds `WIDTH * HEIGHT`.
    DepthOutOfRange(u8),
    /// The partial-key byte-width header is not one of 1, 2, or 4.
    InvalidKeyWidth(u8),
    /// The value byte-width header is not 1.
    InvalidValueWidth(u8),
    /// The `log_size` header byte is outside `[21, 27]`.
    LogSizeOutOfRange(u8),
    /// The file ended before all key/value arrays were read.
    Truncated,
}

impl fmt::Display for OpeningBookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpeningBookError::Io(e) => write!(f, "i/o error reading opening book: {e}"),
            OpeningBookError::DimensionMismatch { expected, found } => write!(
                f,
                "opening book dimensions {found:?} do not match solver dimensions {expected:?}"
            ),
            OpeningBookError::DepthOutOfRange(d) => {
                write!(f, "opening book depth {d} exceeds board size")
            }
            OpeningBookError::InvalidKeyWidth(w) => {
                write!(f, "opening book partial-key width {w} is not one of 1, 2, 4")
            }
            OpeningBookError::InvalidValueWidth(w) => {
                write!(f, "opening book value width {w} must be 1")
            }
            OpeningBookError::LogSizeOutOfRange(l) => {
                write!(f, "opening book log_size {l} is outside [21, 27]")
            }
            OpeningBookError::Truncated => write!(f, "opening book file is truncated"),
        }
    }
}

impl std::error::Error for OpeningBookError {}

impl From<std::io::Error> for OpeningBookError {
    fn from(e: std::io::Error) -> OpeningBookError {
        OpeningBookError::Io(e)
    }
}

/// A precomputed lookup table mapping positions (by their reflection-canonical `key3`) to exact
/// scores, for every reachable position with at most `depth` stones played.
pub struct OpeningBook {
    depth: u8,
    key_width: KeyWidth,
    log_size: u8,
    size: u64,
    keys: Vec<u64>,
    values: Vec<u8>,
}

impl OpeningBook {
    /// Loads an opening book from a byte-exact file, validating every header field against the
    /// solver's board dimensions.
    pub fn load(path: &str) -> Result<OpeningBook, OpeningBookError> {
        let mut file = File::open(path)?;
        let mut header = [0u8; 6];
        file.read_exact(&mut header)?;

        let (width, height, depth, key_width_byte, value_width, log_size) =
            (header[0], header[1], header[2], header[3], header[4], header[5]);

        if width as usize != Position::WIDTH || height as usize != Position::HEIGHT {
            return Err(OpeningBookError::DimensionMismatch {
                expected: (Position::WIDTH as u8, Position::HEIGHT as u8),
                found: (width, height),
            });
        }
        if depth as usize > Position::BOARD_SIZE {
            return Err(OpeningBookError::DepthOutOfRange(depth));
        }
        let key_width =
            KeyWidth::from_byte(key_width_byte).ok_or(OpeningBookError::InvalidKeyWidth(key_width_byte))?;
        if value_width != 1 {
            return Err(OpeningBookError::InvalidValueWidth(value_width));
        }
        if !(21..=27).contains(&log_size) {
            return Err(OpeningBookError::LogSizeOutOfRange(log_size));
        }

        let size = next_prime(1u64 << log_size);

        let mut keys = Vec::with_capacity(size as usize);
        let mut key_buf = vec![0u8; key_width.bytes()];
        for _ in 0..size {
            file.read_exact(&mut key_buf).map_err(|_| OpeningBookError::Truncated)?;
            let key = match key_width {
                KeyWidth::One => key_buf[0] as u64,
                KeyWidth::Two => u16::from_le_bytes([key_buf[0], key_buf[1]]) as u64,
                KeyWidth::Four => {
                    u32::from_le_bytes([key_buf[0], key_buf[1], key_buf[2], key_buf[3]]) as u64
                }
            };
            keys.push(key);
        }

        let mut values = vec![0u8; size as usize];
        file.read_exact(&mut values).map_err(|_| OpeningBookError::Truncated)?;

        Ok(OpeningBook {
            depth,
            key_width,
            log_size,
            size,
            keys,
            values,
        })
    }

    /// Writes this book to disk in the byte-exact format described in `load`.
    pub fn save(&self, path: &str) -> Result<(), std::io::Error> {
        let mut file = File::create(path)?;
        let header = [
            Position::WIDTH as u8,
            Position::HEIGHT as u8,
            self.depth,
            self.key_width.as_byte(),
            1,
            self.log_size,
        ];
        file.write_all(&header)?;

        for &key in &self.keys {
            match self.key_width {
                KeyWidth::One => file.write_all(&[key as u8])?,
                KeyWidth::Two => file.write_all(&(key as u16).to_le_bytes())?,
                KeyWidth::Four => file.write_all(&(key as u32).to_le_bytes())?,
            }
        }
        file.write_all(&self.values)?;
        Ok(())
    }

    /// Builds a book from a map of `key3 -> score`, for a given maximum depth.
    ///
    /// `log_size` picks the slot count and `key_width` the on-disk width of the partial keys
    /// stored in each slot; both must agree with whatever a future `load` call expects.
    pub(crate) fn from_entries(
        entries: &std::collections::HashMap<u64, i32>,
        depth: u8,
        log_size: u8,
        key_width_bytes: u8,
    ) -> OpeningBook {
        let key_width = KeyWidth::from_byte(key_width_bytes).expect("invalid key width");
        let size = next_prime(1u64 << log_size);
        let mut keys = vec![0u64; size as usize];
        let mut values = vec![0u8; size as usize];

        for (&key3, &score) in entries {
            let index = (key3 % size) as usize;
            keys[index] = key3;
            values[index] = (score - Position::MIN_SCORE + 1) as u8;
        }

        OpeningBook {
            depth,
            key_width,
            log_size,
            size,
            keys,
            values,
        }
    }

    /// Looks up the exact score for `position`, returning `None` if the position is deeper than
    /// this book covers or is simply not present (an empty table slot, or a partial-key miss).
    pub fn get(&self, position: &Position) -> Option<i32> {
        if position.moves() > self.depth as usize {
            return None;
        }

        let key3 = position.key3();
        let index = (key3 % self.size) as usize;
        if self.keys[index] != key3 {
            return None;
        }

        let raw = self.values[index];
        if raw == 0 {
            None
        } else {
            Some(raw as i32 + Position::MIN_SCORE - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book() -> OpeningBook {
        let mut entries = std::collections::HashMap::new();
        let empty = Position::new();
        entries.insert(empty.key3(), 4);
        OpeningBook::from_entries(&entries, 1, 21, 1)
    }

    #[test]
    fn get_finds_a_stored_entry() {
        let book = sample_book();
        let position = Position::new();
        assert_eq!(book.get(&position), Some(4));
    }

    #[test]
    fn get_returns_none_beyond_book_depth() {
        let book = sample_book();
        let position = Position::from_moves("12").expect("valid moves");
        assert_eq!(book.get(&position), None);
    }

    #[test]
    fn get_returns_none_for_a_position_absent_from_the_book() {
        let mut entries = std::collections::HashMap::new();
        entries.insert(999u64, 4);
        let book = OpeningBook::from_entries(&entries, 6, 21, 1);

        let position = Position::new();
        assert_eq!(book.get(&position), None);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("connect4-opening-book-test-{}.bin", std::process::id()));
        let path = path.to_str().unwrap().to_string();

        let book = sample_book();
        book.save(&path).expect("save should succeed");

        let loaded = OpeningBook::load(&path).expect("load should succeed");
        let position = Position::new();
        assert_eq!(loaded.get(&position), Some(4));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_rejects_a_truncated_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("connect4-opening-book-truncated-{}.bin", std::process::id()));
        let path = path.to_str().unwrap().to_string();

        std::fs::write(&path, [Position::WIDTH as u8, Position::HEIGHT as u8, 1, 1, 1, 21]).unwrap();

        let result = OpeningBook::load(&path);
        assert!(matches!(result, Err(OpeningBookError::Truncated)));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_rejects_mismatched_dimensions() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("connect4-opening-book-dims-{}.bin", std::process::id()));
        let path = path.to_str().unwrap().to_string();

        std::fs::write(&path, [9u8, 9, 1, 1, 1, 21]).unwrap();

        let result = OpeningBook::load(&path);
        assert!(matches!(result, Err(OpeningBookError::DimensionMismatch { .. })));

        std::fs::remove_file(&path).ok();
    }
}

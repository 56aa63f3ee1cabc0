//! Fixed 24-entry class-to-key-notation table (§4.7).
//!
//! Indices 0..11 are minor keys in Camelot order 1A..12A; indices 12..23
//! are major keys in Camelot order 1B..12B. Each `nA`/`nB` pair is a
//! relative major/minor pair a fifth apart from its neighbors on the
//! Camelot wheel.

pub struct KeyEntry {
    pub camelot: &'static str,
    pub notation: &'static str,
}

pub const KEY_TABLE: [KeyEntry; 24] = [
    KeyEntry { camelot: "1A", notation: "G#m" },
    KeyEntry { camelot: "2A", notation: "D#m" },
    KeyEntry { camelot: "3A", notation: "A#m" },
    KeyEntry { camelot: "4A", notation: "Fm" },
    KeyEntry { camelot: "5A", notation: "Cm" },
    KeyEntry { camelot: "6A", notation: "Gm" },
    KeyEntry { camelot: "7A", notation: "Dm" },
    KeyEntry { camelot: "8A", notation: "Am" },
    KeyEntry { camelot: "9A", notation: "Em" },
    KeyEntry { camelot: "10A", notation: "Bm" },
    KeyEntry { camelot: "11A", notation: "F#m" },
    KeyEntry { camelot: "12A", notation: "C#m" },
    KeyEntry { camelot: "1B", notation: "B" },
    KeyEntry { camelot: "2B", notation: "F#" },
    KeyEntry { camelot: "3B", notation: "Db" },
    KeyEntry { camelot: "4B", notation: "Ab" },
    KeyEntry { camelot: "5B", notation: "Eb" },
    KeyEntry { camelot: "6B", notation: "Bb" },
    KeyEntry { camelot: "7B", notation: "F" },
    KeyEntry { camelot: "8B", notation: "C" },
    KeyEntry { camelot: "9B", notation: "G" },
    KeyEntry { camelot: "10B", notation: "D" },
    KeyEntry { camelot: "11B", notation: "A" },
    KeyEntry { camelot: "12B", notation: "E" },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_examples_match() {
        assert_eq!(KEY_TABLE[0].camelot, "1A");
        assert_eq!(KEY_TABLE[0].notation, "G#m");
        assert_eq!(KEY_TABLE[4].camelot, "5A");
        assert_eq!(KEY_TABLE[4].notation, "Cm");
        assert_eq!(KEY_TABLE[7].camelot, "8A");
        assert_eq!(KEY_TABLE[7].notation, "Am");
        assert_eq!(KEY_TABLE[11].camelot, "12A");
        assert_eq!(KEY_TABLE[11].notation, "C#m");
        assert_eq!(KEY_TABLE[12].camelot, "1B");
        assert_eq!(KEY_TABLE[12].notation, "B");
        assert_eq!(KEY_TABLE[19].camelot, "8B");
        assert_eq!(KEY_TABLE[19].notation, "C");
        assert_eq!(KEY_TABLE[20].camelot, "9B");
        assert_eq!(KEY_TABLE[20].notation, "G");
        assert_eq!(KEY_TABLE[23].camelot, "12B");
        assert_eq!(KEY_TABLE[23].notation, "E");
    }
}

//! Desk keyboard layout: character → world-space key slot.
//!
//! A staggered three-row QWERTY block plus a digit row and space bar,
//! centered on the keyboard origin. Hand assignment follows the key's world
//! X sign — keys left of center are typed by the left hand. Characters with
//! no key of their own resolve to the space bar so hand motion stays
//! continuous on encoding surprises.

use std::collections::HashMap;

use puppet_core::ik::Vec3;
use puppet_core::types::Hand;
use puppet_core::typing::{KeyboardMap, KeySlot};

/// Distance between adjacent key centers, metres.
pub const KEY_PITCH: f32 = 0.019;

/// Row-to-row depth step.
pub const ROW_PITCH: f32 = 0.019;

const DIGIT_ROW: &str = "1234567890";
const TOP_ROW: &str = "qwertyuiop";
const HOME_ROW: &str = "asdfghjkl;";
const BOTTOM_ROW: &str = "zxcvbnm,./";

/// Per-row horizontal stagger, fractions of a key pitch.
const STAGGER: [f32; 4] = [0.0, 0.5, 0.75, 1.25];

#[derive(Debug, Clone)]
pub struct QwertyLayout {
    keys: HashMap<char, KeySlot>,
    space: KeySlot,
}

impl QwertyLayout {
    /// Build the layout around `origin` (the center of the home row).
    pub fn new(origin: Vec3) -> Self {
        let mut keys = HashMap::new();
        let rows = [DIGIT_ROW, TOP_ROW, HOME_ROW, BOTTOM_ROW];
        // The home row sits on the origin; digits are two rows behind.
        let row_z = [-2.0 * ROW_PITCH, -ROW_PITCH, 0.0, ROW_PITCH];

        for (row_idx, row) in rows.iter().enumerate() {
            let count = row.chars().count() as f32;
            let left_edge = -(count - 1.0) * 0.5 * KEY_PITCH + STAGGER[row_idx] * KEY_PITCH;
            for (col, ch) in row.chars().enumerate() {
                let x = left_edge + col as f32 * KEY_PITCH;
                let position = origin + Vec3::new(x, 0.0, row_z[row_idx]);
                keys.insert(ch, slot_at(position));
            }
        }

        let space = slot_at(origin + Vec3::new(0.0, 0.0, 2.0 * ROW_PITCH));
        keys.insert(' ', space);

        Self { keys, space }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn slot_at(position: Vec3) -> KeySlot {
    KeySlot {
        position,
        hand: if position.x < 0.0 {
            Hand::Left
        } else {
            Hand::Right
        },
    }
}

impl KeyboardMap for QwertyLayout {
    fn key(&self, ch: char) -> Option<KeySlot> {
        self.keys.get(&ch.to_ascii_lowercase()).copied()
    }

    fn fallback(&self) -> KeySlot {
        self.space
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> QwertyLayout {
        QwertyLayout::new(Vec3::new(0.0, 0.74, 0.25))
    }

    #[test]
    fn covers_letters_digits_and_space() {
        let l = layout();
        for ch in ('a'..='z').chain('0'..='9').chain([' ', ';', ',', '.', '/']) {
            assert!(l.key(ch).is_some(), "missing key for {ch:?}");
        }
    }

    #[test]
    fn uppercase_maps_to_lowercase_key() {
        let l = layout();
        assert_eq!(l.key('Q'), l.key('q'));
        assert_eq!(l.key('M'), l.key('m'));
    }

    #[test]
    fn hand_split_follows_x_sign() {
        let l = layout();
        let q = l.key('q').expect("q");
        let p = l.key('p').expect("p");
        assert_eq!(q.hand, Hand::Left);
        assert_eq!(p.hand, Hand::Right);
        assert!(q.position.x < 0.0);
        assert!(p.position.x > 0.0);
    }

    #[test]
    fn unknown_char_falls_back_to_space() {
        let l = layout();
        assert!(l.key('€').is_none());
        assert_eq!(l.slot_or_fallback('€'), l.fallback());
        assert_eq!(l.fallback().position, l.key(' ').expect("space").position);
    }

    #[test]
    fn rows_are_staggered_and_spaced() {
        let l = layout();
        let q = l.key('q').expect("q").position;
        let a = l.key('a').expect("a").position;
        // Adjacent rows differ in depth by one row pitch.
        assert!((a.z - q.z - ROW_PITCH).abs() < 1e-6);
        // Stagger shifts the home row right of the top row.
        assert!(a.x > q.x);
    }

    #[test]
    fn adjacent_keys_one_pitch_apart() {
        let l = layout();
        let a = l.key('a').expect("a").position;
        let s = l.key('s').expect("s").position;
        assert!((a.distance(s) - KEY_PITCH).abs() < 1e-6);
    }
}

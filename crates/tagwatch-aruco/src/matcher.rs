//! Dictionary lookup with rotation search.

use crate::Dictionary;

/// A dictionary match for an observed code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    /// Tag id (index into the dictionary).
    pub id: u32,
    /// Quarter turns such that `observed == rotate_code_u64(code, n, rotation)`.
    pub rotation: u8,
    /// Bits that differ after rotation.
    pub hamming: u8,
}

/// Brute-force matcher over every id and rotation.
///
/// AprilTag families top out at a few hundred codes, so a linear scan over
/// precomputed rotations stays well under the decode cost.
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Dictionary,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
}

impl Matcher {
    /// `max_hamming` is capped at the dictionary's correction capability.
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        let n = dict.marker_size;
        let rotated = dict
            .codes
            .iter()
            .map(|&base| {
                [
                    base,
                    rotate_code_u64(base, n, 1),
                    rotate_code_u64(base, n, 2),
                    rotate_code_u64(base, n, 3),
                ]
            })
            .collect();
        let max_hamming = max_hamming.min(dict.max_correction_bits);
        Self {
            dict,
            max_hamming,
            rotated,
        }
    }

    #[inline]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Closest code within `max_hamming`; the lowest id wins ties.
    pub fn match_code(&self, observed: u64) -> Option<Match> {
        let mut best: Option<Match> = None;

        for (id, rots) in self.rotated.iter().enumerate() {
            for (rot, &cand) in rots.iter().enumerate() {
                let h = (observed ^ cand).count_ones() as u8;
                if h > self.max_hamming {
                    continue;
                }
                if best.is_some_and(|b| b.hamming <= h) {
                    continue;
                }
                best = Some(Match {
                    id: id as u32,
                    rotation: rot as u8,
                    hamming: h,
                });
                if h == 0 {
                    return best;
                }
            }
        }

        best
    }
}

/// Rotate a row-major code (`idx = y * n + x`) clockwise by `rot` quarter turns.
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 {
        return code;
    }

    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            let bit = (code >> (sy * n + sx)) & 1;
            out |= bit << (y * n + x);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict() -> Dictionary {
        Dictionary::new("synthetic", 4, 2, vec![0x52e6, 0x269e, 0x0c5c]).expect("dict")
    }

    #[test]
    fn four_quarter_turns_are_identity() {
        let code = 0x0123_4567_89ab_cdef_u64;
        let mut r = code;
        for _ in 0..4 {
            r = rotate_code_u64(r, 8, 1);
        }
        assert_eq!(code, r);
    }

    #[test]
    fn quarter_turn_moves_bottom_left_to_top_left() {
        // 2x2: bit 2 is (x=0, y=1)
        assert_eq!(rotate_code_u64(0b0100, 2, 1), 0b0001);
    }

    #[test]
    fn finds_rotated_code() {
        let d = dict();
        let observed = rotate_code_u64(d.codes[1], 4, 3);
        let m = Matcher::new(d, 0).match_code(observed).expect("match");
        assert_eq!(
            m,
            Match {
                id: 1,
                rotation: 3,
                hamming: 0
            }
        );
    }

    #[test]
    fn tolerates_flipped_bits_up_to_threshold() {
        let d = dict();
        let observed = d.codes[2] ^ 0b1;
        let m = Matcher::new(d.clone(), 1).match_code(observed).expect("match");
        assert_eq!((m.id, m.hamming), (2, 1));

        assert!(Matcher::new(d, 0).match_code(observed).is_none());
    }

    #[test]
    fn threshold_is_capped_by_dictionary() {
        let m = Matcher::new(dict(), 9);
        assert_eq!(m.max_hamming(), 2);
    }
}

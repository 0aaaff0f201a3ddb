use std::fmt;

use rand::Rng;
use sha1::{Digest, Sha1};

use crate::error::ChordError;

/// Largest supported `m`; keeps `2^m` representable as a `u64`.
pub const MAX_BITS: u32 = 63;

/// A position on the ring, always in `[0, 2^m)` for the ring that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(u64);

impl Identifier {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The identifier space of size `2^bits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ring {
    bits: u32,
    size: u64,
}

impl Ring {
    pub fn new(bits: u32) -> Result<Self, ChordError> {
        if bits == 0 || bits > MAX_BITS {
            return Err(ChordError::InvalidBits {
                bits,
                max: MAX_BITS,
            });
        }
        Ok(Self {
            bits,
            size: 1u64 << bits,
        })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Validate that `value` lies on this ring.
    pub fn identifier(&self, value: u64) -> Result<Identifier, ChordError> {
        if value >= self.size {
            return Err(ChordError::IdentifierOutOfRange {
                value,
                ring_size: self.size,
            });
        }
        Ok(Identifier(value))
    }

    /// Reduce any integer onto the ring.
    pub fn wrap(&self, value: u64) -> Identifier {
        Identifier(value & (self.size - 1))
    }

    /// Draw a uniformly random identifier.
    pub fn random(&self) -> Identifier {
        Identifier(rand::rng().random_range(0..self.size))
    }

    /// Hash arbitrary bytes onto the ring.
    ///
    /// The SHA-1 digest is read as one big-endian integer and reduced mod `2^m`,
    /// which keeps its low `m` bits. Only the trailing eight bytes matter since
    /// `m <= 63`.
    pub fn hash<S: AsRef<[u8]> + ?Sized>(&self, input: &S) -> Identifier {
        let mut hasher = Sha1::new();
        hasher.update(input.as_ref());
        let digest = hasher.finalize();
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&digest[digest.len() - 8..]);
        self.wrap(u64::from_be_bytes(tail))
    }

    /// Clockwise distance from `a` to `b`, in `[0, size)`.
    pub fn distance(&self, a: Identifier, b: Identifier) -> u64 {
        b.0.wrapping_sub(a.0) & (self.size - 1)
    }

    /// `n + 2^i mod 2^m`: where finger `i` of node `n` starts.
    pub fn finger_start(&self, n: Identifier, i: u32) -> Identifier {
        self.wrap(n.0.wrapping_add(1u64 << i))
    }

    /// Is `x` in the open interval `(a, b)` going clockwise?
    /// When `a == b` the interval is the whole ring except `a`.
    pub fn in_open(&self, x: Identifier, a: Identifier, b: Identifier) -> bool {
        let dx = self.distance(a, x);
        let db = self.distance(a, b);
        if db == 0 {
            dx != 0
        } else {
            dx > 0 && dx < db
        }
    }

    /// Is `x` in the half-open interval `(a, b]`?
    /// When `a == b` the interval is the whole ring.
    pub fn in_half_open(&self, x: Identifier, a: Identifier, b: Identifier) -> bool {
        let dx = self.distance(a, x);
        let db = self.distance(a, b);
        db == 0 || (dx > 0 && dx <= db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(ring: &Ring, v: u64) -> Identifier {
        ring.identifier(v).unwrap()
    }

    #[test]
    fn rejects_bad_bit_counts() {
        assert!(matches!(Ring::new(0), Err(ChordError::InvalidBits { bits: 0, .. })));
        assert!(matches!(Ring::new(64), Err(ChordError::InvalidBits { bits: 64, .. })));
        assert_eq!(Ring::new(63).unwrap().size(), 1u64 << 63);
    }

    #[test]
    fn identifiers_must_fit() {
        let ring = Ring::new(4).unwrap();
        assert_eq!(ring.identifier(15).unwrap().value(), 15);
        assert_eq!(
            ring.identifier(16),
            Err(ChordError::IdentifierOutOfRange {
                value: 16,
                ring_size: 16
            })
        );
    }

    #[test]
    fn distance_wraps_clockwise() {
        let ring = Ring::new(4).unwrap();
        assert_eq!(ring.distance(id(&ring, 5), id(&ring, 8)), 3);
        assert_eq!(ring.distance(id(&ring, 12), id(&ring, 3)), 7);
        assert_eq!(ring.distance(id(&ring, 7), id(&ring, 7)), 0);
    }

    #[test]
    fn distance_on_widest_ring() {
        let ring = Ring::new(MAX_BITS).unwrap();
        let top = id(&ring, ring.size() - 1);
        assert_eq!(ring.distance(top, id(&ring, 0)), 1);
        assert_eq!(ring.distance(id(&ring, 0), top), ring.size() - 1);
    }

    #[test]
    fn interval_membership() {
        let ring = Ring::new(4).unwrap();
        let (a, b) = (id(&ring, 12), id(&ring, 3));
        assert!(ring.in_open(id(&ring, 15), a, b));
        assert!(ring.in_open(id(&ring, 0), a, b));
        assert!(!ring.in_open(b, a, b));
        assert!(ring.in_half_open(b, a, b));
        assert!(!ring.in_half_open(a, a, b));
        assert!(!ring.in_half_open(id(&ring, 7), a, b));

        // degenerate interval covers everything
        assert!(ring.in_half_open(a, a, a));
        assert!(ring.in_open(b, a, a));
        assert!(!ring.in_open(a, a, a));
    }

    #[test]
    fn finger_starts_wrap() {
        let ring = Ring::new(4).unwrap();
        let n = id(&ring, 14);
        let starts: Vec<u64> = (0..4).map(|i| ring.finger_start(n, i).value()).collect();
        assert_eq!(starts, vec![15, 0, 2, 6]);
    }

    #[test]
    fn hash_is_deterministic_and_bounded() {
        for bits in [1, 4, 8, 16, 32, MAX_BITS] {
            let ring = Ring::new(bits).unwrap();
            for input in ["", "alpha", "beta", "node-42"] {
                let h = ring.hash(input);
                assert_eq!(h, ring.hash(input));
                assert!(h.value() < ring.size());
            }
        }
    }

    #[test]
    fn hash_keeps_low_bits_of_digest() {
        // sha1("abc") = a9993e36 4706816a ba3e2571 7850c26c 9cd0d89d
        let ring = Ring::new(32).unwrap();
        assert_eq!(ring.hash("abc").value(), 0x9cd0_d89d);
        let ring = Ring::new(4).unwrap();
        assert_eq!(ring.hash("abc").value(), 0xd);
    }

    #[test]
    fn random_ids_stay_on_ring() {
        let ring = Ring::new(5).unwrap();
        for _ in 0..100 {
            assert!(ring.random().value() < 32);
        }
    }
}

use super::identifier::{Identifier, Ring};

/// One routing entry: the first node that succeeds `start` on the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finger {
    pub start: Identifier,
    pub node: Identifier,
}

/// Chord finger table. Entry `i` starts at `owner + 2^i`; entry 0 is the successor.
///
/// The table always holds exactly `m` entries.
#[derive(Debug, Clone)]
pub struct FingerTable {
    fingers: Vec<Finger>,
}

impl FingerTable {
    /// A table whose entries all point back at `owner`.
    pub fn new(owner: Identifier, ring: &Ring) -> Self {
        let fingers = (0..ring.bits())
            .map(|i| Finger {
                start: ring.finger_start(owner, i),
                node: owner,
            })
            .collect();
        Self { fingers }
    }

    pub fn len(&self) -> usize {
        self.fingers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingers.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Finger> {
        self.fingers.get(i)
    }

    /// Point entry `i` at `node`. Returns true if the entry changed.
    pub fn set(&mut self, i: usize, node: Identifier) -> bool {
        match self.fingers.get_mut(i) {
            Some(finger) if finger.node != node => {
                finger.node = node;
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Finger> {
        self.fingers.iter()
    }

    pub fn nodes(&self) -> impl Iterator<Item = Identifier> + '_ {
        self.fingers.iter().map(|f| f.node)
    }

    /// Rewrite every entry pointing at `from` to point at `to`.
    pub fn replace(&mut self, from: Identifier, to: Identifier) -> usize {
        let mut replaced = 0;
        for finger in self.fingers.iter_mut().filter(|f| f.node == from) {
            finger.node = to;
            replaced += 1;
        }
        replaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_points_at_owner() {
        let ring = Ring::new(4).unwrap();
        let owner = ring.identifier(6).unwrap();
        let table = FingerTable::new(owner, &ring);
        assert_eq!(table.len(), 4);
        assert!(table.nodes().all(|n| n == owner));
        let starts: Vec<u64> = table.iter().map(|f| f.start.value()).collect();
        assert_eq!(starts, vec![7, 8, 10, 14]);
    }

    #[test]
    fn set_and_replace() {
        let ring = Ring::new(3).unwrap();
        let owner = ring.identifier(0).unwrap();
        let other = ring.identifier(5).unwrap();
        let mut table = FingerTable::new(owner, &ring);

        assert!(table.set(2, other));
        assert!(!table.set(2, other));
        assert!(!table.set(9, other));
        assert_eq!(table.get(2).map(|f| f.node), Some(other));

        assert_eq!(table.replace(owner, other), 2);
        assert!(table.nodes().all(|n| n == other));
    }
}

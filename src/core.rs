pub mod finger_table;
pub mod identifier;
pub mod storage;

use finger_table::FingerTable;
use identifier::{Identifier, Ring};
use storage::{Storage, Value};

use crate::error::ChordError;

/// One member of the ring.
///
/// Other members are referenced by identifier; the owning `Network` resolves them.
/// A predecessor equal to `id` means the predecessor is not known yet.
#[derive(Debug)]
pub struct Node {
    id: Identifier,
    ring: Ring,
    predecessor: Identifier,
    finger_table: FingerTable,
    storage: Storage,
}

impl Node {
    /// Create a lone node with `id` on a ring of `2^bits` identifiers.
    pub fn new(id: u64, bits: u32) -> Result<Self, ChordError> {
        let ring = Ring::new(bits)?;
        let id = ring.identifier(id)?;
        Ok(Self::on_ring(id, ring))
    }

    pub(crate) fn on_ring(id: Identifier, ring: Ring) -> Self {
        Self {
            id,
            ring,
            predecessor: id,
            finger_table: FingerTable::new(id, &ring),
            storage: Storage::new(),
        }
    }

    pub fn id(&self) -> Identifier {
        self.id
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub fn ring_size(&self) -> u64 {
        self.ring.size()
    }

    pub fn predecessor(&self) -> Identifier {
        self.predecessor
    }

    /// The successor lives in finger 0; a table is never empty since `m >= 1`.
    pub fn successor(&self) -> Identifier {
        self.finger_table.get(0).map_or(self.id, |f| f.node)
    }

    pub fn finger_table(&self) -> &FingerTable {
        &self.finger_table
    }

    pub(crate) fn finger_table_mut(&mut self) -> &mut FingerTable {
        &mut self.finger_table
    }

    /// Returns true if the pointer changed.
    pub(crate) fn set_predecessor(&mut self, predecessor: Identifier) -> bool {
        let changed = self.predecessor != predecessor;
        self.predecessor = predecessor;
        changed
    }

    /// Returns true if the pointer changed.
    pub(crate) fn set_successor(&mut self, successor: Identifier) -> bool {
        self.finger_table.set(0, successor)
    }

    /// Clockwise distance from `a` to `b` on this node's ring.
    pub fn distance(&self, a: Identifier, b: Identifier) -> u64 {
        self.ring.distance(a, b)
    }

    /// Whether `key` falls in `(predecessor, self]`.
    pub fn owns(&self, key: Identifier) -> bool {
        self.ring.in_half_open(key, self.predecessor, self.id)
    }

    /// The farthest finger strictly between this node and `key`, or this node.
    pub fn closest_preceding_finger(&self, key: Identifier) -> Identifier {
        self.closest_preceding_finger_where(key, |_| true)
    }

    /// As [`Node::closest_preceding_finger`], skipping fingers rejected by `usable`.
    pub(crate) fn closest_preceding_finger_where<F>(&self, key: Identifier, usable: F) -> Identifier
    where
        F: Fn(Identifier) -> bool,
    {
        self.finger_table
            .iter()
            .rev()
            .map(|f| f.node)
            .find(|&n| self.ring.in_open(n, self.id, key) && usable(n))
            .unwrap_or(self.id)
    }

    pub fn store(&mut self, key: Identifier, value: Value) -> Option<Value> {
        self.storage.insert(key, value)
    }

    pub fn get(&self, key: &Identifier) -> Option<&Value> {
        self.storage.get(key)
    }

    pub fn remove(&mut self, key: &Identifier) -> Option<Value> {
        self.storage.remove(key)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub(crate) fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_node_points_at_itself() {
        for id in [0, 3, 9, 15] {
            let node = Node::new(id, 4).unwrap();
            assert_eq!(node.predecessor(), node.id());
            assert_eq!(node.successor(), node.id());
            assert_eq!(node.id().value(), id);
        }
    }

    #[test]
    fn fresh_finger_table_has_m_self_entries() {
        for bits in 1..=12 {
            let node = Node::new(0, bits).unwrap();
            assert_eq!(node.finger_table().len(), bits as usize);
            assert!(node.finger_table().nodes().all(|n| n == node.id()));
        }
    }

    #[test]
    fn distance_matches_ring() {
        let node = Node::new(0, 4).unwrap();
        let ring = *node.ring();
        let id = |v| ring.identifier(v).unwrap();
        assert_eq!(node.ring_size(), 16);
        assert_eq!(node.distance(id(5), id(8)), 3);
        assert_eq!(node.distance(id(12), id(3)), 7);
        for a in 0..16 {
            for b in 0..16 {
                assert!(node.distance(id(a), id(b)) < 16);
            }
        }
    }

    #[test]
    fn rejects_invalid_arguments() {
        assert!(matches!(Node::new(0, 0), Err(ChordError::InvalidBits { .. })));
        assert!(matches!(
            Node::new(16, 4),
            Err(ChordError::IdentifierOutOfRange { value: 16, ring_size: 16 })
        ));
    }

    #[test]
    fn lone_node_owns_everything() {
        let node = Node::new(7, 4).unwrap();
        for v in 0..16 {
            assert!(node.owns(node.ring().identifier(v).unwrap()));
        }
    }

    #[test]
    fn closest_preceding_finger_picks_farthest_in_range() {
        let mut node = Node::new(0, 4).unwrap();
        let ring = *node.ring();
        let id = |v| ring.identifier(v).unwrap();
        // starts: 1, 2, 4, 8
        node.set_successor(id(3));
        node.finger_table_mut().set(1, id(3));
        node.finger_table_mut().set(2, id(6));
        node.finger_table_mut().set(3, id(10));

        assert_eq!(node.closest_preceding_finger(id(14)), id(10));
        assert_eq!(node.closest_preceding_finger(id(10)), id(6));
        assert_eq!(node.closest_preceding_finger(id(5)), id(3));
        assert_eq!(node.closest_preceding_finger(id(2)), id(0));
        assert_eq!(node.closest_preceding_finger_where(id(14), |n| n != id(10)), id(6));
    }

    #[test]
    fn local_storage() {
        let mut node = Node::new(2, 4).unwrap();
        let key = node.ring().hash("k");
        assert_eq!(node.store(key, b"v".to_vec()), None);
        assert_eq!(node.get(&key), Some(&b"v".to_vec()));
        assert_eq!(node.storage().len(), 1);
        assert_eq!(node.remove(&key), Some(b"v".to_vec()));
        assert!(node.get(&key).is_none());
    }
}

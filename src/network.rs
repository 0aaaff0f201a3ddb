use std::collections::{BTreeMap, HashSet, VecDeque};
use std::ops::Bound::{Excluded, Unbounded};

use tracing::{debug, trace, warn};

use crate::core::identifier::{Identifier, Ring};
use crate::core::storage::Value;
use crate::core::Node;
use crate::error::ChordError;

/// Upper bound on stabilization rounds run by [`Network::settle`].
pub const DEFAULT_MAX_SETTLE_ROUNDS: usize = 128;

/// Result of routing a key through the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    /// The node responsible for the key.
    pub owner: Identifier,
    /// Number of forwarding steps taken before the owner was found.
    pub hops: usize,
}

/// A simulated Chord ring.
///
/// Owns every active node, keyed by identifier. Node ids handed to
/// [`Network::new`] after the first are registered as pending and only become
/// ring members through [`Network::join`] or [`Network::join_pending`].
///
/// `join` follows the Chord protocol: the new node learns its successor and
/// nothing else. Pointers converge through [`Network::stabilize_round`];
/// [`Network::settle`] repeats rounds until no pointer or key moves. Key
/// lookups are exact once the ring has settled.
#[derive(Debug)]
pub struct Network {
    ring: Ring,
    nodes: BTreeMap<Identifier, Node>,
    pending: VecDeque<Identifier>,
    first: Identifier,
    max_settle_rounds: usize,
}

impl Network {
    /// Build a network on a ring of `2^bits` ids. Only `node_ids[0]` is active.
    pub fn new(bits: u32, node_ids: &[u64]) -> Result<Self, ChordError> {
        let ring = Ring::new(bits)?;
        let (&first, rest) = node_ids.split_first().ok_or(ChordError::EmptyNodeList)?;
        let first = ring.identifier(first)?;

        let mut seen = HashSet::from([first]);
        let mut pending = VecDeque::with_capacity(rest.len());
        for &raw in rest {
            let id = ring.identifier(raw)?;
            if !seen.insert(id) {
                return Err(ChordError::DuplicateNode(id));
            }
            pending.push_back(id);
        }

        let mut nodes = BTreeMap::new();
        nodes.insert(first, Node::on_ring(first, ring));
        debug!(bits, first = %first, pending = pending.len(), "created network");

        Ok(Self {
            ring,
            nodes,
            pending,
            first,
            max_settle_rounds: DEFAULT_MAX_SETTLE_ROUNDS,
        })
    }

    pub fn with_max_settle_rounds(mut self, rounds: usize) -> Self {
        self.max_settle_rounds = rounds.max(1);
        self
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub fn bits(&self) -> u32 {
        self.ring.bits()
    }

    pub fn ring_size(&self) -> u64 {
        self.ring.size()
    }

    /// The node joins are bootstrapped through and lookups start from.
    pub fn first(&self) -> Identifier {
        self.first
    }

    pub fn active_count(&self) -> usize {
        self.nodes.len()
    }

    /// Active ids in ascending order.
    pub fn active_ids(&self) -> impl Iterator<Item = Identifier> + '_ {
        self.nodes.keys().copied()
    }

    pub fn is_active(&self, id: Identifier) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: Identifier) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Ids registered at construction that have not joined yet.
    pub fn pending(&self) -> impl Iterator<Item = Identifier> + '_ {
        self.pending.iter().copied()
    }

    /// Map arbitrary data onto the ring. Deterministic and unsalted.
    pub fn hash_function<S: AsRef<[u8]> + ?Sized>(&self, data: &S) -> Identifier {
        self.ring.hash(data)
    }

    fn node_ref(&self, id: Identifier) -> Result<&Node, ChordError> {
        self.nodes.get(&id).ok_or(ChordError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: Identifier) -> Result<&mut Node, ChordError> {
        self.nodes.get_mut(&id).ok_or(ChordError::UnknownNode(id))
    }

    /// The first active id at or clockwise after `key`, from global membership.
    pub fn true_successor(&self, key: Identifier) -> Identifier {
        self.nodes
            .range(key..)
            .next()
            .or_else(|| self.nodes.iter().next())
            .map_or(key, |(id, _)| *id)
    }

    fn next_active_after(&self, id: Identifier) -> Identifier {
        self.nodes
            .range((Excluded(id), Unbounded))
            .next()
            .or_else(|| self.nodes.iter().next())
            .map_or(id, |(next, _)| *next)
    }

    /// Route `key` starting at node `from`, following successors and fingers.
    ///
    /// Every hop moves strictly closer to `key`, so a lookup visits each node
    /// at most once.
    pub fn find_successor(&self, from: Identifier, key: Identifier) -> Result<Lookup, ChordError> {
        let limit = self.nodes.len();
        let mut current = from;
        let mut hops = 0;

        loop {
            let node = self.node_ref(current)?;
            let successor = node.successor();
            if self.ring.in_half_open(key, current, successor) {
                trace!(key = %key, owner = %successor, hops, "lookup resolved");
                return Ok(Lookup {
                    owner: successor,
                    hops,
                });
            }

            let next = node.closest_preceding_finger_where(key, |n| self.nodes.contains_key(&n));
            if next == current {
                return Ok(Lookup {
                    owner: successor,
                    hops,
                });
            }

            hops += 1;
            if hops > limit {
                return Err(ChordError::LookupExhausted { key, hops });
            }
            trace!(from = %current, to = %next, key = %key, "lookup hop");
            current = next;
        }
    }

    /// Find the owner of `key` starting from the first node.
    pub fn lookup(&self, key: Identifier) -> Result<Lookup, ChordError> {
        self.find_successor(self.first, key)
    }

    /// Add `id` to the ring through the first node.
    ///
    /// The new node learns its successor and fills its fingers by lookup. It
    /// is not yet known to the rest of the ring; keys move to it once its
    /// successor accepts it as predecessor during stabilization.
    pub fn join(&mut self, id: u64) -> Result<Identifier, ChordError> {
        let id = self.ring.identifier(id)?;
        if self.nodes.contains_key(&id) {
            return Err(ChordError::AlreadyActive(id));
        }

        let bootstrap = self.first;
        let successor = self.find_successor(bootstrap, id)?.owner;
        let mut node = Node::on_ring(id, self.ring);
        node.set_successor(successor);

        for i in 1..self.ring.bits() {
            let start = self.ring.finger_start(id, i);
            let target = if self.ring.in_half_open(start, id, successor) {
                successor
            } else {
                self.find_successor(bootstrap, start)?.owner
            };
            node.finger_table_mut().set(i as usize, target);
        }

        self.nodes.insert(id, node);
        self.pending.retain(|p| *p != id);
        debug!(node = %id, successor = %successor, via = %bootstrap, "node joined");
        Ok(id)
    }

    /// Join every pending id in registration order, then settle the ring.
    pub fn join_pending(&mut self) -> Result<usize, ChordError> {
        while let Some(id) = self.pending.front().copied() {
            self.join(id.value())?;
        }
        self.settle()
    }

    /// Chord `stabilize` for node `n`: adopt the successor's predecessor if it
    /// sits between us, then notify the successor.
    pub fn stabilize(&mut self, n: Identifier) -> Result<bool, ChordError> {
        let mut successor = self.node_ref(n)?.successor();
        let candidate = self.node_ref(successor)?.predecessor();
        let mut changed = false;

        if self.nodes.contains_key(&candidate) && self.ring.in_open(candidate, n, successor) {
            changed |= self.node_mut(n)?.set_successor(candidate);
            debug!(node = %n, old = %successor, new = %candidate, "successor updated");
            successor = candidate;
        }

        changed |= self.notify(successor, n)?;
        Ok(changed)
    }

    /// Chord `notify`: `candidate` believes it precedes `target`.
    ///
    /// On acceptance, keys in `(old predecessor, candidate]` move to `candidate`.
    /// An unknown old predecessor hands over `(target, candidate]`.
    pub fn notify(&mut self, target: Identifier, candidate: Identifier) -> Result<bool, ChordError> {
        if target == candidate {
            return Ok(false);
        }
        if !self.nodes.contains_key(&candidate) {
            return Err(ChordError::UnknownNode(candidate));
        }
        let ring = self.ring;
        let node = self.node_mut(target)?;
        let predecessor = node.predecessor();
        // an unknown predecessor (== target) accepts any candidate
        if !ring.in_open(candidate, predecessor, target) {
            return Ok(false);
        }

        node.set_predecessor(candidate);
        let moved = node
            .storage_mut()
            .drain_where(|k| ring.in_half_open(k, predecessor, candidate));
        let moved_count = moved.len();
        self.node_mut(candidate)?.storage_mut().extend(moved);

        debug!(
            node = %target,
            old = %predecessor,
            new = %candidate,
            moved = moved_count,
            "predecessor updated"
        );
        Ok(true)
    }

    /// Refresh fingers `1..m` of node `n` by lookup. Finger 0 is kept by `stabilize`.
    pub fn fix_fingers(&mut self, n: Identifier) -> Result<bool, ChordError> {
        let mut changed = false;
        for i in 1..self.ring.bits() {
            let start = self.ring.finger_start(n, i);
            let owner = self.find_successor(n, start)?.owner;
            changed |= self.node_mut(n)?.finger_table_mut().set(i as usize, owner);
        }
        Ok(changed)
    }

    /// Hand every key node `n` does not own to the owner found by lookup from `n`.
    /// Returns how many keys left `n`.
    pub fn repair_keys(&mut self, n: Identifier) -> Result<usize, ChordError> {
        let ring = self.ring;
        let node = self.node_mut(n)?;
        let predecessor = node.predecessor();
        let stray = node
            .storage_mut()
            .drain_where(|k| !ring.in_half_open(k, predecessor, n));
        if stray.is_empty() {
            return Ok(0);
        }
        let moved = self.place_keys(n, stray)?;
        if moved > 0 {
            debug!(node = %n, moved, "repaired misplaced keys");
        }
        Ok(moved)
    }

    /// Store each entry at the owner found by lookup from `from`.
    /// Returns how many entries landed somewhere other than `from`.
    fn place_keys(
        &mut self,
        from: Identifier,
        entries: Vec<(Identifier, Value)>,
    ) -> Result<usize, ChordError> {
        let mut moved = 0;
        for (key, value) in entries {
            let owner = self.find_successor(from, key)?.owner;
            if owner != from {
                moved += 1;
            }
            self.node_mut(owner)?.store(key, value);
        }
        Ok(moved)
    }

    /// Run stabilize on every node in ascending order, fix every finger table,
    /// then move misplaced keys toward their owners.
    /// Returns whether any pointer or key moved.
    pub fn stabilize_round(&mut self) -> Result<bool, ChordError> {
        let ids: Vec<Identifier> = self.nodes.keys().copied().collect();
        let mut changed = false;
        for &id in &ids {
            changed |= self.stabilize(id)?;
        }
        for &id in &ids {
            changed |= self.fix_fingers(id)?;
        }
        for &id in &ids {
            changed |= self.repair_keys(id)? > 0;
        }
        trace!(changed, nodes = ids.len(), "stabilization round");
        Ok(changed)
    }

    /// Run stabilization rounds until no pointer or key moves.
    /// Returns the number of rounds run.
    pub fn settle(&mut self) -> Result<usize, ChordError> {
        for round in 1..=self.max_settle_rounds {
            if !self.stabilize_round()? {
                debug!(rounds = round, nodes = self.nodes.len(), "ring settled");
                return Ok(round);
            }
        }
        warn!(
            rounds = self.max_settle_rounds,
            "ring still changing after maximum stabilization rounds"
        );
        Ok(self.max_settle_rounds)
    }

    /// Remove `id` from the ring gracefully.
    ///
    /// Every pointer at it is rewritten: successors and fingers to its
    /// successor, predecessors to its predecessor. Its keys are then routed
    /// from that successor to their owners.
    pub fn leave(&mut self, id: u64) -> Result<(), ChordError> {
        let id = self.ring.identifier(id)?;
        if !self.nodes.contains_key(&id) {
            return Err(ChordError::UnknownNode(id));
        }
        if self.nodes.len() == 1 {
            return Err(ChordError::LastNode(id));
        }
        let mut departing = self.nodes.remove(&id).ok_or(ChordError::UnknownNode(id))?;

        let heir = match departing.successor() {
            s if s != id && self.nodes.contains_key(&s) => s,
            _ => self.next_active_after(id),
        };
        let predecessor = departing.predecessor();
        let predecessor_known = predecessor != id && self.nodes.contains_key(&predecessor);

        for node in self.nodes.values_mut() {
            node.finger_table_mut().replace(id, heir);
            if node.predecessor() == id {
                let replacement = if predecessor_known {
                    predecessor
                } else {
                    node.id()
                };
                node.set_predecessor(replacement);
            }
        }

        if self.first == id {
            self.first = heir;
        }

        let keys = departing.storage_mut().drain_where(|_| true);
        let handed_off = keys.len();
        self.place_keys(heir, keys)?;
        debug!(node = %id, heir = %heir, keys = handed_off, "node left");
        Ok(())
    }

    /// Store `value` at the node responsible for `hash(key)`.
    /// Returns the lookup that found the owner.
    ///
    /// On an unsettled ring the owner may be stale; stabilization rounds move
    /// the key on.
    pub fn put<K: AsRef<[u8]> + ?Sized>(&mut self, key: &K, value: Value) -> Result<Lookup, ChordError> {
        let key = self.ring.hash(key);
        let lookup = self.lookup(key)?;
        self.node_mut(lookup.owner)?.store(key, value);
        debug!(key = %key, owner = %lookup.owner, hops = lookup.hops, "stored value");
        Ok(lookup)
    }

    pub fn get<K: AsRef<[u8]> + ?Sized>(&self, key: &K) -> Result<Option<&Value>, ChordError> {
        let key = self.ring.hash(key);
        let owner = self.lookup(key)?.owner;
        Ok(self.node_ref(owner)?.get(&key))
    }

    pub fn remove<K: AsRef<[u8]> + ?Sized>(&mut self, key: &K) -> Result<Option<Value>, ChordError> {
        let key = self.ring.hash(key);
        let owner = self.lookup(key)?.owner;
        Ok(self.node_mut(owner)?.remove(&key))
    }

    /// Whether every successor and predecessor matches the sorted membership.
    pub fn is_consistent(&self) -> bool {
        let ids: Vec<Identifier> = self.nodes.keys().copied().collect();
        let len = ids.len();
        ids.iter().enumerate().all(|(i, id)| {
            let next = ids[(i + 1) % len];
            let prev = ids[(i + len - 1) % len];
            self.nodes
                .get(id)
                .is_some_and(|n| n.successor() == next && n.predecessor() == prev)
        })
    }
}

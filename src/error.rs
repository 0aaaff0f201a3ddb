//! Error types for ring and network operations.

use crate::core::identifier::Identifier;

/// Errors returned by the Chord simulation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChordError {
    /// The number of identifier bits is outside the supported range.
    #[error("identifier bits must be between 1 and {max}, got {bits}")]
    InvalidBits { bits: u32, max: u32 },

    /// A network was requested without any node ids.
    #[error("a network needs at least one node id")]
    EmptyNodeList,

    /// An identifier does not fit in the ring.
    #[error("identifier {value} is outside a ring of size {ring_size}")]
    IdentifierOutOfRange { value: u64, ring_size: u64 },

    /// The same node id was registered twice.
    #[error("node {0} is registered more than once")]
    DuplicateNode(Identifier),

    /// No active node has this id.
    #[error("node {0} is not an active ring member")]
    UnknownNode(Identifier),

    /// The node is already part of the ring.
    #[error("node {0} has already joined the ring")]
    AlreadyActive(Identifier),

    /// The last node cannot leave; the ring would be empty.
    #[error("node {0} is the last ring member and cannot leave")]
    LastNode(Identifier),

    /// A lookup did not converge within the hop limit.
    #[error("lookup for {key} did not converge after {hops} hops")]
    LookupExhausted { key: Identifier, hops: usize },

    /// Simulation settings could not be parsed or are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

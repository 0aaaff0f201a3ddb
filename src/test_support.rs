#[cfg(test)]
pub mod test_support {
    use crate::core::identifier::Identifier;
    use crate::network::Network;

    pub fn id(network: &Network, value: u64) -> Identifier {
        network.ring().identifier(value).unwrap()
    }

    /// A network with every id joined and the ring settled.
    pub fn settled_network(bits: u32, ids: &[u64]) -> Network {
        let mut network = Network::new(bits, ids).unwrap();
        network.join_pending().unwrap();
        assert!(network.is_consistent(), "ring failed to settle: {network:?}");
        network
    }
}

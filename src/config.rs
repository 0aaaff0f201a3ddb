//! Settings for the demo simulation binary.
//!
//! Every option can be given on the command line or through its `CHORD_*`
//! environment variable; lists are comma-separated.

use std::collections::HashSet;

use clap::Parser;

use crate::core::identifier::Ring;
use crate::error::ChordError;
use crate::network::DEFAULT_MAX_SETTLE_ROUNDS;

pub const DEFAULT_BITS: u32 = 8;
pub const DEFAULT_NODE_COUNT: usize = 10;

fn default_keys() -> Vec<String> {
    ["alpha", "bravo", "charlie", "delta", "echo"]
        .iter()
        .map(|k| k.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "chord", version, about = "Chord ring simulation")]
pub struct SimulationConfig {
    /// Identifier bits: the ring holds `2^bits` ids.
    #[arg(short, long, env = "CHORD_BITS", default_value_t = DEFAULT_BITS)]
    pub bits: u32,

    /// Explicit node ids; the first seeds the ring. Empty means pick at random.
    #[arg(short, long = "nodes", env = "CHORD_NODES", value_delimiter = ',')]
    pub node_ids: Vec<u64>,

    /// How many random ids to draw when no node ids are given.
    #[arg(long, env = "CHORD_NODE_COUNT", default_value_t = DEFAULT_NODE_COUNT)]
    pub node_count: usize,

    /// Keys stored once the ring has settled.
    #[arg(
        short,
        long,
        env = "CHORD_KEYS",
        value_delimiter = ',',
        default_values_t = default_keys()
    )]
    pub keys: Vec<String>,

    /// Upper bound on stabilization rounds.
    #[arg(long, env = "CHORD_SETTLE_ROUNDS", default_value_t = DEFAULT_MAX_SETTLE_ROUNDS)]
    pub max_settle_rounds: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            bits: DEFAULT_BITS,
            node_ids: Vec::new(),
            node_count: DEFAULT_NODE_COUNT,
            keys: default_keys(),
            max_settle_rounds: DEFAULT_MAX_SETTLE_ROUNDS,
        }
    }
}

impl SimulationConfig {
    /// Parse `args` (program name first), then validate.
    pub fn load_from<I, T>(args: I) -> Result<Self, ChordError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config =
            Self::try_parse_from(args).map_err(|e| ChordError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that span more than one option.
    pub fn validate(&self) -> Result<(), ChordError> {
        let ring = Ring::new(self.bits).map_err(|e| ChordError::InvalidConfig(e.to_string()))?;
        if self.node_ids.is_empty() && self.node_count == 0 {
            return Err(ChordError::InvalidConfig(
                "either node ids or a non-zero node count is required".to_string(),
            ));
        }
        if self.max_settle_rounds == 0 {
            return Err(ChordError::InvalidConfig(
                "max settle rounds must be at least 1".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(self.node_ids.len());
        for &id in &self.node_ids {
            if id >= ring.size() {
                return Err(ChordError::InvalidConfig(format!(
                    "node id {id} does not fit a ring of size {}",
                    ring.size()
                )));
            }
            if !seen.insert(id) {
                return Err(ChordError::InvalidConfig(format!(
                    "node id {id} is listed more than once"
                )));
            }
        }
        Ok(())
    }

    /// The explicit ids, or `node_count` distinct random ids.
    pub fn resolved_node_ids(&self) -> Result<Vec<u64>, ChordError> {
        if !self.node_ids.is_empty() {
            return Ok(self.node_ids.clone());
        }
        let ring = Ring::new(self.bits)?;
        Ok(random_node_ids(&ring, self.node_count))
    }
}

fn random_node_ids(ring: &Ring, count: usize) -> Vec<u64> {
    let count = count.min(usize::try_from(ring.size()).unwrap_or(usize::MAX));
    let mut seen = HashSet::with_capacity(count);
    let mut ids = Vec::with_capacity(count);
    while ids.len() < count {
        let id = ring.random();
        if seen.insert(id) {
            ids.push(id.value());
        }
    }
    ids
}

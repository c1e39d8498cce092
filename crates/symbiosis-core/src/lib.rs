//! Core engine for host/symbiont coevolution on a spatial population grid.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

pub mod config;
pub mod efficient;
pub mod error;
pub mod host;
pub mod observer;
pub mod organism;
pub mod pgg;
pub mod phage;
pub mod random;
pub mod resources;
pub mod symbiont;
pub mod world;

pub use config::{MutationMode, SimulationMode, StartingValue, SymbiosisConfig};
pub use efficient::EfficientSymbiont;
pub use error::{OrganismError, WorldError};
pub use host::{BasicHost, Host, HostState};
pub use observer::{LineageRecord, NullObserver, TickSummary, TransmissionCounters, WorldObserver};
pub use organism::{Genome, Lifeform, Organism, OrganismArena, Vitals};
pub use pgg::{PggHost, PggSymbiont};
pub use phage::{Bacterium, Phage};
pub use resources::Exchange;
pub use symbiont::{BasicSymbiont, Symbiont, SymbiontState};
pub use symbiosis_index::{CellTopology, IndexError, PopulationStructure};
pub use world::{Census, World};

new_key_type! {
    /// Stable handle for organisms backed by a generational slot map.
    pub struct OrganismId;
}

/// High level simulation clock (updates processed since setup).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Lineage counter (organisms produced by reproduction increment this).
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct Generation(pub u32);

impl Generation {
    /// Advances to the next lineage generation.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

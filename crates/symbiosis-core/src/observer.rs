//! Hooks through which statistics and lineage collectors watch a world.

use crate::{Generation, OrganismId, Tick};
use serde::{Deserialize, Serialize};

/// Identity of an organism at the moment it is placed or destroyed.
#[derive(Debug, Clone, PartialEq)]
pub struct LineageRecord {
    pub id: OrganismId,
    pub parent: Option<OrganismId>,
    pub generation: Generation,
    pub kind: &'static str,
    pub interaction_val: f64,
    pub tick: Tick,
}

/// Vertical and horizontal transmission counts for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmissionCounters {
    pub vertical_attempts: u64,
    pub vertical_successes: u64,
    pub horizontal_attempts: u64,
    pub horizontal_successes: u64,
}

/// Summary emitted to observers each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick: Tick,
    pub hosts: usize,
    pub hosted_symbionts: usize,
    pub free_symbionts: usize,
    pub uninfected_hosts: usize,
    pub births: usize,
    pub deaths: usize,
    pub mean_host_interaction: Option<f64>,
    pub mean_symbiont_interaction: Option<f64>,
    pub counters: TransmissionCounters,
}

/// Observer invoked by the world; every hook defaults to a no-op.
pub trait WorldObserver: Send {
    /// An organism received an arena handle.
    fn on_placed(&mut self, _record: &LineageRecord) {}

    /// An organism was removed from the arena.
    fn on_destroyed(&mut self, _record: &LineageRecord) {}

    fn on_tick(&mut self, _summary: &TickSummary) {}
}

/// No-op observer.
#[derive(Debug, Default)]
pub struct NullObserver;

impl WorldObserver for NullObserver {}

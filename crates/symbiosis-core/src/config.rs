//! Typed run configuration.

use crate::error::WorldError;
use crate::random;
use rand::{RngCore, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use symbiosis_index::PopulationStructure;

/// Which organism kinds a world seeds itself with.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// Plain hosts and symbionts.
    #[default]
    Default,
    /// Symbionts whose resource intake is scaled by an evolving efficiency.
    Efficient,
    /// Bacteria and temperate phage.
    Lysis,
    /// Symbionts playing a public-goods game inside their host.
    Pgg,
}

/// Initial value for a trait: either drawn per organism or fixed for everyone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StartingValue {
    Random,
    Fixed(f64),
}

impl StartingValue {
    /// Resolve to a concrete value, drawing uniformly from `[low, high)` when random.
    pub fn resolve(self, rng: &mut dyn RngCore, low: f64, high: f64) -> f64 {
        match self {
            Self::Random => random::uniform(rng, low, high),
            Self::Fixed(value) => value,
        }
    }

    fn within(self, low: f64, high: f64) -> bool {
        match self {
            Self::Random => true,
            Self::Fixed(value) => (low..=high).contains(&value),
        }
    }
}

/// Selects which mutation rate/size pair applies to an offspring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationMode {
    /// Host births and symbionts passed down to a newborn host.
    Vertical,
    /// Symbiont offspring produced independently of host reproduction.
    Horizontal,
}

/// Static configuration for a symbiosis world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SymbiosisConfig {
    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
    /// Organism kinds used by world setup.
    pub mode: SimulationMode,
    /// Cell layout used for placement and neighbour lookups.
    pub structure: PopulationStructure,
    /// Width of the world in cells.
    pub grid_x: usize,
    /// Height of the world in cells.
    pub grid_y: usize,
    /// Hosts injected at setup; `None` fills every cell.
    pub pop_size: Option<usize>,
    /// Symbionts injected per host at setup.
    pub start_moi: f64,
    /// Interaction value of injected hosts.
    pub host_int: StartingValue,
    /// Injected hosts alternate between two fixed strategies (0 and 0.95), overriding `host_int`.
    pub competition_mode: bool,
    /// Interaction value of injected symbionts.
    pub sym_int: StartingValue,

    /// Probability that a vertical mutation happens at all.
    pub mutation_rate: f64,
    /// Standard deviation of vertical mutations.
    pub mutation_size: f64,
    /// Horizontal mutation probability; `None` reuses `mutation_rate`.
    pub horiz_mutation_rate: Option<f64>,
    /// Horizontal mutation size; `None` reuses `mutation_size`.
    pub horiz_mutation_size: Option<f64>,

    /// Multiplier applied to resources a cooperating symbiont returns to its host.
    pub synergy: f64,
    /// Probability that a symbiont attempts vertical transmission into a newborn host.
    pub vertical_transmission: f64,
    /// Points a symbiont pays to transmit vertically.
    pub sym_vert_trans_res: f64,
    /// Enables independent symbiont reproduction.
    pub horiz_trans: bool,
    /// Points a symbiont needs to reproduce horizontally.
    pub sym_horiz_trans_res: f64,
    /// Points a host needs to reproduce.
    pub host_repro_res: f64,
    /// Resources each host requests per update.
    pub res_distribute: f64,
    /// Finite resource pool; `None` means unlimited resources.
    pub limited_res_total: Option<f64>,
    /// Amount added to the finite pool at the start of each update.
    pub limited_res_inflow: f64,

    /// Maximum symbionts a host can carry.
    pub sym_limit: usize,
    /// Halve the admission odds for every symbiont already present.
    pub phage_exclude: bool,
    /// Probability a free-living symbiont tries to enter the host in its cell.
    pub sym_infection_chance: StartingValue,
    /// Probability an infection attempt kills the symbiont instead.
    pub sym_infection_failure_rate: f64,
    /// Keep symbiont offspring in a free-living layer instead of neighbouring hosts.
    pub free_living_syms: bool,
    /// Let free-living symbionts wander when they do not infect.
    pub move_free_syms: bool,
    /// Resources a free-living symbiont requests per update.
    pub free_sym_res_distribute: f64,
    /// Host age limit in updates; 0 disables ageing death.
    pub host_age_max: u32,
    /// Symbiont age limit in updates; 0 disables ageing death.
    pub sym_age_max: u32,

    /// Enables the phage lysis/lysogeny life cycle.
    pub lysis: bool,
    /// Phage probability of choosing lysis on entry.
    pub lysis_chance: StartingValue,
    /// Lysogen probability of switching to lysis each update.
    pub chance_of_induction: StartingValue,
    /// Burst timer value at which a lytic phage bursts its host.
    pub burst_time: f64,
    /// Points per staged lytic offspring.
    pub sym_lysis_res: f64,
    /// Lysogen probability of being lost each update.
    pub prophage_loss_rate: f64,
    pub mutate_lysis_chance: bool,
    pub mutate_induction_chance: bool,
    /// Bacterium incorporation values mutate in offspring.
    pub mutate_host_inc_val: bool,
    /// Phage incorporation values mutate in offspring.
    pub mutate_phage_inc_val: bool,
    /// Lysogens return incorporation-weighted resources to bacteria.
    pub benefit_to_host: bool,
    pub host_inc_val: StartingValue,
    pub phage_inc_val: StartingValue,

    /// Efficiency mutation probability; `None` reuses the horizontal rate.
    pub efficiency_mut_rate: Option<f64>,

    /// Share of points each public-goods symbiont donates to the pool.
    pub pgg_donate: f64,
    /// Multiplier applied to the pool before it is split among symbionts.
    pub pgg_synergy: f64,

    /// Tick summaries retained in memory.
    pub history_capacity: usize,
}

impl Default for SymbiosisConfig {
    fn default() -> Self {
        Self {
            rng_seed: Some(10),
            mode: SimulationMode::Default,
            structure: PopulationStructure::Mixed,
            grid_x: 100,
            grid_y: 100,
            pop_size: None,
            start_moi: 1.0,
            host_int: StartingValue::Random,
            competition_mode: false,
            sym_int: StartingValue::Random,
            mutation_rate: 1.0,
            mutation_size: 0.002,
            horiz_mutation_rate: None,
            horiz_mutation_size: None,
            synergy: 5.0,
            vertical_transmission: 0.7,
            sym_vert_trans_res: 0.0,
            horiz_trans: true,
            sym_horiz_trans_res: 100.0,
            host_repro_res: 1000.0,
            res_distribute: 100.0,
            limited_res_total: None,
            limited_res_inflow: 0.0,
            sym_limit: 1,
            phage_exclude: false,
            sym_infection_chance: StartingValue::Fixed(1.0),
            sym_infection_failure_rate: 0.0,
            free_living_syms: false,
            move_free_syms: false,
            free_sym_res_distribute: 0.0,
            host_age_max: 0,
            sym_age_max: 0,
            lysis: false,
            lysis_chance: StartingValue::Random,
            chance_of_induction: StartingValue::Fixed(0.0),
            burst_time: 10.0,
            sym_lysis_res: 1.0,
            prophage_loss_rate: 0.0,
            mutate_lysis_chance: false,
            mutate_induction_chance: false,
            mutate_host_inc_val: false,
            mutate_phage_inc_val: false,
            benefit_to_host: false,
            host_inc_val: StartingValue::Fixed(0.0),
            phage_inc_val: StartingValue::Fixed(0.0),
            efficiency_mut_rate: None,
            pgg_donate: 0.0,
            pgg_synergy: 1.1,
            history_capacity: 256,
        }
    }
}

impl SymbiosisConfig {
    /// Checks every value that would otherwise silently corrupt a run.
    pub fn validate(&self) -> Result<(), WorldError> {
        if self.grid_x == 0 || self.grid_y == 0 {
            return Err(WorldError::InvalidConfig("grid dimensions must be non-zero"));
        }
        if self.pop_size.is_some_and(|size| size > self.cell_count()) {
            return Err(WorldError::InvalidConfig(
                "pop_size cannot exceed the number of cells",
            ));
        }
        if !self.host_int.within(-1.0, 1.0) || !self.sym_int.within(-1.0, 1.0) {
            return Err(WorldError::InvalidConfig(
                "host_int and sym_int must be between -1 and 1",
            ));
        }
        let chances = [
            self.sym_infection_chance,
            self.lysis_chance,
            self.chance_of_induction,
            self.host_inc_val,
            self.phage_inc_val,
        ];
        if chances.iter().any(|value| !value.within(0.0, 1.0)) {
            return Err(WorldError::InvalidConfig(
                "infection, lysis, induction and incorporation values must be between 0 and 1",
            ));
        }
        let probabilities = [
            Some(self.mutation_rate),
            self.horiz_mutation_rate,
            self.efficiency_mut_rate,
            Some(self.vertical_transmission),
            Some(self.sym_infection_failure_rate),
            Some(self.prophage_loss_rate),
            Some(self.pgg_donate),
        ];
        if probabilities
            .into_iter()
            .flatten()
            .any(|p| !(0.0..=1.0).contains(&p))
        {
            return Err(WorldError::InvalidConfig(
                "rates and probabilities must be between 0 and 1",
            ));
        }
        let amounts = [
            Some(self.start_moi),
            Some(self.mutation_size),
            self.horiz_mutation_size,
            Some(self.synergy),
            Some(self.sym_vert_trans_res),
            Some(self.sym_horiz_trans_res),
            Some(self.host_repro_res),
            Some(self.res_distribute),
            self.limited_res_total,
            Some(self.limited_res_inflow),
            Some(self.free_sym_res_distribute),
            Some(self.burst_time),
            Some(self.pgg_synergy),
        ];
        if amounts.into_iter().flatten().any(|v| !(v >= 0.0 && v.is_finite())) {
            return Err(WorldError::InvalidConfig(
                "sizes, thresholds and resource amounts must be finite and non-negative",
            ));
        }
        if self.lysis && self.mode == SimulationMode::Lysis && self.sym_lysis_res <= 0.0 {
            return Err(WorldError::DegenerateLysisCost(self.sym_lysis_res));
        }
        if self.history_capacity == 0 {
            return Err(WorldError::InvalidConfig("history_capacity must be non-zero"));
        }
        Ok(())
    }

    /// Number of cells in each population layer.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.grid_x.saturating_mul(self.grid_y)
    }

    /// Mutation probability for the given transmission mode.
    #[must_use]
    pub fn mutation_rate_for(&self, mode: MutationMode) -> f64 {
        match mode {
            MutationMode::Vertical => self.mutation_rate,
            MutationMode::Horizontal => self.horiz_mutation_rate.unwrap_or(self.mutation_rate),
        }
    }

    /// Mutation size for the given transmission mode.
    #[must_use]
    pub fn mutation_size_for(&self, mode: MutationMode) -> f64 {
        match mode {
            MutationMode::Vertical => self.mutation_size,
            MutationMode::Horizontal => self.horiz_mutation_size.unwrap_or(self.mutation_size),
        }
    }

    /// Efficiency mutation probability, falling back to the horizontal rate.
    #[must_use]
    pub fn efficiency_mutation_rate(&self) -> f64 {
        self.efficiency_mut_rate
            .unwrap_or_else(|| self.mutation_rate_for(MutationMode::Horizontal))
    }

    /// Zeroes every mutation-related setting so offspring become exact copies.
    pub fn zero_mutation(&mut self) {
        self.mutation_rate = 0.0;
        self.mutation_size = 0.0;
        self.horiz_mutation_rate = Some(0.0);
        self.horiz_mutation_size = Some(0.0);
        self.efficiency_mut_rate = Some(0.0);
        self.mutate_lysis_chance = false;
        self.mutate_induction_chance = false;
        self.mutate_host_inc_val = false;
        self.mutate_phage_inc_val = false;
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    pub(crate) fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

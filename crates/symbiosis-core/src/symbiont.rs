//! Symbionts: organisms living inside a host or free in the parallel cell layer.

use crate::config::{MutationMode, SymbiosisConfig};
use crate::error::{OrganismError, check_interaction, check_probability};
use crate::host::Host;
use crate::organism::{Genome, Organism, Vitals};
use crate::world::World;
use crate::{OrganismId, random, resources};
use rand::RngCore;

/// State shared by every symbiont kind.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbiontState {
    pub vitals: Vitals,
    interaction_val: f64,
    infection_chance: f64,
    /// Non-owning back-reference; `None` while free-living or not yet placed.
    pub host: Option<OrganismId>,
}

impl SymbiontState {
    pub fn new(interaction_val: f64, infection_chance: f64) -> Result<Self, OrganismError> {
        Ok(Self {
            vitals: Vitals::default(),
            interaction_val: check_interaction(interaction_val)?,
            infection_chance: check_probability("infection chance", infection_chance)?,
            host: None,
        })
    }

    /// Copy of the heritable state with fresh vitals and no host.
    #[must_use]
    pub fn offspring(&self) -> Self {
        Self {
            vitals: self.vitals.offspring(),
            interaction_val: self.interaction_val,
            infection_chance: self.infection_chance,
            host: None,
        }
    }

    #[must_use]
    pub fn interaction_val(&self) -> f64 {
        self.interaction_val
    }

    pub fn set_interaction_val(&mut self, value: f64) -> Result<(), OrganismError> {
        self.interaction_val = check_interaction(value)?;
        Ok(())
    }

    /// Interaction value forced by a life-cycle switch rather than user input.
    pub(crate) fn force_interaction_val(&mut self, value: f64) {
        self.interaction_val = value.clamp(-1.0, 1.0);
    }

    #[must_use]
    pub fn infection_chance(&self) -> f64 {
        self.infection_chance
    }

    pub fn set_infection_chance(&mut self, value: f64) -> Result<(), OrganismError> {
        self.infection_chance = check_probability("infection chance", value)?;
        Ok(())
    }

    /// Base mutation; infection chance only evolves when free-living life is enabled.
    pub fn mutate(&mut self, rng: &mut dyn RngCore, config: &SymbiosisConfig, mode: MutationMode) {
        if !random::chance(rng, config.mutation_rate_for(mode)) {
            return;
        }
        let size = config.mutation_size_for(mode);
        self.interaction_val = random::perturb(rng, self.interaction_val, size, -1.0, 1.0);
        if config.free_living_syms {
            self.infection_chance = random::perturb(rng, self.infection_chance, size, 0.0, 1.0);
        }
    }

    pub(crate) fn genome(&self, kind: &str) -> Genome {
        Genome {
            infection_chance: Some(self.infection_chance),
            ..Genome::new(kind, self.interaction_val)
        }
    }
}

/// Capabilities every symbiont kind provides to hosts and the scheduler.
pub trait Symbiont: Organism {
    fn state(&self) -> &SymbiontState;

    fn state_mut(&mut self) -> &mut SymbiontState;

    /// Offspring with a copied genome, mutated under `mode`.
    fn reproduce(
        &self,
        rng: &mut dyn RngCore,
        config: &SymbiosisConfig,
        mode: MutationMode,
    ) -> Box<dyn Symbiont>;

    /// Run one update at `location`, inside `host` or free-living when `host` is `None`.
    fn process(&mut self, world: &mut World, host: Option<&mut dyn Host>, location: usize);

    /// Play the payoff game over `share`, keeping the symbiont's portion and returning the host's.
    fn process_resources(
        &mut self,
        share: f64,
        host: &mut dyn Host,
        config: &SymbiosisConfig,
    ) -> f64 {
        exchange_resources(self, share, host, config)
    }

    /// Try to pass an offspring into a newborn host.
    fn vertical_transmission(&mut self, world: &mut World, offspring: &mut dyn Host) {
        let threshold = world.config().sym_vert_trans_res;
        if !world.will_transmit() || self.points() < threshold {
            return;
        }
        let (rng, config) = world.context();
        let child = self.reproduce(rng, config, MutationMode::Vertical);
        self.set_points(self.points() - threshold);
        let admitted = world.add_symbiont(offspring, child).is_some();
        world.record_vertical(admitted);
    }

    /// Hook run when the symbiont enters a host.
    fn upon_injection(&mut self, _rng: &mut dyn RngCore, _config: &SymbiosisConfig) {}

    /// Contribution to the host's public-goods pool.
    fn process_pool(&mut self) -> f64 {
        0.0
    }

    fn host(&self) -> Option<OrganismId> {
        self.state().host
    }

    fn set_host(&mut self, host: Option<OrganismId>) {
        self.state_mut().host = host;
    }

    fn infection_chance(&self) -> f64 {
        self.state().infection_chance()
    }

    fn wants_to_infect(&self, rng: &mut dyn RngCore) -> bool {
        random::chance(rng, self.infection_chance())
    }

    fn infection_fails(&self, rng: &mut dyn RngCore, config: &SymbiosisConfig) -> bool {
        random::chance(rng, config.sym_infection_failure_rate)
    }
}

/// Default payoff: the symbiont keeps its portion of `share` and the host's portion is returned.
pub fn exchange_resources<S: Symbiont + ?Sized>(
    sym: &mut S,
    share: f64,
    host: &dyn Host,
    config: &SymbiosisConfig,
) -> f64 {
    let split = resources::exchange(
        share,
        host.interaction_val(),
        sym.interaction_val(),
        config.synergy,
    );
    sym.add_points(split.symbiont);
    split.host
}

/// One update of the symbiont lifecycle: age, feed if free, transmit, then move or infect.
pub fn process_symbiont(sym: &mut dyn Symbiont, world: &mut World, location: usize) {
    sym.grow_older(world.config().sym_age_max);
    if sym.is_dead() {
        return;
    }
    let free = sym.host().is_none();
    if free && world.config().free_living_syms {
        let gained = world.pull_resources(world.config().free_sym_res_distribute);
        sym.add_points(gained);
    }
    horizontal_transmission(sym, world, location);
    if free {
        world.move_free_sym(sym, location);
    }
}

/// Independent reproduction once the symbiont holds enough points.
pub fn horizontal_transmission(sym: &mut dyn Symbiont, world: &mut World, location: usize) {
    let config = world.config();
    if !config.horiz_trans || sym.points() < config.sym_horiz_trans_res {
        return;
    }
    sym.set_points(0.0);
    let (rng, config) = world.context();
    let child = sym.reproduce(rng, config, MutationMode::Horizontal);
    let placed = world.sym_do_birth(child, location).is_some();
    world.record_horizontal(placed);
}

/// The plain symbiont used by the default mode.
#[derive(Debug, Clone)]
pub struct BasicSymbiont {
    state: SymbiontState,
}

impl BasicSymbiont {
    pub fn new(interaction_val: f64, infection_chance: f64) -> Result<Self, OrganismError> {
        Ok(Self {
            state: SymbiontState::new(interaction_val, infection_chance)?,
        })
    }
}

impl Organism for BasicSymbiont {
    fn kind(&self) -> &'static str {
        "symbiont"
    }

    fn vitals(&self) -> &Vitals {
        &self.state.vitals
    }

    fn vitals_mut(&mut self) -> &mut Vitals {
        &mut self.state.vitals
    }

    fn interaction_val(&self) -> f64 {
        self.state.interaction_val()
    }

    fn set_interaction_val(&mut self, value: f64) -> Result<(), OrganismError> {
        self.state.set_interaction_val(value)
    }

    fn mutate(&mut self, rng: &mut dyn RngCore, config: &SymbiosisConfig, mode: MutationMode) {
        self.state.mutate(rng, config, mode);
    }

    fn genome(&self) -> Genome {
        self.state.genome(self.kind())
    }
}

impl Symbiont for BasicSymbiont {
    fn state(&self) -> &SymbiontState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SymbiontState {
        &mut self.state
    }

    fn reproduce(
        &self,
        rng: &mut dyn RngCore,
        config: &SymbiosisConfig,
        mode: MutationMode,
    ) -> Box<dyn Symbiont> {
        let mut child = Self {
            state: self.state.offspring(),
        };
        child.mutate(rng, config, mode);
        Box::new(child)
    }

    fn process(&mut self, world: &mut World, _host: Option<&mut dyn Host>, location: usize) {
        process_symbiont(self, world, location);
    }
}

//! Public-goods game: symbionts pool part of their points inside a shared host.

use crate::config::{MutationMode, SymbiosisConfig};
use crate::error::{OrganismError, check_probability};
use crate::host::{Host, HostState, distribute_resources, process_host};
use crate::organism::{Genome, Lifeform, Organism, Vitals};
use crate::random;
use crate::symbiont::{Symbiont, SymbiontState, process_symbiont};
use crate::world::World;
use rand::RngCore;

/// Host that collects its symbionts' donations into a pool and shares it back out.
#[derive(Debug)]
pub struct PggHost {
    state: HostState,
    pool: f64,
}

impl PggHost {
    pub fn new(interaction_val: f64) -> Result<Self, OrganismError> {
        Ok(Self {
            state: HostState::new(interaction_val)?,
            pool: 0.0,
        })
    }

    #[must_use]
    pub fn pool(&self) -> f64 {
        self.pool
    }

    /// Split the amplified pool equally among resident symbionts, then empty it.
    fn distribute_pool(&mut self, world: &mut World) {
        let ids = self.state.symbionts.clone();
        let piece = self.pool * world.config().pgg_synergy / ids.len() as f64;
        for id in ids {
            if let Some(sym) = world.symbiont_mut(id) {
                sym.add_points(piece);
            }
        }
        self.pool = 0.0;
    }
}

impl Organism for PggHost {
    fn kind(&self) -> &'static str {
        "pgg_host"
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
        Genome::new(self.kind(), self.interaction_val())
    }
}

impl Host for PggHost {
    fn state(&self) -> &HostState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut HostState {
        &mut self.state
    }

    fn reproduce(&self, rng: &mut dyn RngCore, config: &SymbiosisConfig) -> Box<dyn Host> {
        let mut baby = Self {
            state: self.state.offspring(),
            pool: 0.0,
        };
        baby.mutate(rng, config, MutationMode::Vertical);
        Box::new(baby)
    }

    fn distribute(&mut self, resources: f64, world: &mut World) {
        distribute_resources(self, resources, world);
        for id in self.state.symbionts.clone() {
            if let Some(mut sym) = world.checkout_symbiont(id) {
                self.pool += sym.process_pool();
                world.restore(id, Lifeform::Symbiont(sym));
            }
        }
        if !self.state.symbionts.is_empty() {
            self.distribute_pool(world);
        }
    }

    fn process(&mut self, world: &mut World, location: usize) {
        process_host(self, world, location);
    }
}

/// Symbiont that donates a share of its points to the host's pool every update.
#[derive(Debug, Clone)]
pub struct PggSymbiont {
    state: SymbiontState,
    donation: f64,
}

impl PggSymbiont {
    pub fn new(
        interaction_val: f64,
        infection_chance: f64,
        donation: f64,
    ) -> Result<Self, OrganismError> {
        Ok(Self {
            state: SymbiontState::new(interaction_val, infection_chance)?,
            donation: check_probability("donation", donation)?,
        })
    }

    #[must_use]
    pub fn donation(&self) -> f64 {
        self.donation
    }
}

impl Organism for PggSymbiont {
    fn kind(&self) -> &'static str {
        "pgg_symbiont"
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
        if random::chance(rng, config.mutation_rate_for(mode)) {
            self.donation = random::perturb(
                rng,
                self.donation,
                config.mutation_size_for(mode),
                0.0,
                1.0,
            );
        }
    }

    fn genome(&self) -> Genome {
        Genome {
            donation: Some(self.donation),
            ..self.state.genome(self.kind())
        }
    }
}

impl Symbiont for PggSymbiont {
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
            donation: self.donation,
        };
        child.mutate(rng, config, mode);
        Box::new(child)
    }

    fn process(&mut self, world: &mut World, _host: Option<&mut dyn Host>, location: usize) {
        process_symbiont(self, world, location);
    }

    fn process_pool(&mut self) -> f64 {
        let donated = self.donation * self.points();
        self.set_points(self.points() - donated);
        donated
    }
}
